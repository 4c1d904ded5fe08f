//! JSON API for the voice agent and the dashboard.
//!
//! - `POST   /api/v1/verify_carrier`: MC number eligibility
//! - `POST   /api/v1/search_loads`: ranked load matches
//! - `POST   /api/v1/evaluate_offer`: one negotiation round
//! - `POST   /api/v1/extract_call_data`: structured fields from a transcript
//! - `POST   /api/v1/classify_call`: outcome, sentiment, confidence
//! - `POST   /api/v1/log_call`: persist a finished call
//! - `GET    /api/v1/call_logs`: newest-first call history
//! - `GET    /api/v1/call_stats`: aggregate dashboard numbers
//! - `DELETE /api/v1/call_logs`: reset the call log

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use freightdesk_core::{
    desk::{
        classification::CallClassification,
        extraction::PartialCallFields,
        matching::{DateWindow, LoadRequirements, ScoredLoad},
        negotiation::{Decision, NegotiationStrategy},
        CompletedCall, DeskRuntime,
    },
    domain::{
        call::{CallId, CallOutcome, CallRecord, Sentiment},
        carrier::{CarrierVerification, McNumber},
        load::{EquipmentType, LoadId},
    },
    errors::{ApplicationError, DomainError, InterfaceError},
    stats::CallStats,
    verification::{verify_raw, CarrierVerifier},
};
use freightdesk_db::repositories::{
    CallLogFilter, CallRecordRepository, RepositoryError, DEFAULT_LIST_LIMIT,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct ApiState {
    desk: Arc<dyn DeskRuntime>,
    calls: Arc<dyn CallRecordRepository>,
    verifier: Arc<dyn CarrierVerifier>,
}

impl ApiState {
    pub fn new(
        desk: Arc<dyn DeskRuntime>,
        calls: Arc<dyn CallRecordRepository>,
        verifier: Arc<dyn CarrierVerifier>,
    ) -> Self {
        Self { desk, calls, verifier }
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/verify_carrier", post(verify_carrier))
        .route("/api/v1/search_loads", post(search_loads))
        .route("/api/v1/evaluate_offer", post(evaluate_offer))
        .route("/api/v1/extract_call_data", post(extract_call_data))
        .route("/api/v1/classify_call", post(classify_call))
        .route("/api/v1/log_call", post(log_call))
        .route("/api/v1/call_logs", get(call_logs).delete(clear_call_logs))
        .route("/api/v1/call_stats", get(call_stats))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
    pub detail: String,
    pub correlation_id: String,
}

pub type ApiRejection = (StatusCode, Json<ApiErrorBody>);

#[derive(Debug, Deserialize)]
pub struct VerifyCarrierRequest {
    pub mc_number: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchLoadsRequest {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub equipment_type: Option<String>,
    #[serde(alias = "optional_pickup_date")]
    pub pickup_date: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SearchLoadsResponse {
    pub status: &'static str,
    pub loads: Vec<ScoredLoad>,
    pub total_matches: usize,
}

#[derive(Debug, Deserialize)]
pub struct EvaluateOfferRequest {
    pub load_id: String,
    pub proposed_rate: Decimal,
    #[serde(default = "first_round")]
    pub round: u32,
}

fn first_round() -> u32 {
    1
}

#[derive(Debug, Serialize)]
pub struct EvaluateOfferResponse {
    pub load_id: LoadId,
    pub round: u32,
    pub proposed_rate: Decimal,
    #[serde(flatten)]
    pub decision: Decision,
    pub message: String,
    pub floor: Decimal,
    pub ceiling: Decimal,
    pub strategy: NegotiationStrategy,
}

#[derive(Debug, Deserialize)]
pub struct TranscriptRequest {
    pub call_transcript: String,
}

#[derive(Debug, Deserialize)]
pub struct ClassifyCallRequest {
    pub call_transcript: String,
    pub outcome: Option<String>,
}

/// A finished call. With `call_transcript` the record is derived from the
/// transcript and any explicit field below takes precedence.
#[derive(Debug, Default, Deserialize)]
pub struct LogCallRequest {
    pub carrier_mc: String,
    pub carrier_name: Option<String>,
    pub load_id: Option<String>,
    pub loadboard_rate: Option<Decimal>,
    pub agreed_rate: Option<Decimal>,
    pub negotiation_rounds: Option<u32>,
    pub outcome: Option<String>,
    pub sentiment: Option<String>,
    pub notes: Option<String>,
    pub call_duration_seconds: Option<u32>,
    pub timestamp: Option<DateTime<Utc>>,
    pub call_transcript: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LogCallResponse {
    pub status: &'static str,
    pub call_id: CallId,
    pub message: &'static str,
}

#[derive(Debug, Default, Deserialize)]
pub struct CallLogsQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub outcome: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct CallLogsResponse {
    pub status: &'static str,
    pub total_calls: usize,
    pub calls: Vec<CallRecord>,
}

#[derive(Debug, Serialize)]
pub struct ClearCallLogsResponse {
    pub status: &'static str,
    pub deleted: u64,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub async fn verify_carrier(
    State(state): State<ApiState>,
    Json(body): Json<VerifyCarrierRequest>,
) -> Result<Json<CarrierVerification>, ApiRejection> {
    let verification =
        verify_raw(state.verifier.as_ref(), &body.mc_number).await.map_err(application_rejection)?;

    info!(
        event_name = "carrier.verified",
        mc_number = %body.mc_number.trim(),
        eligible = verification.eligible,
        "carrier verification completed"
    );
    Ok(Json(verification))
}

pub async fn search_loads(
    State(state): State<ApiState>,
    Json(body): Json<SearchLoadsRequest>,
) -> Result<Json<SearchLoadsResponse>, ApiRejection> {
    let requirements = LoadRequirements {
        origin: non_blank(body.origin),
        destination: non_blank(body.destination),
        equipment_type: non_blank(body.equipment_type)
            .map(|raw| EquipmentType::from_str(&raw))
            .transpose()
            .map_err(domain_rejection)?,
        pickup_window: non_blank(body.pickup_date)
            .map(|raw| parse_day(&raw, "pickup_date"))
            .transpose()
            .map_err(domain_rejection)?
            .map(DateWindow::on_day),
    };

    let loads = state.desk.search_loads(&requirements, body.limit);
    info!(
        event_name = "loads.searched",
        total_matches = loads.len(),
        "load search completed"
    );
    Ok(Json(SearchLoadsResponse { status: "success", total_matches: loads.len(), loads }))
}

pub async fn evaluate_offer(
    State(state): State<ApiState>,
    Json(body): Json<EvaluateOfferRequest>,
) -> Result<Json<EvaluateOfferResponse>, ApiRejection> {
    let load_id = LoadId::canonical(&body.load_id);
    let evaluation = state
        .desk
        .evaluate_offer(&load_id, body.proposed_rate, body.round)
        .map_err(domain_rejection)?;

    info!(
        event_name = "offer.evaluated",
        load_id = %evaluation.load_id,
        round = evaluation.round,
        decision = %evaluation.decision,
        "offer evaluated"
    );
    Ok(Json(EvaluateOfferResponse {
        load_id: evaluation.load_id,
        round: evaluation.round,
        proposed_rate: evaluation.proposed_rate,
        decision: evaluation.decision,
        message: evaluation.message,
        floor: evaluation.bounds.floor,
        ceiling: evaluation.bounds.ceiling,
        strategy: evaluation.strategy,
    }))
}

pub async fn extract_call_data(
    State(state): State<ApiState>,
    Json(body): Json<TranscriptRequest>,
) -> Json<PartialCallFields> {
    Json(state.desk.extract_call_data(&body.call_transcript))
}

pub async fn classify_call(
    State(state): State<ApiState>,
    Json(body): Json<ClassifyCallRequest>,
) -> Result<Json<CallClassification>, ApiRejection> {
    let declared = non_blank(body.outcome)
        .map(|raw| CallOutcome::from_str(&raw))
        .transpose()
        .map_err(domain_rejection)?;

    let fields = state.desk.extract_call_data(&body.call_transcript);
    let classification = state.desk.classify_call(&body.call_transcript, &fields, None);
    let classification = match declared {
        Some(declared) => classification.reconcile_declared(declared),
        None => classification,
    };
    Ok(Json(classification))
}

pub async fn log_call(
    State(state): State<ApiState>,
    Json(body): Json<LogCallRequest>,
) -> Result<Json<LogCallResponse>, ApiRejection> {
    let record = build_record(state.desk.as_ref(), body).map_err(domain_rejection)?;
    let call_id = record.call_id.clone();
    let outcome = record.outcome;

    state.calls.save(record).await.map_err(repository_rejection)?;

    info!(
        event_name = "call.logged",
        call_id = %call_id,
        outcome = %outcome,
        "call logged"
    );
    Ok(Json(LogCallResponse {
        status: "success",
        call_id,
        message: "Call logged successfully",
    }))
}

pub async fn call_logs(
    State(state): State<ApiState>,
    Query(query): Query<CallLogsQuery>,
) -> Result<Json<CallLogsResponse>, ApiRejection> {
    let filter = CallLogFilter {
        outcome: non_blank(query.outcome)
            .map(|raw| CallOutcome::from_str(&raw))
            .transpose()
            .map_err(domain_rejection)?,
        limit: Some(query.limit.unwrap_or(DEFAULT_LIST_LIMIT)),
        ..window_filter(query.start_date, query.end_date).map_err(domain_rejection)?
    };

    let calls = state.calls.list(&filter).await.map_err(repository_rejection)?;
    Ok(Json(CallLogsResponse { status: "success", total_calls: calls.len(), calls }))
}

pub async fn call_stats(
    State(state): State<ApiState>,
    Query(query): Query<CallLogsQuery>,
) -> Result<Json<CallStats>, ApiRejection> {
    let filter = window_filter(query.start_date, query.end_date).map_err(domain_rejection)?;
    let stats = state.calls.stats(&filter).await.map_err(repository_rejection)?;
    Ok(Json(stats))
}

pub async fn clear_call_logs(
    State(state): State<ApiState>,
) -> Result<Json<ClearCallLogsResponse>, ApiRejection> {
    let deleted = state.calls.clear().await.map_err(repository_rejection)?;
    warn!(event_name = "call_logs.cleared", deleted, "call log cleared");
    Ok(Json(ClearCallLogsResponse { status: "success", deleted }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn build_record(desk: &dyn DeskRuntime, body: LogCallRequest) -> Result<CallRecord, DomainError> {
    let carrier_mc = McNumber::parse(&body.carrier_mc)?;
    let outcome = non_blank(body.outcome).map(|raw| CallOutcome::from_str(&raw)).transpose()?;
    let sentiment = non_blank(body.sentiment).map(|raw| Sentiment::from_str(&raw)).transpose()?;
    let load_id = non_blank(body.load_id).map(|raw| LoadId::canonical(&raw));

    let mut record = match non_blank(body.call_transcript) {
        Some(transcript) => {
            let mut call = CompletedCall::new(carrier_mc, transcript);
            call.carrier_name = body.carrier_name;
            call.call_duration_seconds = body.call_duration_seconds;
            call.timestamp = body.timestamp;
            desk.assemble_call(call)
        }
        None => CallRecord {
            call_id: CallId::generate(),
            carrier_mc,
            carrier_name: body.carrier_name,
            timestamp: body.timestamp.unwrap_or_else(Utc::now),
            load_id: None,
            loadboard_rate: None,
            agreed_rate: None,
            negotiation_rounds: 0,
            outcome: CallOutcome::Unknown,
            sentiment: Sentiment::Neutral,
            notes: None,
            call_duration_seconds: body.call_duration_seconds.unwrap_or(0),
        },
    };

    if let Some(load_id) = load_id {
        record.load_id = Some(load_id);
    }
    if let Some(outcome) = outcome {
        record.outcome = outcome;
    }
    if let Some(sentiment) = sentiment {
        record.sentiment = sentiment;
    }
    if let Some(rounds) = body.negotiation_rounds {
        record.negotiation_rounds = rounds;
    }
    if body.agreed_rate.is_some() {
        record.agreed_rate = body.agreed_rate;
    }
    if let Some(notes) = non_blank(body.notes) {
        record.notes = Some(notes);
    }
    // The baseline always follows the final load id unless given explicitly.
    record.loadboard_rate = body.loadboard_rate.or_else(|| {
        let load_id = record.load_id.as_ref()?;
        desk.catalog().find(load_id).map(|load| load.loadboard_rate)
    });

    desk.validate_record(&record)?;
    Ok(record)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|raw| raw.trim().to_string()).filter(|raw| !raw.is_empty())
}

fn parse_day(raw: &str, field: &str) -> Result<NaiveDate, DomainError> {
    if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(day);
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc).date_naive())
        .map_err(|_| DomainError::InvalidInput(format!("{field} `{raw}` is not an ISO date")))
}

/// Dates cover the whole day: a start date begins at midnight, an end date
/// runs to the last microsecond. Full RFC 3339 timestamps are used as given.
fn parse_bound(raw: &str, field: &str, end_of_day: bool) -> Result<DateTime<Utc>, DomainError> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    let day = parse_day(raw, field)?;
    let time = if end_of_day {
        NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999)
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)
    }
    .ok_or_else(|| DomainError::InvalidInput(format!("{field} has no valid time of day")))?;
    Ok(day.and_time(time).and_utc())
}

fn window_filter(
    start_date: Option<String>,
    end_date: Option<String>,
) -> Result<CallLogFilter, DomainError> {
    let start = non_blank(start_date).map(|raw| parse_bound(&raw, "start_date", false)).transpose()?;
    let end = non_blank(end_date).map(|raw| parse_bound(&raw, "end_date", true)).transpose()?;
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            return Err(DomainError::InvalidInput("end_date is before start_date".to_string()));
        }
    }
    Ok(CallLogFilter { start, end, ..CallLogFilter::default() })
}

fn correlation_id() -> String {
    format!("req-{}", &Uuid::new_v4().simple().to_string()[..12])
}

fn reject(error: InterfaceError) -> ApiRejection {
    let status = match &error {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    warn!(
        event_name = "api.request.rejected",
        correlation_id = %error.correlation_id(),
        status = status.as_u16(),
        error = %error,
        "request rejected"
    );
    (
        status,
        Json(ApiErrorBody {
            error: error.user_message().to_string(),
            detail: error.message().to_string(),
            correlation_id: error.correlation_id().to_string(),
        }),
    )
}

fn application_rejection(error: ApplicationError) -> ApiRejection {
    reject(error.into_interface(correlation_id()))
}

fn domain_rejection(error: DomainError) -> ApiRejection {
    application_rejection(ApplicationError::from(error))
}

fn repository_rejection(error: RepositoryError) -> ApiRejection {
    application_rejection(ApplicationError::Persistence(error.to_string()))
}
