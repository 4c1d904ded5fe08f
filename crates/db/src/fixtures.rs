use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use freightdesk_core::domain::call::{CallId, CallOutcome, CallRecord, Sentiment};
use freightdesk_core::domain::carrier::McNumber;
use freightdesk_core::domain::load::LoadId;

use crate::repositories::{CallRecordRepository, RepositoryError};

/// Canonical sample calls used by demos, dashboards and smoke checks.
const SAMPLE_CALLS: &[SampleCallContract] = &[
    SampleCallContract {
        call_id: "CALL_SEED0001",
        carrier_mc: "MC123456",
        carrier_name: "ABC Trucking",
        load_id: "LD001",
        loadboard_rate: 2500,
        agreed_rate: Some(2400),
        negotiation_rounds: 1,
        outcome: CallOutcome::Booked,
        sentiment: Sentiment::Positive,
        notes: "Quick decision, very professional",
        call_duration_seconds: 180,
    },
    SampleCallContract {
        call_id: "CALL_SEED0002",
        carrier_mc: "MC234567",
        carrier_name: "XYZ Logistics",
        load_id: "LD002",
        loadboard_rate: 2200,
        agreed_rate: Some(2200),
        negotiation_rounds: 0,
        outcome: CallOutcome::Booked,
        sentiment: Sentiment::Positive,
        notes: "Accepted immediately",
        call_duration_seconds: 120,
    },
    SampleCallContract {
        call_id: "CALL_SEED0003",
        carrier_mc: "MC345678",
        carrier_name: "Fast Freight",
        load_id: "LD003",
        loadboard_rate: 1800,
        agreed_rate: Some(1750),
        negotiation_rounds: 2,
        outcome: CallOutcome::Negotiated,
        sentiment: Sentiment::Neutral,
        notes: "Wanted to think about it",
        call_duration_seconds: 240,
    },
    SampleCallContract {
        call_id: "CALL_SEED0004",
        carrier_mc: "MC456789",
        carrier_name: "Slow Haul Inc",
        load_id: "LD004",
        loadboard_rate: 1600,
        agreed_rate: None,
        negotiation_rounds: 1,
        outcome: CallOutcome::Rejected,
        sentiment: Sentiment::Negative,
        notes: "Rate too low, not interested",
        call_duration_seconds: 90,
    },
    SampleCallContract {
        call_id: "CALL_SEED0005",
        carrier_mc: "MC567890",
        carrier_name: "Prime Transport",
        load_id: "LD005",
        loadboard_rate: 2800,
        agreed_rate: Some(2700),
        negotiation_rounds: 1,
        outcome: CallOutcome::Booked,
        sentiment: Sentiment::Positive,
        notes: "Minimal negotiation, booked quickly",
        call_duration_seconds: 200,
    },
    SampleCallContract {
        call_id: "CALL_SEED0006",
        carrier_mc: "MC678901",
        carrier_name: "Elite Carriers",
        load_id: "LD006",
        loadboard_rate: 1200,
        agreed_rate: Some(1200),
        negotiation_rounds: 0,
        outcome: CallOutcome::Booked,
        sentiment: Sentiment::Positive,
        notes: "Backhaul opportunity, accepted immediately",
        call_duration_seconds: 100,
    },
    SampleCallContract {
        call_id: "CALL_SEED0007",
        carrier_mc: "MC789012",
        carrier_name: "National Freight",
        load_id: "LD007",
        loadboard_rate: 1950,
        agreed_rate: Some(1900),
        negotiation_rounds: 2,
        outcome: CallOutcome::Negotiated,
        sentiment: Sentiment::Neutral,
        notes: "Will call back after checking schedule",
        call_duration_seconds: 280,
    },
    SampleCallContract {
        call_id: "CALL_SEED0008",
        carrier_mc: "MC890123",
        carrier_name: "Budget Trucking",
        load_id: "LD008",
        loadboard_rate: 1400,
        agreed_rate: None,
        negotiation_rounds: 3,
        outcome: CallOutcome::Rejected,
        sentiment: Sentiment::Negative,
        notes: "Too far from their base, declined",
        call_duration_seconds: 320,
    },
];

/// Sample call dataset covering every agreement and rejection shape.
///
/// Record ids are deterministic, so loading twice overwrites instead of
/// duplicating.
pub struct SampleCallDataset;

impl SampleCallDataset {
    pub fn len() -> usize {
        SAMPLE_CALLS.len()
    }

    /// Builds the records, spacing them one hour apart ending at `anchor`.
    pub fn records(anchor: DateTime<Utc>) -> Result<Vec<CallRecord>, RepositoryError> {
        let newest_offset = SAMPLE_CALLS.len() as i64 - 1;
        SAMPLE_CALLS
            .iter()
            .enumerate()
            .map(|(index, sample)| sample.to_record(anchor - Duration::hours(newest_offset - index as i64)))
            .collect()
    }

    pub async fn load<R>(repository: &R, anchor: DateTime<Utc>) -> Result<SeedResult, RepositoryError>
    where
        R: CallRecordRepository + ?Sized,
    {
        let records = Self::records(anchor)?;
        let mut calls_seeded = Vec::with_capacity(records.len());
        for (sample, record) in SAMPLE_CALLS.iter().zip(records) {
            repository.save(record).await?;
            calls_seeded.push(SeededCall {
                call_id: sample.call_id,
                carrier_name: sample.carrier_name,
                outcome: sample.outcome,
            });
        }

        Ok(SeedResult { calls_seeded })
    }

    /// Checks every sample call is stored with its contracted fields.
    pub async fn verify<R>(repository: &R) -> Result<VerificationResult, RepositoryError>
    where
        R: CallRecordRepository + ?Sized,
    {
        let mut checks = Vec::with_capacity(SAMPLE_CALLS.len());
        for sample in SAMPLE_CALLS {
            let stored = repository.find_by_id(&CallId(sample.call_id.to_string())).await?;
            let matches = stored.as_ref().is_some_and(|record| sample.matches(record));
            checks.push((sample.call_id, matches));
        }

        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(VerificationResult { all_present, checks })
    }
}

#[derive(Debug, Clone, Copy)]
struct SampleCallContract {
    call_id: &'static str,
    carrier_mc: &'static str,
    carrier_name: &'static str,
    load_id: &'static str,
    loadboard_rate: i64,
    agreed_rate: Option<i64>,
    negotiation_rounds: u32,
    outcome: CallOutcome,
    sentiment: Sentiment,
    notes: &'static str,
    call_duration_seconds: u32,
}

impl SampleCallContract {
    fn to_record(&self, timestamp: DateTime<Utc>) -> Result<CallRecord, RepositoryError> {
        let carrier_mc =
            McNumber::parse(self.carrier_mc).map_err(|e| RepositoryError::Decode(e.to_string()))?;
        Ok(CallRecord {
            call_id: CallId(self.call_id.to_string()),
            carrier_mc,
            carrier_name: Some(self.carrier_name.to_string()),
            timestamp,
            load_id: Some(LoadId(self.load_id.to_string())),
            loadboard_rate: Some(Decimal::from(self.loadboard_rate)),
            agreed_rate: self.agreed_rate.map(Decimal::from),
            negotiation_rounds: self.negotiation_rounds,
            outcome: self.outcome,
            sentiment: self.sentiment,
            notes: Some(self.notes.to_string()),
            call_duration_seconds: self.call_duration_seconds,
        })
    }

    fn matches(&self, record: &CallRecord) -> bool {
        record.carrier_mc.to_string() == self.carrier_mc
            && record.carrier_name.as_deref() == Some(self.carrier_name)
            && record.load_id.as_ref().map(LoadId::as_str) == Some(self.load_id)
            && record.loadboard_rate == Some(Decimal::from(self.loadboard_rate))
            && record.agreed_rate == self.agreed_rate.map(Decimal::from)
            && record.negotiation_rounds == self.negotiation_rounds
            && record.outcome == self.outcome
            && record.sentiment == self.sentiment
            && record.call_duration_seconds == self.call_duration_seconds
    }
}

#[derive(Debug)]
pub struct SeedResult {
    pub calls_seeded: Vec<SeededCall>,
}

#[derive(Debug)]
pub struct SeededCall {
    pub call_id: &'static str,
    pub carrier_name: &'static str,
    pub outcome: CallOutcome,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
