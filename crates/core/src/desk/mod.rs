pub mod catalog;
pub mod classification;
pub mod extraction;
pub mod matching;
pub mod negotiation;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::call::{CallId, CallRecord, RateBounds};
use crate::domain::carrier::McNumber;
use crate::domain::load::LoadId;
use crate::errors::DomainError;

use self::{
    catalog::LoadCatalog,
    classification::{
        CallClassification, ClassificationConfig, ClassificationEngine, RuleBasedClassifier,
    },
    extraction::{ExtractionConfig, ExtractionEngine, PartialCallFields, RuleBasedExtractor},
    matching::{LoadRequirements, MatchingConfig, MatchingEngine, ScoredLoad, WeightedLoadMatcher},
    negotiation::{
        Decision, DeterministicNegotiationEngine, NegotiationEngine, NegotiationPolicy,
        NegotiationSession, NegotiationStrategy,
    },
};

/// Tunables for the four engines, one section each.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DeskSettings {
    pub negotiation: NegotiationPolicy,
    pub matching: MatchingConfig,
    pub extraction: ExtractionConfig,
    pub classification: ClassificationConfig,
}

/// Result of a stateless single-offer evaluation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OfferEvaluation {
    pub load_id: LoadId,
    pub round: u32,
    pub proposed_rate: Decimal,
    pub decision: Decision,
    pub bounds: RateBounds,
    pub strategy: NegotiationStrategy,
    pub message: String,
}

/// Everything known about a call once it ends.
#[derive(Clone, Debug)]
pub struct CompletedCall {
    pub carrier_mc: McNumber,
    pub carrier_name: Option<String>,
    pub transcript: String,
    pub negotiation: Option<NegotiationSession>,
    /// Telephony-measured duration; preferred over the transcript estimate.
    pub call_duration_seconds: Option<u32>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl CompletedCall {
    pub fn new(carrier_mc: McNumber, transcript: impl Into<String>) -> Self {
        Self {
            carrier_mc,
            carrier_name: None,
            transcript: transcript.into(),
            negotiation: None,
            call_duration_seconds: None,
            timestamp: None,
        }
    }

    pub fn with_negotiation(mut self, session: NegotiationSession) -> Self {
        self.negotiation = Some(session);
        self
    }

    pub fn with_carrier_name(mut self, carrier_name: impl Into<String>) -> Self {
        self.carrier_name = Some(carrier_name.into());
        self
    }
}

pub trait DeskRuntime: Send + Sync {
    fn catalog(&self) -> &LoadCatalog;

    fn search_loads(&self, requirements: &LoadRequirements, limit: Option<usize>) -> Vec<ScoredLoad>;

    fn evaluate_offer(
        &self,
        load_id: &LoadId,
        proposed_rate: Decimal,
        round: u32,
    ) -> Result<OfferEvaluation, DomainError>;

    fn open_negotiation(&self, load_id: &LoadId) -> Result<NegotiationSession, DomainError>;

    fn submit_offer(
        &self,
        session: &mut NegotiationSession,
        proposed_rate: Decimal,
    ) -> Result<Decision, DomainError>;

    fn extract_call_data(&self, transcript: &str) -> PartialCallFields;

    fn classify_call(
        &self,
        transcript: &str,
        fields: &PartialCallFields,
        decision: Option<&Decision>,
    ) -> CallClassification;

    /// Floor and ceiling for a catalog load under the active policy.
    fn rate_bounds(&self, load_id: &LoadId) -> Option<RateBounds>;

    /// Checks record invariants against the catalog load it references.
    fn validate_record(&self, record: &CallRecord) -> Result<(), DomainError>;

    /// Derives a record from the call without checking invariants, so callers
    /// can apply corrections before validating.
    fn assemble_call(&self, call: CompletedCall) -> CallRecord;

    fn finalize_call(&self, call: CompletedCall) -> Result<CallRecord, DomainError> {
        let record = self.assemble_call(call);
        self.validate_record(&record)?;
        Ok(record)
    }
}

pub struct CallDesk<M, N, X, C> {
    catalog: Arc<LoadCatalog>,
    matcher: M,
    negotiator: N,
    extractor: X,
    classifier: C,
}

pub type DefaultCallDesk =
    CallDesk<WeightedLoadMatcher, DeterministicNegotiationEngine, RuleBasedExtractor, RuleBasedClassifier>;

impl<M, N, X, C> CallDesk<M, N, X, C> {
    pub fn new(catalog: Arc<LoadCatalog>, matcher: M, negotiator: N, extractor: X, classifier: C) -> Self {
        Self { catalog, matcher, negotiator, extractor, classifier }
    }
}

impl DefaultCallDesk {
    pub fn from_settings(catalog: Arc<LoadCatalog>, settings: &DeskSettings) -> Result<Self, DomainError> {
        Ok(Self::new(
            catalog,
            WeightedLoadMatcher::new(settings.matching.clone()),
            DeterministicNegotiationEngine::new(settings.negotiation.clone()),
            RuleBasedExtractor::new(settings.extraction.clone(), settings.negotiation.max_rounds)?,
            RuleBasedClassifier::new(settings.classification.clone())?,
        ))
    }
}

impl<M, N, X, C> DeskRuntime for CallDesk<M, N, X, C>
where
    M: MatchingEngine,
    N: NegotiationEngine,
    X: ExtractionEngine,
    C: ClassificationEngine,
{
    fn catalog(&self) -> &LoadCatalog {
        &self.catalog
    }

    fn search_loads(&self, requirements: &LoadRequirements, limit: Option<usize>) -> Vec<ScoredLoad> {
        self.matcher.search(&self.catalog, requirements, limit)
    }

    fn evaluate_offer(
        &self,
        load_id: &LoadId,
        proposed_rate: Decimal,
        round: u32,
    ) -> Result<OfferEvaluation, DomainError> {
        let load = self.catalog.require(load_id)?;
        let decision = self.negotiator.evaluate(load, proposed_rate, round, None)?;
        let message = decision.message(proposed_rate);

        Ok(OfferEvaluation {
            load_id: load.load_id.clone(),
            round,
            proposed_rate,
            bounds: self.negotiator.policy().bounds(load.loadboard_rate),
            strategy: NegotiationStrategy::for_round(round),
            decision,
            message,
        })
    }

    fn open_negotiation(&self, load_id: &LoadId) -> Result<NegotiationSession, DomainError> {
        let load = self.catalog.require(load_id)?;
        Ok(NegotiationSession::new(load.clone(), self.negotiator.policy()))
    }

    fn submit_offer(
        &self,
        session: &mut NegotiationSession,
        proposed_rate: Decimal,
    ) -> Result<Decision, DomainError> {
        session.submit(&self.negotiator, proposed_rate)
    }

    fn extract_call_data(&self, transcript: &str) -> PartialCallFields {
        self.extractor.extract(transcript)
    }

    fn classify_call(
        &self,
        transcript: &str,
        fields: &PartialCallFields,
        decision: Option<&Decision>,
    ) -> CallClassification {
        self.classifier.classify(transcript, fields, decision)
    }

    fn rate_bounds(&self, load_id: &LoadId) -> Option<RateBounds> {
        let load = self.catalog.find(load_id)?;
        Some(self.negotiator.policy().bounds(load.loadboard_rate))
    }

    fn validate_record(&self, record: &CallRecord) -> Result<(), DomainError> {
        let bounds = record.load_id.as_ref().and_then(|load_id| self.rate_bounds(load_id));
        record.validate(bounds.as_ref(), self.negotiator.policy().max_rounds)
    }

    fn assemble_call(&self, call: CompletedCall) -> CallRecord {
        let fields = self.extractor.extract(&call.transcript);
        let session = call.negotiation.as_ref();
        let decision = session.and_then(NegotiationSession::terminal_decision);
        let classification = self.classifier.classify(&call.transcript, &fields, decision);

        let load_id =
            session.map(|session| session.load().load_id.clone()).or_else(|| fields.load_id.clone());
        let load = load_id.as_ref().and_then(|load_id| self.catalog.find(load_id));

        let agreed_rate = match session {
            Some(session) if decision.is_some() => session.agreed_rate(),
            _ if classification.outcome.is_agreement() => fields.agreed_rate.or(fields.proposed_rate),
            _ => None,
        };
        let negotiation_rounds = session
            .map(NegotiationSession::rounds)
            .or(fields.negotiation_rounds)
            .unwrap_or(0);
        let call_duration_seconds = call
            .call_duration_seconds
            .or(fields.call_duration.map(|duration| duration.seconds))
            .unwrap_or(0);

        let record = CallRecord {
            call_id: CallId::generate(),
            carrier_mc: call.carrier_mc,
            carrier_name: call.carrier_name,
            timestamp: call.timestamp.unwrap_or_else(Utc::now),
            load_id,
            loadboard_rate: load.map(|load| load.loadboard_rate),
            agreed_rate,
            negotiation_rounds,
            outcome: classification.outcome,
            sentiment: classification.sentiment,
            notes: fields.carrier_notes,
            call_duration_seconds,
        };

        debug!(
            event_name = "call.finalized",
            call_id = %record.call_id,
            carrier_mc = %record.carrier_mc,
            outcome = %record.outcome,
            sentiment = %record.sentiment,
            negotiation_rounds = record.negotiation_rounds,
            "call record assembled"
        );
        record
    }
}
