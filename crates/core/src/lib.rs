pub mod config;
pub mod desk;
pub mod domain;
pub mod errors;
pub mod stats;
pub mod verification;

pub use desk::catalog::{CatalogError, LoadCatalog};
pub use desk::classification::{
    CallClassification, ClassificationConfig, ClassificationEngine, RuleBasedClassifier,
};
pub use desk::extraction::{
    CallDuration, DurationSource, ExtractionConfig, ExtractionEngine, PartialCallFields,
    RuleBasedExtractor,
};
pub use desk::matching::{
    DateWindow, LoadRequirements, MatchingConfig, MatchingEngine, ScoredLoad, WeightedLoadMatcher,
};
pub use desk::negotiation::{
    Decision, DeterministicNegotiationEngine, LastRoundPolicy, NegotiationEngine,
    NegotiationPolicy, NegotiationSession, NegotiationStrategy, RejectReason,
};
pub use desk::{CallDesk, CompletedCall, DefaultCallDesk, DeskRuntime, DeskSettings, OfferEvaluation};
pub use domain::call::{CallId, CallOutcome, CallRecord, RateBounds, Sentiment};
pub use domain::carrier::{CarrierVerification, McNumber};
pub use domain::load::{EquipmentType, Load, LoadId};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use stats::CallStats;
pub use verification::{verify_raw, CarrierVerifier, StaticCarrierDirectory};
