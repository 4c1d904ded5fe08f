use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::carrier::McNumber;
use crate::domain::load::LoadId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallId(pub String);

impl CallId {
    pub fn generate() -> Self {
        let hex = Uuid::new_v4().simple().to_string().to_ascii_uppercase();
        Self(format!("CALL_{}", &hex[..8]))
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    Booked,
    Negotiated,
    Rejected,
    NoMatch,
    Unknown,
}

impl CallOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Booked => "booked",
            Self::Negotiated => "negotiated",
            Self::Rejected => "rejected",
            Self::NoMatch => "no_match",
            Self::Unknown => "unknown",
        }
    }

    /// Outcomes that carry an agreed rate.
    pub fn is_agreement(&self) -> bool {
        matches!(self, Self::Booked | Self::Negotiated)
    }
}

impl fmt::Display for CallOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallOutcome {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "booked" => Ok(Self::Booked),
            "negotiated" => Ok(Self::Negotiated),
            "rejected" => Ok(Self::Rejected),
            "no_match" => Ok(Self::NoMatch),
            "unknown" => Ok(Self::Unknown),
            other => Err(DomainError::InvalidInput(format!(
                "unsupported call outcome `{other}` (expected booked|negotiated|rejected|no_match|unknown)"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sentiment {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "positive" => Ok(Self::Positive),
            "neutral" => Ok(Self::Neutral),
            "negative" => Ok(Self::Negative),
            other => Err(DomainError::InvalidInput(format!(
                "unsupported sentiment `{other}` (expected positive|neutral|negative)"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferSide {
    Carrier,
    Broker,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub round: u32,
    pub side: OfferSide,
    pub rate: Decimal,
}

/// Acceptable agreed-rate range for one load.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateBounds {
    pub floor: Decimal,
    pub ceiling: Decimal,
}

impl RateBounds {
    pub fn contains(&self, rate: Decimal) -> bool {
        self.floor <= rate && rate <= self.ceiling
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRecord {
    pub call_id: CallId,
    pub carrier_mc: McNumber,
    pub carrier_name: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub load_id: Option<LoadId>,
    pub loadboard_rate: Option<Decimal>,
    pub agreed_rate: Option<Decimal>,
    pub negotiation_rounds: u32,
    pub outcome: CallOutcome,
    pub sentiment: Sentiment,
    pub notes: Option<String>,
    pub call_duration_seconds: u32,
}

impl CallRecord {
    /// Checks the record invariants against the load's bounds, when known.
    pub fn validate(
        &self,
        bounds: Option<&RateBounds>,
        max_rounds: u32,
    ) -> Result<(), DomainError> {
        if self.negotiation_rounds > max_rounds {
            return Err(DomainError::InvariantViolation(format!(
                "call {} records {} negotiation rounds (max {max_rounds})",
                self.call_id, self.negotiation_rounds
            )));
        }

        if let Some(agreed) = self.agreed_rate {
            if agreed <= Decimal::ZERO {
                return Err(DomainError::InvariantViolation(format!(
                    "call {} has a non-positive agreed rate",
                    self.call_id
                )));
            }
        }

        if !self.outcome.is_agreement() {
            return Ok(());
        }

        let Some(agreed) = self.agreed_rate else {
            return Err(DomainError::InvariantViolation(format!(
                "call {} is {} but has no agreed rate",
                self.call_id, self.outcome
            )));
        };

        match bounds {
            Some(bounds) if !bounds.contains(agreed) => {
                Err(DomainError::InvariantViolation(format!(
                    "call {} agreed rate {agreed} is outside [{}, {}]",
                    self.call_id, bounds.floor, bounds.ceiling
                )))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::{CallId, CallOutcome, CallRecord, RateBounds, Sentiment};
    use crate::domain::{carrier::McNumber, load::LoadId};

    fn record(outcome: CallOutcome, agreed: Option<Decimal>, rounds: u32) -> CallRecord {
        CallRecord {
            call_id: CallId("CALL_TEST0001".to_string()),
            carrier_mc: McNumber::parse("MC123456").expect("mc"),
            carrier_name: Some("ABC Trucking".to_string()),
            timestamp: Utc::now(),
            load_id: Some(LoadId("LD001".to_string())),
            loadboard_rate: Some(Decimal::new(2500, 0)),
            agreed_rate: agreed,
            negotiation_rounds: rounds,
            outcome,
            sentiment: Sentiment::Positive,
            notes: None,
            call_duration_seconds: 180,
        }
    }

    fn bounds() -> RateBounds {
        RateBounds { floor: Decimal::new(2250, 0), ceiling: Decimal::new(2625, 0) }
    }

    #[test]
    fn generated_call_ids_have_stable_shape() {
        let id = CallId::generate();
        assert!(id.0.starts_with("CALL_"));
        assert_eq!(id.0.len(), 13);
        assert!(id.0[5..].chars().all(|ch| ch.is_ascii_hexdigit() && !ch.is_ascii_lowercase()));
    }

    #[test]
    fn booked_record_inside_bounds_is_valid() {
        let record = record(CallOutcome::Booked, Some(Decimal::new(2500, 0)), 2);
        assert!(record.validate(Some(&bounds()), 3).is_ok());
    }

    #[test]
    fn agreement_outside_bounds_is_rejected() {
        let record = record(CallOutcome::Negotiated, Some(Decimal::new(2700, 0)), 2);
        assert!(record.validate(Some(&bounds()), 3).is_err());
    }

    #[test]
    fn agreement_without_rate_is_rejected() {
        let record = record(CallOutcome::Booked, None, 1);
        assert!(record.validate(Some(&bounds()), 3).is_err());
    }

    #[test]
    fn round_count_above_limit_is_rejected() {
        let record = record(CallOutcome::Rejected, None, 4);
        assert!(record.validate(None, 3).is_err());
    }

    #[test]
    fn outcome_parses_hyphenated_no_match() {
        assert_eq!("no-match".parse::<CallOutcome>().ok(), Some(CallOutcome::NoMatch));
        assert_eq!("Booked".parse::<CallOutcome>().ok(), Some(CallOutcome::Booked));
        assert!("maybe".parse::<CallOutcome>().is_err());
    }
}
