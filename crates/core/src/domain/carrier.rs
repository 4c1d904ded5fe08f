use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::DomainError;

/// Motor-carrier number, stored as its digits and displayed as `MC123456`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct McNumber(String);

impl McNumber {
    pub const MIN_DIGITS: usize = 5;
    pub const MAX_DIGITS: usize = 7;

    /// Accepts `MC123456`, `MC-123456`, `MC 123456` or bare digits.
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        let upper = value.trim().to_ascii_uppercase();
        let digits = match upper.strip_prefix("MC") {
            Some(rest) => rest.strip_prefix(['-', ' ']).unwrap_or(rest),
            None => upper.as_str(),
        };

        let valid_length = (Self::MIN_DIGITS..=Self::MAX_DIGITS).contains(&digits.len());
        if !valid_length || !digits.chars().all(|ch| ch.is_ascii_digit()) {
            return Err(DomainError::InvalidInput(format!(
                "invalid MC number `{value}` (expected MC followed by 5-7 digits)"
            )));
        }

        Ok(Self(digits.to_string()))
    }

    pub fn digits(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for McNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MC{}", self.0)
    }
}

impl FromStr for McNumber {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl Serialize for McNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for McNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarrierVerification {
    pub eligible: bool,
    pub carrier_name: Option<String>,
    pub reason: String,
}

impl CarrierVerification {
    pub fn eligible(carrier_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { eligible: true, carrier_name: Some(carrier_name.into()), reason: reason.into() }
    }

    pub fn ineligible(reason: impl Into<String>) -> Self {
        Self { eligible: false, carrier_name: None, reason: reason.into() }
    }
}
