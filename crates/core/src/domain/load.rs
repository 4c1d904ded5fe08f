use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LoadId(pub String);

impl LoadId {
    /// Canonical `LD` + zero-padded number form, e.g. `7` -> `LD007`.
    pub fn from_number(digits: &str) -> Self {
        Self(format!("LD{digits:0>3}"))
    }

    /// Reads a caller-supplied id: `ld-7`, `LD 7`, `LD007` and `7` all name `LD007`.
    /// Anything that is not a load number is kept upper-cased as given.
    pub fn canonical(raw: &str) -> Self {
        let upper = raw.trim().to_ascii_uppercase();
        let digits = upper.strip_prefix("LD").unwrap_or(&upper).trim_start_matches(['-', ' ']);
        if !digits.is_empty() && digits.chars().all(|ch| ch.is_ascii_digit()) {
            Self::from_number(digits)
        } else {
            Self(upper)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LoadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentType {
    DryVan,
    Reefer,
    Flatbed,
    StepDeck,
    PowerOnly,
    Tanker,
}

impl EquipmentType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::DryVan => "Dry Van",
            Self::Reefer => "Reefer",
            Self::Flatbed => "Flatbed",
            Self::StepDeck => "Step Deck",
            Self::PowerOnly => "Power Only",
            Self::Tanker => "Tanker",
        }
    }
}

impl fmt::Display for EquipmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for EquipmentType {
    type Err = DomainError;

    /// Accepts loadboard-style descriptions such as `53ft Dry Van` or
    /// `refrigerated trailer` as well as the snake_case identifiers.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace(['_', '-'], " ");
        let equipment = if normalized.contains("dry van") || normalized == "van" {
            Self::DryVan
        } else if normalized.contains("reefer") || normalized.contains("refrigerated") {
            Self::Reefer
        } else if normalized.contains("step deck") || normalized.contains("stepdeck") {
            Self::StepDeck
        } else if normalized.contains("flatbed") || normalized.contains("flat bed") {
            Self::Flatbed
        } else if normalized.contains("power only") {
            Self::PowerOnly
        } else if normalized.contains("tanker") {
            Self::Tanker
        } else {
            return Err(DomainError::InvalidInput(format!("unsupported equipment type `{value}`")));
        };

        Ok(equipment)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Load {
    pub load_id: LoadId,
    pub origin: String,
    pub destination: String,
    pub pickup_datetime: DateTime<Utc>,
    pub delivery_datetime: DateTime<Utc>,
    pub equipment_type: EquipmentType,
    pub loadboard_rate: Decimal,
    pub weight: u32,
    pub commodity_type: String,
    #[serde(default)]
    pub notes: String,
    pub miles: u32,
}

impl Load {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.load_id.0.trim().is_empty() {
            return Err(DomainError::InvalidInput("load_id must not be empty".to_string()));
        }
        if self.loadboard_rate <= Decimal::ZERO {
            return Err(DomainError::InvalidInput(format!(
                "load {} has a non-positive loadboard rate",
                self.load_id
            )));
        }
        if self.delivery_datetime < self.pickup_datetime {
            return Err(DomainError::InvalidInput(format!(
                "load {} delivers before it is picked up",
                self.load_id
            )));
        }
        Ok(())
    }
}
