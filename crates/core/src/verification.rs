use async_trait::async_trait;

use crate::domain::carrier::{CarrierVerification, McNumber};
use crate::errors::ApplicationError;

#[async_trait]
pub trait CarrierVerifier: Send + Sync {
    async fn verify(&self, mc_number: &McNumber) -> Result<CarrierVerification, ApplicationError>;
}

/// Verifies a raw caller-supplied MC string; malformed input is ineligible, not an error.
pub async fn verify_raw<V>(verifier: &V, raw_mc: &str) -> Result<CarrierVerification, ApplicationError>
where
    V: CarrierVerifier + ?Sized,
{
    match McNumber::parse(raw_mc) {
        Ok(mc_number) => verifier.verify(&mc_number).await,
        Err(_) => Ok(CarrierVerification::ineligible(
            "Invalid MC number format. Expected format: MC123456",
        )),
    }
}

/// Offline directory used when live FMCSA lookups are disabled.
#[derive(Clone, Debug)]
pub struct StaticCarrierDirectory {
    known: Vec<(String, String)>,
}

impl Default for StaticCarrierDirectory {
    fn default() -> Self {
        Self::new([
            ("123456", "ABC Trucking LLC"),
            ("234567", "XYZ Logistics Inc"),
            ("345678", "Swift Transport Co"),
            ("456789", "Premier Freight Services"),
        ])
    }
}

impl StaticCarrierDirectory {
    pub fn new<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            known: entries
                .into_iter()
                .map(|(digits, name)| (digits.to_string(), name.to_string()))
                .collect(),
        }
    }

    pub fn lookup(&self, mc_number: &McNumber) -> CarrierVerification {
        let name = self
            .known
            .iter()
            .find(|(digits, _)| digits == mc_number.digits())
            .map(|(_, name)| name.clone())
            .unwrap_or_else(|| format!("Test Carrier {}", mc_number.digits()));
        CarrierVerification::eligible(name, "Carrier is authorized (offline directory)")
    }
}

#[async_trait]
impl CarrierVerifier for StaticCarrierDirectory {
    async fn verify(&self, mc_number: &McNumber) -> Result<CarrierVerification, ApplicationError> {
        Ok(self.lookup(mc_number))
    }
}

#[cfg(test)]
mod tests {
    use super::{verify_raw, StaticCarrierDirectory};

    #[tokio::test]
    async fn known_carrier_is_eligible_with_name() {
        let result = verify_raw(&StaticCarrierDirectory::default(), "MC-123456").await.expect("verify");
        assert!(result.eligible);
        assert_eq!(result.carrier_name.as_deref(), Some("ABC Trucking LLC"));
    }

    #[tokio::test]
    async fn unknown_carrier_gets_placeholder_name() {
        let result = verify_raw(&StaticCarrierDirectory::default(), "999999").await.expect("verify");
        assert!(result.eligible);
        assert_eq!(result.carrier_name.as_deref(), Some("Test Carrier 999999"));
    }

    #[tokio::test]
    async fn malformed_mc_is_ineligible() {
        let result = verify_raw(&StaticCarrierDirectory::default(), "MC12").await.expect("verify");
        assert!(!result.eligible);
        assert!(result.reason.contains("Invalid MC number format"));
    }
}
