//! FMCSA QC carrier lookup.
//!
//! `GET {base_url}/{digits}?webKey={api_key}`. A 200 means the MC number is
//! registered; the carrier name is read from `content.carrier` (or a bare
//! `carrier` object). Rate limits, server errors and transport failures are
//! retried with exponential backoff.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use freightdesk_core::config::FmcsaConfig;
use freightdesk_core::domain::carrier::{CarrierVerification, McNumber};
use freightdesk_core::errors::ApplicationError;
use freightdesk_core::verification::CarrierVerifier;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("FMCSA API request timed out")]
    Timeout,
    #[error("error connecting to FMCSA API: {0}")]
    Connection(String),
}

#[derive(Debug, Error)]
pub enum FmcsaSetupError {
    #[error("fmcsa.api_key is required when FMCSA lookups are enabled")]
    MissingApiKey,
    #[error("could not build FMCSA HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Clone, Debug, PartialEq)]
pub struct FmcsaResponse {
    pub status: u16,
    pub body: Option<Value>,
}

#[async_trait]
pub trait FmcsaTransport: Send + Sync {
    async fn lookup(&self, digits: &str) -> Result<FmcsaResponse, TransportError>;
}

pub struct HttpFmcsaTransport {
    client: Client,
    base_url: String,
    api_key: SecretString,
}

impl HttpFmcsaTransport {
    pub fn new(config: &FmcsaConfig) -> Result<Self, FmcsaSetupError> {
        let api_key = config.api_key.clone().ok_or(FmcsaSetupError::MissingApiKey)?;
        let client =
            Client::builder().timeout(Duration::from_secs(config.timeout_secs.max(1))).build()?;
        Ok(Self { client, base_url: config.base_url.trim_end_matches('/').to_string(), api_key })
    }
}

#[async_trait]
impl FmcsaTransport for HttpFmcsaTransport {
    async fn lookup(&self, digits: &str) -> Result<FmcsaResponse, TransportError> {
        let url = format!("{}/{digits}", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("webKey", self.api_key.expose_secret())])
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() {
                    TransportError::Timeout
                } else {
                    TransportError::Connection(error.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let body = if status == 200 { response.json::<Value>().await.ok() } else { None };
        Ok(FmcsaResponse { status, body })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 2, base_delay_ms: 500, max_delay_ms: 4_000 }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

enum Attempt {
    Settled(CarrierVerification),
    Retry(String),
}

pub struct FmcsaVerifier {
    transport: Arc<dyn FmcsaTransport>,
    retry_policy: RetryPolicy,
}

impl FmcsaVerifier {
    pub fn new(transport: Arc<dyn FmcsaTransport>, retry_policy: RetryPolicy) -> Self {
        Self { transport, retry_policy }
    }

    pub fn from_config(config: &FmcsaConfig) -> Result<Self, FmcsaSetupError> {
        let transport = HttpFmcsaTransport::new(config)?;
        Ok(Self::new(
            Arc::new(transport),
            RetryPolicy { max_retries: config.max_retries, ..RetryPolicy::default() },
        ))
    }

    async fn attempt(&self, mc_number: &McNumber) -> Attempt {
        match self.transport.lookup(mc_number.digits()).await {
            Ok(response) => settle(&response, mc_number),
            Err(error) => Attempt::Retry(error.to_string()),
        }
    }
}

fn settle(response: &FmcsaResponse, mc_number: &McNumber) -> Attempt {
    match response.status {
        200 => Attempt::Settled(verification_from_payload(response.body.as_ref(), mc_number)),
        404 => Attempt::Settled(CarrierVerification::ineligible(format!(
            "MC number {mc_number} not found in FMCSA database"
        ))),
        401 | 403 => Attempt::Settled(CarrierVerification::ineligible(
            "FMCSA API authentication failed. Please check API key.",
        )),
        429 => Attempt::Retry("FMCSA API rate limit exceeded. Please try again later.".to_string()),
        other => Attempt::Retry(format!("FMCSA API error: {other}")),
    }
}

/// Reads the carrier name from a 200 payload; a registered MC number without
/// a readable name is still eligible under its own number.
pub fn verification_from_payload(payload: Option<&Value>, mc_number: &McNumber) -> CarrierVerification {
    let carrier = payload.and_then(|body| {
        body.pointer("/content/carrier").filter(|value| value.is_object()).or_else(|| body.get("carrier"))
    });
    let name = carrier.and_then(|carrier| {
        ["legalName", "dbaName"]
            .iter()
            .filter_map(|key| carrier.get(*key).and_then(Value::as_str))
            .map(str::trim)
            .find(|name| !name.is_empty())
    });

    match name {
        Some(name) => CarrierVerification::eligible(name, "Verified against FMCSA database"),
        None => CarrierVerification::eligible(mc_number.to_string(), "MC number found in FMCSA database"),
    }
}

#[async_trait]
impl CarrierVerifier for FmcsaVerifier {
    async fn verify(&self, mc_number: &McNumber) -> Result<CarrierVerification, ApplicationError> {
        let mut last_failure = String::from("Unable to verify carrier after multiple attempts");

        for attempt in 0..=self.retry_policy.max_retries {
            match self.attempt(mc_number).await {
                Attempt::Settled(verification) => {
                    debug!(
                        event_name = "carrier.verification.settled",
                        mc_number = %mc_number,
                        eligible = verification.eligible,
                        attempt,
                        "FMCSA lookup settled"
                    );
                    return Ok(verification);
                }
                Attempt::Retry(reason) => {
                    warn!(
                        event_name = "carrier.verification.retry",
                        mc_number = %mc_number,
                        attempt,
                        max_retries = self.retry_policy.max_retries,
                        reason = %reason,
                        "FMCSA lookup failed"
                    );
                    last_failure = reason;
                }
            }

            if attempt < self.retry_policy.max_retries {
                let delay = self.retry_policy.backoff(attempt);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }

        Err(ApplicationError::Integration(last_failure))
    }
}
