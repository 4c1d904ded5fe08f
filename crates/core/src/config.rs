use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::desk::negotiation::LastRoundPolicy;
use crate::desk::DeskSettings;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub catalog: CatalogConfig,
    pub fmcsa: FmcsaConfig,
    pub desk: DeskSettings,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct CatalogConfig {
    pub path: PathBuf,
}

#[derive(Clone, Debug)]
pub struct FmcsaConfig {
    pub enabled: bool,
    pub base_url: String,
    pub api_key: Option<SecretString>,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub catalog_path: Option<PathBuf>,
    pub fmcsa_enabled: Option<bool>,
    pub fmcsa_api_key: Option<String>,
    pub last_round_policy: Option<LastRoundPolicy>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://freightdesk.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8000,
                graceful_shutdown_secs: 15,
            },
            catalog: CatalogConfig { path: PathBuf::from("data/loads.json") },
            fmcsa: FmcsaConfig {
                enabled: false,
                base_url: "https://mobile.fmcsa.dot.gov/qc/services/carriers".to_string(),
                api_key: None,
                timeout_secs: 10,
                max_retries: 2,
            },
            desk: DeskSettings::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from("freightdesk.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(path) = patch.catalog.and_then(|catalog| catalog.path) {
            self.catalog.path = path;
        }

        if let Some(fmcsa) = patch.fmcsa {
            if let Some(enabled) = fmcsa.enabled {
                self.fmcsa.enabled = enabled;
            }
            if let Some(base_url) = fmcsa.base_url {
                self.fmcsa.base_url = base_url;
            }
            if let Some(fmcsa_api_key_value) = fmcsa.api_key {
                self.fmcsa.api_key = Some(secret_value(fmcsa_api_key_value));
            }
            if let Some(timeout_secs) = fmcsa.timeout_secs {
                self.fmcsa.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = fmcsa.max_retries {
                self.fmcsa.max_retries = max_retries;
            }
        }

        if let Some(negotiation) = patch.negotiation {
            let policy = &mut self.desk.negotiation;
            if let Some(floor_pct) = negotiation.floor_pct {
                policy.floor_pct = floor_pct;
            }
            if let Some(ceiling_pct) = negotiation.ceiling_pct {
                policy.ceiling_pct = ceiling_pct;
            }
            if let Some(max_rounds) = negotiation.max_rounds {
                policy.max_rounds = max_rounds;
            }
            if let Some(last_round_policy) = negotiation.last_round_policy {
                policy.last_round_policy = last_round_policy;
            }
        }

        if let Some(matching) = patch.matching {
            let target = &mut self.desk.matching;
            if let Some(weight) = matching.origin_weight {
                target.origin_weight = weight;
            }
            if let Some(weight) = matching.destination_weight {
                target.destination_weight = weight;
            }
            if let Some(weight) = matching.equipment_weight {
                target.equipment_weight = weight;
            }
            if let Some(weight) = matching.date_weight {
                target.date_weight = weight;
            }
            if let Some(min_score) = matching.min_score {
                target.min_score = min_score;
            }
            if let Some(penalty) = matching.equipment_mismatch_penalty {
                target.equipment_mismatch_penalty = penalty;
            }
            if let Some(days) = matching.date_horizon_days {
                target.date_horizon_days = days;
            }
            if let Some(max_results) = matching.max_results {
                target.max_results = max_results;
            }
        }

        if let Some(extraction) = patch.extraction {
            let target = &mut self.desk.extraction;
            if let Some(words_per_minute) = extraction.words_per_minute {
                target.words_per_minute = words_per_minute;
            }
            if let Some(min_duration_secs) = extraction.min_duration_secs {
                target.min_duration_secs = min_duration_secs;
            }
            if let Some(max_duration_secs) = extraction.max_duration_secs {
                target.max_duration_secs = max_duration_secs;
            }
            if let Some(amount) = extraction.min_plausible_amount {
                target.min_plausible_amount = amount;
            }
            if let Some(amount) = extraction.max_plausible_amount {
                target.max_plausible_amount = amount;
            }
            if let Some(max_notes_len) = extraction.max_notes_len {
                target.max_notes_len = max_notes_len;
            }
        }

        if let Some(classification) = patch.classification {
            let target = &mut self.desk.classification;
            if let Some(threshold) = classification.positive_threshold {
                target.positive_threshold = threshold;
            }
            if let Some(threshold) = classification.negative_threshold {
                target.negative_threshold = threshold;
            }
            if let Some(scale) = classification.confidence_scale {
                target.confidence_scale = scale;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("FREIGHTDESK_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("FREIGHTDESK_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_env("FREIGHTDESK_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("FREIGHTDESK_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_env("FREIGHTDESK_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("FREIGHTDESK_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("FREIGHTDESK_SERVER_PORT") {
            self.server.port = parse_env("FREIGHTDESK_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("FREIGHTDESK_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_env("FREIGHTDESK_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("FREIGHTDESK_CATALOG_PATH") {
            self.catalog.path = PathBuf::from(value);
        }

        if let Some(value) = read_env("FREIGHTDESK_FMCSA_ENABLED") {
            self.fmcsa.enabled = parse_env("FREIGHTDESK_FMCSA_ENABLED", &value)?;
        }
        if let Some(value) = read_env("FREIGHTDESK_FMCSA_BASE_URL") {
            self.fmcsa.base_url = value;
        }
        let api_key = read_env("FREIGHTDESK_FMCSA_API_KEY").or_else(|| read_env("FMCSA_API_KEY"));
        if let Some(value) = api_key {
            self.fmcsa.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("FREIGHTDESK_FMCSA_TIMEOUT_SECS") {
            self.fmcsa.timeout_secs = parse_env("FREIGHTDESK_FMCSA_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("FREIGHTDESK_FMCSA_MAX_RETRIES") {
            self.fmcsa.max_retries = parse_env("FREIGHTDESK_FMCSA_MAX_RETRIES", &value)?;
        }

        let policy = &mut self.desk.negotiation;
        if let Some(value) = read_env("FREIGHTDESK_NEGOTIATION_FLOOR_PCT") {
            policy.floor_pct = parse_env("FREIGHTDESK_NEGOTIATION_FLOOR_PCT", &value)?;
        }
        if let Some(value) = read_env("FREIGHTDESK_NEGOTIATION_CEILING_PCT") {
            policy.ceiling_pct = parse_env("FREIGHTDESK_NEGOTIATION_CEILING_PCT", &value)?;
        }
        if let Some(value) = read_env("FREIGHTDESK_NEGOTIATION_MAX_ROUNDS") {
            policy.max_rounds = parse_env("FREIGHTDESK_NEGOTIATION_MAX_ROUNDS", &value)?;
        }
        if let Some(value) = read_env("FREIGHTDESK_NEGOTIATION_LAST_ROUND_POLICY") {
            policy.last_round_policy =
                parse_env("FREIGHTDESK_NEGOTIATION_LAST_ROUND_POLICY", &value)?;
        }

        if let Some(value) = read_env("FREIGHTDESK_MATCHING_MIN_SCORE") {
            self.desk.matching.min_score = parse_env("FREIGHTDESK_MATCHING_MIN_SCORE", &value)?;
        }
        if let Some(value) = read_env("FREIGHTDESK_MATCHING_MAX_RESULTS") {
            self.desk.matching.max_results =
                parse_env("FREIGHTDESK_MATCHING_MAX_RESULTS", &value)?;
        }

        let log_level =
            read_env("FREIGHTDESK_LOGGING_LEVEL").or_else(|| read_env("FREIGHTDESK_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("FREIGHTDESK_LOGGING_FORMAT").or_else(|| read_env("FREIGHTDESK_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(bind_address) = overrides.bind_address {
            self.server.bind_address = bind_address;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(catalog_path) = overrides.catalog_path {
            self.catalog.path = catalog_path;
        }
        if let Some(enabled) = overrides.fmcsa_enabled {
            self.fmcsa.enabled = enabled;
        }
        if let Some(fmcsa_api_key) = overrides.fmcsa_api_key {
            self.fmcsa.api_key = Some(secret_value(fmcsa_api_key));
        }
        if let Some(last_round_policy) = overrides.last_round_policy {
            self.desk.negotiation.last_round_policy = last_round_policy;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_catalog(&self.catalog)?;
        validate_fmcsa(&self.fmcsa)?;
        validate_desk(&self.desk)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("freightdesk.toml"), PathBuf::from("config/freightdesk.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_catalog(catalog: &CatalogConfig) -> Result<(), ConfigError> {
    if catalog.path.as_os_str().is_empty() {
        return Err(ConfigError::Validation("catalog.path must not be empty".to_string()));
    }
    Ok(())
}

fn validate_fmcsa(fmcsa: &FmcsaConfig) -> Result<(), ConfigError> {
    if fmcsa.timeout_secs == 0 || fmcsa.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "fmcsa.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if !fmcsa.enabled {
        return Ok(());
    }

    if !fmcsa.base_url.starts_with("http://") && !fmcsa.base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "fmcsa.base_url must start with http:// or https://".to_string(),
        ));
    }

    let missing = fmcsa
        .api_key
        .as_ref()
        .map(|value| value.expose_secret().trim().is_empty())
        .unwrap_or(true);
    if missing {
        return Err(ConfigError::Validation(
            "fmcsa.api_key is required when fmcsa.enabled is true. Register for a web key at https://mobile.fmcsa.dot.gov/QCDevsite".to_string(),
        ));
    }

    Ok(())
}

fn validate_desk(desk: &DeskSettings) -> Result<(), ConfigError> {
    let policy = &desk.negotiation;
    if policy.floor_pct < Decimal::ZERO || policy.floor_pct >= Decimal::ONE {
        return Err(ConfigError::Validation(
            "negotiation.floor_pct must be in range 0 <= pct < 1".to_string(),
        ));
    }
    if policy.ceiling_pct < Decimal::ZERO {
        return Err(ConfigError::Validation(
            "negotiation.ceiling_pct must not be negative".to_string(),
        ));
    }
    if policy.max_rounds == 0 || policy.max_rounds > 10 {
        return Err(ConfigError::Validation(
            "negotiation.max_rounds must be in range 1..=10".to_string(),
        ));
    }

    let matching = &desk.matching;
    let weights = [
        matching.origin_weight,
        matching.destination_weight,
        matching.equipment_weight,
        matching.date_weight,
    ];
    if weights.iter().any(|weight| *weight < 0.0) || weights.iter().sum::<f64>() <= 0.0 {
        return Err(ConfigError::Validation(
            "matching weights must be non-negative with a positive sum".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&matching.min_score) {
        return Err(ConfigError::Validation("matching.min_score must be in range 0..=1".to_string()));
    }
    if matching.equipment_mismatch_penalty < 0.0 {
        return Err(ConfigError::Validation(
            "matching.equipment_mismatch_penalty must not be negative".to_string(),
        ));
    }
    if matching.date_horizon_days == 0 || matching.max_results == 0 {
        return Err(ConfigError::Validation(
            "matching.date_horizon_days and matching.max_results must be greater than zero"
                .to_string(),
        ));
    }

    let extraction = &desk.extraction;
    if extraction.words_per_minute == 0 {
        return Err(ConfigError::Validation(
            "extraction.words_per_minute must be greater than zero".to_string(),
        ));
    }
    if extraction.min_duration_secs > extraction.max_duration_secs {
        return Err(ConfigError::Validation(
            "extraction.min_duration_secs must not exceed extraction.max_duration_secs".to_string(),
        ));
    }
    if extraction.min_plausible_amount > extraction.max_plausible_amount {
        return Err(ConfigError::Validation(
            "extraction.min_plausible_amount must not exceed extraction.max_plausible_amount"
                .to_string(),
        ));
    }

    if desk.classification.confidence_scale <= 0.0 {
        return Err(ConfigError::Validation(
            "classification.confidence_scale must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    catalog: Option<CatalogPatch>,
    fmcsa: Option<FmcsaPatch>,
    negotiation: Option<NegotiationPatch>,
    matching: Option<MatchingPatch>,
    extraction: Option<ExtractionPatch>,
    classification: Option<ClassificationPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogPatch {
    path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct FmcsaPatch {
    enabled: Option<bool>,
    base_url: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct NegotiationPatch {
    floor_pct: Option<Decimal>,
    ceiling_pct: Option<Decimal>,
    max_rounds: Option<u32>,
    last_round_policy: Option<LastRoundPolicy>,
}

#[derive(Debug, Default, Deserialize)]
struct MatchingPatch {
    origin_weight: Option<f64>,
    destination_weight: Option<f64>,
    equipment_weight: Option<f64>,
    date_weight: Option<f64>,
    min_score: Option<f64>,
    equipment_mismatch_penalty: Option<f64>,
    date_horizon_days: Option<u32>,
    max_results: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct ExtractionPatch {
    words_per_minute: Option<u32>,
    min_duration_secs: Option<u32>,
    max_duration_secs: Option<u32>,
    min_plausible_amount: Option<Decimal>,
    max_plausible_amount: Option<Decimal>,
    max_notes_len: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct ClassificationPatch {
    positive_threshold: Option<u32>,
    negative_threshold: Option<u32>,
    confidence_scale: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};

    use rust_decimal::Decimal;
    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
    use crate::desk::negotiation::LastRoundPolicy;

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_validate_without_any_input() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.server.port == 8000, "default port should be 8000")?;
        ensure(!config.fmcsa.enabled, "fmcsa lookups should be off by default")?;
        ensure(config.desk.negotiation.max_rounds == 3, "default round limit should be 3")?;
        ensure(
            config.desk.negotiation.floor_pct == Decimal::new(10, 2),
            "default floor should be 10%",
        )?;
        ensure(config.catalog.path == PathBuf::from("data/loads.json"), "default catalog path")
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_FMCSA_WEB_KEY", "web-key-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("freightdesk.toml");
            fs::write(
                &path,
                r#"
[fmcsa]
enabled = true
api_key = "${TEST_FMCSA_WEB_KEY}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.fmcsa.enabled, "fmcsa should be enabled from file")?;
            ensure(
                config.fmcsa.api_key.as_ref().map(|key| key.expose_secret() == "web-key-from-env")
                    == Some(true),
                "api key should be loaded from environment",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_FMCSA_WEB_KEY"]);
        result
    }

    #[test]
    fn desk_sections_are_read_from_file() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("freightdesk.toml");
        fs::write(
            &path,
            r#"
[negotiation]
floor_pct = "0.15"
max_rounds = 4
last_round_policy = "accept_at_bound"

[matching]
min_score = 0.5
max_results = 5

[classification]
confidence_scale = 4.0
"#,
        )
        .map_err(|err| err.to_string())?;

        let config =
            AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.desk.negotiation.floor_pct == Decimal::new(15, 2), "floor from file")?;
        ensure(config.desk.negotiation.max_rounds == 4, "round limit from file")?;
        ensure(
            config.desk.negotiation.last_round_policy == LastRoundPolicy::AcceptAtBound,
            "last round policy from file",
        )?;
        ensure(config.desk.matching.min_score == 0.5, "min score from file")?;
        ensure(config.desk.matching.max_results == 5, "max results from file")?;
        ensure(config.desk.classification.confidence_scale == 4.0, "confidence scale from file")
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("FREIGHTDESK_LOG_LEVEL", "warn");
        env::set_var("FREIGHTDESK_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["FREIGHTDESK_LOG_LEVEL", "FREIGHTDESK_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("FREIGHTDESK_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("FREIGHTDESK_SERVER_PORT", "9100");
        env::set_var("FREIGHTDESK_NEGOTIATION_LAST_ROUND_POLICY", "accept_at_bound");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("freightdesk.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[server]
port = 9000

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    last_round_policy: Some(LastRoundPolicy::Reject),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.server.port == 9100, "env port should win over file and defaults")?;
            ensure(
                config.desk.negotiation.last_round_policy == LastRoundPolicy::Reject,
                "override should win over env last round policy",
            )?;
            Ok(())
        })();

        clear_vars(&[
            "FREIGHTDESK_DATABASE_URL",
            "FREIGHTDESK_SERVER_PORT",
            "FREIGHTDESK_NEGOTIATION_LAST_ROUND_POLICY",
        ]);
        result
    }

    #[test]
    fn invalid_env_override_is_reported_with_key() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("FREIGHTDESK_NEGOTIATION_MAX_ROUNDS", "three");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("expected env override failure".to_string()),
                Err(error) => error,
            };
            ensure(
                matches!(
                    error,
                    ConfigError::InvalidEnvOverride { ref key, .. }
                        if key == "FREIGHTDESK_NEGOTIATION_MAX_ROUNDS"
                ),
                "error should name the offending variable",
            )
        })();

        clear_vars(&["FREIGHTDESK_NEGOTIATION_MAX_ROUNDS"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("FREIGHTDESK_FMCSA_ENABLED", "true");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("fmcsa.api_key")
            );
            ensure(has_message, "validation failure should mention fmcsa.api_key")
        })();

        clear_vars(&["FREIGHTDESK_FMCSA_ENABLED"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("FREIGHTDESK_FMCSA_ENABLED", "true");
        env::set_var("FREIGHTDESK_FMCSA_API_KEY", "fmcsa-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(
                !debug.contains("fmcsa-secret-value"),
                "debug output should not contain the fmcsa key",
            )?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&["FREIGHTDESK_FMCSA_ENABLED", "FREIGHTDESK_FMCSA_API_KEY"]);
        result
    }

    #[test]
    fn missing_required_file_is_an_error() {
        let result = AppConfig::load(LoadOptions {
            config_path: Some(PathBuf::from("/nonexistent/freightdesk.toml")),
            require_file: true,
            ..LoadOptions::default()
        });
        assert!(matches!(result, Err(ConfigError::MissingConfigFile(_))));
    }
}
