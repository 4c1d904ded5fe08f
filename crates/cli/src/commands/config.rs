use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use freightdesk_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

/// One rendered setting: dotted key, display value, env override name.
struct Field {
    key: &'static str,
    value: String,
    env_key: &'static str,
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key,
            Some(field.env_key),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let negotiation = &config.desk.negotiation;
    let api_key = match &config.fmcsa.api_key {
        Some(key) => redact_secret(key.expose_secret()),
        None => "<unset>".to_string(),
    };

    vec![
        Field {
            key: "database.url",
            value: config.database.url.clone(),
            env_key: "FREIGHTDESK_DATABASE_URL",
        },
        Field {
            key: "database.max_connections",
            value: config.database.max_connections.to_string(),
            env_key: "FREIGHTDESK_DATABASE_MAX_CONNECTIONS",
        },
        Field {
            key: "database.timeout_secs",
            value: config.database.timeout_secs.to_string(),
            env_key: "FREIGHTDESK_DATABASE_TIMEOUT_SECS",
        },
        Field {
            key: "server.bind_address",
            value: config.server.bind_address.clone(),
            env_key: "FREIGHTDESK_SERVER_BIND_ADDRESS",
        },
        Field {
            key: "server.port",
            value: config.server.port.to_string(),
            env_key: "FREIGHTDESK_SERVER_PORT",
        },
        Field {
            key: "catalog.path",
            value: config.catalog.path.display().to_string(),
            env_key: "FREIGHTDESK_CATALOG_PATH",
        },
        Field {
            key: "fmcsa.enabled",
            value: config.fmcsa.enabled.to_string(),
            env_key: "FREIGHTDESK_FMCSA_ENABLED",
        },
        Field {
            key: "fmcsa.base_url",
            value: config.fmcsa.base_url.clone(),
            env_key: "FREIGHTDESK_FMCSA_BASE_URL",
        },
        Field { key: "fmcsa.api_key", value: api_key, env_key: "FREIGHTDESK_FMCSA_API_KEY" },
        Field {
            key: "negotiation.floor_pct",
            value: negotiation.floor_pct.to_string(),
            env_key: "FREIGHTDESK_NEGOTIATION_FLOOR_PCT",
        },
        Field {
            key: "negotiation.ceiling_pct",
            value: negotiation.ceiling_pct.to_string(),
            env_key: "FREIGHTDESK_NEGOTIATION_CEILING_PCT",
        },
        Field {
            key: "negotiation.max_rounds",
            value: negotiation.max_rounds.to_string(),
            env_key: "FREIGHTDESK_NEGOTIATION_MAX_ROUNDS",
        },
        Field {
            key: "negotiation.last_round_policy",
            value: format!("{:?}", negotiation.last_round_policy),
            env_key: "FREIGHTDESK_NEGOTIATION_LAST_ROUND_POLICY",
        },
        Field {
            key: "matching.min_score",
            value: config.desk.matching.min_score.to_string(),
            env_key: "FREIGHTDESK_MATCHING_MIN_SCORE",
        },
        Field {
            key: "matching.max_results",
            value: config.desk.matching.max_results.to_string(),
            env_key: "FREIGHTDESK_MATCHING_MAX_RESULTS",
        },
        Field {
            key: "logging.level",
            value: config.logging.level.clone(),
            env_key: "FREIGHTDESK_LOGGING_LEVEL",
        },
        Field {
            key: "logging.format",
            value: format!("{:?}", config.logging.format),
            env_key: "FREIGHTDESK_LOGGING_FORMAT",
        },
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("freightdesk.toml"), PathBuf::from("config/freightdesk.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_secret(secret: &str) -> String {
    let trimmed = secret.trim();
    match trimmed.chars().count() {
        0 => "<empty>".to_string(),
        1..=8 => "<redacted>".to_string(),
        _ => {
            let prefix: String = trimmed.chars().take(4).collect();
            format!("{prefix}***")
        }
    }
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, field_source, redact_secret};

    #[test]
    fn redaction_keeps_only_a_short_prefix() {
        assert_eq!(redact_secret(""), "<empty>");
        assert_eq!(redact_secret("abc123"), "<redacted>");
        assert_eq!(redact_secret("abcd1234efgh"), "abcd***");
    }

    #[test]
    fn file_source_requires_full_key_path() {
        let doc: Value = "[negotiation]\nmax_rounds = 4\n".parse().expect("toml");

        assert!(contains_path(&doc, "negotiation.max_rounds"));
        assert!(!contains_path(&doc, "negotiation.floor_pct"));
        assert_eq!(field_source("negotiation.floor_pct", None, Some(&doc), None), "default");
        assert_eq!(
            field_source("negotiation.max_rounds", None, Some(&doc), None),
            "file (config file)"
        );
    }
}
