use std::sync::Arc;

use freightdesk_core::config::{AppConfig, ConfigError, LoadOptions};
use freightdesk_core::desk::catalog::{CatalogError, LoadCatalog};
use freightdesk_core::desk::DefaultCallDesk;
use freightdesk_core::errors::DomainError;
use freightdesk_core::verification::{CarrierVerifier, StaticCarrierDirectory};
use freightdesk_db::{
    connect_with_settings, migrations, CallRecordRepository, DbPool, SqlCallRecordRepository,
};
use thiserror::Error;
use tracing::info;

use crate::api::ApiState;
use crate::fmcsa::{FmcsaSetupError, FmcsaVerifier};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub desk: Arc<DefaultCallDesk>,
    pub calls: Arc<dyn CallRecordRepository>,
    pub verifier: Arc<dyn CarrierVerifier>,
}

impl Application {
    pub fn api_state(&self) -> ApiState {
        ApiState::new(self.desk.clone(), self.calls.clone(), self.verifier.clone())
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("desk rules failed to initialize: {0}")]
    Desk(#[from] DomainError),
    #[error(transparent)]
    Verifier(#[from] FmcsaSetupError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let catalog = LoadCatalog::from_path(&config.catalog.path)?;
    info!(
        event_name = "system.bootstrap.catalog_loaded",
        correlation_id = "bootstrap",
        path = %config.catalog.path.display(),
        loads = catalog.len(),
        "load catalog loaded"
    );
    let desk = DefaultCallDesk::from_settings(Arc::new(catalog), &config.desk)?;

    let verifier: Arc<dyn CarrierVerifier> = if config.fmcsa.enabled {
        Arc::new(FmcsaVerifier::from_config(&config.fmcsa)?)
    } else {
        Arc::new(StaticCarrierDirectory::default())
    };
    info!(
        event_name = "system.bootstrap.verifier_ready",
        correlation_id = "bootstrap",
        mode = if config.fmcsa.enabled { "fmcsa" } else { "offline" },
        "carrier verifier initialized"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let calls: Arc<dyn CallRecordRepository> =
        Arc::new(SqlCallRecordRepository::new(db_pool.clone()));

    Ok(Application { config, db_pool, desk: Arc::new(desk), calls, verifier })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use axum::{extract::State, Json};
    use freightdesk_core::config::{ConfigOverrides, LoadOptions};
    use freightdesk_core::desk::DeskRuntime;
    use freightdesk_db::{CallLogFilter, CallRecordRepository};

    use crate::api::{log_call, LogCallRequest};
    use crate::bootstrap::bootstrap;

    fn shipped_catalog() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../data/loads.json")
    }

    fn overrides(database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                catalog_path: Some(shipped_catalog()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_when_fmcsa_enabled_without_key() {
        let mut options = overrides("sqlite::memory:");
        options.overrides.fmcsa_enabled = Some(true);

        let message = bootstrap(options).await.err().expect("error").to_string();

        assert!(message.contains("fmcsa.api_key"));
    }

    #[tokio::test]
    async fn bootstrap_reports_missing_catalog() {
        let mut options = overrides("sqlite::memory:");
        options.overrides.catalog_path = Some(PathBuf::from("/nonexistent/loads.json"));

        let result = bootstrap(options).await;

        assert!(matches!(result, Err(super::BootstrapError::Catalog(_))));
    }

    #[tokio::test]
    async fn integration_smoke_covers_startup_catalog_and_call_log() {
        let app = bootstrap(overrides("sqlite::memory:?cache=shared"))
            .await
            .expect("bootstrap should succeed with valid overrides");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'call_logs'",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("call log table should exist after bootstrap");
        assert_eq!(table_count, 1);
        assert_eq!(app.desk.catalog().len(), 8);

        let state = app.api_state();
        let Json(logged) = log_call(
            State(state),
            Json(LogCallRequest {
                carrier_mc: "MC567890".to_string(),
                load_id: Some("LD005".to_string()),
                agreed_rate: Some(rust_decimal::Decimal::from(2700)),
                outcome: Some("booked".to_string()),
                ..LogCallRequest::default()
            }),
        )
        .await
        .expect("log call");

        let stored = app.calls.find_by_id(&logged.call_id).await.expect("find").expect("stored");
        assert_eq!(stored.loadboard_rate, Some(rust_decimal::Decimal::from(2800)));
        assert_eq!(app.calls.stats(&CallLogFilter::default()).await.expect("stats").total_calls, 1);

        app.db_pool.close().await;
    }
}
