use std::sync::Arc;

use axum::Router;
use brickbot_core::{
    archive::LogArchiver,
    audit::TracingAuditSink,
    config::{AppConfig, ConfigError, LoadOptions},
    dialog::{ConstraintTable, SlotValidator, TurnResponder},
};
use brickbot_db::{connect, migrations, DbPool, SqlOrderRepository};
use thiserror::Error;
use tracing::info;

use crate::archive::{FsBlobStore, SharedArchiver};
use crate::codehook::CodeHookState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub responder: Arc<TurnResponder>,
    pub archiver: Option<SharedArchiver>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

impl Application {
    pub fn router(&self) -> Router {
        let codehook =
            CodeHookState::new(self.responder.clone(), self.config.server.api_token.clone());
        Router::new()
            .merge(crate::codehook::router(codehook))
            .merge(crate::archive::router(
                self.archiver.clone(),
                self.config.server.api_token.clone(),
            ))
            .merge(crate::health::router(self.db_pool.clone(), self.archiver.is_some()))
    }
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

    let db_pool = connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
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

    let responder = TurnResponder::new(
        SlotValidator::new(ConstraintTable::default()),
        Arc::new(SqlOrderRepository::new(db_pool.clone())),
        Arc::new(TracingAuditSink),
    )
    .with_fulfillment_message(config.dialog.fulfillment_message.clone());

    let archiver = config.archive.enabled.then(|| {
        let store = FsBlobStore::new(config.archive.root_dir.clone());
        info!(
            event_name = "system.bootstrap.archive_enabled",
            correlation_id = "bootstrap",
            root_dir = %store.root().display(),
            prefix = %config.archive.prefix,
            "log archival enabled"
        );
        Arc::new(LogArchiver::new(store, config.archive.prefix.clone()))
    });

    Ok(Application { config, db_pool, responder: Arc::new(responder), archiver })
}

#[cfg(test)]
mod tests {
    use brickbot_core::config::{ConfigOverrides, LoadOptions};
    use brickbot_core::dialog::{TurnDirective, TurnRequest};
    use brickbot_core::domain::slot::{SlotName, SlotSet};
    use tempfile::TempDir;

    use crate::bootstrap::bootstrap;

    fn options(database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_on_invalid_database_url() {
        let result = bootstrap(options("postgres://localhost/brickbot")).await;

        let message = match result {
            Ok(_) => panic!("bootstrap should reject non-sqlite urls"),
            Err(error) => error.to_string(),
        };
        assert!(message.contains("database.url"));
    }

    #[tokio::test]
    async fn bootstrap_wires_responder_to_sql_store() {
        let app = bootstrap(options("sqlite::memory:")).await.expect("bootstrap");
        assert!(app.archiver.is_none(), "archive is disabled by default");

        let slots =
            SlotSet::new().with(SlotName::LegoModel, "ship").with(SlotName::LegoSize, "small");
        let directive = app
            .responder
            .respond(&TurnRequest::new("FulfillmentCodeHook", "OrderLego", slots))
            .await
            .expect("fulfillment");
        assert!(matches!(directive, TurnDirective::Close { .. }));

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM lego_order")
            .fetch_one(&app.db_pool)
            .await
            .expect("count orders");
        assert_eq!(count, 1);

        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn bootstrap_enables_archive_when_configured() {
        let dir = TempDir::new().expect("tempdir");
        let mut load = options("sqlite::memory:");
        load.overrides.archive_enabled = Some(true);
        load.overrides.archive_root_dir = Some(dir.path().to_path_buf());

        let app = bootstrap(load).await.expect("bootstrap");

        let archiver = app.archiver.as_ref().expect("archiver should be built");
        assert_eq!(archiver.store().root(), dir.path());
        app.db_pool.close().await;
    }
}
