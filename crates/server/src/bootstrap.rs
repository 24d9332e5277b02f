use std::sync::Arc;

use axum::Router;
use thiserror::Error;
use tracing::info;

use switchover_agent::{Orchestrator, OrchestratorError};
use switchover_core::config::AppConfig;
use switchover_db::{
    connect_with_settings, migrations, DbPool, SqlMetricsSink, SqlStrategyRepository,
    StrategyRepository,
};

use crate::{api, health};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub orchestrator: Arc<Orchestrator>,
    pub strategies: Arc<dyn StrategyRepository>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
}

impl Application {
    /// Analysis API plus `/health`, sharing one pool.
    pub fn router(&self) -> Router {
        let api_state = api::ApiState {
            orchestrator: self.orchestrator.clone(),
            strategies: self.strategies.clone(),
        };
        api::router(api_state)
            .merge(health::router(self.db_pool.clone(), self.orchestrator.provider_names()))
    }
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
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

    let metrics = Arc::new(SqlMetricsSink::new(db_pool.clone()));
    let orchestrator = Orchestrator::from_config(&config, metrics)?;
    info!(
        event_name = "system.bootstrap.orchestrator_ready",
        correlation_id = "bootstrap",
        providers = ?orchestrator.provider_names(),
        industries = orchestrator.catalog().industries().count(),
        "orchestrator initialized"
    );

    Ok(Application {
        strategies: Arc::new(SqlStrategyRepository::new(db_pool.clone())),
        orchestrator: Arc::new(orchestrator),
        config,
        db_pool,
    })
}

#[cfg(test)]
mod tests {
    use switchover_core::config::{AppConfig, ProviderConfig, ProviderKind};

    use crate::bootstrap::{bootstrap_with_config, BootstrapError};

    #[tokio::test]
    async fn bootstrap_fails_fast_when_database_is_unreachable() {
        let mut config = AppConfig::default();
        config.database.url = "sqlite:///does-not-exist/switchover/switchover.db".to_string();
        config.database.timeout_secs = 1;

        let result = bootstrap_with_config(config).await;

        assert!(matches!(result, Err(BootstrapError::DatabaseConnect(_))));
    }

    #[tokio::test]
    async fn bootstrap_wires_database_and_provider_chain() {
        let mut config = AppConfig::default();
        config.database.url = "sqlite::memory:".to_string();
        config.database.max_connections = 1;
        let mut gemini = ProviderConfig::new(ProviderKind::Gemini);
        gemini.api_key = Some("gemini-test-key".to_string().into());
        config.providers = vec![ProviderConfig::new(ProviderKind::Anthropic), gemini];

        let app = bootstrap_with_config(config).await.expect("bootstrap");

        assert_eq!(app.orchestrator.provider_names(), vec!["gemini".to_string()]);
        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('analysis_metric', 'switching_strategy')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("schema query");
        assert_eq!(table_count, 2);

        app.db_pool.close().await;
    }
}
