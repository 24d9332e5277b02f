use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use switchover_core::domain::strategy::SwitchingStrategy;

pub mod memory;
pub mod metrics;
pub mod strategy;

pub use memory::InMemoryStrategyRepository;
pub use metrics::{ProviderFailureCount, SqlMetricsSink};
pub use strategy::SqlStrategyRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Listing row for stored strategies; the payload is only decoded on `find`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StrategySummary {
    pub id: Uuid,
    pub industry: String,
    pub competitor: String,
    pub incomplete: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&SwitchingStrategy> for StrategySummary {
    fn from(strategy: &SwitchingStrategy) -> Self {
        Self {
            id: strategy.analysis_id,
            industry: strategy.industry.to_string(),
            competitor: strategy.competitor.to_string(),
            incomplete: strategy.incomplete,
            created_at: strategy.generated_at,
        }
    }
}

#[async_trait]
pub trait StrategyRepository: Send + Sync {
    /// Stores a strategy under its analysis id. Saving the same id twice replaces it.
    async fn save(&self, strategy: &SwitchingStrategy) -> Result<(), RepositoryError>;

    async fn find(&self, id: Uuid) -> Result<Option<SwitchingStrategy>, RepositoryError>;

    /// Most recent first.
    async fn list_recent(&self, limit: u32) -> Result<Vec<StrategySummary>, RepositoryError>;
}

pub(crate) fn encode_payload(strategy: &SwitchingStrategy) -> Result<String, RepositoryError> {
    serde_json::to_string(strategy)
        .map_err(|error| RepositoryError::Decode(format!("strategy payload: {error}")))
}

pub(crate) fn decode_payload(payload: &str) -> Result<SwitchingStrategy, RepositoryError> {
    serde_json::from_str(payload)
        .map_err(|error| RepositoryError::Decode(format!("strategy payload: {error}")))
}

pub(crate) fn parse_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("{column} `{raw}`: {error}")))
}

pub(crate) fn parse_uuid(column: &str, raw: &str) -> Result<Uuid, RepositoryError> {
    Uuid::parse_str(raw)
        .map_err(|error| RepositoryError::Decode(format!("{column} `{raw}`: {error}")))
}
