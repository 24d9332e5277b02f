use std::collections::HashMap;

use tokio::sync::RwLock;
use uuid::Uuid;

use switchover_core::domain::strategy::SwitchingStrategy;

use super::{RepositoryError, StrategyRepository, StrategySummary};

#[derive(Default)]
pub struct InMemoryStrategyRepository {
    strategies: RwLock<HashMap<Uuid, SwitchingStrategy>>,
}

#[async_trait::async_trait]
impl StrategyRepository for InMemoryStrategyRepository {
    async fn save(&self, strategy: &SwitchingStrategy) -> Result<(), RepositoryError> {
        let mut strategies = self.strategies.write().await;
        strategies.insert(strategy.analysis_id, strategy.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<SwitchingStrategy>, RepositoryError> {
        let strategies = self.strategies.read().await;
        Ok(strategies.get(&id).cloned())
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<StrategySummary>, RepositoryError> {
        let strategies = self.strategies.read().await;
        let mut summaries: Vec<StrategySummary> =
            strategies.values().map(StrategySummary::from).collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        summaries.truncate(limit as usize);
        Ok(summaries)
    }
}
