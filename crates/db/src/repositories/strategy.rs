use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

use switchover_core::domain::strategy::SwitchingStrategy;

use super::{
    decode_payload, encode_payload, parse_timestamp, parse_uuid, RepositoryError,
    StrategyRepository, StrategySummary,
};
use crate::DbPool;

pub struct SqlStrategyRepository {
    pool: DbPool,
}

impl SqlStrategyRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StrategyRepository for SqlStrategyRepository {
    async fn save(&self, strategy: &SwitchingStrategy) -> Result<(), RepositoryError> {
        let payload = encode_payload(strategy)?;

        sqlx::query(
            r#"
            INSERT INTO switching_strategy (
                id, industry, competitor, incomplete, payload, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                industry = excluded.industry,
                competitor = excluded.competitor,
                incomplete = excluded.incomplete,
                payload = excluded.payload,
                created_at = excluded.created_at
            "#,
        )
        .bind(strategy.analysis_id.to_string())
        .bind(strategy.industry.as_str())
        .bind(strategy.competitor.as_str())
        .bind(strategy.incomplete)
        .bind(payload)
        .bind(strategy.generated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<SwitchingStrategy>, RepositoryError> {
        let row = sqlx::query("SELECT payload FROM switching_strategy WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let payload: String = row.try_get("payload")?;
                decode_payload(&payload).map(Some)
            }
            None => Ok(None),
        }
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<StrategySummary>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, industry, competitor, incomplete, created_at
            FROM switching_strategy
            ORDER BY created_at DESC, id ASC
            LIMIT ?
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_summary).collect()
    }
}

fn row_to_summary(row: &SqliteRow) -> Result<StrategySummary, RepositoryError> {
    let id: String = row.try_get("id")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(StrategySummary {
        id: parse_uuid("id", &id)?,
        industry: row.try_get("industry")?,
        competitor: row.try_get("competitor")?,
        incomplete: row.try_get("incomplete")?,
        created_at: parse_timestamp("created_at", &created_at)?,
    })
}
