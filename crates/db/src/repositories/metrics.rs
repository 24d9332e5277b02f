use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

use switchover_core::metrics::{MetricsError, MetricsSink, SubRequestMetric};

use super::{parse_timestamp, parse_uuid, RepositoryError};
use crate::DbPool;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderFailureCount {
    pub provider: String,
    pub attempts: i64,
    pub failures: i64,
}

/// Appends attempt metrics to `analysis_metric`. Rows are never updated.
pub struct SqlMetricsSink {
    pool: DbPool,
}

impl SqlMetricsSink {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn append(&self, metric: &SubRequestMetric) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO analysis_metric (
                analysis_id, section, provider, attempt, elapsed_ms, success,
                malformed_rows, failure, contract_fingerprint, recorded_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(metric.analysis_id.to_string())
        .bind(metric.section.as_str())
        .bind(&metric.provider)
        .bind(i64::from(metric.attempt))
        .bind(i64::try_from(metric.elapsed_ms).unwrap_or(i64::MAX))
        .bind(metric.success)
        .bind(i64::try_from(metric.malformed_rows).unwrap_or(i64::MAX))
        .bind(metric.failure.as_deref())
        .bind(&metric.contract_fingerprint)
        .bind(metric.recorded_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Attempts for one analysis in insertion order.
    pub async fn list_for_analysis(
        &self,
        analysis_id: Uuid,
    ) -> Result<Vec<SubRequestMetric>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT analysis_id, section, provider, attempt, elapsed_ms, success,
                   malformed_rows, failure, contract_fingerprint, recorded_at
            FROM analysis_metric
            WHERE analysis_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(analysis_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_metric).collect()
    }

    /// Attempt and failure counts per provider, for operator checks.
    pub async fn provider_failure_counts(
        &self,
    ) -> Result<Vec<ProviderFailureCount>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT provider,
                   COUNT(*) AS attempts,
                   SUM(CASE WHEN success = 0 THEN 1 ELSE 0 END) AS failures
            FROM analysis_metric
            GROUP BY provider
            ORDER BY provider ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut counts = Vec::with_capacity(rows.len());
        for row in &rows {
            counts.push(ProviderFailureCount {
                provider: row.try_get("provider")?,
                attempts: row.try_get("attempts")?,
                failures: row.try_get("failures")?,
            });
        }
        Ok(counts)
    }
}

#[async_trait]
impl MetricsSink for SqlMetricsSink {
    async fn record(&self, metric: SubRequestMetric) -> Result<(), MetricsError> {
        self.append(&metric).await.map_err(|error| MetricsError::Unavailable(error.to_string()))
    }
}

fn row_to_metric(row: &SqliteRow) -> Result<SubRequestMetric, RepositoryError> {
    let analysis_id: String = row.try_get("analysis_id")?;
    let section: String = row.try_get("section")?;
    let attempt: i64 = row.try_get("attempt")?;
    let elapsed_ms: i64 = row.try_get("elapsed_ms")?;
    let malformed_rows: i64 = row.try_get("malformed_rows")?;
    let recorded_at: String = row.try_get("recorded_at")?;

    Ok(SubRequestMetric {
        analysis_id: parse_uuid("analysis_id", &analysis_id)?,
        section: section
            .parse()
            .map_err(|error| RepositoryError::Decode(format!("section: {error}")))?,
        provider: row.try_get("provider")?,
        attempt: u32::try_from(attempt)
            .map_err(|_| RepositoryError::Decode(format!("attempt `{attempt}` out of range")))?,
        elapsed_ms: u64::try_from(elapsed_ms).unwrap_or_default(),
        success: row.try_get("success")?,
        malformed_rows: usize::try_from(malformed_rows).unwrap_or_default(),
        failure: row.try_get("failure")?,
        contract_fingerprint: row.try_get("contract_fingerprint")?,
        recorded_at: parse_timestamp("recorded_at", &recorded_at)?,
    })
}
