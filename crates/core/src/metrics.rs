use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::domain::strategy::SectionKind;

/// One provider attempt for one section of one analysis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubRequestMetric {
    pub analysis_id: Uuid,
    pub section: SectionKind,
    pub provider: String,
    pub attempt: u32,
    pub elapsed_ms: u64,
    pub success: bool,
    pub malformed_rows: usize,
    pub failure: Option<String>,
    pub contract_fingerprint: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("metrics sink unavailable: {0}")]
    Unavailable(String),
}

/// Append-only destination for attempt metrics. Failures never abort an analysis.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn record(&self, metric: SubRequestMetric) -> Result<(), MetricsError>;
}

#[derive(Debug, Default)]
pub struct InMemoryMetricsSink {
    metrics: Mutex<Vec<SubRequestMetric>>,
}

impl InMemoryMetricsSink {
    pub async fn snapshot(&self) -> Vec<SubRequestMetric> {
        self.metrics.lock().await.clone()
    }
}

#[async_trait]
impl MetricsSink for InMemoryMetricsSink {
    async fn record(&self, metric: SubRequestMetric) -> Result<(), MetricsError> {
        self.metrics.lock().await.push(metric);
        Ok(())
    }
}

/// Emits each metric as a structured log event.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingMetricsSink;

#[async_trait]
impl MetricsSink for TracingMetricsSink {
    async fn record(&self, metric: SubRequestMetric) -> Result<(), MetricsError> {
        info!(
            event_name = "analysis.section.attempt",
            analysis_id = %metric.analysis_id,
            section = metric.section.as_str(),
            provider = %metric.provider,
            attempt = metric.attempt,
            elapsed_ms = metric.elapsed_ms,
            success = metric.success,
            malformed_rows = metric.malformed_rows,
            failure = metric.failure.as_deref().unwrap_or(""),
            contract_fingerprint = %metric.contract_fingerprint,
            "section attempt recorded"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::{InMemoryMetricsSink, MetricsSink, SubRequestMetric, TracingMetricsSink};
    use crate::domain::strategy::SectionKind;

    fn metric(attempt: u32) -> SubRequestMetric {
        SubRequestMetric {
            analysis_id: Uuid::new_v4(),
            section: SectionKind::Roadmap,
            provider: "scripted".to_string(),
            attempt,
            elapsed_ms: 12,
            success: attempt > 1,
            malformed_rows: 0,
            failure: (attempt == 1).then(|| "timeout".to_string()),
            contract_fingerprint: "abc123".to_string(),
            recorded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn in_memory_sink_appends_in_order() {
        let sink = InMemoryMetricsSink::default();
        sink.record(metric(1)).await.expect("record first");
        sink.record(metric(2)).await.expect("record second");

        let recorded = sink.snapshot().await;
        assert_eq!(recorded.iter().map(|m| m.attempt).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(recorded[0].failure.as_deref(), Some("timeout"));
    }

    #[tokio::test]
    async fn tracing_sink_never_fails() {
        assert!(TracingMetricsSink.record(metric(1)).await.is_ok());
    }
}
