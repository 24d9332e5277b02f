use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use switchover_core::catalog::{CatalogError, TemplateCatalog};
use switchover_core::config::{AppConfig, OrchestratorConfig};
use switchover_core::domain::request::AnalysisRequest;
use switchover_core::domain::strategy::{Section, SectionKind, SwitchingStrategy};
use switchover_core::errors::AnalysisError;
use switchover_core::metrics::{MetricsSink, SubRequestMetric};
use switchover_core::parser::{
    parse_barriers, parse_opportunities, parse_roadmap, parse_roi, ParseError, ParseOutcome,
};
use switchover_core::prompts::{PromptBuilder, PromptError, PromptInputs, RenderedPrompt};
use switchover_core::synthesizer::{synthesize, AnalysisSections, SynthesisStamp};

use crate::llm::{ProviderError, ProviderSlot};
use crate::providers::{build_provider_chain, ProviderBuildError};

type ParseFn<T> = fn(&str) -> Result<ParseOutcome<T>, ParseError>;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("template catalog failed to load: {0}")]
    Catalog(#[from] CatalogError),
    #[error("provider chain failed to build: {0}")]
    Providers(#[from] ProviderBuildError),
    #[error("prompt templates failed to load: {0}")]
    Prompts(#[from] PromptError),
}

/// Why one provider attempt produced no usable section.
#[derive(Debug)]
enum AttemptFailure {
    Provider(ProviderError),
    Parse(ParseError),
    Malformed { ratio: f64, malformed_rows: usize },
}

impl AttemptFailure {
    fn kind(&self) -> &'static str {
        match self {
            Self::Provider(error) => error.kind(),
            Self::Parse(ParseError::NoStructuredContent { .. }) => "no_structured_content",
            Self::Malformed { .. } => "malformed_ratio",
        }
    }

    fn malformed_rows(&self) -> usize {
        match self {
            Self::Provider(_) => 0,
            Self::Parse(ParseError::NoStructuredContent { malformed_rows, .. }) => *malformed_rows,
            Self::Malformed { malformed_rows, .. } => *malformed_rows,
        }
    }
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provider(error) => write!(f, "{error}"),
            Self::Parse(error) => write!(f, "{error}"),
            Self::Malformed { ratio, malformed_rows } => write!(
                f,
                "{malformed_rows} malformed rows ({:.0}% of table rows)",
                ratio * 100.0
            ),
        }
    }
}

/// Fans one analysis request out to four section sub-requests and synthesizes
/// the result. Holds no per-request state.
pub struct Orchestrator {
    catalog: Arc<TemplateCatalog>,
    prompts: PromptBuilder,
    providers: Vec<ProviderSlot>,
    policy: OrchestratorConfig,
    metrics: Arc<dyn MetricsSink>,
}

impl Orchestrator {
    pub fn new(
        catalog: Arc<TemplateCatalog>,
        providers: Vec<ProviderSlot>,
        policy: OrchestratorConfig,
        metrics: Arc<dyn MetricsSink>,
    ) -> Result<Self, OrchestratorError> {
        Ok(Self { catalog, prompts: PromptBuilder::new()?, providers, policy, metrics })
    }

    /// Loads the catalog and provider chain described by `config`.
    pub fn from_config(
        config: &AppConfig,
        metrics: Arc<dyn MetricsSink>,
    ) -> Result<Self, OrchestratorError> {
        let catalog = match &config.templates.directory {
            Some(directory) => TemplateCatalog::load_dir(directory)?,
            None => TemplateCatalog::builtin()?,
        };
        let providers = build_provider_chain(config)?;
        Self::new(Arc::new(catalog), providers, config.orchestrator.clone(), metrics)
    }

    pub fn catalog(&self) -> &TemplateCatalog {
        &self.catalog
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|slot| slot.name().to_string()).collect()
    }

    pub async fn analyze(
        &self,
        request: &AnalysisRequest,
    ) -> Result<SwitchingStrategy, AnalysisError> {
        let template = self.catalog.industry(&request.industry)?;
        let competitor = self.catalog.competitor(&request.competitor);
        let stamp = SynthesisStamp::now();
        let span = info_span!("analysis", analysis_id = %stamp.analysis_id);

        async move {
            let budget = self.policy.deadline_for(request.depth);
            let deadline = Instant::now() + budget;
            info!(
                event_name = "analysis.start",
                industry = %request.industry,
                competitor = %request.competitor,
                depth = request.depth.as_str(),
                known_competitor = !competitor.is_unknown(),
                deadline_ms = budget.as_millis() as u64,
                "starting switching analysis"
            );

            let inputs = PromptInputs { request, template, competitor: &competitor };
            let id = stamp.analysis_id;
            let (barriers, opportunities, roadmap, roi) = tokio::join!(
                self.run_section(SectionKind::Barriers, inputs, id, deadline, parse_barriers),
                self.run_section(
                    SectionKind::Opportunities,
                    inputs,
                    id,
                    deadline,
                    parse_opportunities
                ),
                self.run_section(SectionKind::Roadmap, inputs, id, deadline, parse_roadmap),
                self.run_section(SectionKind::Roi, inputs, id, deadline, parse_roi),
            );

            let sections = AnalysisSections { barriers, opportunities, roadmap, roi };
            if sections.all_unavailable() {
                error!(
                    event_name = "analysis.failed",
                    reason = "all_providers_unavailable",
                    "no section produced usable data"
                );
                return Err(AnalysisError::AllProvidersUnavailable);
            }

            let strategy = synthesize(sections, request, template, stamp);
            info!(
                event_name = "analysis.completed",
                incomplete = strategy.incomplete,
                unavailable_sections = strategy.unavailable_sections.len(),
                risk_level = strategy.risk_assessment.level.as_str(),
                "switching analysis completed"
            );
            Ok(strategy)
        }
        .instrument(span)
        .await
    }

    async fn run_section<T>(
        &self,
        kind: SectionKind,
        inputs: PromptInputs<'_>,
        analysis_id: Uuid,
        deadline: Instant,
        parse: ParseFn<T>,
    ) -> Section<T> {
        let prompt = match self.prompts.render(kind, inputs) {
            Ok(prompt) => prompt,
            Err(render_error) => {
                error!(
                    event_name = "analysis.section.prompt_failed",
                    section = kind.as_str(),
                    error = %render_error,
                    "prompt rendering failed"
                );
                return Section::unavailable(format!("prompt rendering failed: {render_error}"));
            }
        };

        match timeout_at(deadline, self.try_providers(kind, &prompt, analysis_id, parse)).await {
            Ok(section) => section,
            Err(_) => {
                warn!(
                    event_name = "analysis.section.deadline_exceeded",
                    section = kind.as_str(),
                    "analysis deadline expired before the section completed"
                );
                Section::unavailable("analysis deadline exceeded")
            }
        }
    }

    /// Providers in priority order; each gets `1 + retries_per_provider` attempts.
    async fn try_providers<T>(
        &self,
        kind: SectionKind,
        prompt: &RenderedPrompt,
        analysis_id: Uuid,
        parse: ParseFn<T>,
    ) -> Section<T> {
        if self.providers.is_empty() {
            return Section::unavailable("no providers configured");
        }

        let attempts_per_provider = self.policy.retries_per_provider.saturating_add(1);
        let mut last_failure = String::new();

        for slot in &self.providers {
            for attempt in 1..=attempts_per_provider {
                let started = Instant::now();
                let outcome = self.attempt(slot, prompt, parse).await;
                let elapsed_ms = started.elapsed().as_millis() as u64;

                let (success, malformed_rows, failure) = match &outcome {
                    Ok(parsed) => (true, parsed.malformed_rows, None),
                    Err(failure) => (false, failure.malformed_rows(), Some(failure.kind())),
                };
                self.record(SubRequestMetric {
                    analysis_id,
                    section: kind,
                    provider: slot.name().to_string(),
                    attempt,
                    elapsed_ms,
                    success,
                    malformed_rows,
                    failure: failure.map(str::to_string),
                    contract_fingerprint: prompt.fingerprint.clone(),
                    recorded_at: Utc::now(),
                })
                .await;

                match outcome {
                    Ok(parsed) => {
                        info!(
                            event_name = "analysis.section.completed",
                            section = kind.as_str(),
                            provider = slot.name(),
                            attempt,
                            matched_rows = parsed.matched_rows,
                            malformed_rows = parsed.malformed_rows,
                            "section parsed"
                        );
                        return Section::available(parsed.record);
                    }
                    Err(failure) => {
                        warn!(
                            event_name = "analysis.section.attempt_failed",
                            section = kind.as_str(),
                            provider = slot.name(),
                            attempt,
                            failure = failure.kind(),
                            error = %failure,
                            "section attempt failed"
                        );
                        last_failure = format!("{}: {failure}", slot.name());
                    }
                }
            }
        }

        Section::unavailable(format!("all providers failed (last: {last_failure})"))
    }

    async fn attempt<T>(
        &self,
        slot: &ProviderSlot,
        prompt: &RenderedPrompt,
        parse: ParseFn<T>,
    ) -> Result<ParseOutcome<T>, AttemptFailure> {
        let call = slot.client.generate(&prompt.text, &slot.options);
        let raw = match timeout(self.policy.call_timeout(), call).await {
            Ok(result) => result.map_err(AttemptFailure::Provider)?,
            Err(_) => return Err(AttemptFailure::Provider(ProviderError::Timeout)),
        };

        let parsed = parse(&raw).map_err(AttemptFailure::Parse)?;
        if parsed.exceeds_malformed_ratio(self.policy.max_malformed_ratio) {
            return Err(AttemptFailure::Malformed {
                ratio: parsed.malformed_ratio(),
                malformed_rows: parsed.malformed_rows,
            });
        }
        Ok(parsed)
    }

    async fn record(&self, metric: SubRequestMetric) {
        if let Err(sink_error) = self.metrics.record(metric).await {
            warn!(
                event_name = "analysis.metrics.record_failed",
                error = %sink_error,
                "failed to record attempt metric"
            );
        }
    }
}
