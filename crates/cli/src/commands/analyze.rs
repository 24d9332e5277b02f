use std::sync::Arc;

use serde_json::Value;
use tracing::{warn, Level};

use switchover_agent::Orchestrator;
use switchover_core::config::{AppConfig, LoadOptions};
use switchover_core::domain::request::{AnalysisDepth, AnalysisRequest, TimelineUrgency};
use switchover_core::domain::strategy::SwitchingStrategy;
use switchover_core::errors::AnalysisError;
use switchover_core::metrics::{MetricsSink, TracingMetricsSink};
use switchover_db::{
    connect_with_settings, migrations, SqlMetricsSink, SqlStrategyRepository, StrategyRepository,
};

use crate::commands::{current_thread_runtime, CommandResult};

const COMMAND: &str = "analyze";

#[derive(Clone, Debug, Default)]
pub struct AnalyzeArgs {
    pub industry: String,
    pub competitor: String,
    /// `key=value` pairs; values that parse as JSON keep their type.
    pub profile: Vec<String>,
    pub depth: String,
    pub urgency: String,
    pub no_store: bool,
}

type Failure = (&'static str, String, u8);

pub fn run(args: AnalyzeArgs) -> CommandResult {
    let request = match build_request(&args) {
        Ok(request) => request,
        Err(message) => return CommandResult::failure(COMMAND, "invalid_arguments", message, 9),
    };

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };
    init_stderr_logging(&config);

    let runtime = match current_thread_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let outcome = if args.no_store {
        runtime.block_on(analyze_without_store(&config, &request))
    } else {
        runtime.block_on(analyze_and_store(&config, &request))
    };

    match outcome.and_then(|strategy| render(&strategy)) {
        Ok(output) => CommandResult { exit_code: 0, output },
        Err((error_class, message, exit_code)) => {
            CommandResult::failure(COMMAND, error_class, message, exit_code)
        }
    }
}

pub fn build_request(args: &AnalyzeArgs) -> Result<AnalysisRequest, String> {
    if args.industry.trim().is_empty() {
        return Err("--industry must not be empty".to_string());
    }
    if args.competitor.trim().is_empty() {
        return Err("--competitor must not be empty".to_string());
    }

    let depth: AnalysisDepth = args.depth.parse().map_err(|error| format!("--depth: {error}"))?;
    let urgency: TimelineUrgency =
        args.urgency.parse().map_err(|error| format!("--urgency: {error}"))?;

    let mut request = AnalysisRequest::new(args.industry.as_str(), args.competitor.as_str())
        .with_depth(depth)
        .with_urgency(urgency);
    for pair in &args.profile {
        let (key, value) = parse_profile_pair(pair)?;
        request = request.with_profile(key, value);
    }
    Ok(request)
}

fn parse_profile_pair(pair: &str) -> Result<(String, Value), String> {
    let Some((key, raw)) = pair.split_once('=') else {
        return Err(format!("--profile `{pair}` must look like key=value"));
    };
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("--profile `{pair}` has an empty key"));
    }
    let raw = raw.trim();
    let value =
        serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

async fn analyze_without_store(
    config: &AppConfig,
    request: &AnalysisRequest,
) -> Result<SwitchingStrategy, Failure> {
    let orchestrator = build_orchestrator(config, Arc::new(TracingMetricsSink))?;
    analyze(&orchestrator, request).await
}

async fn analyze_and_store(
    config: &AppConfig,
    request: &AnalysisRequest,
) -> Result<SwitchingStrategy, Failure> {
    let pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
    migrations::run_pending(&pool).await.map_err(|error| ("migration", error.to_string(), 5u8))?;

    let orchestrator = build_orchestrator(config, Arc::new(SqlMetricsSink::new(pool.clone())))?;
    let strategy = analyze(&orchestrator, request).await;

    if let Ok(strategy) = &strategy {
        let repository = SqlStrategyRepository::new(pool.clone());
        if let Err(error) = repository.save(strategy).await {
            warn!(
                event_name = "cli.analyze.persist_failed",
                analysis_id = %strategy.analysis_id,
                error = %error,
                "strategy could not be stored"
            );
        }
    }
    pool.close().await;
    strategy
}

fn build_orchestrator(
    config: &AppConfig,
    metrics: Arc<dyn MetricsSink>,
) -> Result<Orchestrator, Failure> {
    Orchestrator::from_config(config, metrics)
        .map_err(|error| ("orchestrator_init", error.to_string(), 6))
}

async fn analyze(
    orchestrator: &Orchestrator,
    request: &AnalysisRequest,
) -> Result<SwitchingStrategy, Failure> {
    orchestrator.analyze(request).await.map_err(|error| match error {
        AnalysisError::UnknownIndustry(_) => ("unknown_industry", error.to_string(), 7),
        AnalysisError::AllProvidersUnavailable => {
            ("providers_unavailable", error.to_string(), 8)
        }
    })
}

fn render(strategy: &SwitchingStrategy) -> Result<String, Failure> {
    serde_json::to_string_pretty(strategy)
        .map_err(|error| ("serialization", error.to_string(), 10))
}

/// Logs go to stderr so stdout carries only the command output.
fn init_stderr_logging(config: &AppConfig) {
    let level = config.logging.level.parse::<Level>().unwrap_or(Level::WARN);
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(level)
        .compact()
        .try_init();
}
