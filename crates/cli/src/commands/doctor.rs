use serde::Serialize;

use switchover_agent::build_provider_chain;
use switchover_core::catalog::TemplateCatalog;
use switchover_core::config::{AppConfig, LoadOptions};
use switchover_core::domain::strategy::SectionKind;
use switchover_core::prompts::{PromptBuilder, PromptContract};
use switchover_db::connect_with_settings;

use crate::commands::{current_thread_runtime, escape_json, CommandResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str) -> Self {
        Self {
            name,
            status: CheckStatus::Skipped,
            details: "skipped because configuration did not load".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\
                 \"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck::pass(
                "config_validation",
                "configuration loaded and validated",
            ));
            checks.push(check_provider_chain(&config));
            checks.push(check_template_catalog(&config));
            checks.push(check_prompt_contracts());
            checks.push(check_database_connectivity(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck::fail("config_validation", error.to_string()));
            checks.push(DoctorCheck::skipped("provider_chain"));
            checks.push(DoctorCheck::skipped("template_catalog"));
            checks.push(check_prompt_contracts());
            checks.push(DoctorCheck::skipped("database_connectivity"));
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_provider_chain(config: &AppConfig) -> DoctorCheck {
    match build_provider_chain(config) {
        Ok(chain) if chain.is_empty() => {
            DoctorCheck::fail("provider_chain", "no provider has an API key")
        }
        Ok(chain) => {
            let order: Vec<String> = chain
                .iter()
                .map(|slot| format!("{} ({})", slot.name(), slot.options.model))
                .collect();
            DoctorCheck::pass("provider_chain", format!("priority order: {}", order.join(" > ")))
        }
        Err(error) => DoctorCheck::fail("provider_chain", error.to_string()),
    }
}

fn check_template_catalog(config: &AppConfig) -> DoctorCheck {
    let (catalog, source) = match &config.templates.directory {
        Some(directory) => (TemplateCatalog::load_dir(directory), directory.display().to_string()),
        None => (TemplateCatalog::builtin(), "built-in".to_string()),
    };

    match catalog {
        Ok(catalog) => DoctorCheck::pass(
            "template_catalog",
            format!(
                "{} industries, {} competitor profiles ({source})",
                catalog.industries().count(),
                catalog.competitors().count()
            ),
        ),
        Err(error) => DoctorCheck::fail("template_catalog", error.to_string()),
    }
}

/// Reports the deployed template/grammar pairs so metrics can be matched to them.
fn check_prompt_contracts() -> DoctorCheck {
    if let Err(error) = PromptBuilder::new() {
        return DoctorCheck::fail("prompt_contracts", error.to_string());
    }

    let contracts: Vec<String> = SectionKind::ALL
        .into_iter()
        .map(|kind| {
            let contract = PromptContract::for_shape(kind);
            format!("{}={}@{}", kind, contract.grammar_version, contract.fingerprint())
        })
        .collect();
    DoctorCheck::pass("prompt_contracts", contracts.join(", "))
}

fn check_database_connectivity(config: &AppConfig) -> DoctorCheck {
    let runtime = match current_thread_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck::fail(
                "database_connectivity",
                format!("failed to initialize async runtime: {error}"),
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;

        pool.close().await;
        Ok::<(), String>(())
    });

    match result {
        Ok(()) => DoctorCheck::pass(
            "database_connectivity",
            format!("connected using `{}`", config.database.url),
        ),
        Err(error) => DoctorCheck::fail("database_connectivity", error),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}
