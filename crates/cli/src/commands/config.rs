use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;
use switchover_core::config::{AppConfig, LoadOptions};
use toml::Value;

/// Where each effective value came from, resolved against one config file.
struct SourceResolver {
    file_path: Option<PathBuf>,
    file_doc: Option<Value>,
}

impl SourceResolver {
    fn detect() -> Self {
        let file_path = detect_config_path();
        let file_doc = load_config_file_doc(file_path.as_deref());
        Self { file_path, file_doc }
    }

    fn source(&self, key_path: &str, env_keys: &[&str]) -> String {
        if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
            return format!("env ({env_key})");
        }

        if let Some(doc) = &self.file_doc {
            if contains_path(doc, key_path) {
                let file_path = self
                    .file_path
                    .as_ref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "config file".to_string());
                return format!("file ({file_path})");
            }
        }

        "default".to_string()
    }
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };
    let sources = SourceResolver::detect();

    let mut lines =
        vec!["effective config (source precedence: env > file > default):".to_string()];
    let mut push = |key: &str, value: String, env_keys: &[&str]| {
        lines.push(render_line(key, &value, sources.source(key, env_keys)));
    };

    push("database.url", config.database.url.clone(), &["SWITCHOVER_DATABASE_URL"]);
    push(
        "database.max_connections",
        config.database.max_connections.to_string(),
        &["SWITCHOVER_DATABASE_MAX_CONNECTIONS"],
    );
    push(
        "database.timeout_secs",
        config.database.timeout_secs.to_string(),
        &["SWITCHOVER_DATABASE_TIMEOUT_SECS"],
    );

    for (index, provider) in config.providers.iter().enumerate() {
        let prefix = format!("providers[{index}]");
        let api_key = provider
            .api_key
            .as_ref()
            .map(|key| redact_token(key.expose_secret()))
            .unwrap_or_else(|| "<unset>".to_string());
        push(&format!("{prefix}.kind"), provider.kind.as_str().to_string(), &[]);
        push(&format!("{prefix}.model"), provider.model.clone(), &[]);
        push(&format!("{prefix}.api_key"), api_key, &[provider.kind.api_key_env()]);
        push(&format!("{prefix}.base_url"), provider.resolved_base_url().to_string(), &[]);
        push(&format!("{prefix}.temperature"), provider.temperature.to_string(), &[]);
        push(&format!("{prefix}.max_tokens"), provider.max_tokens.to_string(), &[]);
    }

    let orchestrator = &config.orchestrator;
    push(
        "orchestrator.basic_deadline_ms",
        orchestrator.basic_deadline_ms.to_string(),
        &["SWITCHOVER_ORCHESTRATOR_BASIC_DEADLINE_MS"],
    );
    push(
        "orchestrator.comprehensive_deadline_ms",
        orchestrator.comprehensive_deadline_ms.to_string(),
        &["SWITCHOVER_ORCHESTRATOR_COMPREHENSIVE_DEADLINE_MS"],
    );
    push(
        "orchestrator.strategic_deadline_ms",
        orchestrator.strategic_deadline_ms.to_string(),
        &["SWITCHOVER_ORCHESTRATOR_STRATEGIC_DEADLINE_MS"],
    );
    push(
        "orchestrator.call_timeout_ms",
        orchestrator.call_timeout_ms.to_string(),
        &["SWITCHOVER_ORCHESTRATOR_CALL_TIMEOUT_MS"],
    );
    push(
        "orchestrator.retries_per_provider",
        orchestrator.retries_per_provider.to_string(),
        &["SWITCHOVER_ORCHESTRATOR_RETRIES_PER_PROVIDER"],
    );
    push(
        "orchestrator.max_malformed_ratio",
        orchestrator.max_malformed_ratio.to_string(),
        &["SWITCHOVER_ORCHESTRATOR_MAX_MALFORMED_RATIO"],
    );

    push(
        "templates.directory",
        config
            .templates
            .directory
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "<built-in>".to_string()),
        &["SWITCHOVER_TEMPLATES_DIR"],
    );

    push(
        "server.bind_address",
        config.server.bind_address.clone(),
        &["SWITCHOVER_SERVER_BIND_ADDRESS"],
    );
    push("server.port", config.server.port.to_string(), &["SWITCHOVER_SERVER_PORT"]);
    push(
        "server.graceful_shutdown_secs",
        config.server.graceful_shutdown_secs.to_string(),
        &["SWITCHOVER_SERVER_GRACEFUL_SHUTDOWN_SECS"],
    );

    push(
        "logging.level",
        config.logging.level.clone(),
        &["SWITCHOVER_LOGGING_LEVEL", "SWITCHOVER_LOG_LEVEL"],
    );
    push(
        "logging.format",
        format!("{:?}", config.logging.format).to_ascii_lowercase(),
        &["SWITCHOVER_LOGGING_FORMAT", "SWITCHOVER_LOG_FORMAT"],
    );

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    ["switchover.toml", "config/switchover.toml"]
        .into_iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    // `providers[0].model` is attributed to the file when the file has a providers list.
    let key_path = key_path.split('[').next().unwrap_or(key_path);
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps the vendor prefix (`sk-ant-…` → `sk-***`) and hides the rest.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, redact_token};

    #[test]
    fn tokens_keep_only_their_prefix() {
        assert_eq!(redact_token("sk-ant-api03-secret"), "sk-***");
        assert_eq!(redact_token("AIzaSecret"), "<redacted>");
        assert_eq!(redact_token("  "), "<empty>");
    }

    #[test]
    fn provider_entries_resolve_to_the_providers_table() {
        let doc: Value = "[[providers]]\nkind = \"openai\"\n[server]\nport = 9000\n"
            .parse()
            .expect("toml");

        assert!(contains_path(&doc, "providers[0].model"));
        assert!(contains_path(&doc, "server.port"));
        assert!(!contains_path(&doc, "server.bind_address"));
    }
}
