use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::request::AnalysisDepth;
use crate::parser::DEFAULT_MAX_MALFORMED_RATIO;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub providers: Vec<ProviderConfig>,
    pub orchestrator: OrchestratorConfig,
    pub templates: TemplatesConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

/// One entry in the provider chain. Order in the config is priority order.
#[derive(Clone, Debug)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub model: String,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ProviderConfig {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            model: kind.default_model().to_string(),
            api_key: None,
            base_url: None,
            temperature: 0.2,
            max_tokens: 1_024,
        }
    }

    pub fn resolved_base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(self.kind.default_base_url())
    }
}

#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    pub basic_deadline_ms: u64,
    pub comprehensive_deadline_ms: u64,
    pub strategic_deadline_ms: u64,
    pub call_timeout_ms: u64,
    pub retries_per_provider: u32,
    pub max_malformed_ratio: f64,
}

impl OrchestratorConfig {
    /// End-to-end budget for one analysis at the given depth.
    pub fn deadline_for(&self, depth: AnalysisDepth) -> Duration {
        let millis = match depth {
            AnalysisDepth::Basic => self.basic_deadline_ms,
            AnalysisDepth::Comprehensive => self.comprehensive_deadline_ms,
            AnalysisDepth::Strategic => self.strategic_deadline_ms,
        };
        Duration::from_millis(millis)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            basic_deadline_ms: 6_000,
            comprehensive_deadline_ms: 10_000,
            strategic_deadline_ms: 15_000,
            call_timeout_ms: 8_000,
            retries_per_provider: 1,
            max_malformed_ratio: DEFAULT_MAX_MALFORMED_RATIO,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct TemplatesConfig {
    /// Directory with `industries/` and `competitors/`; built-ins when unset.
    pub directory: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Anthropic,
    #[serde(rename = "openai")]
    OpenAi,
    Gemini,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Anthropic => "claude-3-5-sonnet-latest",
            Self::OpenAi => "gpt-4o-mini",
            Self::Gemini => "gemini-1.5-flash",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Anthropic => "https://api.anthropic.com",
            Self::OpenAi => "https://api.openai.com",
            Self::Gemini => "https://generativelanguage.googleapis.com",
        }
    }

    /// Environment variable that supplies this provider's API key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Self::Anthropic => "SWITCHOVER_ANTHROPIC_API_KEY",
            Self::OpenAi => "SWITCHOVER_OPENAI_API_KEY",
            Self::Gemini => "SWITCHOVER_GEMINI_API_KEY",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub templates_dir: Option<PathBuf>,
    pub server_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://switchover.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            providers: Vec::new(),
            orchestrator: OrchestratorConfig::default(),
            templates: TemplatesConfig::default(),
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Ok(Self::Anthropic),
            "openai" => Ok(Self::OpenAi),
            "gemini" => Ok(Self::Gemini),
            other => Err(ConfigError::Validation(format!(
                "unsupported provider `{other}` (expected anthropic|openai|gemini)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from("switchover.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// Providers in priority order that carry an API key.
    pub fn enabled_providers(&self) -> impl Iterator<Item = &ProviderConfig> {
        self.providers.iter().filter(|provider| has_api_key(provider))
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(providers) = patch.providers {
            self.providers = providers.into_iter().map(ProviderPatch::into_config).collect();
        }

        if let Some(orchestrator) = patch.orchestrator {
            if let Some(value) = orchestrator.basic_deadline_ms {
                self.orchestrator.basic_deadline_ms = value;
            }
            if let Some(value) = orchestrator.comprehensive_deadline_ms {
                self.orchestrator.comprehensive_deadline_ms = value;
            }
            if let Some(value) = orchestrator.strategic_deadline_ms {
                self.orchestrator.strategic_deadline_ms = value;
            }
            if let Some(value) = orchestrator.call_timeout_ms {
                self.orchestrator.call_timeout_ms = value;
            }
            if let Some(value) = orchestrator.retries_per_provider {
                self.orchestrator.retries_per_provider = value;
            }
            if let Some(value) = orchestrator.max_malformed_ratio {
                self.orchestrator.max_malformed_ratio = value;
            }
        }

        if let Some(templates) = patch.templates {
            if let Some(directory) = templates.directory {
                self.templates.directory = Some(directory);
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("SWITCHOVER_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("SWITCHOVER_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("SWITCHOVER_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("SWITCHOVER_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("SWITCHOVER_DATABASE_TIMEOUT_SECS", &value)?;
        }

        // A key for a kind missing from the file appends that provider at the
        // end of the chain, in anthropic, openai, gemini order.
        for kind in [ProviderKind::Anthropic, ProviderKind::OpenAi, ProviderKind::Gemini] {
            let Some(value) = read_env(kind.api_key_env()) else { continue };
            match self.providers.iter_mut().find(|provider| provider.kind == kind) {
                Some(provider) => provider.api_key = Some(secret_value(value)),
                None => {
                    let mut provider = ProviderConfig::new(kind);
                    provider.api_key = Some(secret_value(value));
                    self.providers.push(provider);
                }
            }
        }

        if let Some(value) = read_env("SWITCHOVER_ORCHESTRATOR_BASIC_DEADLINE_MS") {
            self.orchestrator.basic_deadline_ms =
                parse_u64("SWITCHOVER_ORCHESTRATOR_BASIC_DEADLINE_MS", &value)?;
        }
        if let Some(value) = read_env("SWITCHOVER_ORCHESTRATOR_COMPREHENSIVE_DEADLINE_MS") {
            self.orchestrator.comprehensive_deadline_ms =
                parse_u64("SWITCHOVER_ORCHESTRATOR_COMPREHENSIVE_DEADLINE_MS", &value)?;
        }
        if let Some(value) = read_env("SWITCHOVER_ORCHESTRATOR_STRATEGIC_DEADLINE_MS") {
            self.orchestrator.strategic_deadline_ms =
                parse_u64("SWITCHOVER_ORCHESTRATOR_STRATEGIC_DEADLINE_MS", &value)?;
        }
        if let Some(value) = read_env("SWITCHOVER_ORCHESTRATOR_CALL_TIMEOUT_MS") {
            self.orchestrator.call_timeout_ms =
                parse_u64("SWITCHOVER_ORCHESTRATOR_CALL_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = read_env("SWITCHOVER_ORCHESTRATOR_RETRIES_PER_PROVIDER") {
            self.orchestrator.retries_per_provider =
                parse_u32("SWITCHOVER_ORCHESTRATOR_RETRIES_PER_PROVIDER", &value)?;
        }
        if let Some(value) = read_env("SWITCHOVER_ORCHESTRATOR_MAX_MALFORMED_RATIO") {
            self.orchestrator.max_malformed_ratio =
                parse_f64("SWITCHOVER_ORCHESTRATOR_MAX_MALFORMED_RATIO", &value)?;
        }

        if let Some(value) = read_env("SWITCHOVER_TEMPLATES_DIR") {
            self.templates.directory = Some(PathBuf::from(value));
        }

        if let Some(value) = read_env("SWITCHOVER_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("SWITCHOVER_SERVER_PORT") {
            self.server.port = parse_u16("SWITCHOVER_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("SWITCHOVER_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("SWITCHOVER_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("SWITCHOVER_LOGGING_LEVEL").or_else(|| read_env("SWITCHOVER_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("SWITCHOVER_LOGGING_FORMAT").or_else(|| read_env("SWITCHOVER_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(templates_dir) = overrides.templates_dir {
            self.templates.directory = Some(templates_dir);
        }
        if let Some(server_port) = overrides.server_port {
            self.server.port = server_port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_providers(&self.providers)?;
        validate_orchestrator(&self.orchestrator)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("switchover.toml"), PathBuf::from("config/switchover.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn has_api_key(provider: &ProviderConfig) -> bool {
    provider.api_key.as_ref().is_some_and(|value| !value.expose_secret().trim().is_empty())
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_providers(providers: &[ProviderConfig]) -> Result<(), ConfigError> {
    if !providers.iter().any(has_api_key) {
        return Err(ConfigError::Validation(
            "at least one provider needs an api_key. Set SWITCHOVER_ANTHROPIC_API_KEY, \
             SWITCHOVER_OPENAI_API_KEY or SWITCHOVER_GEMINI_API_KEY, or add [[providers]] \
             entries to switchover.toml"
                .to_string(),
        ));
    }

    for provider in providers {
        let name = provider.kind.as_str();
        if provider.model.trim().is_empty() {
            return Err(ConfigError::Validation(format!("providers.{name}.model must be set")));
        }
        if !(0.0..=2.0).contains(&provider.temperature) {
            return Err(ConfigError::Validation(format!(
                "providers.{name}.temperature must be in range 0.0..=2.0"
            )));
        }
        if provider.max_tokens == 0 {
            return Err(ConfigError::Validation(format!(
                "providers.{name}.max_tokens must be greater than zero"
            )));
        }
        if let Some(base_url) = &provider.base_url {
            if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                return Err(ConfigError::Validation(format!(
                    "providers.{name}.base_url must start with http:// or https://"
                )));
            }
        }
    }

    Ok(())
}

fn validate_orchestrator(orchestrator: &OrchestratorConfig) -> Result<(), ConfigError> {
    let deadlines = [
        ("basic_deadline_ms", orchestrator.basic_deadline_ms),
        ("comprehensive_deadline_ms", orchestrator.comprehensive_deadline_ms),
        ("strategic_deadline_ms", orchestrator.strategic_deadline_ms),
        ("call_timeout_ms", orchestrator.call_timeout_ms),
    ];
    for (field, value) in deadlines {
        if value == 0 || value > 300_000 {
            return Err(ConfigError::Validation(format!(
                "orchestrator.{field} must be in range 1..=300000"
            )));
        }
    }

    if orchestrator.retries_per_provider > 5 {
        return Err(ConfigError::Validation(
            "orchestrator.retries_per_provider must be at most 5".to_string(),
        ));
    }

    if !(0.0..=1.0).contains(&orchestrator.max_malformed_ratio) {
        return Err(ConfigError::Validation(
            "orchestrator.max_malformed_ratio must be in range 0.0..=1.0".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.parse::<f64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    providers: Option<Vec<ProviderPatch>>,
    orchestrator: Option<OrchestratorPatch>,
    templates: Option<TemplatesPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ProviderPatch {
    kind: ProviderKind,
    model: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl ProviderPatch {
    fn into_config(self) -> ProviderConfig {
        let mut provider = ProviderConfig::new(self.kind);
        if let Some(model) = self.model {
            provider.model = model;
        }
        provider.api_key = self.api_key.filter(|value| !value.trim().is_empty()).map(secret_value);
        provider.base_url = self.base_url;
        if let Some(temperature) = self.temperature {
            provider.temperature = temperature;
        }
        if let Some(max_tokens) = self.max_tokens {
            provider.max_tokens = max_tokens;
        }
        provider
    }
}

#[derive(Debug, Default, Deserialize)]
struct OrchestratorPatch {
    basic_deadline_ms: Option<u64>,
    comprehensive_deadline_ms: Option<u64>,
    strategic_deadline_ms: Option<u64>,
    call_timeout_ms: Option<u64>,
    retries_per_provider: Option<u32>,
    max_malformed_ratio: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct TemplatesPatch {
    directory: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat, ProviderKind};
    use crate::domain::request::AnalysisDepth;

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_SWITCHOVER_OPENAI_KEY", "sk-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("switchover.toml");
            fs::write(
                &path,
                r#"
[[providers]]
kind = "openai"
model = "gpt-4o"
api_key = "${TEST_SWITCHOVER_OPENAI_KEY}"
temperature = 0.1
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.providers.len() == 1, "one provider should be configured")?;
            let provider = &config.providers[0];
            ensure(provider.kind == ProviderKind::OpenAi, "provider kind should be openai")?;
            ensure(provider.model == "gpt-4o", "model should come from the file")?;
            ensure(
                provider.api_key.as_ref().map(|key| key.expose_secret() == "sk-from-env")
                    == Some(true),
                "api key should be interpolated from the environment",
            )?;
            ensure(
                provider.resolved_base_url() == "https://api.openai.com",
                "base url should default per provider kind",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_SWITCHOVER_OPENAI_KEY"]);
        result
    }

    #[test]
    fn env_api_keys_extend_the_provider_chain_in_order() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SWITCHOVER_GEMINI_API_KEY", "gemini-key");
        env::set_var("SWITCHOVER_ANTHROPIC_API_KEY", "anthropic-key");
        env::set_var("SWITCHOVER_LOG_LEVEL", "warn");
        env::set_var("SWITCHOVER_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            let kinds = config.enabled_providers().map(|p| p.kind).collect::<Vec<_>>();
            ensure(
                kinds == vec![ProviderKind::Anthropic, ProviderKind::Gemini],
                "env providers should follow anthropic, openai, gemini order",
            )?;
            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&[
            "SWITCHOVER_GEMINI_API_KEY",
            "SWITCHOVER_ANTHROPIC_API_KEY",
            "SWITCHOVER_LOG_LEVEL",
            "SWITCHOVER_LOG_FORMAT",
        ]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SWITCHOVER_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("SWITCHOVER_ANTHROPIC_API_KEY", "anthropic-from-env");
        env::set_var("SWITCHOVER_ORCHESTRATOR_CALL_TIMEOUT_MS", "4000");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("switchover.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[[providers]]
kind = "anthropic"
api_key = "anthropic-from-file"

[orchestrator]
call_timeout_ms = 2000
strategic_deadline_ms = 20000

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.providers.len() == 1,
                "env key should update the file provider instead of appending",
            )?;
            ensure(
                config.providers[0].api_key.as_ref().map(|key| key.expose_secret().to_string())
                    == Some("anthropic-from-env".to_string()),
                "env api key should win over file",
            )?;
            ensure(
                config.orchestrator.call_timeout() == Duration::from_millis(4_000),
                "env call timeout should win over file",
            )?;
            ensure(
                config.orchestrator.deadline_for(AnalysisDepth::Strategic)
                    == Duration::from_millis(20_000),
                "file deadline should win over defaults",
            )?;
            ensure(
                config.orchestrator.deadline_for(AnalysisDepth::Basic)
                    == Duration::from_millis(6_000),
                "basic deadline should keep its default",
            )?;
            Ok(())
        })();

        clear_vars(&[
            "SWITCHOVER_DATABASE_URL",
            "SWITCHOVER_ANTHROPIC_API_KEY",
            "SWITCHOVER_ORCHESTRATOR_CALL_TIMEOUT_MS",
        ]);
        result
    }

    #[test]
    fn validation_fails_fast_without_provider_keys() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let error = match AppConfig::load(LoadOptions::default()) {
            Ok(_) => {
                return Err("expected validation failure but config load succeeded".to_string())
            }
            Err(error) => error,
        };
        let has_message = matches!(
            error,
            ConfigError::Validation(ref message) if message.contains("SWITCHOVER_ANTHROPIC_API_KEY")
        );
        ensure(has_message, "validation failure should name the api key variables")
    }

    #[test]
    fn invalid_numeric_env_override_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SWITCHOVER_ANTHROPIC_API_KEY", "anthropic-key");
        env::set_var("SWITCHOVER_ORCHESTRATOR_MAX_MALFORMED_RATIO", "1.5");
        env::set_var("SWITCHOVER_SERVER_PORT", "eighty");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("expected invalid port override".to_string()),
                Err(error) => error,
            };
            ensure(
                matches!(
                    error,
                    ConfigError::InvalidEnvOverride { ref key, .. } if key == "SWITCHOVER_SERVER_PORT"
                ),
                "invalid port should be reported with its key",
            )?;

            env::remove_var("SWITCHOVER_SERVER_PORT");
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("expected malformed ratio validation failure".to_string()),
                Err(error) => error,
            };
            ensure(
                matches!(
                    error,
                    ConfigError::Validation(ref message) if message.contains("max_malformed_ratio")
                ),
                "out of range ratio should fail validation",
            )
        })();

        clear_vars(&[
            "SWITCHOVER_ANTHROPIC_API_KEY",
            "SWITCHOVER_ORCHESTRATOR_MAX_MALFORMED_RATIO",
            "SWITCHOVER_SERVER_PORT",
        ]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SWITCHOVER_OPENAI_API_KEY", "sk-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("sk-secret-value"), "debug output should not contain api key")?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&["SWITCHOVER_OPENAI_API_KEY"]);
        result
    }
}
