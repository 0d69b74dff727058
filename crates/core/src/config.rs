use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::flow::FlowKind;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub retrieval: RetrievalConfig,
    pub rules: RulesConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub embedding_model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct RetrievalConfig {
    pub api_key: Option<SecretString>,
    pub embedding_api_key: Option<SecretString>,
    pub index_host: Option<String>,
    pub namespace: String,
    pub top_k: u32,
    pub min_score: f64,
}

#[derive(Clone, Debug)]
pub struct RulesConfig {
    pub stop_delivery_path: PathBuf,
    pub urgent_notice_path: PathBuf,
    pub stop_delivery_policy_path: PathBuf,
    pub urgent_notice_policy_path: PathBuf,
}

impl RulesConfig {
    pub fn rules_path(&self, flow: FlowKind) -> &Path {
        match flow {
            FlowKind::StopDelivery => &self.stop_delivery_path,
            FlowKind::UrgentNotice => &self.urgent_notice_path,
        }
    }

    pub fn policy_path(&self, flow: FlowKind) -> &Path {
        match flow {
            FlowKind::StopDelivery => &self.stop_delivery_policy_path,
            FlowKind::UrgentNotice => &self.urgent_notice_policy_path,
        }
    }
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
pub enum LlmProvider {
    Gemini,
    OpenAi,
    Ollama,
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
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub retrieval_api_key: Option<String>,
    pub retrieval_index_host: Option<String>,
    pub rules_stop_delivery_path: Option<PathBuf>,
    pub rules_urgent_notice_path: Option<PathBuf>,
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
            llm: LlmConfig {
                provider: LlmProvider::Gemini,
                api_key: None,
                base_url: None,
                model: "gemini-2.0-flash".to_string(),
                embedding_model: "text-embedding-004".to_string(),
                timeout_secs: 30,
                max_retries: 4,
            },
            retrieval: RetrievalConfig {
                api_key: None,
                embedding_api_key: None,
                index_host: None,
                namespace: "default".to_string(),
                top_k: 3,
                min_score: 0.45,
            },
            rules: RulesConfig {
                stop_delivery_path: PathBuf::from("rules/stop_delivery.json"),
                urgent_notice_path: PathBuf::from("rules/urgent_notice.json"),
                stop_delivery_policy_path: PathBuf::from("rules/stop_delivery_policy.txt"),
                urgent_notice_policy_path: PathBuf::from("rules/urgent_notice_policy.txt"),
            },
            server: ServerConfig {
                bind_address: "0.0.0.0".to_string(),
                port: 8000,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));
static ENV_ASSIGNMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Z_]*=(.+)$").expect("valid assignment pattern"));

/// Strips the debris that tends to surround pasted keys: a leading `NAME=`,
/// embedded whitespace and wrapping quotes.
pub fn sanitize_secret(raw: &str) -> String {
    let compact = WHITESPACE.replace_all(raw, "");
    let unquoted = trim_quotes(&compact);
    let value = ENV_ASSIGNMENT
        .captures(unquoted)
        .and_then(|captures| captures.get(1))
        .map_or(unquoted, |assigned| assigned.as_str());
    trim_quotes(value).to_string()
}

fn trim_quotes(value: &str) -> &str {
    value.trim_matches(|character| matches!(character, '\'' | '"'))
}

fn secret_value(value: String) -> SecretString {
    sanitize_secret(&value).into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected gemini|openai|ollama)"
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
                options.config_path.unwrap_or_else(|| PathBuf::from("aquaroute.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(embedding_model) = llm.embedding_model {
                self.llm.embedding_model = embedding_model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
        }

        if let Some(retrieval) = patch.retrieval {
            if let Some(retrieval_api_key_value) = retrieval.api_key {
                self.retrieval.api_key = Some(secret_value(retrieval_api_key_value));
            }
            if let Some(embedding_api_key_value) = retrieval.embedding_api_key {
                self.retrieval.embedding_api_key = Some(secret_value(embedding_api_key_value));
            }
            if let Some(index_host) = retrieval.index_host {
                self.retrieval.index_host = Some(index_host);
            }
            if let Some(namespace) = retrieval.namespace {
                self.retrieval.namespace = namespace;
            }
            if let Some(top_k) = retrieval.top_k {
                self.retrieval.top_k = top_k;
            }
            if let Some(min_score) = retrieval.min_score {
                self.retrieval.min_score = min_score;
            }
        }

        if let Some(rules) = patch.rules {
            if let Some(path) = rules.stop_delivery_path {
                self.rules.stop_delivery_path = path;
            }
            if let Some(path) = rules.urgent_notice_path {
                self.rules.urgent_notice_path = path;
            }
            if let Some(path) = rules.stop_delivery_policy_path {
                self.rules.stop_delivery_policy_path = path;
            }
            if let Some(path) = rules.urgent_notice_policy_path {
                self.rules.urgent_notice_policy_path = path;
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
        if let Some(value) = read_env("AQUAROUTE_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        let google_api_key = read_env("GOOGLE_API_KEY");
        let llm_api_key = read_env("AQUAROUTE_LLM_API_KEY").or_else(|| google_api_key.clone());
        if let Some(value) = llm_api_key {
            self.llm.api_key = Some(secret_value(value));
        }
        let embedding_api_key =
            read_env("AQUAROUTE_RETRIEVAL_EMBEDDING_API_KEY").or(google_api_key);
        if let Some(value) = embedding_api_key {
            self.retrieval.embedding_api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("AQUAROUTE_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("AQUAROUTE_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("AQUAROUTE_LLM_EMBEDDING_MODEL") {
            self.llm.embedding_model = value;
        }
        if let Some(value) = read_env("AQUAROUTE_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("AQUAROUTE_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("AQUAROUTE_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("AQUAROUTE_LLM_MAX_RETRIES", &value)?;
        }

        let retrieval_api_key =
            read_env("AQUAROUTE_RETRIEVAL_API_KEY").or_else(|| read_env("PINECONE_API_KEY"));
        if let Some(value) = retrieval_api_key {
            self.retrieval.api_key = Some(secret_value(value));
        }
        let index_host =
            read_env("AQUAROUTE_RETRIEVAL_INDEX_HOST").or_else(|| read_env("PINECONE_INDEX_HOST"));
        if let Some(value) = index_host {
            self.retrieval.index_host = Some(sanitize_secret(&value));
        }
        let namespace =
            read_env("AQUAROUTE_RETRIEVAL_NAMESPACE").or_else(|| read_env("PINECONE_NAMESPACE"));
        if let Some(value) = namespace {
            self.retrieval.namespace = sanitize_secret(&value);
        }
        if let Some(value) = read_env("AQUAROUTE_RETRIEVAL_TOP_K") {
            self.retrieval.top_k = parse_u32("AQUAROUTE_RETRIEVAL_TOP_K", &value)?;
        }
        if let Some(value) = read_env("AQUAROUTE_RETRIEVAL_MIN_SCORE") {
            self.retrieval.min_score = parse_f64("AQUAROUTE_RETRIEVAL_MIN_SCORE", &value)?;
        }

        if let Some(value) = read_env("AQUAROUTE_RULES_STOP_DELIVERY_PATH") {
            self.rules.stop_delivery_path = PathBuf::from(value);
        }
        if let Some(value) = read_env("AQUAROUTE_RULES_URGENT_NOTICE_PATH") {
            self.rules.urgent_notice_path = PathBuf::from(value);
        }
        if let Some(value) = read_env("AQUAROUTE_RULES_STOP_DELIVERY_POLICY_PATH") {
            self.rules.stop_delivery_policy_path = PathBuf::from(value);
        }
        if let Some(value) = read_env("AQUAROUTE_RULES_URGENT_NOTICE_POLICY_PATH") {
            self.rules.urgent_notice_policy_path = PathBuf::from(value);
        }

        if let Some(value) = read_env("AQUAROUTE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("AQUAROUTE_SERVER_PORT") {
            self.server.port = parse_u16("AQUAROUTE_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("AQUAROUTE_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("AQUAROUTE_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("AQUAROUTE_LOGGING_LEVEL").or_else(|| read_env("AQUAROUTE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("AQUAROUTE_LOGGING_FORMAT").or_else(|| read_env("AQUAROUTE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(retrieval_api_key) = overrides.retrieval_api_key {
            self.retrieval.api_key = Some(secret_value(retrieval_api_key));
        }
        if let Some(index_host) = overrides.retrieval_index_host {
            self.retrieval.index_host = Some(index_host);
        }
        if let Some(path) = overrides.rules_stop_delivery_path {
            self.rules.stop_delivery_path = path;
        }
        if let Some(path) = overrides.rules_urgent_notice_path {
            self.rules.urgent_notice_path = path;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    /// Structural checks applied on every load.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_llm(&self.llm)?;
        validate_retrieval(&self.retrieval)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }

    /// Credential checks for the remote collaborators. Only the server and
    /// `doctor` need these; offline rule tooling does not.
    pub fn require_collaborators(&self) -> Result<(), ConfigError> {
        match self.llm.provider {
            LlmProvider::Gemini | LlmProvider::OpenAi => {
                if is_blank_secret(self.llm.api_key.as_ref()) {
                    return Err(ConfigError::Validation(
                        "llm.api_key is required for gemini/openai providers (set AQUAROUTE_LLM_API_KEY or GOOGLE_API_KEY)"
                            .to_string(),
                    ));
                }
            }
            LlmProvider::Ollama => {
                let missing = self
                    .llm
                    .base_url
                    .as_ref()
                    .map(|value| value.trim().is_empty())
                    .unwrap_or(true);
                if missing {
                    return Err(ConfigError::Validation(
                        "llm.base_url is required for ollama provider".to_string(),
                    ));
                }
            }
        }

        if is_blank_secret(self.retrieval.api_key.as_ref()) {
            return Err(ConfigError::Validation(
                "retrieval.api_key is required (set AQUAROUTE_RETRIEVAL_API_KEY or PINECONE_API_KEY)"
                    .to_string(),
            ));
        }
        let host_missing = self
            .retrieval
            .index_host
            .as_ref()
            .map(|value| value.trim().is_empty())
            .unwrap_or(true);
        if host_missing {
            return Err(ConfigError::Validation(
                "retrieval.index_host is required (set AQUAROUTE_RETRIEVAL_INDEX_HOST or PINECONE_INDEX_HOST)"
                    .to_string(),
            ));
        }
        if is_blank_secret(self.embedding_api_key()) {
            return Err(ConfigError::Validation(
                "retrieval.embedding_api_key is required for query embeddings (set GOOGLE_API_KEY)"
                    .to_string(),
            ));
        }

        Ok(())
    }

    /// Query embeddings always go through Gemini, whatever the chat provider.
    /// A Gemini chat key doubles as the embedding key.
    pub fn embedding_api_key(&self) -> Option<&SecretString> {
        self.retrieval.embedding_api_key.as_ref().or(match self.llm.provider {
            LlmProvider::Gemini => self.llm.api_key.as_ref(),
            LlmProvider::OpenAi | LlmProvider::Ollama => None,
        })
    }
}

fn is_blank_secret(secret: Option<&SecretString>) -> bool {
    secret.map(|value| value.expose_secret().trim().is_empty()).unwrap_or(true)
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("aquaroute.toml"), PathBuf::from("config/aquaroute.toml")]
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

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }
    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }
    if let Some(base_url) = &llm.base_url {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "llm.base_url must start with http:// or https://".to_string(),
            ));
        }
    }
    Ok(())
}

fn validate_retrieval(retrieval: &RetrievalConfig) -> Result<(), ConfigError> {
    if retrieval.top_k == 0 || retrieval.top_k > 50 {
        return Err(ConfigError::Validation(
            "retrieval.top_k must be in range 1..=50".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&retrieval.min_score) {
        return Err(ConfigError::Validation(
            "retrieval.min_score must be in range 0.0..=1.0".to_string(),
        ));
    }
    if retrieval.namespace.trim().is_empty() {
        return Err(ConfigError::Validation(
            "retrieval.namespace must not be empty".to_string(),
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
    llm: Option<LlmPatch>,
    retrieval: Option<RetrievalPatch>,
    rules: Option<RulesPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    embedding_model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct RetrievalPatch {
    api_key: Option<String>,
    embedding_api_key: Option<String>,
    index_host: Option<String>,
    namespace: Option<String>,
    top_k: Option<u32>,
    min_score: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct RulesPatch {
    stop_delivery_path: Option<PathBuf>,
    urgent_notice_path: Option<PathBuf>,
    stop_delivery_policy_path: Option<PathBuf>,
    urgent_notice_policy_path: Option<PathBuf>,
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
