use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use aquaroute_core::config::{AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

struct Entry {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

impl Entry {
    fn new(
        key: &'static str,
        value: impl Into<String>,
        env_keys: &'static [&'static str],
    ) -> Self {
        Self { key, value: value.into(), env_keys }
    }
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines =
        vec!["effective config (source precedence: env > file > default):".to_string()];
    for entry in entries(&config) {
        let source = field_source(
            entry.key,
            entry.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(entry.key, &entry.value, source));
    }

    lines.join("\n")
}

fn entries(config: &AppConfig) -> Vec<Entry> {
    let path = |path: &Path| path.display().to_string();
    vec![
        Entry::new(
            "llm.provider",
            format!("{:?}", config.llm.provider),
            &["AQUAROUTE_LLM_PROVIDER"],
        ),
        Entry::new("llm.model", &config.llm.model, &["AQUAROUTE_LLM_MODEL"]),
        Entry::new(
            "llm.embedding_model",
            &config.llm.embedding_model,
            &["AQUAROUTE_LLM_EMBEDDING_MODEL"],
        ),
        Entry::new(
            "llm.base_url",
            config.llm.base_url.as_deref().unwrap_or("<unset>"),
            &["AQUAROUTE_LLM_BASE_URL"],
        ),
        Entry::new(
            "llm.api_key",
            redact_secret(config.llm.api_key.as_ref()),
            &["AQUAROUTE_LLM_API_KEY", "GOOGLE_API_KEY"],
        ),
        Entry::new(
            "llm.timeout_secs",
            config.llm.timeout_secs.to_string(),
            &["AQUAROUTE_LLM_TIMEOUT_SECS"],
        ),
        Entry::new(
            "llm.max_retries",
            config.llm.max_retries.to_string(),
            &["AQUAROUTE_LLM_MAX_RETRIES"],
        ),
        Entry::new(
            "retrieval.api_key",
            redact_secret(config.retrieval.api_key.as_ref()),
            &["AQUAROUTE_RETRIEVAL_API_KEY", "PINECONE_API_KEY"],
        ),
        Entry::new(
            "retrieval.embedding_api_key",
            redact_secret(config.embedding_api_key()),
            &["AQUAROUTE_RETRIEVAL_EMBEDDING_API_KEY", "GOOGLE_API_KEY"],
        ),
        Entry::new(
            "retrieval.index_host",
            config.retrieval.index_host.as_deref().unwrap_or("<unset>"),
            &["AQUAROUTE_RETRIEVAL_INDEX_HOST", "PINECONE_INDEX_HOST"],
        ),
        Entry::new(
            "retrieval.namespace",
            &config.retrieval.namespace,
            &["AQUAROUTE_RETRIEVAL_NAMESPACE", "PINECONE_NAMESPACE"],
        ),
        Entry::new(
            "retrieval.top_k",
            config.retrieval.top_k.to_string(),
            &["AQUAROUTE_RETRIEVAL_TOP_K"],
        ),
        Entry::new(
            "retrieval.min_score",
            config.retrieval.min_score.to_string(),
            &["AQUAROUTE_RETRIEVAL_MIN_SCORE"],
        ),
        Entry::new(
            "rules.stop_delivery_path",
            path(&config.rules.stop_delivery_path),
            &["AQUAROUTE_RULES_STOP_DELIVERY_PATH"],
        ),
        Entry::new(
            "rules.urgent_notice_path",
            path(&config.rules.urgent_notice_path),
            &["AQUAROUTE_RULES_URGENT_NOTICE_PATH"],
        ),
        Entry::new(
            "rules.stop_delivery_policy_path",
            path(&config.rules.stop_delivery_policy_path),
            &["AQUAROUTE_RULES_STOP_DELIVERY_POLICY_PATH"],
        ),
        Entry::new(
            "rules.urgent_notice_policy_path",
            path(&config.rules.urgent_notice_policy_path),
            &["AQUAROUTE_RULES_URGENT_NOTICE_POLICY_PATH"],
        ),
        Entry::new(
            "server.bind_address",
            &config.server.bind_address,
            &["AQUAROUTE_SERVER_BIND_ADDRESS"],
        ),
        Entry::new("server.port", config.server.port.to_string(), &["AQUAROUTE_SERVER_PORT"]),
        Entry::new(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["AQUAROUTE_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        Entry::new(
            "logging.level",
            &config.logging.level,
            &["AQUAROUTE_LOGGING_LEVEL", "AQUAROUTE_LOG_LEVEL"],
        ),
        Entry::new(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["AQUAROUTE_LOGGING_FORMAT", "AQUAROUTE_LOG_FORMAT"],
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("aquaroute.toml"), PathBuf::from("config/aquaroute.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
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

/// Keeps a four-character prefix on long keys so operators can tell them apart.
fn redact_secret(secret: Option<&SecretString>) -> String {
    let Some(secret) = secret else {
        return "<unset>".to_string();
    };
    let exposed = secret.expose_secret().trim();
    if exposed.is_empty() {
        return "<empty>".to_string();
    }
    if exposed.chars().count() > 12 {
        let prefix: String = exposed.chars().take(4).collect();
        return format!("{prefix}***");
    }
    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::{contains_path, redact_secret};

    #[test]
    fn redaction_never_reveals_more_than_a_short_prefix() {
        let long = SecretString::from("AIzaSyExampleExampleExample".to_string());
        let short = SecretString::from("abc123".to_string());

        assert_eq!(redact_secret(Some(&long)), "AIza***");
        assert_eq!(redact_secret(Some(&short)), "<redacted>");
        assert_eq!(redact_secret(None), "<unset>");
    }

    #[test]
    fn dotted_paths_resolve_inside_tables() {
        let doc: toml::Value = "[retrieval]\nnamespace = \"faq\"\n".parse().expect("toml");
        assert!(contains_path(&doc, "retrieval.namespace"));
        assert!(!contains_path(&doc, "retrieval.top_k"));
    }
}
