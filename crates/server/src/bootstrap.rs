use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use aquaroute_agent::llm::LlmClient;
use aquaroute_agent::prompts::ASSISTANT_PERSONA;
use aquaroute_agent::rag::RetrievalSettings;
use aquaroute_agent::retrieval::Retriever;
use aquaroute_agent::router::RouterParts;
use aquaroute_agent::ConversationRouter;
use aquaroute_core::audit::TracingAuditSink;
use aquaroute_core::config::{AppConfig, ConfigError, LlmProvider, LoadOptions};
use aquaroute_core::{ApplicationError, FlowKind, RuleEngine, RuleSet, RuleSetError};
use thiserror::Error;
use tracing::{info, warn};

use crate::providers::gemini::{self, GeminiClient, GeminiSettings};
use crate::providers::openai::{self, OpenAiCompatibleClient, OpenAiSettings};
use crate::providers::pinecone::{PineconeRetriever, PineconeSettings};
use crate::providers::RetryPolicy;

pub struct Application {
    pub config: AppConfig,
    pub router: Arc<ConversationRouter>,
    pub rule_sets: Vec<RuleSetSummary>,
}

/// What `/health` reports about each loaded rule set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleSetSummary {
    pub process: FlowKind,
    pub rule_count: usize,
    pub required_fields: usize,
    pub policy_loaded: bool,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    RuleSet(#[from] RuleSetError),
    #[error("provider client setup failed: {0:#}")]
    Provider(anyhow::Error),
    #[error("router wiring failed: {0}")]
    Router(#[from] ApplicationError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        provider = ?config.llm.provider,
        "starting application bootstrap"
    );

    let stop_delivery = load_rules(&config, FlowKind::StopDelivery)?;
    let urgent_notice = load_rules(&config, FlowKind::UrgentNotice)?;
    let stop_delivery_policy = load_policy(config.rules.policy_path(FlowKind::StopDelivery));
    let urgent_notice_policy = load_policy(config.rules.policy_path(FlowKind::UrgentNotice));
    let rule_sets = vec![
        summarize(&stop_delivery, !stop_delivery_policy.is_empty()),
        summarize(&urgent_notice, !urgent_notice_policy.is_empty()),
    ];

    config.require_collaborators()?;
    let llm = build_llm(&config).map_err(BootstrapError::Provider)?;
    let retriever = build_retriever(&config).map_err(BootstrapError::Provider)?;
    info!(
        event_name = "system.bootstrap.providers_ready",
        correlation_id = "bootstrap",
        model = %config.llm.model,
        "completion and retrieval clients initialized"
    );

    let router = ConversationRouter::from_parts(RouterParts {
        llm,
        retriever,
        stop_delivery_rules: stop_delivery,
        urgent_notice_rules: urgent_notice,
        stop_delivery_policy,
        urgent_notice_policy,
        retrieval: RetrievalSettings {
            top_k: config.retrieval.top_k as usize,
            namespace: config.retrieval.namespace.clone(),
            min_score: config.retrieval.min_score,
        },
        audit_sink: Arc::new(TracingAuditSink),
    })?;

    Ok(Application { config, router: Arc::new(router), rule_sets })
}

fn load_rules(config: &AppConfig, flow: FlowKind) -> Result<RuleEngine, RuleSetError> {
    let path = config.rules.rules_path(flow);
    let rule_set = RuleSet::load(path, flow)?;
    info!(
        event_name = "system.bootstrap.rules_loaded",
        correlation_id = "bootstrap",
        process = flow.slug(),
        rule_count = rule_set.rules().len(),
        path = %path.display(),
        "rule set loaded"
    );
    Ok(RuleEngine::new(rule_set))
}

/// A missing manual only degrades decision wording, so it is not fatal.
fn load_policy(path: &Path) -> String {
    match fs::read_to_string(path) {
        Ok(text) => text,
        Err(error) => {
            warn!(
                event_name = "system.bootstrap.policy_missing",
                correlation_id = "bootstrap",
                path = %path.display(),
                error = %error,
                "policy manual unavailable; decisions will be worded without it"
            );
            String::new()
        }
    }
}

fn summarize(rules: &RuleEngine, policy_loaded: bool) -> RuleSetSummary {
    RuleSetSummary {
        process: rules.process(),
        rule_count: rules.rule_set().rules().len(),
        required_fields: rules.rule_set().required_fields().len(),
        policy_loaded,
    }
}

fn build_llm(config: &AppConfig) -> anyhow::Result<Arc<dyn LlmClient>> {
    let timeout = Duration::from_secs(config.llm.timeout_secs);
    let retry = RetryPolicy::new(config.llm.max_retries);
    let persona = Some(ASSISTANT_PERSONA.to_string());

    let client: Arc<dyn LlmClient> = match config.llm.provider {
        LlmProvider::Gemini => {
            let api_key = config.llm.api_key.clone().context("llm.api_key is not set")?;
            Arc::new(GeminiClient::new(
                GeminiSettings {
                    api_key,
                    base_url: base_url_or(config, gemini::DEFAULT_BASE_URL),
                    model: config.llm.model.clone(),
                    embedding_model: config.llm.embedding_model.clone(),
                    timeout,
                    retry,
                },
                persona,
            )?)
        }
        LlmProvider::OpenAi | LlmProvider::Ollama => Arc::new(OpenAiCompatibleClient::new(
            OpenAiSettings {
                api_key: config.llm.api_key.clone(),
                base_url: base_url_or(config, openai::DEFAULT_BASE_URL),
                model: config.llm.model.clone(),
                timeout,
                retry,
            },
            persona,
        )?),
    };
    Ok(client)
}

fn build_retriever(config: &AppConfig) -> anyhow::Result<Arc<dyn Retriever>> {
    let timeout = Duration::from_secs(config.llm.timeout_secs);
    let retry = RetryPolicy::new(config.llm.max_retries);

    let embedding_base_url = match config.llm.provider {
        LlmProvider::Gemini => base_url_or(config, gemini::DEFAULT_BASE_URL),
        LlmProvider::OpenAi | LlmProvider::Ollama => gemini::DEFAULT_BASE_URL.to_string(),
    };
    let embedder = GeminiClient::new(
        GeminiSettings {
            api_key: config.embedding_api_key().cloned().context("embedding api key is not set")?,
            base_url: embedding_base_url,
            model: config.llm.model.clone(),
            embedding_model: config.llm.embedding_model.clone(),
            timeout,
            retry: retry.clone(),
        },
        None,
    )?;

    let retriever = PineconeRetriever::new(
        PineconeSettings {
            api_key: config.retrieval.api_key.clone().context("retrieval.api_key is not set")?,
            index_host: config
                .retrieval
                .index_host
                .clone()
                .context("retrieval.index_host is not set")?,
            timeout,
            retry,
        },
        Arc::new(embedder),
    )?;
    Ok(Arc::new(retriever))
}

fn base_url_or(config: &AppConfig, default: &str) -> String {
    config
        .llm
        .base_url
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(default)
        .to_string()
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use aquaroute_core::config::{ConfigOverrides, LoadOptions};
    use aquaroute_core::FlowKind;

    use crate::bootstrap::{bootstrap, BootstrapError};

    fn rules_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../rules")
    }

    fn overrides() -> ConfigOverrides {
        ConfigOverrides {
            llm_api_key: Some("test-gemini-key".to_string()),
            retrieval_api_key: Some("test-pinecone-key".to_string()),
            retrieval_index_host: Some("faq-index.svc.pinecone.io".to_string()),
            rules_stop_delivery_path: Some(rules_dir().join("stop_delivery.json")),
            rules_urgent_notice_path: Some(rules_dir().join("urgent_notice.json")),
            ..ConfigOverrides::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_wires_router_with_both_rule_sets() {
        let app = bootstrap(LoadOptions { overrides: overrides(), ..LoadOptions::default() })
            .await
            .expect("bootstrap should succeed with valid overrides");

        let processes: Vec<_> = app.rule_sets.iter().map(|summary| summary.process).collect();
        assert_eq!(processes, vec![FlowKind::StopDelivery, FlowKind::UrgentNotice]);
        assert!(app.rule_sets.iter().all(|summary| summary.rule_count > 0));
        assert_eq!(app.router.controller(FlowKind::UrgentNotice).kind(), FlowKind::UrgentNotice);
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_on_unreadable_rule_set() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                rules_stop_delivery_path: Some(rules_dir().join("does_not_exist.json")),
                ..overrides()
            },
            ..LoadOptions::default()
        })
        .await;

        assert!(matches!(result, Err(BootstrapError::RuleSet(_))));
    }

    #[tokio::test]
    async fn bootstrap_rejects_rule_set_wired_to_the_wrong_process() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                rules_urgent_notice_path: Some(rules_dir().join("stop_delivery.json")),
                ..overrides()
            },
            ..LoadOptions::default()
        })
        .await;

        let message = result.err().expect("error").to_string();
        assert!(message.contains("was expected"), "unexpected error: {message}");
    }

    #[tokio::test]
    async fn bootstrap_requires_retrieval_credentials() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                retrieval_index_host: Some("   ".to_string()),
                ..overrides()
            },
            ..LoadOptions::default()
        })
        .await;

        let message = result.err().expect("error").to_string();
        assert!(message.contains("retrieval.index_host"), "unexpected error: {message}");
    }
}
