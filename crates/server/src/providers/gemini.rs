use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use aquaroute_agent::llm::{ChatMessage, ChatRole, LlmClient};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{send_with_retry, RetryPolicy};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Clone, Debug)]
pub struct GeminiSettings {
    pub api_key: SecretString,
    pub base_url: String,
    pub model: String,
    pub embedding_model: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

/// `generateContent` completions under a fixed system instruction.
pub struct GeminiClient {
    http: Client,
    settings: GeminiSettings,
    system_instruction: Option<String>,
}

impl GeminiClient {
    pub fn new(settings: GeminiSettings, system_instruction: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(settings.timeout)
            .build()
            .context("failed to build gemini http client")?;
        Ok(Self { http, settings, system_instruction })
    }

    fn endpoint(&self, method: &str, model: &str) -> String {
        format!(
            "{}/models/{}:{method}",
            self.settings.base_url.trim_end_matches('/'),
            model.trim_start_matches("models/")
        )
    }

    /// Query embedding for retrieval.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let model = self.settings.embedding_model.trim_start_matches("models/");
        let body = EmbedContentRequest {
            model: format!("models/{model}"),
            content: Content { role: None, parts: vec![Part { text: text.to_string() }] },
            task_type: "RETRIEVAL_QUERY",
        };
        let url = self.endpoint("embedContent", model);

        let response = send_with_retry(&self.settings.retry, "gemini.embed", || {
            self.http
                .post(&url)
                .header("x-goog-api-key", self.settings.api_key.expose_secret())
                .json(&body)
        })
        .await?;

        let payload: EmbedContentResponse =
            response.json().await.context("failed to decode gemini embedding response")?;
        if payload.embedding.values.is_empty() {
            return Err(anyhow!("gemini returned an empty embedding"));
        }
        Ok(payload.embedding.values)
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn generate(&self, prompt: &str, history: &[ChatMessage]) -> Result<String> {
        let body = build_generate_request(self.system_instruction.as_deref(), prompt, history);
        let url = self.endpoint("generateContent", &self.settings.model);
        debug!(
            event_name = "provider.gemini.generate",
            model = %self.settings.model,
            history_len = history.len(),
            "requesting gemini completion"
        );

        let response = send_with_retry(&self.settings.retry, "gemini.generate", || {
            self.http
                .post(&url)
                .header("x-goog-api-key", self.settings.api_key.expose_secret())
                .json(&body)
        })
        .await?;

        let payload: GenerateContentResponse =
            response.json().await.context("failed to decode gemini completion response")?;
        extract_text(payload)
    }
}

fn build_generate_request(
    system_instruction: Option<&str>,
    prompt: &str,
    history: &[ChatMessage],
) -> GenerateContentRequest {
    let mut contents: Vec<Content> = history
        .iter()
        .map(|message| Content {
            role: Some(match message.role {
                ChatRole::User => "user",
                ChatRole::Assistant => "model",
            }),
            parts: vec![Part { text: message.content.clone() }],
        })
        .collect();
    contents.push(Content { role: Some("user"), parts: vec![Part { text: prompt.to_string() }] });

    GenerateContentRequest {
        contents,
        system_instruction: system_instruction.map(|text| Content {
            role: None,
            parts: vec![Part { text: text.to_string() }],
        }),
    }
}

fn extract_text(payload: GenerateContentResponse) -> Result<String> {
    let candidate = payload
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("gemini response carried no candidates"))?;
    let text: String = candidate
        .content
        .map(|content| content.parts.into_iter().map(|part| part.text).collect())
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(anyhow!("gemini candidate had no text"));
    }
    Ok(text)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest {
    model: String,
    content: Content,
    task_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: Embedding,
}

#[derive(Debug, Deserialize)]
struct Embedding {
    #[serde(default)]
    values: Vec<f32>,
}
