use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use aquaroute_agent::llm::{ChatMessage, LlmClient};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{send_with_retry, RetryPolicy};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Clone, Debug)]
pub struct OpenAiSettings {
    /// Absent for local servers such as Ollama.
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

/// Any `/chat/completions` compatible endpoint (OpenAI, Ollama).
pub struct OpenAiCompatibleClient {
    http: Client,
    settings: OpenAiSettings,
    system_instruction: Option<String>,
}

impl OpenAiCompatibleClient {
    pub fn new(settings: OpenAiSettings, system_instruction: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(settings.timeout)
            .build()
            .context("failed to build chat completions http client")?;
        Ok(Self { http, settings, system_instruction })
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn generate(&self, prompt: &str, history: &[ChatMessage]) -> Result<String> {
        let body = build_request(
            &self.settings.model,
            self.system_instruction.as_deref(),
            prompt,
            history,
        );
        let url = format!("{}/chat/completions", self.settings.base_url.trim_end_matches('/'));

        let response = send_with_retry(&self.settings.retry, "chat_completions", || {
            let request = self.http.post(&url).json(&body);
            match &self.settings.api_key {
                Some(key) => request.bearer_auth(key.expose_secret()),
                None => request,
            }
        })
        .await?;

        let payload: ChatCompletionResponse =
            response.json().await.context("failed to decode chat completion response")?;
        payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| anyhow!("chat completion response carried no content"))
    }
}

fn build_request<'a>(
    model: &'a str,
    system_instruction: Option<&'a str>,
    prompt: &'a str,
    history: &'a [ChatMessage],
) -> ChatCompletionRequest<'a> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    if let Some(system) = system_instruction {
        messages.push(WireMessage { role: "system", content: system });
    }
    messages.extend(
        history
            .iter()
            .map(|message| WireMessage { role: message.role.as_str(), content: &message.content }),
    );
    messages.push(WireMessage { role: "user", content: prompt });

    ChatCompletionRequest { model, messages }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use aquaroute_agent::llm::ChatMessage;
    use serde_json::json;

    use super::build_request;

    #[test]
    fn system_history_then_prompt() {
        let history = vec![ChatMessage::user("hola"), ChatMessage::assistant("buenas")];
        let request = build_request("gpt-4o-mini", Some("persona"), "¿precio?", &history);

        assert_eq!(
            serde_json::to_value(&request).expect("serialize"),
            json!({
                "model": "gpt-4o-mini",
                "messages": [
                    {"role": "system", "content": "persona"},
                    {"role": "user", "content": "hola"},
                    {"role": "assistant", "content": "buenas"},
                    {"role": "user", "content": "¿precio?"}
                ]
            })
        );
    }
}
