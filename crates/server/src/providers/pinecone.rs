use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use aquaroute_agent::retrieval::{RetrievedSnippet, Retriever};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::gemini::GeminiClient;
use super::{send_with_retry, RetryPolicy};

#[derive(Clone, Debug)]
pub struct PineconeSettings {
    pub api_key: SecretString,
    pub index_host: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

/// Gemini query embedding followed by a Pinecone nearest-neighbour query.
pub struct PineconeRetriever {
    http: Client,
    settings: PineconeSettings,
    embedder: Arc<GeminiClient>,
}

impl PineconeRetriever {
    pub fn new(settings: PineconeSettings, embedder: Arc<GeminiClient>) -> Result<Self> {
        let http = Client::builder()
            .timeout(settings.timeout)
            .build()
            .context("failed to build pinecone http client")?;
        Ok(Self { http, settings, embedder })
    }

    fn query_url(&self) -> String {
        let host = self.settings.index_host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            format!("{host}/query")
        } else {
            format!("https://{host}/query")
        }
    }
}

#[async_trait]
impl Retriever for PineconeRetriever {
    async fn search(
        &self,
        query: &str,
        top_k: usize,
        namespace: &str,
    ) -> Result<Vec<RetrievedSnippet>> {
        let vector = self.embedder.embed_query(query).await?;
        let body = QueryRequest { vector, top_k, include_metadata: true, namespace };
        let url = self.query_url();

        let response = send_with_retry(&self.settings.retry, "pinecone.query", || {
            self.http.post(&url).header("Api-Key", self.settings.api_key.expose_secret()).json(&body)
        })
        .await?;

        let payload: QueryResponse =
            response.json().await.context("failed to decode pinecone query response")?;
        debug!(
            event_name = "provider.pinecone.query",
            namespace,
            match_count = payload.matches.len(),
            "pinecone query completed"
        );
        Ok(payload.matches.into_iter().map(into_snippet).collect())
    }
}

fn into_snippet(matched: QueryMatch) -> RetrievedSnippet {
    let metadata_text = |key: &str| {
        matched.metadata.get(key).and_then(Value::as_str).map(str::to_string)
    };
    RetrievedSnippet {
        text: metadata_text("text").unwrap_or_default(),
        source_label: metadata_text("file_name").unwrap_or_else(|| "Doc".to_string()),
        score: matched.score,
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: Vec<f32>,
    top_k: usize,
    include_metadata: bool,
    namespace: &'a str,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    #[serde(default)]
    score: f64,
    #[serde(default)]
    metadata: Map<String, Value>,
}
