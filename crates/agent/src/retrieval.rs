use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One ranked passage from the document index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetrievedSnippet {
    pub text: String,
    pub source_label: String,
    pub score: f64,
}

#[async_trait]
pub trait Retriever: Send + Sync {
    async fn search(
        &self,
        query: &str,
        top_k: usize,
        namespace: &str,
    ) -> Result<Vec<RetrievedSnippet>>;
}
