//! Scripted collaborators shared by the unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use aquaroute_core::{FlowKind, RuleEngine, RuleSet};
use async_trait::async_trait;

use crate::llm::{ChatMessage, LlmClient};
use crate::retrieval::{RetrievedSnippet, Retriever};

/// Replies with queued responses in order; errors once the queue runs dry.
#[derive(Default)]
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<Result<String, String>>>,
    calls: Mutex<Vec<(String, Vec<ChatMessage>)>>,
}

impl ScriptedLlm {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|reply| Ok(reply.into())).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self::default()
    }

    pub fn then_fail(self, message: &str) -> Self {
        self.replies.lock().expect("script lock").push_back(Err(message.to_string()));
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").iter().map(|(prompt, _)| prompt.clone()).collect()
    }

    pub fn histories(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().expect("calls lock").iter().map(|(_, history)| history.clone()).collect()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().expect("script lock").len()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn generate(&self, prompt: &str, history: &[ChatMessage]) -> Result<String> {
        self.calls.lock().expect("calls lock").push((prompt.to_string(), history.to_vec()));
        match self.replies.lock().expect("script lock").pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("llm unavailable")),
        }
    }
}

pub struct ScriptedRetriever {
    result: Result<Vec<RetrievedSnippet>, String>,
    queries: Mutex<Vec<(String, usize, String)>>,
}

impl ScriptedRetriever {
    pub fn with_snippets(snippets: Vec<RetrievedSnippet>) -> Self {
        Self { result: Ok(snippets), queries: Mutex::new(Vec::new()) }
    }

    pub fn failing(message: &str) -> Self {
        Self { result: Err(message.to_string()), queries: Mutex::new(Vec::new()) }
    }

    pub fn queries(&self) -> Vec<(String, usize, String)> {
        self.queries.lock().expect("queries lock").clone()
    }
}

#[async_trait]
impl Retriever for ScriptedRetriever {
    async fn search(
        &self,
        query: &str,
        top_k: usize,
        namespace: &str,
    ) -> Result<Vec<RetrievedSnippet>> {
        self.queries.lock().expect("queries lock").push((
            query.to_string(),
            top_k,
            namespace.to_string(),
        ));
        self.result.clone().map_err(|message| anyhow!(message))
    }
}

pub fn snippet(text: &str, source_label: &str, score: f64) -> RetrievedSnippet {
    RetrievedSnippet { text: text.to_string(), source_label: source_label.to_string(), score }
}

pub const STOP_DELIVERY_RULES: &str = include_str!("../../../rules/stop_delivery.json");
pub const URGENT_NOTICE_RULES: &str = include_str!("../../../rules/urgent_notice.json");

pub fn rule_engine(flow: FlowKind) -> RuleEngine {
    let raw = match flow {
        FlowKind::StopDelivery => STOP_DELIVERY_RULES,
        FlowKind::UrgentNotice => URGENT_NOTICE_RULES,
    };
    let rule_set =
        RuleSet::from_json_str(raw, flow.slug(), flow).expect("shipped rule set is valid");
    RuleEngine::new(rule_set)
}
