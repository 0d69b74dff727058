use aquaroute_core::domain::flow::FlowKind;
use aquaroute_core::{Decision, FactContext};
use serde::{Deserialize, Serialize};

use crate::llm::ChatMessage;

/// One user turn as handed over by the caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TurnRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
    #[serde(default)]
    pub context: FactContext,
    #[serde(default)]
    pub flow_marker: Option<FlowKind>,
}

impl TurnRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            history: Vec::new(),
            context: FactContext::new(),
            flow_marker: None,
        }
    }

    pub fn with_context(mut self, context: FactContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_flow_marker(mut self, flow_marker: Option<FlowKind>) -> Self {
        self.flow_marker = flow_marker;
        self
    }

    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceLabel {
    AgentStop,
    AgentUrgent,
    Rag,
    Chat,
}

impl From<FlowKind> for SourceLabel {
    fn from(flow: FlowKind) -> Self {
        match flow {
            FlowKind::StopDelivery => Self::AgentStop,
            FlowKind::UrgentNotice => Self::AgentUrgent,
        }
    }
}

/// Provenance of a grounded answer; `score` is a percentage with one decimal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub name: String,
    pub score: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    CollectingInfo { missing_field: String },
    DecisionReached { rule_id: String, decision: Decision },
    NoRuleMatched,
    Retrieval { context_used: Vec<String> },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TurnResponse {
    pub answer: String,
    /// Only the fields changed on this turn.
    pub context_updates: FactContext,
    pub flow_marker: Option<FlowKind>,
    pub source: SourceLabel,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<Diagnostic>,
}
