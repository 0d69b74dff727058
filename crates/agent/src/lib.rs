//! Turn routing for the aquaroute conversational agent.
//!
//! This crate sits between the HTTP surface and the deterministic core:
//! - classifies each turn against the active flow (`analyzer`)
//! - pulls one field value at a time out of free text (`extraction`)
//! - drives the collect/decide state machine per process (`flow_controller`)
//! - answers general questions from the document index (`rag`)
//! - assembles the response envelope (`router`)
//!
//! # Safety Principle
//!
//! The LLM is strictly a translator. It classifies turns and extracts field
//! values; every business outcome comes from the rule engine in
//! `aquaroute-core`.

pub mod analyzer;
pub mod extraction;
pub mod flow_controller;
pub mod llm;
pub mod prompts;
pub mod rag;
pub mod response;
pub mod retrieval;
pub mod router;

#[cfg(test)]
pub(crate) mod testing;

pub use analyzer::TurnAnalyzer;
pub use flow_controller::{FlowController, ProcessProfile};
pub use llm::{ChatMessage, ChatRole, LlmClient};
pub use response::{Diagnostic, SourceLabel, SourceRef, TurnRequest, TurnResponse};
pub use retrieval::{RetrievedSnippet, Retriever};
pub use router::ConversationRouter;
