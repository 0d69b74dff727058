//! Deterministic core of the aquaroute conversational agent.
//!
//! Holds everything that does not talk to the network: the fact model a
//! structured process accumulates across turns, the declarative rule engine
//! that turns those facts into a decision, the collection state machine,
//! configuration, and the error taxonomy shared by the outer crates.
//!
//! The LLM never decides outcomes. It only classifies turns and extracts
//! field values; the decision always comes from [`rules::RuleEngine`].

pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod rules;

pub use domain::decision::Decision;
pub use domain::facts::{FactContext, FactValue};
pub use domain::flow::{FlowKind, Intent, TurnCategory, TurnClassification};
pub use errors::{ApplicationError, DomainError, FailureKind, InterfaceError};
pub use rules::{MissingInfo, RuleEngine, RuleSet, RuleSetError};
