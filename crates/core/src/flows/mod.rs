pub mod engine;
pub mod states;

pub use engine::{FlowDefinition, FlowEngine, FlowTransitionError, RuleDrivenFlow};
pub use states::{FlowAction, FlowContext, FlowEvent, FlowState, TransitionOutcome};
