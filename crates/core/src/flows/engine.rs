use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::flow::FlowKind;
use crate::flows::states::{FlowAction, FlowContext, FlowEvent, FlowState, TransitionOutcome};

pub trait FlowDefinition {
    fn flow_kind(&self) -> FlowKind;
    fn initial_state(&self) -> FlowState;
    fn transition(
        &self,
        current: &FlowState,
        event: &FlowEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>;
}

/// Collect-then-decide lifecycle shared by every rule-backed process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RuleDrivenFlow {
    kind: FlowKind,
}

impl RuleDrivenFlow {
    pub fn new(kind: FlowKind) -> Self {
        Self { kind }
    }
}

impl FlowDefinition for RuleDrivenFlow {
    fn flow_kind(&self) -> FlowKind {
        self.kind
    }

    fn initial_state(&self) -> FlowState {
        FlowState::Collecting
    }

    fn transition(
        &self,
        current: &FlowState,
        event: &FlowEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_rule_driven(current, event, context)
    }
}

pub struct FlowEngine<F> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn flow_kind(&self) -> FlowKind {
        self.flow.flow_kind()
    }

    pub fn initial_state(&self) -> FlowState {
        self.flow.initial_state()
    }

    pub fn apply(
        &self,
        current: &FlowState,
        event: &FlowEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        self.flow.transition(current, event, context)
    }

    pub fn apply_with_audit<S>(
        &self,
        current: &FlowState,
        event: &FlowEvent,
        context: &FlowContext,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.apply(current, event, context);
        match &result {
            Ok(outcome) => {
                sink.emit(
                    AuditEvent::new(
                        audit,
                        Some(self.flow_kind()),
                        "flow.transition_applied",
                        AuditCategory::Flow,
                        AuditOutcome::Success,
                    )
                    .with_metadata("from", format!("{:?}", outcome.from))
                    .with_metadata("to", format!("{:?}", outcome.to))
                    .with_metadata("event", format!("{:?}", outcome.event)),
                );
            }
            Err(error) => {
                sink.emit(
                    AuditEvent::new(
                        audit,
                        Some(self.flow_kind()),
                        "flow.transition_rejected",
                        AuditCategory::Flow,
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("missing required fields before transition from {state:?}: {missing_fields:?}")]
    MissingRequiredFields { state: FlowState, missing_fields: Vec<String> },
    #[error("invalid transition from {state:?} using event {event:?}")]
    InvalidTransition { state: FlowState, event: FlowEvent },
}

fn transition_rule_driven(
    current: &FlowState,
    event: &FlowEvent,
    context: &FlowContext,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use FlowAction::{
        ClearFlowMarker, EvaluateRules, GenerateDecisionResponse, PromptForMissingField,
        ReportManualReview,
    };
    use FlowEvent::{
        Abandoned, DecisionReached, FieldCollected, FieldStillMissing, NoRuleMatched,
        RequiredFieldsCollected,
    };
    use FlowState::{Collecting, Deciding, Done};

    let (to, actions) = match (current, event) {
        (Collecting, FieldCollected) | (Collecting, FieldStillMissing) => {
            if context.missing_required_fields.is_empty() {
                return Err(FlowTransitionError::InvalidTransition {
                    state: current.clone(),
                    event: event.clone(),
                });
            }
            (Collecting, vec![PromptForMissingField])
        }
        (Collecting, RequiredFieldsCollected) => {
            if !context.missing_required_fields.is_empty() {
                return Err(FlowTransitionError::MissingRequiredFields {
                    state: current.clone(),
                    missing_fields: context.missing_required_fields.clone(),
                });
            }
            (Deciding, vec![EvaluateRules])
        }
        (Deciding, DecisionReached) => (Done, vec![GenerateDecisionResponse, ClearFlowMarker]),
        (Deciding, NoRuleMatched) => (Done, vec![ReportManualReview, ClearFlowMarker]),
        (Collecting, Abandoned) | (Deciding, Abandoned) => (Done, vec![ClearFlowMarker]),
        _ => {
            return Err(FlowTransitionError::InvalidTransition {
                state: current.clone(),
                event: event.clone(),
            });
        }
    };

    Ok(TransitionOutcome { from: current.clone(), to, event: event.clone(), actions })
}
