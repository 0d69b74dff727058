use serde::{Deserialize, Serialize};

/// Where a structured process stands within a single turn.
///
/// Not persisted: every turn starts in `Collecting` and the caller only keeps
/// the flow marker, which is cleared once `Done` is reached.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowState {
    Collecting,
    Deciding,
    Done,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowEvent {
    FieldCollected,
    FieldStillMissing,
    RequiredFieldsCollected,
    DecisionReached,
    NoRuleMatched,
    Abandoned,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FlowContext {
    pub missing_required_fields: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowAction {
    PromptForMissingField,
    EvaluateRules,
    GenerateDecisionResponse,
    ReportManualReview,
    ClearFlowMarker,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: FlowState,
    pub to: FlowState,
    pub event: FlowEvent,
    pub actions: Vec<FlowAction>,
}

impl TransitionOutcome {
    pub fn clears_marker(&self) -> bool {
        self.actions.contains(&FlowAction::ClearFlowMarker)
    }
}
