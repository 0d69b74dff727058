use std::sync::Arc;

use aquaroute_core::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use aquaroute_core::domain::flow::FlowKind;
use aquaroute_core::flows::{
    FlowContext, FlowEngine, FlowEvent, FlowState, RuleDrivenFlow, TransitionOutcome,
};
use aquaroute_core::{
    ApplicationError, Decision, DomainError, FactContext, FactValue, MissingInfo, RuleEngine,
};
use tracing::info;

use crate::extraction::{FieldExtractor, KeywordInference};
use crate::llm::LlmClient;
use crate::prompts::PromptRenderer;
use crate::response::Diagnostic;

pub const STOP_DELIVERY_NO_MATCH: &str = "No he podido determinar una acción automática para tu caso. Un agente humano revisará tu solicitud.";
pub const URGENT_NOTICE_NO_MATCH: &str =
    "No podemos procesar el aviso urgente con los datos actuales.";

/// Per-process wording and grounding around the shared collect/decide loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessProfile {
    kind: FlowKind,
    acknowledgement_prefix: String,
    no_match_message: String,
    policy_text: String,
    inference: Option<KeywordInference>,
}

impl ProcessProfile {
    pub fn stop_delivery(policy_text: impl Into<String>) -> Self {
        Self {
            kind: FlowKind::StopDelivery,
            acknowledgement_prefix: "Gracias. ".to_string(),
            no_match_message: STOP_DELIVERY_NO_MATCH.to_string(),
            policy_text: policy_text.into(),
            inference: None,
        }
    }

    pub fn urgent_notice(policy_text: impl Into<String>) -> Self {
        Self {
            kind: FlowKind::UrgentNotice,
            acknowledgement_prefix: String::new(),
            no_match_message: URGENT_NOTICE_NO_MATCH.to_string(),
            policy_text: policy_text.into(),
            inference: Some(KeywordInference::new(
                "producto",
                [("agua", "agua"), ("cafe", "cafe")],
            )),
        }
    }

    pub fn for_flow(kind: FlowKind, policy_text: impl Into<String>) -> Self {
        match kind {
            FlowKind::StopDelivery => Self::stop_delivery(policy_text),
            FlowKind::UrgentNotice => Self::urgent_notice(policy_text),
        }
    }

    pub fn kind(&self) -> FlowKind {
        self.kind
    }

    pub fn policy_text(&self) -> &str {
        &self.policy_text
    }
}

/// Result of one flow step.
#[derive(Clone, Debug, PartialEq)]
pub struct FlowOutcome {
    pub answer: String,
    pub context_updates: FactContext,
    pub flow_marker: Option<FlowKind>,
    pub diagnostic: Diagnostic,
    pub state: FlowState,
}

pub struct FlowController {
    rules: RuleEngine,
    flow: FlowEngine<RuleDrivenFlow>,
    profile: ProcessProfile,
    extractor: Arc<FieldExtractor>,
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptRenderer>,
    audit_sink: Arc<dyn AuditSink>,
}

impl FlowController {
    pub fn new(
        rules: RuleEngine,
        profile: ProcessProfile,
        extractor: Arc<FieldExtractor>,
        llm: Arc<dyn LlmClient>,
        prompts: Arc<PromptRenderer>,
        audit_sink: Arc<dyn AuditSink>,
    ) -> Result<Self, ApplicationError> {
        if rules.process() != profile.kind() {
            return Err(ApplicationError::Configuration(format!(
                "rule set for {} cannot drive the {} flow",
                rules.process(),
                profile.kind()
            )));
        }

        Ok(Self {
            flow: FlowEngine::new(RuleDrivenFlow::new(profile.kind())),
            rules,
            profile,
            extractor,
            llm,
            prompts,
            audit_sink,
        })
    }

    pub fn kind(&self) -> FlowKind {
        self.profile.kind()
    }

    /// Runs one turn of the collect/decide loop against the caller's facts.
    ///
    /// The returned `context_updates` only carries what this turn learned.
    /// On error nothing is to be merged: the caller keeps its previous facts
    /// and marker.
    pub async fn handle(
        &self,
        message: &str,
        context: &FactContext,
        audit: &AuditContext,
    ) -> Result<FlowOutcome, ApplicationError> {
        let mut facts = context.clone();
        let mut updates = FactContext::new();
        let mut state = self.flow.initial_state();

        if let Some(missing) = self.rules.get_missing_info(&facts) {
            let Some(value) = self.extract(message, &missing).await else {
                self.transition(&state, FlowEvent::FieldStillMissing, &facts, audit)?;
                return Ok(self.ask(missing, "", updates));
            };

            info!(
                event_name = "flow.field_collected",
                correlation_id = %audit.correlation_id,
                flow = %self.kind(),
                field = %missing.field,
                "collected field value"
            );
            facts.insert(missing.field.clone(), value.clone());
            updates.insert(missing.field.clone(), value);

            if let Some(next) = self.rules.get_missing_info(&facts) {
                if next.field == missing.field {
                    return Err(DomainError::InvariantViolation(format!(
                        "field `{}` reported missing right after it was collected",
                        missing.field
                    ))
                    .into());
                }
                self.transition(&state, FlowEvent::FieldCollected, &facts, audit)?;
                let prefix = self.profile.acknowledgement_prefix.clone();
                return Ok(self.ask(next, &prefix, updates));
            }
        }

        state = self.transition(&state, FlowEvent::RequiredFieldsCollected, &facts, audit)?.to;

        match self.rules.evaluate_rule(&facts) {
            Some(matched) => {
                let answer = self.describe_decision(matched.decision, &facts).await?;
                let outcome = self.transition(&state, FlowEvent::DecisionReached, &facts, audit)?;
                self.audit_sink.emit(
                    AuditEvent::new(
                        audit,
                        Some(self.kind()),
                        "rules.decision_reached",
                        AuditCategory::Rules,
                        AuditOutcome::Success,
                    )
                    .with_metadata("rule_id", matched.rule_id)
                    .with_metadata("decision", matched.decision.decision.clone()),
                );

                Ok(FlowOutcome {
                    answer,
                    context_updates: updates,
                    flow_marker: self.marker_after(&outcome),
                    diagnostic: Diagnostic::DecisionReached {
                        rule_id: matched.rule_id.to_string(),
                        decision: matched.decision.clone(),
                    },
                    state: outcome.to,
                })
            }
            None => {
                let outcome = self.transition(&state, FlowEvent::NoRuleMatched, &facts, audit)?;
                self.audit_sink.emit(
                    AuditEvent::new(
                        audit,
                        Some(self.kind()),
                        "rules.no_rule_matched",
                        AuditCategory::Rules,
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("fact_count", facts.len().to_string()),
                );

                Ok(FlowOutcome {
                    answer: self.profile.no_match_message.clone(),
                    context_updates: updates,
                    flow_marker: self.marker_after(&outcome),
                    diagnostic: Diagnostic::NoRuleMatched,
                    state: outcome.to,
                })
            }
        }
    }

    /// Records that the user walked away from this flow. No decision is made.
    pub fn abandon(
        &self,
        context: &FactContext,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, ApplicationError> {
        let state = self.flow.initial_state();
        self.transition(&state, FlowEvent::Abandoned, context, audit)
    }

    async fn extract(&self, message: &str, missing: &MissingInfo) -> Option<FactValue> {
        let field_type = self.rules.rule_set().field_type(&missing.field);
        if let Some(value) = self.extractor.extract(message, missing, field_type).await {
            return Some(value);
        }

        let inferred = self.profile.inference.as_ref()?.infer(&missing.field, message)?;
        field_type.coerce(&inferred.to_string())
    }

    async fn describe_decision(
        &self,
        decision: &Decision,
        facts: &FactContext,
    ) -> Result<String, ApplicationError> {
        let prompt = self
            .prompts
            .decision_response(self.kind(), decision, facts, self.profile.policy_text())
            .map_err(|error| ApplicationError::Configuration(format!("{error:#}")))?;

        self.llm.generate(&prompt, &[]).await.map_err(|error| {
            ApplicationError::Integration(format!("decision response generation failed: {error:#}"))
        })
    }

    fn ask(&self, missing: MissingInfo, prefix: &str, updates: FactContext) -> FlowOutcome {
        FlowOutcome {
            answer: format!("{prefix}{}", missing.question),
            context_updates: updates,
            flow_marker: Some(self.kind()),
            diagnostic: Diagnostic::CollectingInfo { missing_field: missing.field },
            state: FlowState::Collecting,
        }
    }

    fn marker_after(&self, outcome: &TransitionOutcome) -> Option<FlowKind> {
        if outcome.clears_marker() {
            None
        } else {
            Some(self.kind())
        }
    }

    fn transition(
        &self,
        current: &FlowState,
        event: FlowEvent,
        facts: &FactContext,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, ApplicationError> {
        let context = FlowContext { missing_required_fields: self.missing_fields(facts) };
        self.flow
            .apply_with_audit(current, &event, &context, self.audit_sink.as_ref(), audit)
            .map_err(|error| ApplicationError::from(DomainError::from(error)))
    }

    fn missing_fields(&self, facts: &FactContext) -> Vec<String> {
        self.rules
            .rule_set()
            .required_fields()
            .iter()
            .filter(|field| !facts.has_value(field))
            .cloned()
            .collect()
    }
}
