use std::sync::Arc;

use aquaroute_core::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use aquaroute_core::domain::flow::{FlowKind, Intent, TurnCategory, TurnClassification};
use aquaroute_core::{ApplicationError, FactContext, RuleEngine};
use tracing::info;

use crate::analyzer::TurnAnalyzer;
use crate::extraction::FieldExtractor;
use crate::flow_controller::{FlowController, ProcessProfile};
use crate::llm::LlmClient;
use crate::prompts::PromptRenderer;
use crate::rag::{ChatHandler, RagHandler, RetrievalSettings};
use crate::response::{SourceLabel, TurnRequest, TurnResponse};
use crate::retrieval::Retriever;

/// Appended to an answer that interrupted a flow still waiting for input.
pub const RESUMPTION_HINT: &str =
    "\n\n_(Por cierto, seguimos pendientes de tu gestión anterior. ¿Deseas continuar?)_";

/// Everything needed to wire a router from loaded configuration.
pub struct RouterParts {
    pub llm: Arc<dyn LlmClient>,
    pub retriever: Arc<dyn Retriever>,
    pub stop_delivery_rules: RuleEngine,
    pub urgent_notice_rules: RuleEngine,
    pub stop_delivery_policy: String,
    pub urgent_notice_policy: String,
    pub retrieval: RetrievalSettings,
    pub audit_sink: Arc<dyn AuditSink>,
}

/// Single entry point per user turn.
pub struct ConversationRouter {
    analyzer: TurnAnalyzer,
    stop_delivery: FlowController,
    urgent_notice: FlowController,
    rag: RagHandler,
    chat: ChatHandler,
    audit_sink: Arc<dyn AuditSink>,
}

impl ConversationRouter {
    pub fn new(
        analyzer: TurnAnalyzer,
        stop_delivery: FlowController,
        urgent_notice: FlowController,
        rag: RagHandler,
        chat: ChatHandler,
        audit_sink: Arc<dyn AuditSink>,
    ) -> Result<Self, ApplicationError> {
        if stop_delivery.kind() != FlowKind::StopDelivery
            || urgent_notice.kind() != FlowKind::UrgentNotice
        {
            return Err(ApplicationError::Configuration(
                "flow controllers were wired to the wrong processes".to_string(),
            ));
        }
        Ok(Self { analyzer, stop_delivery, urgent_notice, rag, chat, audit_sink })
    }

    pub fn from_parts(parts: RouterParts) -> Result<Self, ApplicationError> {
        let prompts = Arc::new(PromptRenderer::new().map_err(|error| {
            ApplicationError::Configuration(format!("prompt templates: {error:#}"))
        })?);
        let extractor = Arc::new(FieldExtractor::new(parts.llm.clone(), prompts.clone()));

        let controller = |rules: RuleEngine, profile: ProcessProfile| {
            FlowController::new(
                rules,
                profile,
                extractor.clone(),
                parts.llm.clone(),
                prompts.clone(),
                parts.audit_sink.clone(),
            )
        };
        let stop_delivery = controller(
            parts.stop_delivery_rules,
            ProcessProfile::stop_delivery(parts.stop_delivery_policy),
        )?;
        let urgent_notice = controller(
            parts.urgent_notice_rules,
            ProcessProfile::urgent_notice(parts.urgent_notice_policy),
        )?;

        Self::new(
            TurnAnalyzer::with_llm(parts.llm.clone(), prompts.clone()),
            stop_delivery,
            urgent_notice,
            RagHandler::new(
                parts.retriever,
                parts.llm.clone(),
                prompts,
                parts.retrieval,
                parts.audit_sink.clone(),
            ),
            ChatHandler::new(parts.llm),
            parts.audit_sink,
        )
    }

    pub fn controller(&self, flow: FlowKind) -> &FlowController {
        match flow {
            FlowKind::StopDelivery => &self.stop_delivery,
            FlowKind::UrgentNotice => &self.urgent_notice,
        }
    }

    pub async fn process_request(
        &self,
        request: &TurnRequest,
        audit: &AuditContext,
    ) -> Result<TurnResponse, ApplicationError> {
        let active = request.flow_marker;
        let classification =
            self.analyzer.analyze(&request.message, &request.history, active).await;
        self.record_classification(&classification, active, audit);

        let intent = classification.detected_intent;
        match (classification.category, active) {
            (TurnCategory::ContinuesFlow, Some(flow)) => self.run_flow(flow, request, audit).await,
            (TurnCategory::InterruptsFlow, Some(flow)) => match intent.flow_kind() {
                Some(target) => self.switch_flow(flow, target, request, audit).await,
                None => {
                    let mut response = self.route_by_intent(intent, request, audit).await?;
                    response.answer.push_str(RESUMPTION_HINT);
                    response.flow_marker = Some(flow);
                    Ok(response)
                }
            },
            (TurnCategory::SwitchesIntent, Some(flow)) => match intent.flow_kind() {
                Some(target) => self.switch_flow(flow, target, request, audit).await,
                None => {
                    self.controller(flow).abandon(&request.context, audit)?;
                    self.route_by_intent(intent, request, audit).await
                }
            },
            (TurnCategory::NoFlow, _) | (_, None) => {
                self.route_by_intent(intent, request, audit).await
            }
        }
    }

    async fn switch_flow(
        &self,
        from: FlowKind,
        to: FlowKind,
        request: &TurnRequest,
        audit: &AuditContext,
    ) -> Result<TurnResponse, ApplicationError> {
        if from != to {
            info!(
                event_name = "routing.flow_switched",
                correlation_id = %audit.correlation_id,
                from = %from,
                to = %to,
                "abandoning active flow for a new process"
            );
            self.controller(from).abandon(&request.context, audit)?;
        }
        self.run_flow(to, request, audit).await
    }

    async fn route_by_intent(
        &self,
        intent: Intent,
        request: &TurnRequest,
        audit: &AuditContext,
    ) -> Result<TurnResponse, ApplicationError> {
        match intent {
            Intent::StopDelivery => self.run_flow(FlowKind::StopDelivery, request, audit).await,
            Intent::UrgentNotice => self.run_flow(FlowKind::UrgentNotice, request, audit).await,
            Intent::GeneralQuestion => {
                let rag = self.rag.answer(&request.message, audit).await?;
                Ok(TurnResponse {
                    answer: rag.answer,
                    context_updates: FactContext::new(),
                    flow_marker: None,
                    source: SourceLabel::Rag,
                    sources: rag.sources,
                    diagnostic: Some(rag.diagnostic),
                })
            }
            Intent::ChitChat => {
                let answer = self.chat.reply(&request.message, &request.history).await?;
                Ok(TurnResponse {
                    answer,
                    context_updates: FactContext::new(),
                    flow_marker: None,
                    source: SourceLabel::Chat,
                    sources: Vec::new(),
                    diagnostic: None,
                })
            }
        }
    }

    async fn run_flow(
        &self,
        flow: FlowKind,
        request: &TurnRequest,
        audit: &AuditContext,
    ) -> Result<TurnResponse, ApplicationError> {
        let outcome =
            self.controller(flow).handle(&request.message, &request.context, audit).await?;
        Ok(TurnResponse {
            answer: outcome.answer,
            context_updates: outcome.context_updates,
            flow_marker: outcome.flow_marker,
            source: SourceLabel::from(flow),
            sources: Vec::new(),
            diagnostic: Some(outcome.diagnostic),
        })
    }

    fn record_classification(
        &self,
        classification: &TurnClassification,
        active: Option<FlowKind>,
        audit: &AuditContext,
    ) {
        let category = format!("{:?}", classification.category);
        info!(
            event_name = "routing.turn_classified",
            correlation_id = %audit.correlation_id,
            category = %category,
            intent = %classification.detected_intent,
            active_flow = active.map(FlowKind::marker).unwrap_or("none"),
            "classified turn"
        );
        self.audit_sink.emit(
            AuditEvent::new(
                audit,
                active,
                "routing.turn_classified",
                AuditCategory::Routing,
                AuditOutcome::Success,
            )
            .with_metadata("category", category)
            .with_metadata("intent", classification.detected_intent.label()),
        );
    }
}
