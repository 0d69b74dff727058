use std::sync::Arc;

use aquaroute_agent::{ConversationRouter, TurnRequest, TurnResponse};
use aquaroute_core::audit::AuditContext;
use aquaroute_core::{FailureKind, InterfaceError};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

pub const SESSION_HEADER: &str = "x-session-id";

#[derive(Clone)]
pub struct ChatState {
    router: Arc<ConversationRouter>,
}

impl ChatState {
    pub fn new(router: Arc<ConversationRouter>) -> Self {
        Self { router }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub correlation_id: String,
}

pub fn router(state: ChatState) -> Router {
    Router::new().route("/api/chat", post(chat)).with_state(state)
}

pub async fn chat(
    State(state): State<ChatState>,
    headers: HeaderMap,
    Json(request): Json<TurnRequest>,
) -> Result<Json<TurnResponse>, (StatusCode, Json<ErrorBody>)> {
    let correlation_id = Uuid::new_v4().to_string();
    let session_id = headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);
    let audit = AuditContext::new(session_id, correlation_id.clone(), "customer");

    if request.message.trim().is_empty() {
        return Err(error_response(InterfaceError::bad_request(
            "message must not be blank",
            correlation_id,
        )));
    }

    match state.router.process_request(&request, &audit).await {
        Ok(response) => {
            info!(
                event_name = "http.chat.completed",
                correlation_id = %audit.correlation_id,
                source = ?response.source,
                flow = response.flow_marker.map(|flow| flow.marker()).unwrap_or("none"),
                updated_fields = response.context_updates.len(),
                "chat turn completed"
            );
            Ok(Json(response))
        }
        Err(error) => {
            let interface = error.into_interface(correlation_id);
            warn!(
                event_name = "http.chat.failed",
                correlation_id = %interface.correlation_id(),
                error = %interface,
                "chat turn failed"
            );
            Err(error_response(interface))
        }
    }
}

fn error_response(error: InterfaceError) -> (StatusCode, Json<ErrorBody>) {
    let status = match error.kind() {
        FailureKind::BadRequest => StatusCode::BAD_REQUEST,
        FailureKind::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        FailureKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = ErrorBody {
        error: error.user_message(),
        correlation_id: error.correlation_id().to_string(),
    };
    (status, Json(body))
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    use anyhow::{anyhow, Result};
    use aquaroute_agent::llm::{ChatMessage, LlmClient};
    use aquaroute_agent::rag::RetrievalSettings;
    use aquaroute_agent::retrieval::{RetrievedSnippet, Retriever};
    use aquaroute_agent::router::RouterParts;
    use aquaroute_agent::ConversationRouter;
    use aquaroute_core::audit::InMemoryAuditSink;
    use aquaroute_core::{ApplicationError, DomainError, FlowKind, RuleEngine, RuleSet};
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::chat::{error_response, router, ChatState, SESSION_HEADER};

    struct ScriptedLlm {
        replies: Mutex<VecDeque<String>>,
    }

    impl ScriptedLlm {
        fn new(replies: &[&str]) -> Self {
            Self { replies: Mutex::new(replies.iter().map(|reply| reply.to_string()).collect()) }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn generate(&self, _prompt: &str, _history: &[ChatMessage]) -> Result<String> {
            self.replies
                .lock()
                .expect("script lock")
                .pop_front()
                .ok_or_else(|| anyhow!("llm unavailable"))
        }
    }

    struct OfflineRetriever;

    #[async_trait]
    impl Retriever for OfflineRetriever {
        async fn search(&self, _: &str, _: usize, _: &str) -> Result<Vec<RetrievedSnippet>> {
            Err(anyhow!("index unreachable"))
        }
    }

    fn rule_engine(flow: FlowKind, file: &str) -> RuleEngine {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../rules").join(file);
        RuleEngine::new(RuleSet::load(&path, flow).expect("rule set"))
    }

    fn app(replies: &[&str], audit_sink: InMemoryAuditSink) -> axum::Router {
        let conversation = ConversationRouter::from_parts(RouterParts {
            llm: Arc::new(ScriptedLlm::new(replies)),
            retriever: Arc::new(OfflineRetriever),
            stop_delivery_rules: rule_engine(FlowKind::StopDelivery, "stop_delivery.json"),
            urgent_notice_rules: rule_engine(FlowKind::UrgentNotice, "urgent_notice.json"),
            stop_delivery_policy: String::new(),
            urgent_notice_policy: String::new(),
            retrieval: RetrievalSettings::default(),
            audit_sink: Arc::new(audit_sink),
        })
        .expect("router");
        router(ChatState::new(Arc::new(conversation)))
    }

    fn post_json(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header("content-type", "application/json")
            .header(SESSION_HEADER, "session-42")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn new_stop_request_opens_the_flow_and_asks_first_question() {
        let sink = InMemoryAuditSink::default();
        let app = app(&["STOP", "NULL"], sink.clone());

        let response = app
            .oneshot(post_json(json!({
                "message": "Quiero parar el reparto",
                "history": [],
                "context": {},
                "flow_marker": null
            })))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["flow_marker"], "STOP_DELIVERY");
        assert_eq!(body["source"], "AGENT_STOP");
        assert_eq!(body["context_updates"], json!({}));
        assert_eq!(body["diagnostic"], json!({"kind": "collecting_info", "missing_field": "motivo"}));
        assert_eq!(body["answer"], "¿Cuál es el motivo por el que quieres parar el reparto?");

        let events = sink.events();
        assert!(!events.is_empty());
        assert!(events.iter().all(|event| event.session_id.as_deref() == Some("session-42")));
    }

    #[tokio::test]
    async fn retrieval_outage_maps_to_service_unavailable_with_correlation_id() {
        let app = app(&[], InMemoryAuditSink::default());

        let response = app
            .oneshot(post_json(json!({"message": "¿Cuál es el horario de reparto?"})))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = json_body(response).await;
        assert_eq!(body["error"], "The service is temporarily unavailable. Please retry shortly.");
        assert!(!body["correlation_id"].as_str().unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn blank_message_is_rejected_before_routing() {
        let app = app(&[], InMemoryAuditSink::default());

        let response =
            app.oneshot(post_json(json!({"message": "   "}))).await.expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_flow_marker_is_rejected_as_malformed_request() {
        let app = app(&[], InMemoryAuditSink::default());

        let response = app
            .oneshot(post_json(json!({"message": "hola", "flow_marker": "CANCEL_ORDER"})))
            .await
            .expect("response");

        assert!(response.status().is_client_error());
    }

    #[test]
    fn stalled_flow_is_reported_as_server_error() {
        let error = ApplicationError::from(DomainError::InvariantViolation(
            "collection made no progress".to_string(),
        ))
        .into_interface("corr-7");

        let (status, body) = error_response(error);

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.0.error, "An unexpected internal error occurred.");
        assert_eq!(body.0.correlation_id, "corr-7");
    }
}
