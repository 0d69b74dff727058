use std::sync::Arc;

use aquaroute_core::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use aquaroute_core::ApplicationError;
use tracing::info;

use crate::llm::{ChatMessage, LlmClient};
use crate::prompts::PromptRenderer;
use crate::response::{Diagnostic, SourceRef};
use crate::retrieval::Retriever;

#[derive(Clone, Debug, PartialEq)]
pub struct RetrievalSettings {
    pub top_k: usize,
    pub namespace: String,
    /// Snippets must score strictly above this to be used.
    pub min_score: f64,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { top_k: 3, namespace: "default".to_string(), min_score: 0.45 }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RagAnswer {
    pub answer: String,
    pub sources: Vec<SourceRef>,
    pub diagnostic: Diagnostic,
}

/// Answers general questions from the document index only.
pub struct RagHandler {
    retriever: Arc<dyn Retriever>,
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptRenderer>,
    settings: RetrievalSettings,
    audit_sink: Arc<dyn AuditSink>,
}

impl RagHandler {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        llm: Arc<dyn LlmClient>,
        prompts: Arc<PromptRenderer>,
        settings: RetrievalSettings,
        audit_sink: Arc<dyn AuditSink>,
    ) -> Self {
        Self { retriever, llm, prompts, settings, audit_sink }
    }

    pub async fn answer(
        &self,
        message: &str,
        audit: &AuditContext,
    ) -> Result<RagAnswer, ApplicationError> {
        let snippets = self
            .retriever
            .search(message, self.settings.top_k, &self.settings.namespace)
            .await
            .map_err(|error| {
                ApplicationError::Integration(format!("document retrieval failed: {error:#}"))
            })?;

        let relevant: Vec<_> =
            snippets.into_iter().filter(|snippet| snippet.score > self.settings.min_score).collect();
        let grounding =
            relevant.iter().map(|snippet| snippet.text.as_str()).collect::<Vec<_>>().join("\n");

        let prompt = self
            .prompts
            .rag_answer(&grounding, message)
            .map_err(|error| ApplicationError::Configuration(format!("{error:#}")))?;
        let answer = self.llm.generate(&prompt, &[]).await.map_err(|error| {
            ApplicationError::Integration(format!("grounded answer generation failed: {error:#}"))
        })?;

        let sources: Vec<SourceRef> = relevant
            .iter()
            .map(|snippet| SourceRef {
                name: snippet.source_label.clone(),
                score: (snippet.score * 1000.0).round() / 10.0,
            })
            .collect();
        let context_used: Vec<String> = sources.iter().map(|source| source.name.clone()).collect();

        info!(
            event_name = "retrieval.answered",
            correlation_id = %audit.correlation_id,
            snippet_count = relevant.len(),
            "answered from document index"
        );
        self.audit_sink.emit(
            AuditEvent::new(
                audit,
                None,
                "retrieval.answered",
                AuditCategory::Retrieval,
                AuditOutcome::Success,
            )
            .with_metadata("context_used", context_used.join(",")),
        );

        Ok(RagAnswer { answer, sources, diagnostic: Diagnostic::Retrieval { context_used } })
    }
}

/// Plain conversation under the assistant persona, with the full history.
pub struct ChatHandler {
    llm: Arc<dyn LlmClient>,
}

impl ChatHandler {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub async fn reply(
        &self,
        message: &str,
        history: &[ChatMessage],
    ) -> Result<String, ApplicationError> {
        self.llm.generate(message, history).await.map_err(|error| {
            ApplicationError::Integration(format!("chat completion failed: {error:#}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use aquaroute_core::audit::{AuditContext, InMemoryAuditSink};
    use aquaroute_core::ApplicationError;

    use super::{ChatHandler, RagHandler, RetrievalSettings};
    use crate::llm::ChatMessage;
    use crate::prompts::PromptRenderer;
    use crate::response::{Diagnostic, SourceRef};
    use crate::testing::{snippet, ScriptedLlm, ScriptedRetriever};

    fn audit() -> AuditContext {
        AuditContext::new(None, "req-rag", "test")
    }

    fn handler(retriever: Arc<ScriptedRetriever>, llm: Arc<ScriptedLlm>) -> RagHandler {
        RagHandler::new(
            retriever,
            llm,
            Arc::new(PromptRenderer::new().expect("templates")),
            RetrievalSettings { namespace: "faq".to_string(), ..RetrievalSettings::default() },
            Arc::new(InMemoryAuditSink::default()),
        )
    }

    #[tokio::test]
    async fn keeps_only_snippets_above_threshold() {
        let retriever = Arc::new(ScriptedRetriever::with_snippets(vec![
            snippet("La garrafa de 20L cuesta 6€.", "precios.pdf", 0.8123),
            snippet("Texto irrelevante", "otros.pdf", 0.45),
        ]));
        let llm = Arc::new(ScriptedLlm::new(["Cuesta 6€."]));

        let answer =
            handler(retriever.clone(), llm.clone()).answer("¿precio?", &audit()).await.expect("rag");

        assert_eq!(answer.answer, "Cuesta 6€.");
        assert_eq!(answer.sources, vec![SourceRef { name: "precios.pdf".to_string(), score: 81.2 }]);
        assert_eq!(
            answer.diagnostic,
            Diagnostic::Retrieval { context_used: vec!["precios.pdf".to_string()] }
        );
        assert_eq!(retriever.queries(), vec![("¿precio?".to_string(), 3, "faq".to_string())]);
        let prompt = &llm.prompts()[0];
        assert!(prompt.contains("La garrafa de 20L cuesta 6€."));
        assert!(!prompt.contains("Texto irrelevante"));
    }

    #[tokio::test]
    async fn retrieval_failure_is_an_integration_error() {
        let retriever = Arc::new(ScriptedRetriever::failing("index unreachable"));
        let llm = Arc::new(ScriptedLlm::new(["unused"]));

        let result = handler(retriever, llm.clone()).answer("¿precio?", &audit()).await;

        assert!(matches!(result, Err(ApplicationError::Integration(_))));
        assert_eq!(llm.remaining(), 1);
    }

    #[tokio::test]
    async fn chat_passes_full_history() {
        let llm = Arc::new(ScriptedLlm::new(["¡Hola!"]));
        let history = vec![
            ChatMessage::user("uno"),
            ChatMessage::assistant("dos"),
            ChatMessage::user("tres"),
        ];

        let reply = ChatHandler::new(llm.clone()).reply("hola", &history).await.expect("chat");

        assert_eq!(reply, "¡Hola!");
        assert_eq!(llm.prompts(), vec!["hola".to_string()]);
        assert_eq!(llm.histories()[0].len(), 3);
    }
}
