use anyhow::{Context as _, Result};
use aquaroute_core::domain::flow::FlowKind;
use aquaroute_core::rules::FieldOption;
use aquaroute_core::{Decision, FactContext};
use tera::{Context, Tera};

use crate::llm::ChatMessage;

/// System instruction for every completion the agent requests.
pub const ASSISTANT_PERSONA: &str = "Eres un asistente virtual de Aquaservice. Tu misión es ayudar al cliente con sus pedidos, dudas y gestiones. Responde SIEMPRE en español de forma amable y profesional.";

const TURN_ANALYSIS: &str = r#"System is currently in a flow state: '{{ flow_marker }}'.
User just sent: "{{ message }}"

Analyze the user's message in relation to the flow.
1. ANSWER_FLOW: Is the user answering the flow's question OR accepting one of the offered alternatives? (e.g. "Yes", "Change it for minis", "I want option 2", "exceso de agua").
2. INTERRUPTION: Is the user asking a generic knowledge question unrelated to completing the current action? (e.g. "What is the pH?", "Where are you located?") -> Intent: FAQ
3. NEW_INTENT: Is the user explicitly abandoning this and starting a different process? (e.g. "Forget it", "I want an urgent delivery instead") -> Intent: STOP/URGENT

Return JSON ONLY:
{"classification": "ANSWER_FLOW" | "INTERRUPTION" | "NEW_INTENT", "detected_intent": "FAQ" | "STOP_DELIVERY" | "URGENT_NOTICE" | "CHAT"}
"#;

const INTENT_CLASSIFICATION: &str = r#"Analyze the user's latest message and conversation history.
Classify the intent into one of these exact categories:
- STOP_DELIVERY: User wants to stop, pause, cancel, or skip a delivery/service.
- URGENT_NOTICE: User needs water immediately, ran out, urgent delivery request.
- FAQ: User asks a general question about service, prices, bottles, machines, etc.
- CHAT: Greetings, small talk, or unclear.

History:
{{ history }}

User Message: {{ message }}

Category:
"#;

const FIELD_EXTRACTION: &str = r#"Extract the value for the field '{{ field }}' from the text: "{{ message }}".
{% if options %}Possible values: {{ options }}
{% endif %}If the text contains the answer, return ONLY the value (e.g. from the 'value' field if options are provided).
If not found, return NULL.
"#;

const DECISION_RESPONSE: &str = r#"Genera una respuesta FINAL para el cliente.
NO expliques qué regla has usado.
NO enumeres parámetros técnicos.
Se DIRECTO, AMABLE y BREVE.

Si la decisión es APROBADA: Confirma la acción y da el plazo de entrega.
Si es RECHAZADA: Explica el motivo de forma sencilla (ej: "Por tu zona no podemos...") y ofrece la alternativa si la hay.

MANUAL OPERATIVO (Solo para extraer datos como plazos):
{{ policy_text }}

SITUACIÓN:
Proceso: {{ process }}
Decisión: {{ decision }}
Motivo Técnico: {{ reason }}
Acciones: {{ allowed_actions }}
Usuario Contexto: {{ facts }}
"#;

const RAG_ANSWER: &str = r#"Responde a la pregunta del usuario basándote ÚNICAMENTE en el siguiente contexto.
Responde en Español de forma clara y concisa.
Contexto:
{{ context }}

Pregunta Usuario: {{ message }}
"#;

pub struct PromptRenderer {
    tera: Tera,
}

impl PromptRenderer {
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        tera.autoescape_on(Vec::new());
        tera.add_raw_templates(vec![
            ("turn_analysis", TURN_ANALYSIS),
            ("intent_classification", INTENT_CLASSIFICATION),
            ("field_extraction", FIELD_EXTRACTION),
            ("decision_response", DECISION_RESPONSE),
            ("rag_answer", RAG_ANSWER),
        ])
        .context("prompt templates failed to compile")?;
        Ok(Self { tera })
    }

    pub fn turn_analysis(&self, active: FlowKind, message: &str) -> Result<String> {
        let mut context = Context::new();
        context.insert("flow_marker", active.marker());
        context.insert("message", message);
        self.render("turn_analysis", &context)
    }

    pub fn intent_classification(&self, message: &str, history: &[ChatMessage]) -> Result<String> {
        let lines: Vec<String> = history
            .iter()
            .map(|entry| format!("{}: {}", entry.role.as_str(), entry.content))
            .collect();

        let mut context = Context::new();
        context.insert("history", &lines.join("\n"));
        context.insert("message", message);
        self.render("intent_classification", &context)
    }

    pub fn field_extraction(
        &self,
        field: &str,
        options: &[FieldOption],
        message: &str,
    ) -> Result<String> {
        let options = options
            .iter()
            .map(|option| format!("{} ({})", option.value, option.label))
            .collect::<Vec<_>>()
            .join(", ");

        let mut context = Context::new();
        context.insert("field", field);
        context.insert("options", &options);
        context.insert("message", message);
        self.render("field_extraction", &context)
    }

    pub fn decision_response(
        &self,
        process: FlowKind,
        decision: &Decision,
        facts: &FactContext,
        policy_text: &str,
    ) -> Result<String> {
        let mut context = Context::new();
        context.insert("policy_text", policy_text);
        context.insert("process", process.marker());
        context.insert("decision", &decision.decision);
        context.insert("reason", &decision.reason);
        context.insert("allowed_actions", &decision.allowed_actions.join(", "));
        context.insert("facts", &serde_json::to_string(facts)?);
        self.render("decision_response", &context)
    }

    pub fn rag_answer(&self, grounding: &str, message: &str) -> Result<String> {
        let mut context = Context::new();
        context.insert("context", grounding);
        context.insert("message", message);
        self.render("rag_answer", &context)
    }

    fn render(&self, template: &str, context: &Context) -> Result<String> {
        self.tera
            .render(template, context)
            .with_context(|| format!("failed to render prompt template `{template}`"))
    }
}

#[cfg(test)]
mod tests {
    use aquaroute_core::domain::flow::FlowKind;
    use aquaroute_core::rules::FieldOption;
    use aquaroute_core::{Decision, FactContext};

    use super::PromptRenderer;
    use crate::llm::ChatMessage;

    #[test]
    fn templates_compile_and_embed_inputs_verbatim() {
        let prompts = PromptRenderer::new().expect("templates");

        let turn =
            prompts.turn_analysis(FlowKind::StopDelivery, "¿y el pH <del agua>?").expect("turn");
        assert!(turn.contains("'STOP_DELIVERY'"));
        assert!(turn.contains("¿y el pH <del agua>?"), "no html escaping in prompts");

        let intent = prompts
            .intent_classification(
                "hola",
                &[ChatMessage::user("buenas"), ChatMessage::assistant("¿en qué te ayudo?")],
            )
            .expect("intent");
        assert!(intent.contains("user: buenas\nassistant: ¿en qué te ayudo?"));
    }

    #[test]
    fn extraction_prompt_lists_options_only_when_present() {
        let prompts = PromptRenderer::new().expect("templates");
        let options = vec![FieldOption {
            value: "exceso_agua".to_string(),
            label: "Tengo exceso de agua".to_string(),
        }];

        let with_options =
            prompts.field_extraction("motivo", &options, "me sobra agua").expect("render");
        assert!(with_options.contains("Possible values: exceso_agua (Tengo exceso de agua)"));

        let without = prompts.field_extraction("scoring", &[], "un 4").expect("render");
        assert!(!without.contains("Possible values"));
    }

    #[test]
    fn decision_prompt_carries_policy_and_decision_fields() {
        let prompts = PromptRenderer::new().expect("templates");
        let decision = Decision {
            decision: "APROBADA".to_string(),
            allowed_actions: vec!["PAUSAR_REPARTO".to_string(), "AVISAR".to_string()],
            reason: "scoring alto".to_string(),
            extra: Default::default(),
        };
        let facts = FactContext::new().with("scoring", 3.5);

        let prompt = prompts
            .decision_response(FlowKind::StopDelivery, &decision, &facts, "Plazo: 48h")
            .expect("render");
        assert!(prompt.contains("Plazo: 48h"));
        assert!(prompt.contains("Decisión: APROBADA"));
        assert!(prompt.contains("Acciones: PAUSAR_REPARTO, AVISAR"));
        assert!(prompt.contains("\"scoring\":3.5"));
    }
}
