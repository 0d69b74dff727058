use std::sync::Arc;

use anyhow::{anyhow, Result};
use aquaroute_core::domain::flow::{FlowKind, Intent, TurnCategory, TurnClassification};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use crate::llm::{strip_code_fences, ChatMessage, LlmClient};
use crate::prompts::PromptRenderer;

/// History entries the no-flow intent classifier gets to see.
const INTENT_HISTORY_WINDOW: usize = 2;

/// Decides how a message relates to the flow that is waiting for an answer.
#[async_trait]
pub trait TurnClassifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn classify_turn(
        &self,
        message: &str,
        history: &[ChatMessage],
        active: FlowKind,
    ) -> Result<TurnClassification>;
}

/// Picks one of the fixed intents for a message outside any flow.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn classify_intent(&self, message: &str, history: &[ChatMessage]) -> Result<Intent>;
}

pub struct LlmTurnClassifier {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptRenderer>,
}

impl LlmTurnClassifier {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: Arc<PromptRenderer>) -> Self {
        Self { llm, prompts }
    }
}

#[derive(Debug, Deserialize)]
struct TurnAnalysisReply {
    classification: String,
    #[serde(default)]
    detected_intent: Option<String>,
}

#[async_trait]
impl TurnClassifier for LlmTurnClassifier {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn classify_turn(
        &self,
        message: &str,
        _history: &[ChatMessage],
        active: FlowKind,
    ) -> Result<TurnClassification> {
        let prompt = self.prompts.turn_analysis(active, message)?;
        let raw = self.llm.generate(&prompt, &[]).await?;
        parse_turn_analysis(&raw, active)
    }
}

fn parse_turn_analysis(raw: &str, active: FlowKind) -> Result<TurnClassification> {
    let reply: TurnAnalysisReply = serde_json::from_str(strip_code_fences(raw))
        .map_err(|error| anyhow!("unparsable turn analysis `{raw}`: {error}"))?;
    let detected = reply.detected_intent.as_deref().map(Intent::from_label);

    match reply.classification.trim().to_ascii_uppercase().as_str() {
        "ANSWER_FLOW" => Ok(TurnClassification::continues(active)),
        "INTERRUPTION" => Ok(TurnClassification::new(
            TurnCategory::InterruptsFlow,
            detected.unwrap_or(Intent::GeneralQuestion),
        )),
        "NEW_INTENT" => {
            let intent = detected
                .ok_or_else(|| anyhow!("NEW_INTENT classification without detected_intent"))?;
            Ok(TurnClassification::new(TurnCategory::SwitchesIntent, intent))
        }
        other => Err(anyhow!("unknown turn classification `{other}`")),
    }
}

/// Keyword guess used when the model is unavailable: short answers, yes/no
/// and product words are taken as a reply to the pending question.
#[derive(Clone, Debug, Default)]
pub struct HeuristicTurnClassifier;

impl HeuristicTurnClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn looks_like_answer(&self, message: &str) -> bool {
        tokenize(&normalize_text(message)).iter().any(|token| is_answer_token(token))
    }
}

#[async_trait]
impl TurnClassifier for HeuristicTurnClassifier {
    fn name(&self) -> &'static str {
        "keyword_heuristic"
    }

    async fn classify_turn(
        &self,
        message: &str,
        _history: &[ChatMessage],
        active: FlowKind,
    ) -> Result<TurnClassification> {
        if self.looks_like_answer(message) {
            Ok(TurnClassification::continues(active))
        } else {
            Err(anyhow!("no answer keyword in message"))
        }
    }
}

fn is_answer_token(token: &str) -> bool {
    const WORDS: &[&str] = &[
        "si", "vale", "ok", "claro", "correcto", "no", "cambia", "cambiar", "cambialo", "botella",
        "botellas", "caja", "cajas", "garrafa", "garrafas", "minis", "opcion",
    ];
    WORDS.contains(&token) || is_quantity(token)
}

/// Plain decimal quantities only; `nan`, `inf` and exponents are words here.
fn is_quantity(token: &str) -> bool {
    token.chars().any(|character| character.is_ascii_digit())
        && token.chars().all(|character| character.is_ascii_digit() || character == '.')
}

pub struct LlmIntentClassifier {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptRenderer>,
}

impl LlmIntentClassifier {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: Arc<PromptRenderer>) -> Self {
        Self { llm, prompts }
    }
}

#[async_trait]
impl IntentClassifier for LlmIntentClassifier {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn classify_intent(&self, message: &str, history: &[ChatMessage]) -> Result<Intent> {
        let prompt = self.prompts.intent_classification(message, history)?;
        let raw = self.llm.generate(&prompt, &[]).await?;
        Ok(Intent::from_label(&raw))
    }
}

#[derive(Clone, Debug, Default)]
pub struct KeywordIntentClassifier;

impl KeywordIntentClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, message: &str) -> Intent {
        let normalized = normalize_text(message);

        if contains_any(&normalized, &[
            "urgente",
            "urgencia",
            "sin agua",
            "me he quedado",
            "inmediat",
            "cuanto antes",
            "hoy mismo",
        ]) {
            Intent::UrgentNotice
        } else if contains_any(&normalized, &[
            "parar",
            "pausar",
            "detener",
            "suspender",
            "cancelar",
            "no quiero recibir",
            "saltar",
            "stop",
        ]) {
            Intent::StopDelivery
        } else if message.contains('?')
            || contains_any(&normalized, &["cuanto", "precio", "como ", "donde", "horario", "que es"])
        {
            Intent::GeneralQuestion
        } else {
            Intent::ChitChat
        }
    }
}

#[async_trait]
impl IntentClassifier for KeywordIntentClassifier {
    fn name(&self) -> &'static str {
        "keyword_heuristic"
    }

    async fn classify_intent(&self, message: &str, _history: &[ChatMessage]) -> Result<Intent> {
        Ok(self.classify(message))
    }
}

/// Primary/fallback pairing for both classification questions. Never fails:
/// when every strategy errors the turn is treated as chit-chat (no flow) or
/// as a continuation (active flow).
pub struct TurnAnalyzer {
    turn_classifier: Arc<dyn TurnClassifier>,
    turn_fallback: Arc<dyn TurnClassifier>,
    intent_classifier: Arc<dyn IntentClassifier>,
    intent_fallback: Arc<dyn IntentClassifier>,
}

impl TurnAnalyzer {
    pub fn new(
        turn_classifier: Arc<dyn TurnClassifier>,
        turn_fallback: Arc<dyn TurnClassifier>,
        intent_classifier: Arc<dyn IntentClassifier>,
        intent_fallback: Arc<dyn IntentClassifier>,
    ) -> Self {
        Self { turn_classifier, turn_fallback, intent_classifier, intent_fallback }
    }

    /// Model-backed classification with the keyword heuristics behind it.
    pub fn with_llm(llm: Arc<dyn LlmClient>, prompts: Arc<PromptRenderer>) -> Self {
        Self::new(
            Arc::new(LlmTurnClassifier::new(llm.clone(), prompts.clone())),
            Arc::new(HeuristicTurnClassifier::new()),
            Arc::new(LlmIntentClassifier::new(llm, prompts)),
            Arc::new(KeywordIntentClassifier::new()),
        )
    }

    pub async fn analyze(
        &self,
        message: &str,
        history: &[ChatMessage],
        active: Option<FlowKind>,
    ) -> TurnClassification {
        let Some(flow) = active else {
            return TurnClassification::no_flow(self.classify_intent(message, history).await);
        };

        match self.turn_classifier.classify_turn(message, history, flow).await {
            Ok(classification) => classification,
            Err(error) => {
                warn!(
                    event_name = "routing.turn_classifier_failed",
                    classifier = self.turn_classifier.name(),
                    flow = flow.marker(),
                    error = %error,
                    "turn classification failed, falling back"
                );
                self.fallback_turn(message, history, flow).await
            }
        }
    }

    async fn fallback_turn(
        &self,
        message: &str,
        history: &[ChatMessage],
        flow: FlowKind,
    ) -> TurnClassification {
        if let Ok(classification) = self.turn_fallback.classify_turn(message, history, flow).await {
            info!(
                event_name = "routing.turn_fallback_applied",
                classifier = self.turn_fallback.name(),
                flow = flow.marker(),
                "fallback classified turn as flow answer"
            );
            return classification;
        }

        match self.classify_intent(message, history).await {
            Intent::ChitChat => TurnClassification::continues(flow),
            intent => TurnClassification::new(TurnCategory::InterruptsFlow, intent),
        }
    }

    async fn classify_intent(&self, message: &str, history: &[ChatMessage]) -> Intent {
        let recent = &history[history.len().saturating_sub(INTENT_HISTORY_WINDOW)..];

        let primary_error = match self.intent_classifier.classify_intent(message, recent).await {
            Ok(intent) => return intent,
            Err(error) => error,
        };
        warn!(
            event_name = "routing.intent_classifier_failed",
            classifier = self.intent_classifier.name(),
            error = %primary_error,
            "intent classification failed, falling back"
        );

        match self.intent_fallback.classify_intent(message, recent).await {
            Ok(intent) => intent,
            Err(error) => {
                warn!(
                    event_name = "routing.intent_fallback_failed",
                    classifier = self.intent_fallback.name(),
                    error = %error,
                    "intent fallback failed, treating turn as chit-chat"
                );
                Intent::ChitChat
            }
        }
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

/// Lowercases and strips Spanish diacritics so keyword tables stay ASCII.
pub(crate) fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|character| match character {
            'á' | 'à' | 'ä' => 'a',
            'é' | 'è' | 'ë' => 'e',
            'í' | 'ì' | 'ï' => 'i',
            'ó' | 'ò' | 'ö' => 'o',
            'ú' | 'ù' | 'ü' => 'u',
            other => other,
        })
        .collect()
}

pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.split(|character: char| !(character.is_alphanumeric() || character == '.'))
        .map(|token| token.trim_matches('.'))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use aquaroute_core::domain::flow::{FlowKind, Intent, TurnCategory, TurnClassification};

    use super::{
        parse_turn_analysis, HeuristicTurnClassifier, KeywordIntentClassifier, TurnAnalyzer,
    };
    use crate::llm::ChatMessage;
    use crate::prompts::PromptRenderer;
    use crate::testing::ScriptedLlm;

    fn analyzer(llm: Arc<ScriptedLlm>) -> TurnAnalyzer {
        TurnAnalyzer::with_llm(llm, Arc::new(PromptRenderer::new().expect("templates")))
    }

    #[test]
    fn parses_fenced_turn_analysis() {
        let raw = "```json\n{\"classification\": \"INTERRUPTION\", \"detected_intent\": \"FAQ\"}\n```";
        let parsed = parse_turn_analysis(raw, FlowKind::StopDelivery).expect("parse");
        assert_eq!(
            parsed,
            TurnClassification::new(TurnCategory::InterruptsFlow, Intent::GeneralQuestion)
        );

        let answer = parse_turn_analysis(
            "{\"classification\": \"ANSWER_FLOW\", \"detected_intent\": \"CHAT\"}",
            FlowKind::UrgentNotice,
        )
        .expect("parse");
        assert_eq!(answer, TurnClassification::continues(FlowKind::UrgentNotice));

        assert!(parse_turn_analysis("sure, it's an answer", FlowKind::StopDelivery).is_err());
        assert!(parse_turn_analysis("{\"classification\": \"MAYBE\"}", FlowKind::StopDelivery)
            .is_err());
    }

    #[test]
    fn heuristic_matches_whole_words_only() {
        let heuristic = HeuristicTurnClassifier::new();
        assert!(heuristic.looks_like_answer("Sí, cámbialo por minis"));
        assert!(heuristic.looks_like_answer("Vale"));
        assert!(heuristic.looks_like_answer("3.5"));
        assert!(!heuristic.looks_like_answer("¿Dónde están vuestras oficinas?"));
        assert!(!heuristic.looks_like_answer("casino"), "`si`/`no` inside words do not count");
    }

    #[test]
    fn float_spellings_are_not_quantities() {
        let heuristic = HeuristicTurnClassifier::new();
        for message in ["nan", "inf", "Infinity", "NaN?", "1e3"] {
            assert!(!heuristic.looks_like_answer(message), "{message} should not be an answer");
        }
        assert!(heuristic.looks_like_answer("quiero 2 cajas"));
        assert!(heuristic.looks_like_answer("12.5"));
    }

    #[test]
    fn keyword_intents_cover_the_fixed_label_set() {
        let keywords = KeywordIntentClassifier::new();
        assert_eq!(keywords.classify("Me he quedado sin agua, es urgente"), Intent::UrgentNotice);
        assert_eq!(keywords.classify("Quiero pausar el reparto"), Intent::StopDelivery);
        assert_eq!(keywords.classify("¿Cuánto cuesta el agua?"), Intent::GeneralQuestion);
        assert_eq!(keywords.classify("hola, buenas"), Intent::ChitChat);
    }

    #[tokio::test]
    async fn no_flow_uses_intent_classifier_with_recent_history() {
        let llm = Arc::new(ScriptedLlm::new(["STOP_DELIVERY"]));
        let history = vec![
            ChatMessage::user("primer mensaje antiguo"),
            ChatMessage::assistant("hola"),
            ChatMessage::user("quiero parar"),
        ];

        let classification = analyzer(llm.clone()).analyze("el reparto", &history, None).await;

        assert_eq!(classification, TurnClassification::no_flow(Intent::StopDelivery));
        let prompts = llm.prompts();
        assert!(!prompts[0].contains("primer mensaje antiguo"));
        assert!(prompts[0].contains("user: quiero parar"));
    }

    #[tokio::test]
    async fn classifier_failure_with_answer_keyword_continues_flow() {
        let llm = Arc::new(ScriptedLlm::failing());

        let classification =
            analyzer(llm).analyze("si, vale", &[], Some(FlowKind::StopDelivery)).await;

        assert_eq!(classification, TurnClassification::continues(FlowKind::StopDelivery));
    }

    #[tokio::test]
    async fn unparsable_output_falls_back_to_intent_as_interruption() {
        let llm = Arc::new(ScriptedLlm::new(["I think it is a question", "FAQ"]));

        let classification = analyzer(llm)
            .analyze("¿Cuál es el horario de atención?", &[], Some(FlowKind::UrgentNotice))
            .await;

        assert_eq!(
            classification,
            TurnClassification::new(TurnCategory::InterruptsFlow, Intent::GeneralQuestion)
        );
    }

    #[tokio::test]
    async fn fallback_chit_chat_keeps_the_flow() {
        let llm = Arc::new(ScriptedLlm::new(["not json", "CHAT"]));

        let classification =
            analyzer(llm).analyze("jajaja", &[], Some(FlowKind::StopDelivery)).await;

        assert_eq!(classification, TurnClassification::continues(FlowKind::StopDelivery));
    }

    #[tokio::test]
    async fn total_collaborator_outage_still_classifies() {
        let llm = Arc::new(ScriptedLlm::failing());

        let no_flow = analyzer(llm.clone()).analyze("¿precio de la garrafa?", &[], None).await;
        assert_eq!(no_flow, TurnClassification::no_flow(Intent::GeneralQuestion));

        let in_flow = analyzer(llm)
            .analyze("necesito agua urgente", &[], Some(FlowKind::StopDelivery))
            .await;
        assert_eq!(
            in_flow,
            TurnClassification::new(TurnCategory::InterruptsFlow, Intent::UrgentNotice)
        );
    }

    #[tokio::test]
    async fn switch_reports_the_new_process() {
        let llm = Arc::new(ScriptedLlm::new([
            "{\"classification\": \"NEW_INTENT\", \"detected_intent\": \"URGENT_NOTICE\"}",
        ]));

        let classification = analyzer(llm)
            .analyze("olvídalo, quiero un aviso urgente", &[], Some(FlowKind::StopDelivery))
            .await;

        assert_eq!(
            classification,
            TurnClassification::new(TurnCategory::SwitchesIntent, Intent::UrgentNotice)
        );
    }
}
