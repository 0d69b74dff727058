use std::sync::Arc;

use aquaroute_core::rules::{FieldOption, FieldType};
use aquaroute_core::{FactValue, MissingInfo};
use tracing::{debug, warn};

use crate::analyzer::normalize_text;
use crate::llm::LlmClient;
use crate::prompts::PromptRenderer;

/// Pulls the value for one pending field out of a free-text answer.
///
/// A collaborator failure, a `NULL` reply, an answer outside the declared
/// option set and a value that does not fit the field type all come back as
/// `None`: the field stays missing and is asked again.
pub struct FieldExtractor {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptRenderer>,
}

impl FieldExtractor {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: Arc<PromptRenderer>) -> Self {
        Self { llm, prompts }
    }

    pub async fn extract(
        &self,
        message: &str,
        missing: &MissingInfo,
        field_type: FieldType,
    ) -> Option<FactValue> {
        let raw = match self.request(message, missing).await {
            Ok(raw) => raw,
            Err(error) => {
                warn!(
                    event_name = "extraction.failed",
                    field = %missing.field,
                    error = %error,
                    "field extraction failed, treating as no value"
                );
                return None;
            }
        };

        let value = interpret_extraction(&raw, &missing.options, field_type);
        debug!(
            event_name = "extraction.completed",
            field = %missing.field,
            found = value.is_some(),
            "field extraction completed"
        );
        value
    }

    async fn request(&self, message: &str, missing: &MissingInfo) -> anyhow::Result<String> {
        let prompt = self.prompts.field_extraction(&missing.field, &missing.options, message)?;
        self.llm.generate(&prompt, &[]).await
    }
}

pub fn interpret_extraction(
    raw: &str,
    options: &[FieldOption],
    field_type: FieldType,
) -> Option<FactValue> {
    let cleaned = raw.replace(['"', '\''], "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned.to_ascii_uppercase().contains("NULL") {
        return None;
    }

    if options.is_empty() {
        field_type.coerce(cleaned)
    } else {
        match_option(cleaned, options).and_then(|value| field_type.coerce(value))
    }
}

fn match_option<'a>(answer: &str, options: &'a [FieldOption]) -> Option<&'a str> {
    let normalized = normalize_text(answer);
    options
        .iter()
        .find(|option| {
            normalize_text(&option.value) == normalized || normalize_text(&option.label) == normalized
        })
        .map(|option| option.value.as_str())
}

/// Keyword lookup for a single field, tried when extraction comes back empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeywordInference {
    field: String,
    table: Vec<(String, String)>,
}

impl KeywordInference {
    pub fn new<'a>(
        field: impl Into<String>,
        table: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        Self {
            field: field.into(),
            table: table
                .into_iter()
                .map(|(keyword, value)| (normalize_text(keyword), value.to_string()))
                .collect(),
        }
    }

    pub fn infer(&self, field: &str, message: &str) -> Option<FactValue> {
        if field != self.field {
            return None;
        }
        let normalized = normalize_text(message);
        self.table
            .iter()
            .find(|(keyword, _)| normalized.contains(keyword.as_str()))
            .map(|(_, value)| FactValue::text(value.clone()))
    }
}
