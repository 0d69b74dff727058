//! Declarative rule sets: one JSON document per structured process.
//!
//! A document is parsed into loosely shaped records first and then validated
//! into a [`RuleSet`], so every malformed file is rejected at load time rather
//! than surfacing as a silent non-match mid-conversation.

pub mod engine;

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::decision::Decision;
use crate::domain::facts::{first_number_in, FactContext, FactValue};
use crate::domain::flow::FlowKind;

pub use engine::{MatchedRule, RuleEngine};

#[derive(Debug, Error)]
pub enum RuleSetError {
    #[error("could not read rule set `{path}`: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("could not parse rule set `{origin}`: {source}")]
    Parse { origin: String, source: serde_json::Error },
    #[error("rule set `{origin}` declares process `{found}` but {expected} was expected")]
    ProcessMismatch { origin: String, expected: FlowKind, found: String },
    #[error("rule set `{origin}` is invalid: {message}")]
    Validation { origin: String, message: String },
}

/// Numeric constraint; either bound may be omitted but not both.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NumericRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl NumericRange {
    pub fn contains(&self, value: f64) -> bool {
        self.min.map(|min| value >= min).unwrap_or(true)
            && self.max.map(|max| value <= max).unwrap_or(true)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    Range(NumericRange),
    Exact(FactValue),
}

impl Condition {
    /// A missing fact never satisfies a condition.
    pub fn matches(&self, value: Option<&FactValue>) -> bool {
        let Some(value) = value else {
            return false;
        };
        match self {
            Self::Exact(expected) => value == expected,
            Self::Range(range) => {
                value.as_number().map(|number| range.contains(number)).unwrap_or(false)
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    #[default]
    Text,
    Number,
    Boolean,
}

impl FieldType {
    /// Converts a raw extracted answer into a fact of this type.
    pub fn coerce(self, raw: &str) -> Option<FactValue> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        match self {
            Self::Text => Some(FactValue::text(trimmed)),
            Self::Number => first_number_in(trimmed).map(FactValue::Number),
            Self::Boolean => parse_boolean(trimmed).map(FactValue::Bool),
        }
    }

    fn accepts(self, value: &FactValue) -> bool {
        matches!(
            (self, value),
            (Self::Text, FactValue::Text(_))
                | (Self::Number, FactValue::Number(_))
                | (Self::Boolean, FactValue::Bool(_))
        )
    }
}

fn parse_boolean(raw: &str) -> Option<bool> {
    let normalized = raw.to_lowercase();
    let first_word = normalized
        .split(|character: char| !character.is_alphanumeric())
        .find(|word| !word.is_empty())?;
    match first_word {
        "si" | "sí" | "yes" | "true" | "vale" | "claro" | "correcto" => Some(true),
        "no" | "false" | "nunca" => Some(false),
        _ => None,
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOption {
    pub value: String,
    pub label: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionDefinition {
    pub question: String,
    #[serde(default)]
    pub options: Vec<FieldOption>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Rule {
    pub id: String,
    pub priority: i64,
    pub conditions: BTreeMap<String, Condition>,
    pub decision: Decision,
}

impl Rule {
    /// Conjunctive match across every listed field.
    pub fn matches(&self, context: &FactContext) -> bool {
        self.conditions.iter().all(|(field, condition)| condition.matches(context.get(field)))
    }
}

/// The next piece of information a flow has to ask for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingInfo {
    pub field: String,
    pub question: String,
    pub options: Vec<FieldOption>,
}

/// Immutable, priority-ordered rules for exactly one process.
#[derive(Clone, Debug, PartialEq)]
pub struct RuleSet {
    process: FlowKind,
    rules: Vec<Rule>,
    required_fields: Vec<String>,
    field_types: BTreeMap<String, FieldType>,
    questions: BTreeMap<String, QuestionDefinition>,
}

impl RuleSet {
    pub fn load(path: &Path, expected: FlowKind) -> Result<Self, RuleSetError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| RuleSetError::Read { path: path.to_path_buf(), source })?;
        Self::from_json_str(&raw, &path.display().to_string(), expected)
    }

    pub fn from_json_str(
        raw: &str,
        origin: &str,
        expected: FlowKind,
    ) -> Result<Self, RuleSetError> {
        let document = serde_json::from_str::<RuleSetDocument>(raw)
            .map_err(|source| RuleSetError::Parse { origin: origin.to_string(), source })?;

        let process = document.process.parse::<FlowKind>().ok();
        if process != Some(expected) {
            return Err(RuleSetError::ProcessMismatch {
                origin: origin.to_string(),
                expected,
                found: document.process,
            });
        }

        let invalid =
            |message: String| RuleSetError::Validation { origin: origin.to_string(), message };

        if document.required_fields.is_empty() {
            return Err(invalid("required_fields must list at least one field".to_string()));
        }
        let mut seen_fields = BTreeSet::new();
        for field in &document.required_fields {
            if field.trim().is_empty() {
                return Err(invalid("required_fields contains an empty name".to_string()));
            }
            if !seen_fields.insert(field.as_str()) {
                return Err(invalid(format!("required field `{field}` is listed twice")));
            }
        }

        for (field, definition) in &document.missing_info_behavior.questions {
            if !seen_fields.contains(field.as_str()) {
                return Err(invalid(format!(
                    "question declared for `{field}` which is not a required field"
                )));
            }
            let mut seen_values = BTreeSet::new();
            for option in &definition.options {
                if !seen_values.insert(option.value.as_str()) {
                    return Err(invalid(format!(
                        "field `{field}` declares option `{}` twice",
                        option.value
                    )));
                }
            }
        }

        let mut seen_ids = BTreeSet::new();
        let mut rules = Vec::with_capacity(document.rules.len());
        for rule in document.rules {
            if !seen_ids.insert(rule.id.clone()) {
                return Err(invalid(format!("rule id `{}` is used twice", rule.id)));
            }
            for (field, condition) in &rule.when {
                validate_condition(&rule.id, field, condition, document.field_types.get(field))
                    .map_err(invalid)?;
            }
            rules.push(Rule {
                id: rule.id,
                priority: rule.priority,
                conditions: rule.when,
                decision: rule.then,
            });
        }

        // Stable: equal priorities keep declaration order.
        rules.sort_by(|left, right| right.priority.cmp(&left.priority));

        Ok(Self {
            process: expected,
            rules,
            required_fields: document.required_fields,
            field_types: document.field_types,
            questions: document.missing_info_behavior.questions,
        })
    }

    pub fn process(&self) -> FlowKind {
        self.process
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn required_fields(&self) -> &[String] {
        &self.required_fields
    }

    pub fn field_type(&self, field: &str) -> FieldType {
        self.field_types.get(field).copied().unwrap_or_default()
    }

    pub fn question_for(&self, field: &str) -> Option<&QuestionDefinition> {
        self.questions.get(field)
    }
}

fn validate_condition(
    rule_id: &str,
    field: &str,
    condition: &Condition,
    declared: Option<&FieldType>,
) -> Result<(), String> {
    match condition {
        Condition::Range(range) => {
            if range.min.is_none() && range.max.is_none() {
                return Err(format!("rule `{rule_id}` has a range on `{field}` without bounds"));
            }
            if let (Some(min), Some(max)) = (range.min, range.max) {
                if min > max {
                    return Err(format!(
                        "rule `{rule_id}` has an empty range on `{field}` (min {min} > max {max})"
                    ));
                }
            }
            if matches!(declared, Some(FieldType::Text) | Some(FieldType::Boolean)) {
                return Err(format!(
                    "rule `{rule_id}` applies a numeric range to non-numeric field `{field}`"
                ));
            }
        }
        Condition::Exact(value) => {
            if let Some(field_type) = declared {
                if !field_type.accepts(value) {
                    return Err(format!(
                        "rule `{rule_id}` compares `{field}` against `{value}` which is not a {field_type:?} value"
                    ));
                }
            }
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct RuleSetDocument {
    process: String,
    #[serde(default)]
    rules: Vec<RuleDocument>,
    #[serde(default)]
    required_fields: Vec<String>,
    #[serde(default)]
    field_types: BTreeMap<String, FieldType>,
    #[serde(default)]
    missing_info_behavior: MissingInfoBehavior,
}

#[derive(Debug, Deserialize)]
struct RuleDocument {
    id: String,
    #[serde(default)]
    priority: i64,
    #[serde(default)]
    when: BTreeMap<String, Condition>,
    then: Decision,
}

#[derive(Debug, Default, Deserialize)]
struct MissingInfoBehavior {
    #[serde(default)]
    questions: BTreeMap<String, QuestionDefinition>,
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::{Condition, FieldType, NumericRange, RuleSet, RuleSetError};
    use crate::domain::facts::FactValue;
    use crate::domain::flow::FlowKind;

    const BASE: &str = r#"{
        "process": "STOP_DELIVERY",
        "required_fields": ["motivo", "scoring"],
        "field_types": {"scoring": "number"},
        "rules": [
            {"id": "R1", "when": {"motivo": "vacaciones"},
             "then": {"decision": "APROBADA", "reason": "pausa estacional"}}
        ],
        "missing_info_behavior": {"questions": {"motivo": {"question": "¿Por qué?",
            "options": [{"value": "vacaciones", "label": "Vacaciones"}]}}}
    }"#;

    fn load(raw: &str) -> Result<RuleSet, RuleSetError> {
        RuleSet::from_json_str(raw, "inline", FlowKind::StopDelivery)
    }

    fn validation_message(raw: &str) -> String {
        match load(raw) {
            Err(RuleSetError::Validation { message, .. }) => message,
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn loads_well_formed_document() {
        let rule_set = load(BASE).expect("rule set should load");
        assert_eq!(rule_set.process(), FlowKind::StopDelivery);
        assert_eq!(rule_set.rules().len(), 1);
        assert_eq!(rule_set.rules()[0].priority, 0);
        assert!(rule_set.rules()[0].decision.allowed_actions.is_empty());
        assert_eq!(rule_set.field_type("scoring"), FieldType::Number);
        assert_eq!(rule_set.field_type("motivo"), FieldType::Text);
    }

    #[test]
    fn conditions_parse_into_exact_or_range() {
        let range: Condition = serde_json::from_str(r#"{"min": 2}"#).expect("range");
        assert_eq!(range, Condition::Range(NumericRange { min: Some(2.0), max: None }));

        let exact: Condition = serde_json::from_str(r#""exceso_agua""#).expect("exact");
        assert_eq!(exact, Condition::Exact(FactValue::text("exceso_agua")));

        assert!(serde_json::from_str::<Condition>(r#"{"minimum": 2}"#).is_err());
    }

    #[test]
    fn rejects_mismatched_process() {
        let error = RuleSet::from_json_str(BASE, "inline", FlowKind::UrgentNotice)
            .expect_err("process mismatch must be fatal");
        assert!(matches!(error, RuleSetError::ProcessMismatch { expected: FlowKind::UrgentNotice, .. }));
    }

    #[test]
    fn rejects_unparsable_json() {
        assert!(matches!(load("{not json"), Err(RuleSetError::Parse { .. })));
        assert!(matches!(
            load(r#"{"process": "STOP_DELIVERY", "rules": [{"id": "R1", "when": {"x": {"foo": 1}}, "then": {"decision": "A", "reason": "r"}}]}"#),
            Err(RuleSetError::Parse { .. })
        ));
    }

    #[test]
    fn rejects_structural_mistakes() {
        assert!(validation_message(&BASE.replace(r#"["motivo", "scoring"]"#, "[]"))
            .contains("at least one field"));
        assert!(validation_message(&BASE.replace(r#"["motivo", "scoring"]"#, r#"["motivo", "motivo"]"#))
            .contains("listed twice"));
        assert!(validation_message(&BASE.replace(r#""vacaciones"}"#, r#"{}}"#))
            .contains("without bounds"));
        assert!(validation_message(&BASE.replace(r#""vacaciones"}"#, r#"{"min": 5, "max": 1}}"#))
            .contains("empty range"));
        assert!(validation_message(&BASE.replace(r#"{"motivo": "vacaciones"}"#, r#"{"scoring": "alto"}"#))
            .contains("not a Number value"));
        assert!(validation_message(&BASE.replace(r#"{"questions": {"motivo""#, r#"{"questions": {"zona""#))
            .contains("not a required field"));
    }

    #[test]
    fn coerces_extracted_answers_by_declared_type() {
        assert_eq!(FieldType::Number.coerce("unas 3 botellas"), Some(FactValue::Number(3.0)));
        assert_eq!(FieldType::Number.coerce("ninguna"), None);
        assert_eq!(FieldType::Boolean.coerce("Sí, claro"), Some(FactValue::Bool(true)));
        assert_eq!(FieldType::Boolean.coerce("no"), Some(FactValue::Bool(false)));
        assert_eq!(FieldType::Boolean.coerce("quizás"), None);
        assert_eq!(FieldType::Text.coerce("  vacaciones "), Some(FactValue::text("vacaciones")));
        assert_eq!(FieldType::Text.coerce("   "), None);
    }

    #[test]
    fn load_reads_from_disk_and_reports_missing_files() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("rules.json");
        fs::write(&path, BASE).expect("write rules");

        assert!(RuleSet::load(&path, FlowKind::StopDelivery).is_ok());
        assert!(matches!(
            RuleSet::load(&dir.path().join("absent.json"), FlowKind::StopDelivery),
            Err(RuleSetError::Read { .. })
        ));
    }
}
