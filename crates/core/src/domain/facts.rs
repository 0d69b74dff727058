use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use serde::{Deserialize, Serialize};

/// A single known fact about the case being handled.
///
/// Values keep the type they arrived with: an exact-match rule condition never
/// coerces between text, numbers and booleans.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FactValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl FactValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Numeric view used by range conditions. Text yields the first signed
    /// decimal it contains (`"3 botellas"` -> 3.0); booleans never coerce.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Text(text) => first_number_in(text),
            Self::Bool(_) => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Self::Text(text) if text.trim().is_empty())
    }
}

impl fmt::Display for FactValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Number(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl From<&str> for FactValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FactValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for FactValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for FactValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

static SIGNED_DECIMAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?[0-9]+(?:\.[0-9]+)?").expect("valid decimal pattern"));

/// Parses the leftmost signed decimal in `text`, if any.
pub fn first_number_in(text: &str) -> Option<f64> {
    SIGNED_DECIMAL.find(text).and_then(|found| found.as_str().parse::<f64>().ok())
}

/// Everything known about the current case, keyed by field name.
///
/// Owned by the caller and passed in on every turn. A JSON `null` is treated
/// exactly like an absent key.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, Option<FactValue>>", into = "BTreeMap<String, FactValue>")]
pub struct FactContext {
    fields: BTreeMap<String, FactValue>,
}

impl FactContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<FactValue>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn get(&self, field: &str) -> Option<&FactValue> {
        self.fields.get(field)
    }

    /// Present and carrying something other than blank text.
    pub fn has_value(&self, field: &str) -> bool {
        self.fields.get(field).map(|value| !value.is_blank()).unwrap_or(false)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<FactValue>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Applies an incremental update, overwriting fields it names and leaving
    /// the rest untouched.
    pub fn merge(&mut self, updates: &FactContext) {
        for (field, value) in &updates.fields {
            self.fields.insert(field.clone(), value.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<BTreeMap<String, Option<FactValue>>> for FactContext {
    fn from(raw: BTreeMap<String, Option<FactValue>>) -> Self {
        let fields =
            raw.into_iter().filter_map(|(field, value)| value.map(|value| (field, value))).collect();
        Self { fields }
    }
}

impl From<FactContext> for BTreeMap<String, FactValue> {
    fn from(context: FactContext) -> Self {
        context.fields
    }
}

#[cfg(test)]
mod tests {
    use super::{first_number_in, FactContext, FactValue};

    #[test]
    fn extracts_leading_number_from_mixed_text() {
        assert_eq!(first_number_in("3 botellas"), Some(3.0));
        assert_eq!(first_number_in("quedan -2.5 garrafas"), Some(-2.5));
        assert_eq!(first_number_in("pedido 12. gracias"), Some(12.0));
        assert_eq!(first_number_in("sin botellas"), None);
        assert_eq!(FactValue::Bool(true).as_number(), None);
    }

    #[test]
    fn number_scan_takes_only_the_first_well_formed_decimal() {
        assert_eq!(first_number_in("-.5 litros"), Some(5.0));
        assert_eq!(first_number_in("12.34.56"), Some(12.34));
        assert_eq!(first_number_in("-2 cajas"), Some(-2.0));
        assert_eq!(first_number_in("nota 3,5"), Some(3.0));
        assert_eq!(first_number_in("٣ botellas"), None);
        assert_eq!(FactValue::text("scoring 4.2 de 5").as_number(), Some(4.2));
    }

    #[test]
    fn null_values_deserialize_as_absent() {
        let context: FactContext =
            serde_json::from_str(r#"{"motivo": null, "scoring": 3.5, "zona_apta": true}"#)
                .expect("context should parse");

        assert!(context.get("motivo").is_none());
        assert_eq!(context.get("scoring"), Some(&FactValue::Number(3.5)));
        assert_eq!(context.get("zona_apta"), Some(&FactValue::Bool(true)));
        assert_eq!(context.len(), 2);
    }

    #[test]
    fn blank_text_is_not_a_value() {
        let context = FactContext::new().with("motivo", "  ").with("plan", "mensual");
        assert!(!context.has_value("motivo"));
        assert!(context.has_value("plan"));
        assert!(!context.has_value("scoring"));
    }

    #[test]
    fn merge_only_touches_named_fields() {
        let mut context = FactContext::new().with("plan", "mensual").with("scoring", 2.0);
        context.merge(&FactContext::new().with("scoring", 4.0));

        assert_eq!(context.get("plan"), Some(&FactValue::text("mensual")));
        assert_eq!(context.get("scoring"), Some(&FactValue::Number(4.0)));
    }
}
