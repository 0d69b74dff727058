use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::decision::Decision;
use crate::domain::facts::FactContext;
use crate::domain::flow::FlowKind;
use crate::rules::{MissingInfo, Rule, RuleSet};

/// The rule that fired for a context, with its id kept for the decision trace.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchedRule<'a> {
    pub rule_id: &'a str,
    pub decision: &'a Decision,
}

/// Pure evaluation of a fact context against one process's rule set.
///
/// Cheap to clone; the rule set is shared read-only between clones.
#[derive(Clone, Debug)]
pub struct RuleEngine {
    rule_set: Arc<RuleSet>,
}

impl RuleEngine {
    pub fn new(rule_set: RuleSet) -> Self {
        Self { rule_set: Arc::new(rule_set) }
    }

    pub fn process(&self) -> FlowKind {
        self.rule_set.process()
    }

    pub fn rule_set(&self) -> &RuleSet {
        &self.rule_set
    }

    /// Decision of the highest-priority rule whose every condition holds.
    pub fn evaluate(&self, context: &FactContext) -> Option<&Decision> {
        self.evaluate_rule(context).map(|matched| matched.decision)
    }

    pub fn evaluate_rule(&self, context: &FactContext) -> Option<MatchedRule<'_>> {
        debug!(
            event_name = "rules.evaluate",
            flow = %self.process(),
            fact_count = context.len(),
            "evaluating rule set"
        );

        let matched = self.rule_set.rules().iter().find(|rule| rule.matches(context))?;
        info!(
            event_name = "rules.matched",
            flow = %self.process(),
            rule_id = %matched.id,
            priority = matched.priority,
            "rule matched"
        );
        Some(as_matched(matched))
    }

    /// First required field, in declaration order, that has no usable value.
    ///
    /// `None` only means collection is finished; a rule may still not match.
    pub fn get_missing_info(&self, context: &FactContext) -> Option<MissingInfo> {
        let field = self
            .rule_set
            .required_fields()
            .iter()
            .find(|field| !context.has_value(field))?;

        let (question, options) = match self.rule_set.question_for(field) {
            Some(definition) => (definition.question.clone(), definition.options.clone()),
            None => (format!("Please provide {field}"), Vec::new()),
        };

        Some(MissingInfo { field: field.clone(), question, options })
    }
}

fn as_matched(rule: &Rule) -> MatchedRule<'_> {
    MatchedRule { rule_id: &rule.id, decision: &rule.decision }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::RuleEngine;
    use crate::domain::facts::FactContext;
    use crate::domain::flow::FlowKind;
    use crate::rules::RuleSet;

    const STOP_RULES: &str = r#"{
        "process": "STOP_DELIVERY",
        "required_fields": ["motivo", "scoring"],
        "field_types": {"scoring": "number"},
        "rules": [
            {"id": "low-generic", "priority": 10,
             "when": {"motivo": "exceso_agua"},
             "then": {"decision": "REVISION", "reason": "generic", "allowed_actions": []}},
            {"id": "high-specific", "priority": 50,
             "when": {"motivo": "exceso_agua", "scoring": {"min": 3}},
             "then": {"decision": "APROBADA", "reason": "buen cliente",
                      "allowed_actions": ["PAUSAR_REPARTO"], "plazo_dias": 2}},
            {"id": "tie-first", "priority": 5,
             "when": {"motivo": "vacaciones"},
             "then": {"decision": "PRIMERA", "reason": "declared first"}},
            {"id": "tie-second", "priority": 5,
             "when": {"motivo": "vacaciones"},
             "then": {"decision": "SEGUNDA", "reason": "declared second"}},
            {"id": "bottles", "priority": 1,
             "when": {"motivo": "cambio_plan", "botellas": {"min": 2}},
             "then": {"decision": "CAMBIO", "reason": "suficientes botellas"}},
            {"id": "flag", "priority": 1,
             "when": {"motivo": "cierre", "zona_apta": true},
             "then": {"decision": "CIERRE", "reason": "zona apta"}}
        ],
        "missing_info_behavior": {"questions": {
            "motivo": {"question": "¿Cuál es el motivo?",
                       "options": [{"value": "exceso_agua", "label": "Exceso de agua"}]}
        }}
    }"#;

    fn engine() -> RuleEngine {
        RuleEngine::new(
            RuleSet::from_json_str(STOP_RULES, "inline", FlowKind::StopDelivery)
                .expect("fixture rule set should load"),
        )
    }

    fn decision_label(engine: &RuleEngine, context: &FactContext) -> Option<String> {
        engine.evaluate(context).map(|decision| decision.decision.clone())
    }

    #[test]
    fn higher_priority_rule_wins_over_overlapping_rule() {
        let engine = engine();
        let context = FactContext::new().with("motivo", "exceso_agua").with("scoring", 3.5);

        let matched = engine.evaluate_rule(&context).expect("a rule should match");
        assert_eq!(matched.rule_id, "high-specific");
        assert_eq!(matched.decision.allowed_actions, vec!["PAUSAR_REPARTO".to_string()]);
        assert_eq!(matched.decision.extra.get("plazo_dias"), Some(&serde_json::json!(2)));

        let low_scoring = FactContext::new().with("motivo", "exceso_agua").with("scoring", 1.0);
        assert_eq!(decision_label(&engine, &low_scoring).as_deref(), Some("REVISION"));
    }

    #[test]
    fn shipped_stop_rules_leave_no_scoring_gap_below_three() {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../rules/stop_delivery.json");
        let engine = RuleEngine::new(
            RuleSet::load(&path, FlowKind::StopDelivery).expect("shipped rule set should load"),
        );
        let matched = |scoring: f64| {
            let context = FactContext::new().with("motivo", "exceso_agua").with("scoring", scoring);
            engine.evaluate_rule(&context).map(|matched| matched.rule_id.to_string())
        };

        assert_eq!(matched(2.995).as_deref(), Some("STOP_EXCESO_AGUA_SCORING_BAJO"));
        assert_eq!(matched(0.0).as_deref(), Some("STOP_EXCESO_AGUA_SCORING_BAJO"));
        assert_eq!(matched(3.0).as_deref(), Some("STOP_EXCESO_AGUA_SCORING_ALTO"));
    }

    #[test]
    fn equal_priorities_fall_back_to_declaration_order() {
        let context = FactContext::new().with("motivo", "vacaciones");
        assert_eq!(decision_label(&engine(), &context).as_deref(), Some("PRIMERA"));
    }

    #[test]
    fn missing_fact_never_matches() {
        let engine = engine();
        let context = FactContext::new().with("motivo", "cambio_plan");
        assert_eq!(decision_label(&engine, &context), None);

        let cierre = FactContext::new().with("motivo", "cierre");
        assert_eq!(decision_label(&engine, &cierre), None);
    }

    #[test]
    fn range_conditions_read_numbers_out_of_text() {
        let engine = engine();
        let enough = FactContext::new().with("motivo", "cambio_plan").with("botellas", "3 botellas");
        assert_eq!(decision_label(&engine, &enough).as_deref(), Some("CAMBIO"));

        let none = FactContext::new().with("motivo", "cambio_plan").with("botellas", "sin botellas");
        assert_eq!(decision_label(&engine, &none), None);

        let boolean = FactContext::new().with("motivo", "cambio_plan").with("botellas", true);
        assert_eq!(decision_label(&engine, &boolean), None);
    }

    #[test]
    fn exact_conditions_do_not_coerce_types() {
        let engine = engine();
        let as_text = FactContext::new().with("motivo", "cierre").with("zona_apta", "true");
        assert_eq!(decision_label(&engine, &as_text), None);

        let as_bool = FactContext::new().with("motivo", "cierre").with("zona_apta", true);
        assert_eq!(decision_label(&engine, &as_bool).as_deref(), Some("CIERRE"));
    }

    #[test]
    fn evaluation_is_idempotent() {
        let engine = engine();
        let context = FactContext::new().with("motivo", "exceso_agua").with("scoring", 4.0);
        let snapshot = context.clone();

        let first = engine.evaluate(&context).cloned();
        let second = engine.evaluate(&context).cloned();
        assert_eq!(first, second);
        assert_eq!(context, snapshot);
    }

    #[test]
    fn missing_info_walks_required_fields_in_order() {
        let engine = engine();

        let first = engine.get_missing_info(&FactContext::new()).expect("motivo is missing");
        assert_eq!(first.field, "motivo");
        assert_eq!(first.question, "¿Cuál es el motivo?");
        assert_eq!(first.options.len(), 1);

        let blank = FactContext::new().with("motivo", "").with("scoring", 2.0);
        assert_eq!(engine.get_missing_info(&blank).map(|info| info.field).as_deref(), Some("motivo"));

        let second = engine
            .get_missing_info(&FactContext::new().with("motivo", "exceso_agua"))
            .expect("scoring is missing");
        assert_eq!(second.field, "scoring");
        assert_eq!(second.question, "Please provide scoring");
        assert!(second.options.is_empty());

        let complete = FactContext::new().with("motivo", "otro").with("scoring", 0.0);
        assert_eq!(engine.get_missing_info(&complete), None);
        assert_eq!(engine.evaluate(&complete), None);
    }

    #[test]
    fn supplied_field_is_never_reported_missing_again() {
        let engine = engine();
        let mut context = FactContext::new();

        for _ in 0..engine.rule_set().required_fields().len() {
            let missing = engine.get_missing_info(&context).expect("still collecting");
            context.insert(missing.field.clone(), "valor");
            let next = engine.get_missing_info(&context);
            assert_ne!(next.map(|info| info.field), Some(missing.field));
        }
        assert_eq!(engine.get_missing_info(&context), None);
    }
}
