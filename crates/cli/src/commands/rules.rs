use aquaroute_core::config::{AppConfig, LoadOptions};
use aquaroute_core::{Decision, FactContext, FlowKind, MissingInfo, RuleEngine, RuleSet};
use serde::Serialize;

use super::{CommandResult, EXIT_CONFIG, EXIT_INPUT, EXIT_RULE_SET};

#[derive(Debug, Serialize)]
struct RuleSetReport {
    process: FlowKind,
    path: String,
    rule_count: usize,
    required_fields: Vec<String>,
}

#[derive(Debug, Serialize)]
struct EvaluationReport {
    process: FlowKind,
    complete: bool,
    missing_info: Option<MissingInfo>,
    matched_rule: Option<String>,
    decision: Option<Decision>,
}

pub fn check() -> CommandResult {
    check_with(LoadOptions::default())
}

pub fn check_with(options: LoadOptions) -> CommandResult {
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "rules.check",
                "config_validation",
                error.to_string(),
                EXIT_CONFIG,
            )
        }
    };

    let mut reports = Vec::new();
    for flow in FlowKind::ALL {
        let path = config.rules.rules_path(flow);
        match RuleSet::load(path, flow) {
            Ok(rule_set) => reports.push(RuleSetReport {
                process: flow,
                path: path.display().to_string(),
                rule_count: rule_set.rules().len(),
                required_fields: rule_set.required_fields().to_vec(),
            }),
            Err(error) => {
                return CommandResult::failure(
                    "rules.check",
                    "rule_set_invalid",
                    error.to_string(),
                    EXIT_RULE_SET,
                )
            }
        }
    }

    let message = reports
        .iter()
        .map(|report| format!("{}: {} rules", report.process.slug(), report.rule_count))
        .collect::<Vec<_>>()
        .join(", ");
    CommandResult::success_with("rules.check", message, Some(reports))
}

pub fn evaluate(process: FlowKind, facts: &str) -> CommandResult {
    evaluate_with(LoadOptions::default(), process, facts)
}

/// Offline dry-run: the same `get_missing_info` / `evaluate` pair a live turn uses.
pub fn evaluate_with(options: LoadOptions, process: FlowKind, facts: &str) -> CommandResult {
    let context: FactContext = match serde_json::from_str(facts) {
        Ok(context) => context,
        Err(error) => {
            return CommandResult::failure(
                "rules.evaluate",
                "invalid_facts",
                format!("facts must be a JSON object of strings, numbers or booleans: {error}"),
                EXIT_INPUT,
            )
        }
    };

    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "rules.evaluate",
                "config_validation",
                error.to_string(),
                EXIT_CONFIG,
            )
        }
    };
    let engine = match RuleSet::load(config.rules.rules_path(process), process) {
        Ok(rule_set) => RuleEngine::new(rule_set),
        Err(error) => {
            return CommandResult::failure(
                "rules.evaluate",
                "rule_set_invalid",
                error.to_string(),
                EXIT_RULE_SET,
            )
        }
    };

    let missing_info = engine.get_missing_info(&context);
    let matched = match missing_info {
        Some(_) => None,
        None => engine.evaluate_rule(&context),
    };
    let message = match (&missing_info, &matched) {
        (Some(missing), _) => format!("missing field `{}`", missing.field),
        (None, Some(matched)) => format!("rule `{}` matched", matched.rule_id),
        (None, None) => "no rule matched".to_string(),
    };

    let report = EvaluationReport {
        process,
        complete: missing_info.is_none(),
        matched_rule: matched.as_ref().map(|matched| matched.rule_id.to_string()),
        decision: matched.map(|matched| matched.decision.clone()),
        missing_info,
    };
    CommandResult::success_with("rules.evaluate", message, Some(report))
}
