use std::fs;

use aquaroute_core::config::{AppConfig, LoadOptions};
use aquaroute_core::{FlowKind, RuleSet};
use serde::Serialize;

use super::{CommandResult, EXIT_DOCTOR};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Warn,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    run_with(LoadOptions::default(), json_output)
}

pub fn run_with(options: LoadOptions, json_output: bool) -> CommandResult {
    let report = build_report(options);
    let exit_code = if report.overall_status == CheckStatus::Fail { EXIT_DOCTOR } else { 0 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report(options: LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options) {
        Ok(config) => {
            checks.push(check(
                "config_validation",
                CheckStatus::Pass,
                "configuration loaded and validated",
            ));
            for flow in FlowKind::ALL {
                checks.push(check_rule_set(&config, flow));
            }
            for flow in FlowKind::ALL {
                checks.push(check_policy_text(&config, flow));
            }
            checks.push(check_collaborators(&config));
        }
        Err(error) => {
            checks.push(check("config_validation", CheckStatus::Fail, error.to_string()));
            for name in ["rule_sets", "policy_texts", "collaborator_credentials"] {
                checks.push(check(
                    name,
                    CheckStatus::Skipped,
                    "skipped because configuration did not load",
                ));
            }
        }
    }

    let failed = checks
        .iter()
        .any(|check| matches!(check.status, CheckStatus::Fail | CheckStatus::Skipped));
    let warned = checks.iter().any(|check| check.status == CheckStatus::Warn);
    let (overall_status, summary) = match (failed, warned) {
        (true, _) => (CheckStatus::Fail, "doctor: one or more readiness checks failed"),
        (false, true) => (CheckStatus::Warn, "doctor: ready with warnings"),
        (false, false) => (CheckStatus::Pass, "doctor: all readiness checks passed"),
    };

    DoctorReport { overall_status, summary: summary.to_string(), checks }
}

fn check(name: &str, status: CheckStatus, details: impl Into<String>) -> DoctorCheck {
    DoctorCheck { name: name.to_string(), status, details: details.into() }
}

fn check_rule_set(config: &AppConfig, flow: FlowKind) -> DoctorCheck {
    let name = format!("rule_set.{}", flow.slug());
    let path = config.rules.rules_path(flow);
    match RuleSet::load(path, flow) {
        Ok(rule_set) => check(
            &name,
            CheckStatus::Pass,
            format!(
                "{} rules, required fields [{}] from `{}`",
                rule_set.rules().len(),
                rule_set.required_fields().join(", "),
                path.display()
            ),
        ),
        Err(error) => check(&name, CheckStatus::Fail, error.to_string()),
    }
}

/// Decisions are still worded without a manual, so absence only warns.
fn check_policy_text(config: &AppConfig, flow: FlowKind) -> DoctorCheck {
    let name = format!("policy_text.{}", flow.slug());
    let path = config.rules.policy_path(flow);
    match fs::read_to_string(path) {
        Ok(text) if !text.trim().is_empty() => check(
            &name,
            CheckStatus::Pass,
            format!("{} bytes from `{}`", text.len(), path.display()),
        ),
        Ok(_) => check(&name, CheckStatus::Warn, format!("`{}` is empty", path.display())),
        Err(error) => {
            check(&name, CheckStatus::Warn, format!("`{}` unreadable: {error}", path.display()))
        }
    }
}

fn check_collaborators(config: &AppConfig) -> DoctorCheck {
    match config.require_collaborators() {
        Ok(()) => check(
            "collaborator_credentials",
            CheckStatus::Pass,
            format!(
                "{:?} completion ({}), pinecone retrieval namespace `{}`",
                config.llm.provider, config.llm.model, config.retrieval.namespace
            ),
        ),
        Err(error) => check("collaborator_credentials", CheckStatus::Fail, error.to_string()),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Warn => "warn",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
