use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::bootstrap::RuleSetSummary;

#[derive(Clone)]
pub struct HealthState {
    rule_sets: Vec<RuleSetSummary>,
}

impl HealthState {
    pub fn new(rule_sets: Vec<RuleSetSummary>) -> Self {
        Self { rule_sets }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub rules: HealthCheck,
    pub policies: HealthCheck,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let rules = rules_check(&state.rule_sets);
    let ready = rules.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "aquaroute-server router initialized".to_string(),
        },
        rules,
        policies: policies_check(&state.rule_sets),
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn rules_check(rule_sets: &[RuleSetSummary]) -> HealthCheck {
    let empty: Vec<&str> = rule_sets
        .iter()
        .filter(|summary| summary.rule_count == 0)
        .map(|summary| summary.process.slug())
        .collect();
    if rule_sets.is_empty() || !empty.is_empty() {
        return HealthCheck {
            status: "degraded",
            detail: format!("rule sets without rules: [{}]", empty.join(", ")),
        };
    }

    let detail = rule_sets
        .iter()
        .map(|summary| {
            format!(
                "{}: {} rules / {} fields",
                summary.process.slug(),
                summary.rule_count,
                summary.required_fields
            )
        })
        .collect::<Vec<_>>()
        .join("; ");
    HealthCheck { status: "ready", detail }
}

/// Missing manuals only degrade decision wording; reported but never fatal.
fn policies_check(rule_sets: &[RuleSetSummary]) -> HealthCheck {
    let missing: Vec<&str> = rule_sets
        .iter()
        .filter(|summary| !summary.policy_loaded)
        .map(|summary| summary.process.slug())
        .collect();
    if missing.is_empty() {
        HealthCheck { status: "ready", detail: "policy manuals loaded".to_string() }
    } else {
        HealthCheck {
            status: "degraded",
            detail: format!("policy manual missing for: {}", missing.join(", ")),
        }
    }
}
