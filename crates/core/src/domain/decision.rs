use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payload attached to a rule. Passed through to response generation; the core
/// never interprets `decision` beyond exposing it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub decision: String,
    #[serde(default)]
    pub allowed_actions: Vec<String>,
    pub reason: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}
