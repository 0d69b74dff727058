use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Structured processes that gather facts before an automated decision.
///
/// Serialized as the flow marker the caller stores between turns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowKind {
    StopDelivery,
    UrgentNotice,
}

impl FlowKind {
    pub const ALL: [FlowKind; 2] = [FlowKind::StopDelivery, FlowKind::UrgentNotice];

    pub fn marker(self) -> &'static str {
        match self {
            Self::StopDelivery => "STOP_DELIVERY",
            Self::UrgentNotice => "URGENT_NOTICE",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            Self::StopDelivery => "stop-delivery",
            Self::UrgentNotice => "urgent-notice",
        }
    }

    pub fn intent(self) -> Intent {
        match self {
            Self::StopDelivery => Intent::StopDelivery,
            Self::UrgentNotice => Intent::UrgentNotice,
        }
    }
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

impl FromStr for FlowKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase().replace('-', "_");
        match normalized.as_str() {
            "STOP_DELIVERY" => Ok(Self::StopDelivery),
            "URGENT_NOTICE" => Ok(Self::UrgentNotice),
            other => Err(format!(
                "unknown process `{other}` (expected stop-delivery|urgent-notice)"
            )),
        }
    }
}

/// What the user is after, independent of any active flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Intent {
    #[serde(rename = "STOP_DELIVERY")]
    StopDelivery,
    #[serde(rename = "URGENT_NOTICE")]
    UrgentNotice,
    #[serde(rename = "FAQ")]
    GeneralQuestion,
    #[serde(rename = "CHAT")]
    ChitChat,
}

impl Intent {
    pub fn label(self) -> &'static str {
        match self {
            Self::StopDelivery => "STOP_DELIVERY",
            Self::UrgentNotice => "URGENT_NOTICE",
            Self::GeneralQuestion => "FAQ",
            Self::ChitChat => "CHAT",
        }
    }

    pub fn flow_kind(self) -> Option<FlowKind> {
        match self {
            Self::StopDelivery => Some(FlowKind::StopDelivery),
            Self::UrgentNotice => Some(FlowKind::UrgentNotice),
            Self::GeneralQuestion | Self::ChitChat => None,
        }
    }

    /// Lenient reading of a classifier's free-text label. Anything that does
    /// not name a process or a question is chit-chat.
    pub fn from_label(raw: &str) -> Self {
        let upper = raw.to_ascii_uppercase();
        if upper.contains("STOP") {
            Self::StopDelivery
        } else if upper.contains("URGENT") {
            Self::UrgentNotice
        } else if upper.contains("FAQ") {
            Self::GeneralQuestion
        } else {
            Self::ChitChat
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TurnCategory {
    ContinuesFlow,
    InterruptsFlow,
    SwitchesIntent,
    NoFlow,
}

/// How one incoming message relates to the active flow. Computed fresh every
/// turn and never persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnClassification {
    pub category: TurnCategory,
    pub detected_intent: Intent,
}

impl TurnClassification {
    pub fn new(category: TurnCategory, detected_intent: Intent) -> Self {
        Self { category, detected_intent }
    }

    pub fn no_flow(intent: Intent) -> Self {
        Self::new(TurnCategory::NoFlow, intent)
    }

    pub fn continues(flow: FlowKind) -> Self {
        Self::new(TurnCategory::ContinuesFlow, flow.intent())
    }
}
