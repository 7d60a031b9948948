use serde::{Deserialize, Serialize};

/// Outcome category of a wellbeing evaluation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allow,
    /// Content still flows, prefixed with an advisory message.
    SoftStop,
    /// The model is not consulted; only the wellbeing message is returned.
    HardStop,
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::SoftStop => "soft_stop",
            Self::HardStop => "hard_stop",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fresh verdict from the guard. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WellbeingDecision {
    pub decision: Decision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl WellbeingDecision {
    pub fn allow() -> Self {
        Self {
            decision: Decision::Allow,
            message: None,
        }
    }

    pub fn soft_stop(message: impl Into<String>) -> Self {
        Self {
            decision: Decision::SoftStop,
            message: Some(message.into()),
        }
    }

    pub fn hard_stop(message: impl Into<String>) -> Self {
        Self {
            decision: Decision::HardStop,
            message: Some(message.into()),
        }
    }
}
