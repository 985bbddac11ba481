//! Response Types - recommended (never executed) defense actions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// TIERS
// ============================================================================

/// Urgency tier, derived only from `highestThreat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionTier {
    Monitor,
    Routine,
    Urgent,
    Immediate,
}

impl ActionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionTier::Monitor => "monitor",
            ActionTier::Routine => "routine",
            ActionTier::Urgent => "urgent",
            ActionTier::Immediate => "immediate",
        }
    }

    /// Exclusive lower bound of the tier's threat bracket
    pub fn floor(&self) -> Option<f32> {
        match self {
            ActionTier::Immediate => Some(0.8),
            ActionTier::Urgent => Some(0.6),
            ActionTier::Routine => Some(0.4),
            ActionTier::Monitor => None,
        }
    }
}

impl std::fmt::Display for ActionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ACTIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefenseAction {
    pub device_id: String,
    pub text: String,
    pub tier: ActionTier,
}

/// Acknowledgement for an action handed to a sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionReceipt {
    pub success: bool,
    pub message: String,
    pub device_id: String,
    pub action: String,
    pub timestamp: DateTime<Utc>,
}

impl ActionReceipt {
    pub fn accepted(device_id: &str, action: &str) -> Self {
        Self {
            success: true,
            message: format!("Defense action applied: {}", action),
            device_id: device_id.to_string(),
            action: action.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn dropped(device_id: &str, action: &str, reason: &str) -> Self {
        Self {
            success: false,
            message: format!("Defense action not delivered: {}", reason),
            device_id: device_id.to_string(),
            action: action.to_string(),
            timestamp: Utc::now(),
        }
    }
}
