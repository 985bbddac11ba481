//! Action Policy - threat score -> ordered recommendations
//!
//! Thresholds are half-open and checked top-down:
//! `> 0.8` immediate, `> 0.6` urgent, `> 0.4` routine, otherwise monitor.

use super::types::{ActionTier, DefenseAction};
use crate::logic::model::ThreatPrediction;
use crate::logic::twin::DeviceState;

/// Tier for a threat value. NaN lands in `Monitor`.
pub fn tier_for(highest_threat: f32) -> ActionTier {
    [ActionTier::Immediate, ActionTier::Urgent, ActionTier::Routine]
        .into_iter()
        .find(|tier| tier.floor().is_some_and(|floor| highest_threat > floor))
        .unwrap_or(ActionTier::Monitor)
}

/// Recommendation texts for one tier, in fixed order.
pub fn action_texts(tier: ActionTier, device: &DeviceState) -> Vec<String> {
    match tier {
        ActionTier::Immediate => vec![
            format!("IMMEDIATE: Isolate device {} from network", device.device_id),
            "Apply emergency security patches".to_string(),
            "Enable enhanced monitoring".to_string(),
            "Notify security team".to_string(),
        ],
        ActionTier::Urgent => {
            let target = device
                .device
                .ip_address
                .as_deref()
                .filter(|ip| !ip.is_empty())
                .unwrap_or(&device.device_id);
            vec![
                format!("URGENT: Update firewall rules for {}", target),
                "Schedule security update within 24 hours".to_string(),
                "Increase logging level".to_string(),
            ]
        }
        ActionTier::Routine => vec![
            "ROUTINE: Apply standard security updates".to_string(),
            "Review access controls".to_string(),
            "Monitor for suspicious activity".to_string(),
        ],
        ActionTier::Monitor => vec!["MONITOR: Continue normal surveillance".to_string()],
    }
}

pub fn actions(prediction: &ThreatPrediction, device: &DeviceState) -> Vec<DefenseAction> {
    let tier = tier_for(prediction.highest_threat);
    action_texts(tier, device)
        .into_iter()
        .map(|text| DefenseAction {
            device_id: device.device_id.clone(),
            text,
            tier,
        })
        .collect()
}
