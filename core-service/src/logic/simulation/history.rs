//! Run history and read-only projections for the read API.
//!
//! Nothing in the pipeline depends on these being read.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use uuid::Uuid;

use super::types::{RunSummary, SimulationRun};
use crate::logic::response::{tier_for, ActionTier};
use crate::logic::twin::DeviceState;

/// Bounded, newest-last list of sealed runs.
pub struct RunHistory {
    runs: RwLock<VecDeque<Arc<SimulationRun>>>,
    capacity: usize,
}

impl RunHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            runs: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn push(&self, run: SimulationRun) -> Arc<SimulationRun> {
        let run = Arc::new(run);
        let mut runs = self.runs.write();
        if runs.len() == self.capacity {
            runs.pop_front();
        }
        runs.push_back(run.clone());
        run
    }

    pub fn latest(&self) -> Option<Arc<SimulationRun>> {
        self.runs.read().back().cloned()
    }

    pub fn get(&self, run_id: Uuid) -> Option<Arc<SimulationRun>> {
        self.runs.read().iter().find(|r| r.run_id == run_id).cloned()
    }

    /// Newest first.
    pub fn summaries(&self) -> Vec<RunSummary> {
        self.runs.read().iter().rev().map(|r| r.summary()).collect()
    }

    pub fn len(&self) -> usize {
        self.runs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// DEVICE PROJECTION
// ============================================================================

/// Flat device view for listings (one row per twin).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceView {
    pub device_id: String,
    pub model_id: String,
    pub ip_address: Option<String>,
    pub os: Option<String>,
    pub status: Option<String>,
    pub traffic_volume: i64,
    pub latency: i64,
    pub suspicious_flag: i64,
    pub attack_type: Option<String>,
    pub attack_probability: i64,
    pub threat_probability: Option<f64>,
    pub last_prediction: Option<String>,
    /// Tier of the last written threat probability, if any
    pub risk_tier: Option<ActionTier>,
}

impl From<&DeviceState> for DeviceView {
    fn from(twin: &DeviceState) -> Self {
        Self {
            device_id: twin.device_id.clone(),
            model_id: twin.model_id.clone(),
            ip_address: twin.device.ip_address.clone(),
            os: twin.device.os.clone(),
            status: twin.device.status.clone(),
            traffic_volume: twin.traffic.traffic_volume,
            latency: twin.traffic.latency,
            suspicious_flag: twin.traffic.suspicious_flag,
            attack_type: twin.attack.attack_type.clone(),
            attack_probability: twin.attack.attack_probability,
            threat_probability: twin.prediction.threat_probability,
            last_prediction: twin.prediction.last_prediction.clone(),
            risk_tier: twin.prediction.threat_probability.map(|p| tier_for(p as f32)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::logic::twin::{PatchValue, PropertyPath, TwinPatch};

    fn empty_run() -> SimulationRun {
        SimulationRun::seal(Uuid::new_v4(), Utc::now(), Vec::new(), false, None)
    }

    #[test]
    fn test_history_is_bounded_and_newest_first() {
        let history = RunHistory::new(2);
        let first = history.push(empty_run());
        let second = history.push(empty_run());
        let third = history.push(empty_run());

        assert_eq!(history.len(), 2);
        assert!(history.get(first.run_id).is_none());
        assert_eq!(history.latest().unwrap().run_id, third.run_id);

        let ids: Vec<Uuid> = history.summaries().into_iter().map(|s| s.run_id).collect();
        assert_eq!(ids, vec![third.run_id, second.run_id]);
    }

    #[test]
    fn test_empty_history() {
        let history = RunHistory::new(0);
        assert!(history.is_empty());
        assert!(history.latest().is_none());
        history.push(empty_run());
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_device_view_from_twin() {
        let twin = DeviceState::new("fw-1")
            .patched(
                &TwinPatch::new()
                    .replace(PropertyPath::Os, PatchValue::Text("pfSense".into()))
                    .replace(PropertyPath::ThreatProbability, PatchValue::Float(0.72)),
            )
            .unwrap();

        let view = DeviceView::from(&twin);
        assert_eq!(view.os.as_deref(), Some("pfSense"));
        assert_eq!(view.risk_tier, Some(ActionTier::Urgent));

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["deviceId"], "fw-1");
        assert_eq!(json["riskTier"], "urgent");
    }
}
