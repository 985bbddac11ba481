//! Simulation run records
//!
//! A `SimulationRun` is built by the coordinator and never mutated once
//! sealed; callers share it behind an `Arc`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::HIGH_RISK_THRESHOLD;
use crate::logic::model::ThreatPrediction;
use crate::logic::response::DefenseAction;

/// What happened to a device's write-back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum DeviceStatus {
    /// `threatProbability` / `lastPrediction` written to the twin
    Updated,
    /// Scored, but the write-back failed after retries
    WriteFailed { error: String },
    /// Write-back skipped because the run was cancelled
    Cancelled,
    /// The device task died before producing a prediction
    Aborted { error: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceOutcome {
    pub device_id: String,
    pub ip_address: Option<String>,
    pub prediction: ThreatPrediction,
    pub actions: Vec<DefenseAction>,
    #[serde(flatten)]
    pub status: DeviceStatus,
}

impl DeviceOutcome {
    /// Placeholder for a device whose task panicked: zero scores, no actions.
    pub fn aborted(device_id: String, ip_address: Option<String>, error: String) -> Self {
        Self {
            device_id,
            ip_address,
            prediction: ThreatPrediction::from_scores([0.0; 3], true, "unscored"),
            actions: Vec::new(),
            status: DeviceStatus::Aborted { error },
        }
    }

    pub fn is_high_risk(&self) -> bool {
        self.prediction.highest_threat > HIGH_RISK_THRESHOLD
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationRun {
    pub run_id: Uuid,
    /// Run start
    #[serde(rename = "timestamp")]
    pub started_at: DateTime<Utc>,
    pub sealed_at: DateTime<Utc>,
    /// Same order as the snapshot the run was computed from
    #[serde(rename = "devicePredictions")]
    pub devices: Vec<DeviceOutcome>,
    pub total_devices: usize,
    pub high_risk_count: usize,
    pub updated_count: usize,
    pub failed_count: usize,
    pub cancelled_count: usize,
    pub low_confidence_count: usize,
    pub cancelled: bool,
    /// Set when the device snapshot itself could not be read
    pub snapshot_error: Option<String>,
}

impl SimulationRun {
    /// Seal a run: counters are derived from the outcomes, never passed in.
    pub fn seal(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        devices: Vec<DeviceOutcome>,
        cancelled: bool,
        snapshot_error: Option<String>,
    ) -> Self {
        let count = |f: &dyn Fn(&DeviceOutcome) -> bool| devices.iter().filter(|d| f(d)).count();

        let high_risk_count = count(&|d| d.is_high_risk());
        let updated_count = count(&|d| d.status == DeviceStatus::Updated);
        let failed_count = count(&|d| {
            matches!(d.status, DeviceStatus::WriteFailed { .. } | DeviceStatus::Aborted { .. })
        });
        let cancelled_count = count(&|d| d.status == DeviceStatus::Cancelled);
        let low_confidence_count = count(&|d| d.prediction.low_confidence);

        Self {
            run_id,
            started_at,
            sealed_at: Utc::now(),
            total_devices: devices.len(),
            devices,
            high_risk_count,
            updated_count,
            failed_count,
            cancelled_count,
            low_confidence_count,
            cancelled,
            snapshot_error,
        }
    }

    pub fn device(&self, device_id: &str) -> Option<&DeviceOutcome> {
        self.devices.iter().find(|d| d.device_id == device_id)
    }

    /// Compact view for listings and logs.
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            run_id: self.run_id,
            sealed_at: self.sealed_at,
            total_devices: self.total_devices,
            high_risk_count: self.high_risk_count,
            updated_count: self.updated_count,
            failed_count: self.failed_count,
            cancelled_count: self.cancelled_count,
            cancelled: self.cancelled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: Uuid,
    pub sealed_at: DateTime<Utc>,
    pub total_devices: usize,
    pub high_risk_count: usize,
    pub updated_count: usize,
    pub failed_count: usize,
    pub cancelled_count: usize,
    pub cancelled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(id: &str, threat: f32, status: DeviceStatus) -> DeviceOutcome {
        DeviceOutcome {
            device_id: id.to_string(),
            ip_address: None,
            prediction: ThreatPrediction::from_scores([threat, 0.0, 0.0], false, "test"),
            actions: Vec::new(),
            status,
        }
    }

    #[test]
    fn test_seal_derives_counters() {
        let run = SimulationRun::seal(
            Uuid::new_v4(),
            Utc::now(),
            vec![
                outcome("a", 0.9, DeviceStatus::Updated),
                outcome("b", 0.5, DeviceStatus::Updated),
                outcome("c", 0.75, DeviceStatus::WriteFailed { error: "down".into() }),
                outcome("d", 0.7, DeviceStatus::Cancelled),
            ],
            true,
            None,
        );

        assert_eq!(run.total_devices, 4);
        // 0.7 itself is not high risk
        assert_eq!(run.high_risk_count, 2);
        assert_eq!(run.updated_count, 2);
        assert_eq!(run.failed_count, 1);
        assert_eq!(run.cancelled_count, 1);
        assert!(run.sealed_at >= run.started_at);
    }

    #[test]
    fn test_outcome_json_shape() {
        let json = serde_json::to_value(outcome("a", 0.3, DeviceStatus::WriteFailed { error: "x".into() })).unwrap();
        assert_eq!(json["deviceId"], "a");
        assert_eq!(json["status"], "writeFailed");
        assert_eq!(json["error"], "x");
        assert_eq!(json["prediction"]["predictedType"], "Ransomware");
    }

    #[test]
    fn test_run_wire_names() {
        let run = SimulationRun::seal(
            Uuid::new_v4(),
            Utc::now(),
            vec![outcome("A", 0.9, DeviceStatus::Updated)],
            false,
            None,
        );
        let json = serde_json::to_value(&run).unwrap();

        assert!(json["timestamp"].is_string());
        assert_eq!(json["devicePredictions"][0]["deviceId"], "A");
        assert_eq!(json["devicePredictions"][0]["status"], "updated");
        assert_eq!(json["totalDevices"], 1);
        assert_eq!(json["highRiskCount"], 1);
        assert!(json.get("startedAt").is_none());
    }
}
