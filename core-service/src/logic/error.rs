//! Error taxonomy for the pipeline.
//!
//! None of these end the process. Per-message and per-device errors are
//! collected into batch/run reports; the rest of the batch keeps going.

use std::time::Duration;

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Errors surfaced by a twin store backend.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Backend unreachable or refused the call
    #[error("twin store unavailable: {0}")]
    Unavailable(String),

    /// Call did not complete in time
    #[error("twin store call timed out after {0:?}")]
    Timeout(Duration),

    /// Patch rejected before commit; twin left untouched
    #[error("invalid patch at {path}: {reason}")]
    InvalidPatch { path: String, reason: String },
}

impl StoreError {
    /// Whether a bounded retry may help.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Timeout(_))
    }
}

/// Per-message / per-device failures reported by ingestion and runs.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    #[error("message #{index} is malformed: {reason}")]
    MalformedMessage { index: usize, reason: String },

    #[error("message #{index} has no deviceId, applied as {substituted}")]
    MissingIdentity { index: usize, substituted: String },

    #[error("device {device_id}: store failed after {attempts} attempt(s): {source}")]
    StoreUnavailable {
        device_id: String,
        attempts: u32,
        #[source]
        source: StoreError,
    },

    #[error("device {device_id}: scoring used defaults for {}", missing.join(", "))]
    ScoringInputIncomplete {
        device_id: String,
        missing: Vec<&'static str>,
    },

    #[error("device {device_id}: skipped, run cancelled")]
    RunCancelled { device_id: String },

    #[error("device {device_id}: task aborted: {reason}")]
    TaskAborted { device_id: String, reason: String },
}

impl PipelineError {
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::MalformedMessage { .. } => "malformed_message",
            PipelineError::MissingIdentity { .. } => "missing_identity",
            PipelineError::StoreUnavailable { .. } => "store_unavailable",
            PipelineError::ScoringInputIncomplete { .. } => "scoring_input_incomplete",
            PipelineError::RunCancelled { .. } => "run_cancelled",
            PipelineError::TaskAborted { .. } => "task_aborted",
        }
    }
}

// Reports are serialized for the read API and the run log; keep the wire
// form flat: {"kind": "...", "message": "..."}.
impl Serialize for PipelineError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("PipelineError", 2)?;
        s.serialize_field("kind", self.kind())?;
        s.serialize_field("message", &self.to_string())?;
        s.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(StoreError::Unavailable("down".into()).is_retryable());
        assert!(StoreError::Timeout(Duration::from_millis(5)).is_retryable());
        assert!(!StoreError::InvalidPatch {
            path: "TrafficProperties.latency".into(),
            reason: "negative".into(),
        }
        .is_retryable());
    }

    #[test]
    fn test_pipeline_error_serializes_flat() {
        let err = PipelineError::MissingIdentity {
            index: 3,
            substituted: "UnknownDevice".into(),
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "missing_identity");
        assert!(json["message"].as_str().unwrap().contains("UnknownDevice"));
    }
}
