//! Feature Normalizer
//!
//! Raw telemetry message (JSON object) -> device id + replace-only twin patch.
//!
//! - string fields pass through, `null` when absent
//! - integer fields default to 0 when absent or unparsable, then get bounded
//! - missing `deviceId` -> `UnknownDevice` (message is still applied)
//! - unparsable payload -> `MalformedMessage` (message is skipped)

use serde::Serialize;
use serde_json::{Map, Value};

use crate::constants::UNKNOWN_DEVICE_ID;
use crate::logic::error::PipelineError;
use crate::logic::twin::{PatchValue, PropertyPath, TwinPatch};

/// Telemetry key -> twin property, string-valued
const TEXT_FIELDS: &[(&str, PropertyPath)] = &[
    ("ipAddress", PropertyPath::IpAddress),
    ("os", PropertyPath::Os),
    ("status", PropertyPath::Status),
    ("patchLevel", PropertyPath::PatchLevel),
    ("vulnerabilityScore", PropertyPath::VulnerabilityScore),
    ("protocol", PropertyPath::Protocol),
    ("port", PropertyPath::Port),
    ("attackType", PropertyPath::AttackType),
];

/// Optional scoring attributes, patched only when present and numeric
const SCORING_FIELDS: &[(&str, PropertyPath)] = &[
    ("connections", PropertyPath::Connections),
    ("uptime", PropertyPath::Uptime),
    ("criticality", PropertyPath::Criticality),
    ("networkSegment", PropertyPath::NetworkSegment),
    ("accessLevel", PropertyPath::AccessLevel),
];

// ============================================================================
// OUTPUT TYPES
// ============================================================================

/// Bounded numeric part of one message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryMetrics {
    pub traffic_volume: i64,
    pub latency: i64,
    pub suspicious_flag: i64,
    pub attack_probability: i64,
    pub attack_path: i64,
    pub detected_by: i64,
}

impl TelemetryMetrics {
    fn bounded(self) -> Self {
        Self {
            traffic_volume: self.traffic_volume.max(0),
            latency: self.latency.max(0),
            suspicious_flag: i64::from(self.suspicious_flag != 0),
            attack_probability: self.attack_probability.clamp(0, 100),
            attack_path: self.attack_path,
            detected_by: self.detected_by,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NormalizedMessage {
    /// Position in the batch
    pub index: usize,
    pub device_id: String,
    /// `deviceId` was missing and the sentinel was substituted
    pub identity_missing: bool,
    pub patch: TwinPatch,
    pub metrics: TelemetryMetrics,
}

impl NormalizedMessage {
    /// Warning to surface when the sentinel id was used.
    pub fn identity_warning(&self) -> Option<PipelineError> {
        self.identity_missing.then(|| PipelineError::MissingIdentity {
            index: self.index,
            substituted: self.device_id.clone(),
        })
    }
}

// ============================================================================
// NORMALIZER
// ============================================================================

#[derive(Debug, Clone)]
pub struct FeatureNormalizer {
    sentinel_id: String,
}

impl FeatureNormalizer {
    pub fn new() -> Self {
        Self {
            sentinel_id: UNKNOWN_DEVICE_ID.to_string(),
        }
    }

    pub fn with_sentinel(sentinel_id: &str) -> Self {
        Self {
            sentinel_id: sentinel_id.to_string(),
        }
    }

    /// Parse raw bytes/text then normalize.
    pub fn normalize(&self, index: usize, raw: &str) -> Result<NormalizedMessage, PipelineError> {
        let value: Value = serde_json::from_str(raw).map_err(|e| PipelineError::MalformedMessage {
            index,
            reason: e.to_string(),
        })?;
        self.normalize_value(index, &value)
    }

    /// Normalize an already-parsed document.
    pub fn normalize_value(&self, index: usize, value: &Value) -> Result<NormalizedMessage, PipelineError> {
        let doc = value.as_object().ok_or_else(|| PipelineError::MalformedMessage {
            index,
            reason: format!("expected a JSON object, got {}", json_type(value)),
        })?;

        let reported_id = text_field(doc, "deviceId").filter(|id| !id.trim().is_empty());
        let identity_missing = reported_id.is_none();
        let device_id = reported_id.unwrap_or_else(|| self.sentinel_id.clone());

        if identity_missing {
            log::warn!(
                "Telemetry message #{} has no deviceId, applying as {}",
                index,
                device_id
            );
        }

        let mut patch = TwinPatch::new();
        for (key, path) in TEXT_FIELDS {
            patch.push(*path, PatchValue::text(text_field(doc, key)));
        }

        let metrics = TelemetryMetrics {
            traffic_volume: int_field(doc, "trafficVolume"),
            latency: int_field(doc, "latency"),
            suspicious_flag: int_field(doc, "suspiciousFlag"),
            attack_probability: int_field(doc, "attackProbability"),
            attack_path: int_field(doc, "attackPath"),
            detected_by: int_field(doc, "detectedBy"),
        }
        .bounded();

        patch.push(PropertyPath::TrafficVolume, PatchValue::Integer(metrics.traffic_volume));
        patch.push(PropertyPath::Latency, PatchValue::Integer(metrics.latency));
        patch.push(PropertyPath::SuspiciousFlag, PatchValue::Integer(metrics.suspicious_flag));
        patch.push(PropertyPath::AttackProbability, PatchValue::Integer(metrics.attack_probability));
        patch.push(PropertyPath::AttackPath, PatchValue::Integer(metrics.attack_path));
        patch.push(PropertyPath::DetectedBy, PatchValue::Integer(metrics.detected_by));

        for (key, path) in SCORING_FIELDS {
            if let Some(x) = float_field(doc, key) {
                patch.push(*path, PatchValue::Float(x));
            }
        }

        Ok(NormalizedMessage {
            index,
            device_id,
            identity_missing,
            patch,
            metrics,
        })
    }
}

impl Default for FeatureNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// FIELD HELPERS
// ============================================================================

/// Strings as-is; numbers/bools rendered to text; null/absent/other -> None.
fn text_field(doc: &Map<String, Value>, key: &str) -> Option<String> {
    match doc.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Integers, floats (truncated toward zero) and numeric strings; else 0.
fn int_field(doc: &Map<String, Value>, key: &str) -> i64 {
    let parsed = match doc.get(key) {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().and_then(float_to_int)),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(float_to_int))
        }
        _ => None,
    };
    parsed.unwrap_or(0)
}

fn float_field(doc: &Map<String, Value>, key: &str) -> Option<f64> {
    match doc.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|x| x.is_finite())
}

fn float_to_int(x: f64) -> Option<i64> {
    if x.is_finite() && x.abs() < i64::MAX as f64 {
        Some(x.trunc() as i64)
    } else {
        None
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(raw: &str) -> NormalizedMessage {
        FeatureNormalizer::new().normalize(0, raw).unwrap()
    }

    #[test]
    fn test_full_message() {
        let msg = normalize(
            r#"{"deviceId":"router-01","ipAddress":"192.168.1.1","os":"Cisco IOS",
                "port":443,"trafficVolume":"1500","latency":12.9,"suspiciousFlag":1,
                "attackType":"DDoS","attackProbability":85}"#,
        );

        assert_eq!(msg.device_id, "router-01");
        assert!(!msg.identity_missing);
        assert_eq!(
            msg.patch.get(PropertyPath::IpAddress),
            Some(&PatchValue::Text("192.168.1.1".into()))
        );
        assert_eq!(msg.patch.get(PropertyPath::Port), Some(&PatchValue::Text("443".into())));
        assert_eq!(msg.patch.get(PropertyPath::Status), Some(&PatchValue::Null));
        assert_eq!(msg.metrics.traffic_volume, 1500);
        assert_eq!(msg.metrics.latency, 12);
        assert_eq!(msg.metrics.attack_probability, 85);
        assert_eq!(msg.patch.get(PropertyPath::DetectedBy), Some(&PatchValue::Integer(0)));
    }

    #[test]
    fn test_missing_device_id_uses_sentinel() {
        let msg = normalize(r#"{"os":"Linux"}"#);
        assert_eq!(msg.device_id, UNKNOWN_DEVICE_ID);
        assert!(msg.identity_missing);
        assert!(matches!(
            msg.identity_warning(),
            Some(PipelineError::MissingIdentity { .. })
        ));

        let blank = normalize(r#"{"deviceId":"  "}"#);
        assert_eq!(blank.device_id, UNKNOWN_DEVICE_ID);
    }

    #[test]
    fn test_unparsable_numbers_default_to_zero() {
        let msg = normalize(r#"{"deviceId":"d","latency":"slow","trafficVolume":null,"attackPath":[1]}"#);
        assert_eq!(msg.metrics, TelemetryMetrics::default());
    }

    #[test]
    fn test_metrics_are_bounded() {
        let msg = normalize(
            r#"{"deviceId":"d","trafficVolume":-10,"latency":-1,"suspiciousFlag":5,"attackProbability":250}"#,
        );
        assert_eq!(msg.metrics.traffic_volume, 0);
        assert_eq!(msg.metrics.latency, 0);
        assert_eq!(msg.metrics.suspicious_flag, 1);
        assert_eq!(msg.metrics.attack_probability, 100);
    }

    #[test]
    fn test_scoring_fields_only_when_present() {
        let msg = normalize(r#"{"deviceId":"d","connections":42,"criticality":"0.9","uptime":"n/a"}"#);
        assert_eq!(msg.patch.get(PropertyPath::Connections), Some(&PatchValue::Float(42.0)));
        assert_eq!(msg.patch.get(PropertyPath::Criticality), Some(&PatchValue::Float(0.9)));
        assert_eq!(msg.patch.get(PropertyPath::Uptime), None);
        assert_eq!(msg.patch.get(PropertyPath::AccessLevel), None);
    }

    #[test]
    fn test_malformed_payloads() {
        let normalizer = FeatureNormalizer::new();
        for (i, raw) in ["{not json", "[1,2,3]", "\"text\"", ""].iter().enumerate() {
            match normalizer.normalize(i, raw) {
                Err(PipelineError::MalformedMessage { index, .. }) => assert_eq!(index, i),
                other => panic!("expected MalformedMessage, got {:?}", other),
            }
        }
    }
}
