//! Twin Types
//!
//! Canonical per-device state and the replace-only patch that mutates it.
//! KHÔNG chứa I/O - only data structures and the pure patch-apply step.

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_DEVICE_MODEL;
use crate::logic::error::StoreError;

// ============================================================================
// DEVICE STATE
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceProperties {
    pub ip_address: Option<String>,
    pub os: Option<String>,
    pub status: Option<String>,
    pub patch_level: Option<String>,
    /// Free-form, device-reported
    pub vulnerability_score: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficProperties {
    pub protocol: Option<String>,
    pub port: Option<String>,
    pub traffic_volume: i64,
    pub latency: i64,
    pub suspicious_flag: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackSimulationProperties {
    pub attack_type: Option<String>,
    pub attack_probability: i64,
    pub attack_path: i64,
    pub detected_by: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionProperties {
    pub last_prediction: Option<String>,
    pub threat_probability: Option<f64>,
}

/// Optional attributes consumed by the scorer when a device reports them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringProperties {
    pub connections: Option<f64>,
    pub uptime: Option<f64>,
    pub criticality: Option<f64>,
    pub network_segment: Option<f64>,
    pub access_level: Option<f64>,
}

/// Canonical state of one device twin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    #[serde(rename = "$dtId")]
    pub device_id: String,
    #[serde(rename = "$model")]
    pub model_id: String,
    #[serde(rename = "DeviceProperties", default)]
    pub device: DeviceProperties,
    #[serde(rename = "TrafficProperties", default)]
    pub traffic: TrafficProperties,
    #[serde(rename = "AttackSimulationProperties", default)]
    pub attack: AttackSimulationProperties,
    #[serde(rename = "PredictionProperties", default)]
    pub prediction: PredictionProperties,
    #[serde(rename = "ScoringProperties", default)]
    pub scoring: ScoringProperties,
}

impl DeviceState {
    pub fn new(device_id: &str) -> Self {
        Self::with_model(device_id, DEFAULT_DEVICE_MODEL)
    }

    pub fn with_model(device_id: &str, model_id: &str) -> Self {
        Self {
            device_id: device_id.to_string(),
            model_id: model_id.to_string(),
            device: DeviceProperties::default(),
            traffic: TrafficProperties::default(),
            attack: AttackSimulationProperties::default(),
            prediction: PredictionProperties::default(),
            scoring: ScoringProperties::default(),
        }
    }

    /// Apply a replace-only patch, returning the new state.
    ///
    /// Every op is validated before anything is written, so a rejected patch
    /// leaves `self` as it was. `Null` values are no-ops.
    pub fn patched(&self, patch: &TwinPatch) -> Result<DeviceState, StoreError> {
        let mut next = self.clone();
        for op in &patch.ops {
            next.replace(op.path, &op.value)?;
        }
        Ok(next)
    }

    fn replace(&mut self, path: PropertyPath, value: &PatchValue) -> Result<(), StoreError> {
        if value.is_null() {
            return Ok(());
        }

        match path.kind() {
            FieldKind::Text => {
                let text = value.as_text().ok_or_else(|| mismatch(path, value, "text"))?;
                *self.text_slot(path) = Some(text.to_string());
            }
            FieldKind::Integer => {
                let n = value.as_integer().ok_or_else(|| mismatch(path, value, "integer"))?;
                let (min, max) = path.integer_bounds();
                if n < min || n > max {
                    return Err(StoreError::InvalidPatch {
                        path: path.as_str().to_string(),
                        reason: format!("{} outside [{}, {}]", n, min, max),
                    });
                }
                *self.integer_slot(path) = n;
            }
            FieldKind::Float => {
                let x = value.as_float().ok_or_else(|| mismatch(path, value, "number"))?;
                if !x.is_finite() {
                    return Err(StoreError::InvalidPatch {
                        path: path.as_str().to_string(),
                        reason: "non-finite number".to_string(),
                    });
                }
                if path == PropertyPath::ThreatProbability && !(0.0..=1.0).contains(&x) {
                    return Err(StoreError::InvalidPatch {
                        path: path.as_str().to_string(),
                        reason: format!("{} outside [0, 1]", x),
                    });
                }
                *self.float_slot(path) = Some(x);
            }
        }
        Ok(())
    }

    fn text_slot(&mut self, path: PropertyPath) -> &mut Option<String> {
        use PropertyPath::*;
        match path {
            IpAddress => &mut self.device.ip_address,
            Os => &mut self.device.os,
            Status => &mut self.device.status,
            PatchLevel => &mut self.device.patch_level,
            VulnerabilityScore => &mut self.device.vulnerability_score,
            Protocol => &mut self.traffic.protocol,
            Port => &mut self.traffic.port,
            AttackType => &mut self.attack.attack_type,
            LastPrediction => &mut self.prediction.last_prediction,
            _ => unreachable!("{} is not a text property", path),
        }
    }

    fn integer_slot(&mut self, path: PropertyPath) -> &mut i64 {
        use PropertyPath::*;
        match path {
            TrafficVolume => &mut self.traffic.traffic_volume,
            Latency => &mut self.traffic.latency,
            SuspiciousFlag => &mut self.traffic.suspicious_flag,
            AttackProbability => &mut self.attack.attack_probability,
            AttackPath => &mut self.attack.attack_path,
            DetectedBy => &mut self.attack.detected_by,
            _ => unreachable!("{} is not an integer property", path),
        }
    }

    fn float_slot(&mut self, path: PropertyPath) -> &mut Option<f64> {
        use PropertyPath::*;
        match path {
            ThreatProbability => &mut self.prediction.threat_probability,
            Connections => &mut self.scoring.connections,
            Uptime => &mut self.scoring.uptime,
            Criticality => &mut self.scoring.criticality,
            NetworkSegment => &mut self.scoring.network_segment,
            AccessLevel => &mut self.scoring.access_level,
            _ => unreachable!("{} is not a float property", path),
        }
    }
}

fn mismatch(path: PropertyPath, value: &PatchValue, expected: &str) -> StoreError {
    StoreError::InvalidPatch {
        path: path.as_str().to_string(),
        reason: format!("expected {}, got {}", expected, value.type_name()),
    }
}

// ============================================================================
// PROPERTY PATHS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Float,
}

/// Dotted logical path of a patchable twin property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyPath {
    // DeviceProperties
    IpAddress,
    Os,
    Status,
    PatchLevel,
    VulnerabilityScore,
    // TrafficProperties
    Protocol,
    Port,
    TrafficVolume,
    Latency,
    SuspiciousFlag,
    // AttackSimulationProperties
    AttackType,
    AttackProbability,
    AttackPath,
    DetectedBy,
    // PredictionProperties
    LastPrediction,
    ThreatProbability,
    // ScoringProperties
    Connections,
    Uptime,
    Criticality,
    NetworkSegment,
    AccessLevel,
}

impl PropertyPath {
    pub const ALL: [PropertyPath; 21] = [
        PropertyPath::IpAddress,
        PropertyPath::Os,
        PropertyPath::Status,
        PropertyPath::PatchLevel,
        PropertyPath::VulnerabilityScore,
        PropertyPath::Protocol,
        PropertyPath::Port,
        PropertyPath::TrafficVolume,
        PropertyPath::Latency,
        PropertyPath::SuspiciousFlag,
        PropertyPath::AttackType,
        PropertyPath::AttackProbability,
        PropertyPath::AttackPath,
        PropertyPath::DetectedBy,
        PropertyPath::LastPrediction,
        PropertyPath::ThreatProbability,
        PropertyPath::Connections,
        PropertyPath::Uptime,
        PropertyPath::Criticality,
        PropertyPath::NetworkSegment,
        PropertyPath::AccessLevel,
    ];

    pub fn as_str(&self) -> &'static str {
        use PropertyPath::*;
        match self {
            IpAddress => "DeviceProperties.ipAddress",
            Os => "DeviceProperties.os",
            Status => "DeviceProperties.status",
            PatchLevel => "DeviceProperties.patchLevel",
            VulnerabilityScore => "DeviceProperties.vulnerabilityScore",
            Protocol => "TrafficProperties.protocol",
            Port => "TrafficProperties.port",
            TrafficVolume => "TrafficProperties.trafficVolume",
            Latency => "TrafficProperties.latency",
            SuspiciousFlag => "TrafficProperties.suspiciousFlag",
            AttackType => "AttackSimulationProperties.attackType",
            AttackProbability => "AttackSimulationProperties.attackProbability",
            AttackPath => "AttackSimulationProperties.attackPath",
            DetectedBy => "AttackSimulationProperties.detectedBy",
            LastPrediction => "PredictionProperties.lastPrediction",
            ThreatProbability => "PredictionProperties.threatProbability",
            Connections => "ScoringProperties.connections",
            Uptime => "ScoringProperties.uptime",
            Criticality => "ScoringProperties.criticality",
            NetworkSegment => "ScoringProperties.networkSegment",
            AccessLevel => "ScoringProperties.accessLevel",
        }
    }

    /// Accepts the dotted form and the JSON-pointer form (`/A/b`).
    pub fn parse(path: &str) -> Option<Self> {
        let dotted = path.trim_start_matches('/').replace('/', ".");
        Self::ALL.iter().copied().find(|p| p.as_str() == dotted)
    }

    pub fn kind(&self) -> FieldKind {
        use PropertyPath::*;
        match self {
            IpAddress | Os | Status | PatchLevel | VulnerabilityScore | Protocol | Port
            | AttackType | LastPrediction => FieldKind::Text,
            TrafficVolume | Latency | SuspiciousFlag | AttackProbability | AttackPath
            | DetectedBy => FieldKind::Integer,
            ThreatProbability | Connections | Uptime | Criticality | NetworkSegment
            | AccessLevel => FieldKind::Float,
        }
    }

    /// Inclusive bounds for integer properties.
    pub fn integer_bounds(&self) -> (i64, i64) {
        match self {
            PropertyPath::TrafficVolume | PropertyPath::Latency => (0, i64::MAX),
            PropertyPath::SuspiciousFlag => (0, 1),
            PropertyPath::AttackProbability => (0, 100),
            _ => (i64::MIN, i64::MAX),
        }
    }
}

impl std::fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for PropertyPath {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PropertyPath {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        PropertyPath::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown twin property: {}", raw)))
    }
}

// ============================================================================
// PATCH
// ============================================================================

/// Typed patch value. `Null` never clears a property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatchValue {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
}

impl PatchValue {
    pub fn is_null(&self) -> bool {
        matches!(self, PatchValue::Null)
    }

    pub fn text(value: Option<String>) -> Self {
        value.map(PatchValue::Text).unwrap_or(PatchValue::Null)
    }

    fn as_text(&self) -> Option<&str> {
        match self {
            PatchValue::Text(s) => Some(s),
            _ => None,
        }
    }

    fn as_integer(&self) -> Option<i64> {
        match self {
            PatchValue::Integer(n) => Some(*n),
            PatchValue::Float(x) if x.fract() == 0.0 && x.is_finite() => Some(*x as i64),
            _ => None,
        }
    }

    fn as_float(&self) -> Option<f64> {
        match self {
            PatchValue::Float(x) => Some(*x),
            PatchValue::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            PatchValue::Null => "null",
            PatchValue::Integer(_) => "integer",
            PatchValue::Float(_) => "float",
            PatchValue::Text(_) => "text",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOp {
    pub path: PropertyPath,
    pub value: PatchValue,
}

/// Ordered list of replace operations; later ops on the same path win.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TwinPatch {
    pub ops: Vec<PatchOp>,
}

impl TwinPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(mut self, path: PropertyPath, value: PatchValue) -> Self {
        self.push(path, value);
        self
    }

    pub fn push(&mut self, path: PropertyPath, value: PatchValue) {
        self.ops.push(PatchOp { path, value });
    }

    pub fn get(&self, path: PropertyPath) -> Option<&PatchValue> {
        self.ops.iter().rev().find(|op| op.path == path).map(|op| &op.value)
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }
}

// ============================================================================
// QUERY
// ============================================================================

/// Predicate for `TwinStore::query`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TwinQuery {
    /// Exact model id match
    pub model_id: Option<String>,
    /// Exact `DeviceProperties.status` match
    pub status: Option<String>,
    /// Exact `DeviceProperties.os` match
    pub os: Option<String>,
}

impl TwinQuery {
    pub fn of_model(model_id: &str) -> Self {
        Self {
            model_id: Some(model_id.to_string()),
            ..Default::default()
        }
    }

    pub fn matches(&self, twin: &DeviceState) -> bool {
        let eq = |want: &Option<String>, have: Option<&String>| match want {
            Some(w) => have.map_or(false, |h| h == w),
            None => true,
        };
        eq(&self.model_id, Some(&twin.model_id))
            && eq(&self.status, twin.device.status.as_ref())
            && eq(&self.os, twin.device.os.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_patch() -> TwinPatch {
        TwinPatch::new()
            .replace(PropertyPath::IpAddress, PatchValue::Text("10.0.0.5".into()))
            .replace(PropertyPath::TrafficVolume, PatchValue::Integer(1200))
            .replace(PropertyPath::SuspiciousFlag, PatchValue::Integer(1))
            .replace(PropertyPath::Os, PatchValue::Null)
    }

    #[test]
    fn test_apply_is_idempotent() {
        let base = DeviceState::new("dev-1");
        let once = base.patched(&sample_patch()).unwrap();
        let twice = once.patched(&sample_patch()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_null_does_not_clear() {
        let base = DeviceState::new("dev-1")
            .patched(&TwinPatch::new().replace(PropertyPath::Os, PatchValue::Text("Linux".into())))
            .unwrap();
        let next = base.patched(&sample_patch()).unwrap();
        assert_eq!(next.device.os.as_deref(), Some("Linux"));
        assert_eq!(next.device.ip_address.as_deref(), Some("10.0.0.5"));
    }

    #[test]
    fn test_absent_keys_untouched() {
        let base = DeviceState::new("dev-1")
            .patched(&TwinPatch::new().replace(PropertyPath::Latency, PatchValue::Integer(40)))
            .unwrap();
        let next = base
            .patched(&TwinPatch::new().replace(PropertyPath::Port, PatchValue::Text("443".into())))
            .unwrap();
        assert_eq!(next.traffic.latency, 40);
        assert_eq!(next.traffic.port.as_deref(), Some("443"));
    }

    #[test]
    fn test_rejected_patch_is_atomic() {
        let base = DeviceState::new("dev-1");
        let patch = TwinPatch::new()
            .replace(PropertyPath::Status, PatchValue::Text("online".into()))
            .replace(PropertyPath::AttackProbability, PatchValue::Integer(140));

        let err = base.patched(&patch).unwrap_err();
        assert!(matches!(err, StoreError::InvalidPatch { .. }));
        assert_eq!(base.device.status, None);
    }

    #[test]
    fn test_type_mismatch_rejected() {
        let patch = TwinPatch::new().replace(PropertyPath::Latency, PatchValue::Text("fast".into()));
        assert!(DeviceState::new("d").patched(&patch).is_err());
    }

    #[test]
    fn test_property_path_parse() {
        assert_eq!(
            PropertyPath::parse("DeviceProperties.ipAddress"),
            Some(PropertyPath::IpAddress)
        );
        assert_eq!(
            PropertyPath::parse("/TrafficProperties/latency"),
            Some(PropertyPath::Latency)
        );
        assert_eq!(PropertyPath::parse("Nope.nothing"), None);
        for path in PropertyPath::ALL {
            assert_eq!(PropertyPath::parse(path.as_str()), Some(path));
        }
    }

    #[test]
    fn test_patch_json_shape() {
        let patch = TwinPatch::new()
            .replace(PropertyPath::ThreatProbability, PatchValue::Float(0.25))
            .replace(PropertyPath::LastPrediction, PatchValue::Text("DDoS".into()));
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json[0]["path"], "PredictionProperties.threatProbability");
        assert_eq!(json[1]["value"], "DDoS");

        let back: TwinPatch = serde_json::from_value(json).unwrap();
        assert_eq!(back, patch);
    }

    #[test]
    fn test_query_matches() {
        let twin = DeviceState::new("dev-1")
            .patched(&TwinPatch::new().replace(PropertyPath::Status, PatchValue::Text("active".into())))
            .unwrap();
        assert!(TwinQuery::of_model(DEFAULT_DEVICE_MODEL).matches(&twin));
        assert!(!TwinQuery::of_model("dtmi:other;1").matches(&twin));
        let q = TwinQuery {
            status: Some("active".into()),
            ..Default::default()
        };
        assert!(q.matches(&twin));
    }
}
