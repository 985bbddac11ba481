//! Feature Vector - scorer input built from a device twin
//!
//! **Versioned feature vector with layout validation**
//!
//! Every slot the twin cannot fill gets its neutral default from
//! `FEATURE_DEFAULTS` and is remembered in `defaulted_mask`, which the
//! scorer turns into a low-confidence flag.

use serde::{Deserialize, Serialize};

use super::layout::{
    feature_index, layout_hash, validate_layout, LayoutMismatchError, FEATURE_COUNT,
    FEATURE_DEFAULTS, FEATURE_LAYOUT, FEATURE_VERSION,
};
use crate::logic::twin::DeviceState;

// ============================================================================
// VERSIONED FEATURE VECTOR
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Feature layout version
    pub version: u8,
    /// CRC32 hash of the feature layout (for mismatch detection)
    pub layout_hash: u32,
    /// Feature values in order defined by FEATURE_LAYOUT
    pub values: [f32; FEATURE_COUNT],
    /// Bit i set = feature i fell back to its default
    pub defaulted_mask: u16,
}

impl FeatureVector {
    /// All features at their neutral defaults
    pub fn new() -> Self {
        Self {
            version: FEATURE_VERSION,
            layout_hash: layout_hash(),
            values: FEATURE_DEFAULTS,
            defaulted_mask: (1u16 << FEATURE_COUNT) - 1,
        }
    }

    /// Fully specified vector (nothing defaulted)
    pub fn from_values(values: [f32; FEATURE_COUNT]) -> Self {
        Self {
            version: FEATURE_VERSION,
            layout_hash: layout_hash(),
            values,
            defaulted_mask: 0,
        }
    }

    /// Build from a twin snapshot.
    pub fn from_device(device: &DeviceState) -> Self {
        let sources: [Option<f64>; FEATURE_COUNT] = [
            parse_number(device.device.vulnerability_score.as_deref()),
            device.prediction.threat_probability,
            device.scoring.connections,
            device.scoring.uptime,
            parse_number(device.device.patch_level.as_deref()),
            device.scoring.criticality,
            device.scoring.network_segment,
            device.scoring.access_level,
        ];

        let mut vector = Self::new();
        for (i, source) in sources.into_iter().enumerate() {
            if let Some(v) = source.filter(|v| v.is_finite()) {
                vector.set(i, v as f32);
            }
        }
        vector
    }

    pub fn as_array(&self) -> &[f32; FEATURE_COUNT] {
        &self.values
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn get(&self, index: usize) -> Option<f32> {
        self.values.get(index).copied()
    }

    pub fn get_by_name(&self, name: &str) -> Option<f32> {
        feature_index(name).and_then(|i| self.get(i))
    }

    /// Set feature by index (clears its defaulted bit)
    pub fn set(&mut self, index: usize, value: f32) {
        if index < FEATURE_COUNT {
            self.values[index] = value;
            self.defaulted_mask &= !(1u16 << index);
        }
    }

    pub fn set_by_name(&mut self, name: &str, value: f32) -> bool {
        if let Some(index) = feature_index(name) {
            self.set(index, value);
            true
        } else {
            false
        }
    }

    pub fn is_defaulted(&self, index: usize) -> bool {
        index < FEATURE_COUNT && self.defaulted_mask & (1u16 << index) != 0
    }

    /// Names of features that fell back to defaults
    pub fn defaulted(&self) -> Vec<&'static str> {
        FEATURE_LAYOUT
            .iter()
            .enumerate()
            .filter(|(i, _)| self.is_defaulted(*i))
            .map(|(_, name)| *name)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.defaulted_mask == 0
    }

    pub fn validate(&self) -> Result<(), LayoutMismatchError> {
        validate_layout(self.version, self.layout_hash)
    }

    /// Convert to JSON-serializable format for logging
    pub fn to_log_entry(&self) -> serde_json::Value {
        serde_json::json!({
            "feature_version": self.version,
            "layout_hash": self.layout_hash,
            "values": self.values,
            "defaulted": self.defaulted(),
        })
    }
}

impl Default for FeatureVector {
    fn default() -> Self {
        Self::new()
    }
}

impl From<[f32; FEATURE_COUNT]> for FeatureVector {
    fn from(values: [f32; FEATURE_COUNT]) -> Self {
        Self::from_values(values)
    }
}

/// Free-form device strings ("7.5", " 3 ") -> number; anything else is absent.
fn parse_number(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

// ============================================================================
// BUILDER PATTERN
// ============================================================================

/// Builder for creating FeatureVector with named setters
pub struct FeatureVectorBuilder {
    vector: FeatureVector,
}

impl FeatureVectorBuilder {
    pub fn new() -> Self {
        Self { vector: FeatureVector::new() }
    }

    pub fn vulnerability_score(mut self, value: f32) -> Self {
        self.vector.set(0, value);
        self
    }

    pub fn threat_probability(mut self, value: f32) -> Self {
        self.vector.set(1, value);
        self
    }

    pub fn connections(mut self, value: f32) -> Self {
        self.vector.set(2, value);
        self
    }

    pub fn uptime(mut self, value: f32) -> Self {
        self.vector.set(3, value);
        self
    }

    pub fn patch_level(mut self, value: f32) -> Self {
        self.vector.set(4, value);
        self
    }

    pub fn criticality(mut self, value: f32) -> Self {
        self.vector.set(5, value);
        self
    }

    pub fn network_segment(mut self, value: f32) -> Self {
        self.vector.set(6, value);
        self
    }

    pub fn access_level(mut self, value: f32) -> Self {
        self.vector.set(7, value);
        self
    }

    pub fn build(self) -> FeatureVector {
        self.vector
    }
}

impl Default for FeatureVectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
