//! Inference - scorer contract and prediction type
//!
//! Any `ThreatScorer` maps a `FeatureVector` to three category scores.
//! `ThreatPrediction::from_scores` owns the parts every scorer must agree on:
//! clamping, argmax with earliest-category tie-break, and the
//! low-confidence flag.

use serde::{Deserialize, Serialize};

use crate::logic::features::layout::{feature_index, FEATURE_COUNT};
use crate::logic::features::FeatureVector;

// ============================================================================
// CATEGORIES
// ============================================================================

/// Threat categories, in tie-break order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThreatCategory {
    #[serde(rename = "Ransomware")]
    Ransomware,
    #[serde(rename = "DDoS")]
    DDoS,
    #[serde(rename = "Data Theft")]
    DataTheft,
}

pub const CATEGORY_COUNT: usize = 3;

impl ThreatCategory {
    pub const ALL: [ThreatCategory; CATEGORY_COUNT] = [
        ThreatCategory::Ransomware,
        ThreatCategory::DDoS,
        ThreatCategory::DataTheft,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            ThreatCategory::Ransomware => "Ransomware",
            ThreatCategory::DDoS => "DDoS",
            ThreatCategory::DataTheft => "Data Theft",
        }
    }
}

impl std::fmt::Display for ThreatCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

// ============================================================================
// PREDICTION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreatPrediction {
    pub ransomware: f32,
    pub ddos: f32,
    pub data_theft: f32,
    /// max(categories)
    pub highest_threat: f32,
    /// argmax(categories), earliest category wins ties
    pub predicted_type: ThreatCategory,
    /// At least one input feature fell back to its default
    pub low_confidence: bool,
    /// Scorer that produced this prediction
    pub method: String,
}

impl ThreatPrediction {
    /// Build from raw scorer output. Non-finite scores count as 0.
    pub fn from_scores(raw: [f32; CATEGORY_COUNT], low_confidence: bool, method: &str) -> Self {
        let scores = raw.map(|s| if s.is_finite() { s.clamp(0.0, 1.0) } else { 0.0 });

        let mut best = 0;
        for i in 1..CATEGORY_COUNT {
            if scores[i] > scores[best] {
                best = i;
            }
        }

        Self {
            ransomware: scores[0],
            ddos: scores[1],
            data_theft: scores[2],
            highest_threat: scores[best],
            predicted_type: ThreatCategory::ALL[best],
            low_confidence,
            method: method.to_string(),
        }
    }

    pub fn scores(&self) -> [f32; CATEGORY_COUNT] {
        [self.ransomware, self.ddos, self.data_theft]
    }

    pub fn score_of(&self, category: ThreatCategory) -> f32 {
        match category {
            ThreatCategory::Ransomware => self.ransomware,
            ThreatCategory::DDoS => self.ddos,
            ThreatCategory::DataTheft => self.data_theft,
        }
    }
}

// ============================================================================
// SCORER TRAIT
// ============================================================================

/// Deterministic feature vector -> prediction.
pub trait ThreatScorer: Send + Sync {
    fn score(&self, features: &FeatureVector) -> ThreatPrediction;

    /// Short identifier recorded in `ThreatPrediction::method`
    fn name(&self) -> &str;
}

// ============================================================================
// HEURISTIC FALLBACK
// ============================================================================

/// Upper bound per feature used to squash count-like features into [0,1]
const HEURISTIC_SCALE: [f32; FEATURE_COUNT] = [1.0, 1.0, 1000.0, 8760.0, 10.0, 1.0, 10.0, 5.0];

/// Rule-based scorer used when no trained artifact is available.
#[derive(Debug, Clone, Default)]
pub struct HeuristicScorer;

impl HeuristicScorer {
    pub fn new() -> Self {
        Self
    }

    fn unit(features: &FeatureVector, name: &str) -> f32 {
        let Some(i) = feature_index(name) else {
            return 0.0;
        };
        let value = features.get(i).unwrap_or(0.0);
        (value / HEURISTIC_SCALE[i]).clamp(0.0, 1.0)
    }
}

impl ThreatScorer for HeuristicScorer {
    fn score(&self, features: &FeatureVector) -> ThreatPrediction {
        let vuln = Self::unit(features, "vulnerability_score");
        let threat = Self::unit(features, "threat_probability");
        let conns = Self::unit(features, "connections");
        let patch = Self::unit(features, "patch_level");
        let crit = Self::unit(features, "criticality");
        let access = Self::unit(features, "access_level");

        // Well-patched devices are less exposed to ransomware
        let ransomware = 0.4 * vuln + 0.3 * threat + 0.2 * crit + 0.1 * access - 0.1 * patch;
        let ddos = 0.4 * conns + 0.4 * threat + 0.2 * vuln;
        let data_theft = 0.35 * access + 0.3 * crit + 0.25 * threat + 0.1 * vuln;

        ThreatPrediction::from_scores(
            [ransomware, ddos, data_theft],
            !features.is_complete(),
            self.name(),
        )
    }

    fn name(&self) -> &str {
        "heuristic"
    }
}
