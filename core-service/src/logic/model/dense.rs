//! Dense Scorer - feed-forward network over the feature vector
//!
//! Inputs are min/max normalized per feature, pushed through the layers
//! (ndarray), and the last layer's activation yields three category scores.
//!
//! Trained weights ship as a JSON artifact:
//! ```json
//! {
//!   "name": "twin-threat-v3",
//!   "feature_version": 1,
//!   "layout_hash": 305419896,
//!   "normalization": { "min_vals": [..8], "max_vals": [..8] },
//!   "layers": [ { "weights": [[..]], "bias": [..], "activation": "relu" }, .. ]
//! }
//! ```
//! The artifact is rejected if its checksum (when pinned) or feature layout
//! does not match.

use std::path::{Path, PathBuf};

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::inference::{ThreatPrediction, ThreatScorer, CATEGORY_COUNT};
use crate::logic::features::layout::{layout_hash, validate_layout, LayoutMismatchError, FEATURE_COUNT, FEATURE_VERSION};
use crate::logic::features::FeatureVector;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("cannot read weights {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("weights are not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("weights checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("bad weights shape: {0}")]
    Shape(String),

    #[error(transparent)]
    Layout(#[from] LayoutMismatchError),
}

// ============================================================================
// WEIGHTS ARTIFACT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Linear,
    Relu,
    Sigmoid,
    Softmax,
}

impl Activation {
    fn apply(&self, x: Array1<f32>) -> Array1<f32> {
        match self {
            Activation::Linear => x,
            Activation::Relu => x.mapv(|v| v.max(0.0)),
            Activation::Sigmoid => x.mapv(|v| 1.0 / (1.0 + (-v).exp())),
            Activation::Softmax => {
                let max = x.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
                let exp = x.mapv(|v| (v - max).exp());
                let sum = exp.sum();
                if sum > 0.0 {
                    exp / sum
                } else {
                    exp
                }
            }
        }
    }
}

/// Per-feature min/max used to scale inputs into [0,1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizationParams {
    pub min_vals: Vec<f32>,
    pub max_vals: Vec<f32>,
}

impl NormalizationParams {
    fn apply(&self, features: &[f32]) -> Array1<f32> {
        Array1::from_iter(features.iter().enumerate().map(|(i, &v)| {
            let min = self.min_vals.get(i).copied().unwrap_or(0.0);
            let max = self.max_vals.get(i).copied().unwrap_or(1.0);
            let range = (max - min).max(1e-8);
            ((v - min) / range).clamp(0.0, 1.0)
        }))
    }
}

impl Default for NormalizationParams {
    fn default() -> Self {
        Self {
            min_vals: vec![0.0; FEATURE_COUNT],
            max_vals: vec![1.0; FEATURE_COUNT],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerSpec {
    /// Row-major, one row per output unit
    pub weights: Vec<Vec<f32>>,
    pub bias: Vec<f32>,
    pub activation: Activation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightsFile {
    #[serde(default)]
    pub name: Option<String>,
    pub feature_version: u8,
    pub layout_hash: u32,
    pub normalization: NormalizationParams,
    pub layers: Vec<LayerSpec>,
}

// ============================================================================
// BUILT-IN WEIGHTS
// ============================================================================

// Feature order: vuln, threat, conns, uptime, patch, crit, segment, access
const BUILTIN_MIN: [f32; FEATURE_COUNT] = [0.0; FEATURE_COUNT];
const BUILTIN_MAX: [f32; FEATURE_COUNT] = [1.0, 1.0, 1000.0, 8760.0, 10.0, 1.0, 10.0, 5.0];

const BUILTIN_WEIGHTS: [[f32; FEATURE_COUNT]; CATEGORY_COUNT] = [
    [4.0, 3.0, 0.0, 0.0, -0.5, 1.5, 0.0, 1.0], // ransomware
    [1.0, 3.0, 3.0, 0.0, 0.0, 0.0, 0.5, 0.0],  // ddos
    [1.0, 2.5, 0.0, 0.0, 0.0, 2.0, 0.0, 2.5],  // data theft
];
const BUILTIN_BIAS: [f32; CATEGORY_COUNT] = [-4.5, -4.0, -4.5];

// ============================================================================
// SCORER
// ============================================================================

#[derive(Debug, Clone)]
struct Layer {
    weights: Array2<f32>,
    bias: Array1<f32>,
    activation: Activation,
}

#[derive(Debug, Clone)]
pub struct DenseScorer {
    name: String,
    normalization: NormalizationParams,
    layers: Vec<Layer>,
}

impl DenseScorer {
    /// Single sigmoid layer over the normalized features.
    pub fn builtin() -> Self {
        let weights = Array2::from_shape_fn((CATEGORY_COUNT, FEATURE_COUNT), |(r, c)| BUILTIN_WEIGHTS[r][c]);
        Self {
            name: "dense-builtin".to_string(),
            normalization: NormalizationParams {
                min_vals: BUILTIN_MIN.to_vec(),
                max_vals: BUILTIN_MAX.to_vec(),
            },
            layers: vec![Layer {
                weights,
                bias: Array1::from_vec(BUILTIN_BIAS.to_vec()),
                activation: Activation::Sigmoid,
            }],
        }
    }

    /// Load an artifact from disk, optionally pinning its SHA-256 (hex).
    pub fn load(path: &Path, expected_sha256: Option<&str>) -> Result<Self, ModelError> {
        log::info!("Loading scoring weights from: {}", path.display());

        let bytes = std::fs::read(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let scorer = Self::from_bytes(&bytes, expected_sha256)?;

        log::info!("Scoring weights loaded: {} ({} layers)", scorer.name, scorer.layers.len());
        Ok(scorer)
    }

    pub fn from_bytes(bytes: &[u8], expected_sha256: Option<&str>) -> Result<Self, ModelError> {
        if let Some(expected) = expected_sha256 {
            let actual = hex::encode(Sha256::digest(bytes));
            if !actual.eq_ignore_ascii_case(expected.trim()) {
                return Err(ModelError::ChecksumMismatch {
                    expected: expected.trim().to_lowercase(),
                    actual,
                });
            }
        }

        let file: WeightsFile = serde_json::from_slice(bytes)?;
        Self::from_weights(file)
    }

    pub fn from_weights(file: WeightsFile) -> Result<Self, ModelError> {
        validate_layout(file.feature_version, file.layout_hash)?;

        if file.normalization.min_vals.len() != FEATURE_COUNT
            || file.normalization.max_vals.len() != FEATURE_COUNT
        {
            return Err(ModelError::Shape(format!(
                "normalization needs {} min/max values",
                FEATURE_COUNT
            )));
        }
        if file.layers.is_empty() {
            return Err(ModelError::Shape("no layers".to_string()));
        }

        let mut layers = Vec::with_capacity(file.layers.len());
        let mut inputs = FEATURE_COUNT;
        for (i, spec) in file.layers.into_iter().enumerate() {
            let outputs = spec.weights.len();
            if outputs == 0 || spec.bias.len() != outputs {
                return Err(ModelError::Shape(format!(
                    "layer {}: {} weight rows but {} biases",
                    i,
                    outputs,
                    spec.bias.len()
                )));
            }
            if let Some(row) = spec.weights.iter().find(|row| row.len() != inputs) {
                return Err(ModelError::Shape(format!(
                    "layer {}: expected {} inputs, got a row of {}",
                    i,
                    inputs,
                    row.len()
                )));
            }

            let flat: Vec<f32> = spec.weights.into_iter().flatten().collect();
            let weights = Array2::from_shape_vec((outputs, inputs), flat)
                .map_err(|e| ModelError::Shape(format!("layer {}: {}", i, e)))?;

            layers.push(Layer {
                weights,
                bias: Array1::from_vec(spec.bias),
                activation: spec.activation,
            });
            inputs = outputs;
        }

        if inputs != CATEGORY_COUNT {
            return Err(ModelError::Shape(format!(
                "output layer has {} units, expected {}",
                inputs, CATEGORY_COUNT
            )));
        }

        Ok(Self {
            name: file.name.unwrap_or_else(|| "dense".to_string()),
            normalization: file.normalization,
            layers,
        })
    }

    /// Built-in weights as an artifact (for exporting / retraining seeds).
    pub fn builtin_weights() -> WeightsFile {
        WeightsFile {
            name: Some("dense-builtin".to_string()),
            feature_version: FEATURE_VERSION,
            layout_hash: layout_hash(),
            normalization: NormalizationParams {
                min_vals: BUILTIN_MIN.to_vec(),
                max_vals: BUILTIN_MAX.to_vec(),
            },
            layers: vec![LayerSpec {
                weights: BUILTIN_WEIGHTS.iter().map(|row| row.to_vec()).collect(),
                bias: BUILTIN_BIAS.to_vec(),
                activation: Activation::Sigmoid,
            }],
        }
    }

    fn forward(&self, features: &FeatureVector) -> [f32; CATEGORY_COUNT] {
        let mut x = self.normalization.apply(features.as_slice());
        for layer in &self.layers {
            x = layer.activation.apply(layer.weights.dot(&x) + &layer.bias);
        }

        let mut out = [0.0f32; CATEGORY_COUNT];
        for (slot, v) in out.iter_mut().zip(x.iter()) {
            *slot = *v;
        }
        out
    }
}

impl Default for DenseScorer {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ThreatScorer for DenseScorer {
    fn score(&self, features: &FeatureVector) -> ThreatPrediction {
        ThreatPrediction::from_scores(self.forward(features), !features.is_complete(), &self.name)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
