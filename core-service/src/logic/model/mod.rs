//! Model Module - threat scoring
//!
//! - `inference`: `ThreatScorer` contract, `ThreatPrediction`, heuristic fallback
//! - `dense`: feed-forward scorer with built-in or file-loaded weights

pub mod dense;
pub mod inference;

use std::sync::Arc;

pub use dense::{Activation, DenseScorer, ModelError, NormalizationParams, WeightsFile};
pub use inference::{HeuristicScorer, ThreatCategory, ThreatPrediction, ThreatScorer, CATEGORY_COUNT};

use crate::logic::config::PipelineConfig;

/// Scorer for a pipeline: configured artifact, else built-in weights.
/// A configured artifact that fails to load degrades to the heuristic scorer.
pub fn scorer_from_config(config: &PipelineConfig) -> Arc<dyn ThreatScorer> {
    let Some(path) = config.model_path.as_deref() else {
        return Arc::new(DenseScorer::builtin());
    };

    match DenseScorer::load(path, config.model_sha256.as_deref()) {
        Ok(scorer) => Arc::new(scorer),
        Err(e) => {
            log::warn!("Scoring weights unusable ({}), using heuristic scorer", e);
            Arc::new(HeuristicScorer::new())
        }
    }
}
