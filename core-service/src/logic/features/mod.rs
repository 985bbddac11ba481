//! Features Module - telemetry normalization and scorer input
//!
//! ## Structure
//! - `normalizer`: raw telemetry message -> device id + twin patch
//! - `layout`: versioned scorer feature layout (order, defaults, hash)
//! - `vector`: `FeatureVector` built from a twin snapshot

pub mod layout;
pub mod normalizer;
pub mod vector;

#[cfg(test)]
mod tests;

pub use layout::{LayoutInfo, LayoutMismatchError, FEATURE_COUNT, FEATURE_DEFAULTS, FEATURE_LAYOUT, FEATURE_VERSION};
pub use normalizer::{FeatureNormalizer, NormalizedMessage, TelemetryMetrics};
pub use vector::{FeatureVector, FeatureVectorBuilder};
