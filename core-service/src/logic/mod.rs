//! Logic Module - the telemetry -> twin -> score -> action pipeline
//!
//! ## Layout
//! - `features/` - message normalization, feature layout and vectors
//! - `twin/` - device twin state, store trait, retry
//! - `model/` - threat scorers
//! - `response/` - action policy and sinks
//! - `simulation/` - run coordinator, run history, run log
//! - `ingest` - telemetry batch ingestion
//! - `dashboard` - operator dashboard state reducer
//! - `fleet` - mock device fleet for demos

pub mod config;
pub mod dashboard;
pub mod error;
pub mod features;
pub mod fleet;
pub mod ingest;
pub mod model;
pub mod response;
pub mod simulation;
pub mod twin;

pub use config::PipelineConfig;
pub use error::{PipelineError, StoreError};
