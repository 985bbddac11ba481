//! Twin Module - canonical per-device state
//!
//! ## Structure
//! - `types`: DeviceState, property paths, replace-only patches, queries
//! - `store`: `TwinStore` trait + in-memory backend with per-device locking
//! - `retry`: bounded retry / timeout wrapper for store calls

pub mod types;
pub mod store;
pub mod retry;

#[cfg(test)]
pub(crate) mod testing;

pub use types::{
    DeviceState, DeviceProperties, TrafficProperties, AttackSimulationProperties,
    PredictionProperties, ScoringProperties, PropertyPath, PatchValue, PatchOp,
    TwinPatch, TwinQuery,
};
pub use store::{TwinStore, InMemoryTwinStore};
pub use retry::{RetryPolicy, RetryFailure, with_retry};
