//! Simulation Module - run orchestration and run records
//!
//! ## Structure
//! - `coordinator`: snapshot -> fan-out scoring/write-back -> sealed run
//! - `types`: `SimulationRun`, per-device outcomes
//! - `history`: recent runs + device projections for the read API
//! - `recorder`: JSONL run log

pub mod coordinator;
pub mod history;
pub mod recorder;
pub mod types;

pub use coordinator::{CancelHandle, SimulationCoordinator};
pub use history::{DeviceView, RunHistory};
pub use recorder::{RecorderStats, RunRecorder};
pub use types::{DeviceOutcome, DeviceStatus, RunSummary, SimulationRun};
