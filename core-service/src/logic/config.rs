//! Pipeline configuration
//!
//! Built from the environment (see `constants`) or constructed directly in
//! tests. Passed explicitly into the ingestor and the coordinator.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::logic::twin::RetryPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Max concurrent per-device tasks
    pub max_workers: usize,
    /// Timeout applied to each store call
    pub store_timeout: Duration,
    /// Bounded retry for store calls
    pub retry: RetryPolicy,
    /// Deadline for a whole run; expiry cancels unstarted write-backs
    pub run_timeout: Duration,
    /// Sealed runs kept for the read API
    pub run_history: usize,
    /// Pre-trained scoring artifact, if any
    pub model_path: Option<PathBuf>,
    /// Pinned SHA-256 of the artifact
    pub model_sha256: Option<String>,
    /// JSONL run log directory
    pub run_log_dir: PathBuf,
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        Self {
            max_workers: constants::get_max_workers(),
            store_timeout: Duration::from_millis(constants::get_store_timeout_ms()),
            retry: RetryPolicy {
                attempts: constants::get_retry_attempts(),
                first_delay: Duration::from_millis(constants::get_retry_min_backoff_ms()),
                delay_cap: Duration::from_millis(constants::get_retry_max_backoff_ms()),
            },
            run_timeout: Duration::from_secs(constants::get_run_timeout_secs()),
            run_history: constants::get_run_history(),
            model_path: constants::get_model_path(),
            model_sha256: constants::get_model_sha256(),
            run_log_dir: constants::get_run_log_dir(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_workers: constants::DEFAULT_MAX_WORKERS,
            store_timeout: Duration::from_millis(constants::DEFAULT_STORE_TIMEOUT_MS),
            retry: RetryPolicy::default(),
            run_timeout: Duration::from_secs(constants::DEFAULT_RUN_TIMEOUT_SECS),
            run_history: constants::DEFAULT_RUN_HISTORY,
            model_path: None,
            model_sha256: None,
            run_log_dir: PathBuf::from("runs"),
        }
    }
}
