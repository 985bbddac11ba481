//! Central Configuration Constants
//!
//! Single source of truth for all configuration defaults.
//! Every runtime knob reads `TWINSHIELD_*` from the environment and falls
//! back to the value here.

use std::path::PathBuf;

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "TwinShield";

/// Sentinel id used when a telemetry message carries no `deviceId`
pub const UNKNOWN_DEVICE_ID: &str = "UnknownDevice";

/// Twin model assigned to devices created through telemetry
pub const DEFAULT_DEVICE_MODEL: &str = "dtmi:twinshield:Device;1";

/// Devices above this `highestThreat` count as high risk in a run summary
pub const HIGH_RISK_THRESHOLD: f32 = 0.7;

/// Default size of the per-device worker pool
pub const DEFAULT_MAX_WORKERS: usize = 8;

/// Default timeout for a single store call (milliseconds)
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 2_000;

/// Default store retry attempts
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Default first retry delay (milliseconds)
pub const DEFAULT_RETRY_MIN_BACKOFF_MS: u64 = 100;

/// Default retry delay cap (milliseconds)
pub const DEFAULT_RETRY_MAX_BACKOFF_MS: u64 = 2_000;

/// Default deadline for one simulation run (seconds)
pub const DEFAULT_RUN_TIMEOUT_SECS: u64 = 30;

/// Number of sealed runs kept in memory for the read API
pub const DEFAULT_RUN_HISTORY: usize = 20;

// ============================================
// Helper functions to read from env with fallback
// ============================================

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// Worker pool size
pub fn get_max_workers() -> usize {
    env_parse("TWINSHIELD_MAX_WORKERS", DEFAULT_MAX_WORKERS).max(1)
}

/// Store call timeout in milliseconds
pub fn get_store_timeout_ms() -> u64 {
    env_parse("TWINSHIELD_STORE_TIMEOUT_MS", DEFAULT_STORE_TIMEOUT_MS)
}

/// Store retry attempts
pub fn get_retry_attempts() -> u32 {
    env_parse("TWINSHIELD_RETRY_ATTEMPTS", DEFAULT_RETRY_ATTEMPTS).max(1)
}

/// First retry delay in milliseconds
pub fn get_retry_min_backoff_ms() -> u64 {
    env_parse("TWINSHIELD_RETRY_MIN_BACKOFF_MS", DEFAULT_RETRY_MIN_BACKOFF_MS)
}

/// Retry delay cap in milliseconds
pub fn get_retry_max_backoff_ms() -> u64 {
    env_parse("TWINSHIELD_RETRY_MAX_BACKOFF_MS", DEFAULT_RETRY_MAX_BACKOFF_MS)
}

/// Run deadline in seconds
pub fn get_run_timeout_secs() -> u64 {
    env_parse("TWINSHIELD_RUN_TIMEOUT_SECS", DEFAULT_RUN_TIMEOUT_SECS)
}

/// Size of the in-memory run history
pub fn get_run_history() -> usize {
    env_parse("TWINSHIELD_RUN_HISTORY", DEFAULT_RUN_HISTORY).max(1)
}

/// Optional path to a pre-trained scoring artifact
pub fn get_model_path() -> Option<PathBuf> {
    std::env::var("TWINSHIELD_MODEL_PATH")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
}

/// Optional pinned SHA-256 of the scoring artifact
pub fn get_model_sha256() -> Option<String> {
    std::env::var("TWINSHIELD_MODEL_SHA256")
        .ok()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
}

/// Directory for the JSONL run log
pub fn get_run_log_dir() -> PathBuf {
    std::env::var("TWINSHIELD_RUN_LOG_DIR")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("twinshield")
                .join("runs")
        })
}
