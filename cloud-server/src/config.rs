//! Configuration module

use std::env;

/// Server configuration (pipeline knobs live in `PipelineConfig`)
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    /// Capacity of the defense action channel
    pub action_channel_capacity: usize,

    /// Append sealed runs to the JSONL run log
    pub record_runs: bool,

    /// Seed the mock fleet on startup
    pub seed_demo_fleet: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),

            environment: env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),

            action_channel_capacity: env::var("ACTION_CHANNEL_CAPACITY")
                .ok()
                .and_then(|c| c.parse().ok())
                .unwrap_or(1024),

            record_runs: env_flag("RECORD_RUNS", true),

            seed_demo_fleet: env_flag("SEED_DEMO_FLEET", false),
        }
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            environment: "development".to_string(),
            action_channel_capacity: 1024,
            record_runs: false,
            seed_demo_fleet: false,
        }
    }
}

fn env_flag(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}
