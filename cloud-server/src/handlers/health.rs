//! Health check handler

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    timestamp: i64,
    scorer: String,
    run_in_progress: bool,
}

pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().timestamp(),
        scorer: state.coordinator.scorer_name().to_string(),
        run_in_progress: state.current_run.lock().is_some(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::test_state;

    #[tokio::test]
    async fn test_health_reports_scorer() {
        let Json(health) = check(State(test_state())).await;
        assert_eq!(health.status, "healthy");
        assert_eq!(health.scorer, "dense-builtin");
        assert!(!health.run_in_progress);
    }
}
