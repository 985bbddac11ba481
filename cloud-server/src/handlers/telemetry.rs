//! Telemetry ingestion handler

use axum::{extract::State, Json};

use twinshield_core::logic::ingest::{BatchReport, TelemetryInput};

use crate::{AppError, AppResult, AppState};

/// Largest batch accepted in one request
pub const MAX_BATCH_SIZE: usize = 1000;

/// Ingest a batch of telemetry messages (raw strings or JSON documents)
pub async fn ingest(
    State(state): State<AppState>,
    Json(batch): Json<Vec<TelemetryInput>>,
) -> AppResult<Json<BatchReport>> {
    if batch.is_empty() {
        return Err(AppError::ValidationError("Telemetry batch is empty".to_string()));
    }
    if batch.len() > MAX_BATCH_SIZE {
        return Err(AppError::ValidationError(format!(
            "Telemetry batch exceeds {} messages",
            MAX_BATCH_SIZE
        )));
    }

    let report = state.ingestor.ingest(batch).await;
    tracing::info!(
        received = report.received,
        applied = report.applied,
        failed = report.failed,
        malformed = report.malformed(),
        "Telemetry batch ingested"
    );

    state.refresh_devices().await;
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::test_state;
    use serde_json::json;

    #[tokio::test]
    async fn test_ingest_updates_store_and_dashboard() {
        let state = test_state();
        let batch = vec![
            TelemetryInput::from(json!({"deviceId": "cam-1", "os": "Linux", "trafficVolume": 500})),
            TelemetryInput::from("{not json"),
        ];

        let Json(report) = ingest(State(state.clone()), Json(batch)).await.unwrap();
        assert_eq!(report.received, 2);
        assert_eq!(report.applied, 1);
        assert_eq!(report.malformed(), 1);

        let twin = state.store.get("cam-1").await.unwrap().unwrap();
        assert_eq!(twin.traffic.traffic_volume, 500);
        assert_eq!(state.dashboard.read().devices.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_batch_rejected() {
        let result = ingest(State(test_state()), Json(Vec::new())).await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_oversized_batch_rejected() {
        let batch = (0..=MAX_BATCH_SIZE)
            .map(|i| TelemetryInput::from(json!({"deviceId": format!("d{}", i)})))
            .collect();
        let result = ingest(State(test_state()), Json(batch)).await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }
}
