//! Simulation run handlers

use axum::{extract::{Path, State}, Json};
use serde::Serialize;
use uuid::Uuid;

use twinshield_core::logic::dashboard::DashboardEvent;
use twinshield_core::logic::simulation::{CancelHandle, RunSummary, SimulationRun};

use crate::{AppError, AppResult, AppState};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelResponse {
    pub cancelled: bool,
}

/// Frees the run slot when the run task ends, however it ends.
struct RunSlot {
    state: AppState,
}

impl Drop for RunSlot {
    fn drop(&mut self) {
        self.state.current_run.lock().take();
    }
}

/// Run one simulation over every twin; one run at a time.
///
/// The run, its publication and the slot release live in a detached task,
/// so a client that disconnects mid-run does not strand the slot or lose
/// the sealed run.
pub async fn run(State(state): State<AppState>) -> AppResult<Json<SimulationRun>> {
    let cancel = {
        let mut current = state.current_run.lock();
        if current.is_some() {
            return Err(AppError::Conflict("A simulation run is already in progress".to_string()));
        }
        let handle = CancelHandle::new();
        *current = Some(handle.clone());
        handle
    };

    state.dispatch(DashboardEvent::Loading(true));

    let task_state = state.clone();
    let joined = tokio::spawn(async move {
        let slot = RunSlot { state: task_state.clone() };
        let run = task_state.coordinator.run_with_cancel(cancel).await;

        tracing::info!(
            run_id = %run.run_id,
            devices = run.total_devices,
            high_risk = run.high_risk_count,
            failed = run.failed_count,
            cancelled = run.cancelled,
            "Simulation run sealed"
        );

        let run = task_state.publish_run(run);
        drop(slot);
        task_state.refresh_devices().await;
        run
    })
    .await;

    match joined {
        Ok(run) => Ok(Json(SimulationRun::clone(&run))),
        Err(e) => {
            state.dispatch(DashboardEvent::Error(Some(e.to_string())));
            Err(e.into())
        }
    }
}

/// Request cancellation of the run in progress
pub async fn cancel(State(state): State<AppState>) -> Json<CancelResponse> {
    let cancelled = match state.current_run.lock().as_ref() {
        Some(handle) => {
            handle.cancel();
            true
        }
        None => false,
    };
    Json(CancelResponse { cancelled })
}

pub async fn latest(State(state): State<AppState>) -> AppResult<Json<SimulationRun>> {
    state
        .history
        .latest()
        .map(|run| Json(SimulationRun::clone(&run)))
        .ok_or_else(|| AppError::NotFound("No simulation run yet".to_string()))
}

pub async fn get(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> AppResult<Json<SimulationRun>> {
    state
        .history
        .get(run_id)
        .map(|run| Json(SimulationRun::clone(&run)))
        .ok_or_else(|| AppError::NotFound(format!("Run {} not found", run_id)))
}

/// Summaries of retained runs, newest first
pub async fn history(State(state): State<AppState>) -> Json<Vec<RunSummary>> {
    Json(state.history.summaries())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::config::Config;
    use crate::state::testing::test_state;
    use twinshield_core::logic::error::StoreError;
    use twinshield_core::logic::response::LogSink;
    use twinshield_core::logic::twin::{
        DeviceState, InMemoryTwinStore, PatchValue, PropertyPath, TwinPatch, TwinQuery, TwinStore,
    };
    use twinshield_core::logic::PipelineConfig;

    /// In-memory store whose snapshot reads take a while.
    struct SlowSnapshotStore {
        inner: InMemoryTwinStore,
        delay: Duration,
    }

    #[async_trait]
    impl TwinStore for SlowSnapshotStore {
        async fn get(&self, device_id: &str) -> Result<Option<DeviceState>, StoreError> {
            self.inner.get(device_id).await
        }

        async fn apply(&self, device_id: &str, patch: &TwinPatch) -> Result<(), StoreError> {
            self.inner.apply(device_id, patch).await
        }

        async fn query(&self, query: &TwinQuery) -> Result<Vec<DeviceState>, StoreError> {
            tokio::time::sleep(self.delay).await;
            self.inner.query(query).await
        }
    }

    fn slow_state(delay: Duration) -> AppState {
        let store = SlowSnapshotStore {
            inner: InMemoryTwinStore::new(),
            delay,
        };
        AppState::new(Config::default(), PipelineConfig::default(), Arc::new(store), Arc::new(LogSink))
    }

    async fn seed(state: &AppState, ids: &[&str]) {
        for id in ids {
            let patch = TwinPatch::new()
                .replace(PropertyPath::IpAddress, PatchValue::Text("10.0.0.9".into()))
                .replace(PropertyPath::SuspiciousFlag, PatchValue::Integer(1));
            state.store.apply(id, &patch).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_run_publishes_to_history_and_dashboard() {
        let state = test_state();
        seed(&state, &["a", "b"]).await;

        let Json(run) = run(State(state.clone())).await.unwrap();
        assert_eq!(run.total_devices, 2);
        assert!(state.current_run.lock().is_none());

        let Json(latest) = latest(State(state.clone())).await.unwrap();
        assert_eq!(latest.run_id, run.run_id);

        let Json(found) = get(State(state.clone()), Path(run.run_id)).await.unwrap();
        assert_eq!(found.total_devices, 2);

        let dashboard = state.dashboard.read();
        assert_eq!(dashboard.runs_seen, 1);
        assert!(!dashboard.is_loading);
        assert_eq!(dashboard.devices.len(), 2);
        assert!(dashboard.devices.iter().all(|d| d.threat_probability.is_some()));
    }

    #[tokio::test]
    async fn test_second_run_conflicts_while_one_is_active() {
        let state = test_state();
        *state.current_run.lock() = Some(CancelHandle::new());

        let result = run(State(state)).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_cancel_without_run() {
        let Json(resp) = cancel(State(test_state())).await;
        assert!(!resp.cancelled);
    }

    #[tokio::test]
    async fn test_cancel_signals_active_run() {
        let state = test_state();
        let handle = CancelHandle::new();
        *state.current_run.lock() = Some(handle.clone());

        let Json(resp) = cancel(State(state)).await;
        assert!(resp.cancelled);
        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn test_latest_and_get_without_runs() {
        let state = test_state();
        assert!(matches!(latest(State(state.clone())).await, Err(AppError::NotFound(_))));
        assert!(matches!(get(State(state.clone()), Path(Uuid::new_v4())).await, Err(AppError::NotFound(_))));

        let Json(summaries) = history(State(state)).await;
        assert!(summaries.is_empty());
    }

    #[tokio::test]
    async fn test_history_newest_first() {
        let state = test_state();
        seed(&state, &["a"]).await;
        let Json(first) = run(State(state.clone())).await.unwrap();
        let Json(second) = run(State(state.clone())).await.unwrap();

        let Json(summaries) = history(State(state)).await;
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].run_id, second.run_id);
        assert_eq!(summaries[1].run_id, first.run_id);
    }

    #[tokio::test]
    async fn test_dropped_request_still_publishes_and_frees_slot() {
        let state = slow_state(Duration::from_millis(200));
        seed(&state, &["a"]).await;

        let request = tokio::spawn(run(State(state.clone())));
        tokio::time::sleep(Duration::from_millis(20)).await;
        request.abort();
        assert!(request.await.unwrap_err().is_cancelled());

        // Snapshot read (200 ms) has to finish before the slot frees up
        let mut waited = 0;
        while state.current_run.lock().is_some() && waited < 2_000 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            waited += 20;
        }

        assert!(state.current_run.lock().is_none());
        assert_eq!(state.history.len(), 1);
        assert_eq!(state.dashboard.read().runs_seen, 1);

        let Json(next) = run(State(state.clone())).await.unwrap();
        assert_eq!(next.total_devices, 1);
        assert_eq!(state.history.len(), 2);
    }
}
