//! Shared application state

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use twinshield_core::logic::dashboard::{reduce, DashboardEvent, DashboardState};
use twinshield_core::logic::ingest::TelemetryIngestor;
use twinshield_core::logic::model::scorer_from_config;
use twinshield_core::logic::response::ActionSink;
use twinshield_core::logic::simulation::{
    CancelHandle, DeviceView, RunHistory, RunRecorder, SimulationCoordinator, SimulationRun,
};
use twinshield_core::logic::twin::TwinStore;
use twinshield_core::logic::PipelineConfig;

use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn TwinStore>,
    pub ingestor: Arc<TelemetryIngestor>,
    pub coordinator: Arc<SimulationCoordinator>,
    pub history: Arc<RunHistory>,
    pub recorder: Option<Arc<RunRecorder>>,
    pub sink: Arc<dyn ActionSink>,
    pub dashboard: Arc<RwLock<DashboardState>>,
    /// Cancel switch of the run in progress, if any
    pub current_run: Arc<Mutex<Option<CancelHandle>>>,
}

impl AppState {
    pub fn new(
        config: Config,
        pipeline: PipelineConfig,
        store: Arc<dyn TwinStore>,
        sink: Arc<dyn ActionSink>,
    ) -> Self {
        let scorer = scorer_from_config(&pipeline);
        let recorder = config
            .record_runs
            .then(|| Arc::new(RunRecorder::new(pipeline.run_log_dir.clone())));

        Self {
            ingestor: Arc::new(TelemetryIngestor::new(store.clone(), pipeline.clone())),
            coordinator: Arc::new(
                SimulationCoordinator::new(store.clone(), scorer, pipeline.clone()).with_sink(sink.clone()),
            ),
            history: Arc::new(RunHistory::new(pipeline.run_history)),
            recorder,
            sink,
            dashboard: Arc::new(RwLock::new(DashboardState::default())),
            current_run: Arc::new(Mutex::new(None)),
            store,
            config,
        }
    }

    /// Apply one dashboard transition.
    pub fn dispatch(&self, event: DashboardEvent) {
        let mut guard = self.dashboard.write();
        let current = std::mem::take(&mut *guard);
        *guard = reduce(current, event);
    }

    /// Reload the dashboard's device list from the store.
    pub async fn refresh_devices(&self) -> Vec<DeviceView> {
        match self.store.list_all().await {
            Ok(twins) => {
                let views: Vec<DeviceView> = twins.iter().map(DeviceView::from).collect();
                self.dispatch(DashboardEvent::DevicesLoaded(views.clone()));
                views
            }
            Err(e) => {
                tracing::warn!("Device refresh failed: {}", e);
                self.dispatch(DashboardEvent::Error(Some(e.to_string())));
                Vec::new()
            }
        }
    }

    /// Store a sealed run: history, run log, dashboard.
    pub fn publish_run(&self, run: SimulationRun) -> Arc<SimulationRun> {
        if let Some(recorder) = &self.recorder {
            if let Err(e) = recorder.append(&run) {
                tracing::warn!("Failed to record run {}: {}", run.run_id, e);
            }
        }

        let health = network_health(&run);
        let run = self.history.push(run);
        self.dispatch(DashboardEvent::RunSealed(run.summary()));
        if let Some(health) = health {
            self.dispatch(DashboardEvent::NetworkHealth(health));
        }
        run
    }
}

/// 100 minus the mean threat (in percent) across the run's devices.
fn network_health(run: &SimulationRun) -> Option<u8> {
    if run.devices.is_empty() {
        return None;
    }
    let mean = run
        .devices
        .iter()
        .map(|d| d.prediction.highest_threat)
        .sum::<f32>()
        / run.devices.len() as f32;
    Some((100.0 - mean * 100.0).round().clamp(0.0, 100.0) as u8)
}
