//! Simulation Coordinator - one scoring pass over every known device
//!
//! Snapshot -> fan out (score, derive actions, write back) -> join -> seal.
//!
//! - fan-out is bounded by `max_workers`
//! - a device whose write-back has not started when the run is cancelled is
//!   recorded as `Cancelled`; in-flight write-backs finish
//! - `run_timeout` expiry cancels the run the same way
//! - a device task that panics is reported as `Aborted`, never dropped
//! - the run is sealed only after every task has been joined

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use uuid::Uuid;

use super::types::{DeviceOutcome, DeviceStatus, SimulationRun};
use crate::logic::config::PipelineConfig;
use crate::logic::error::PipelineError;
use crate::logic::features::FeatureVector;
use crate::logic::model::{ThreatPrediction, ThreatScorer};
use crate::logic::response::{self, ActionSink};
use crate::logic::twin::{with_retry, DeviceState, PatchValue, PropertyPath, TwinPatch, TwinStore};

// ============================================================================
// CANCELLATION
// ============================================================================

/// Cloneable cancel switch shared between a run and whoever may stop it.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once `cancel` has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // Sender lives in self, so wait_for cannot observe a closed channel
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// COORDINATOR
// ============================================================================

pub struct SimulationCoordinator {
    store: Arc<dyn TwinStore>,
    scorer: Arc<dyn ThreatScorer>,
    sink: Option<Arc<dyn ActionSink>>,
    config: PipelineConfig,
}

impl SimulationCoordinator {
    pub fn new(store: Arc<dyn TwinStore>, scorer: Arc<dyn ThreatScorer>, config: PipelineConfig) -> Self {
        Self {
            store,
            scorer,
            sink: None,
            config,
        }
    }

    /// Hand every non-cancelled device's actions to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn ActionSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn scorer_name(&self) -> &str {
        self.scorer.name()
    }

    pub async fn run(&self) -> SimulationRun {
        self.run_with_cancel(CancelHandle::new()).await
    }

    pub async fn run_with_cancel(&self, cancel: CancelHandle) -> SimulationRun {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        log::info!("Simulation run {} started (scorer: {})", run_id, self.scorer.name());

        let snapshot = with_retry(
            &self.config.retry,
            self.config.store_timeout,
            "list_all",
            || self.store.list_all(),
        )
        .await;

        let devices = match snapshot {
            Ok(devices) => devices,
            Err(failure) => {
                let error = format!(
                    "device snapshot failed after {} attempt(s): {}",
                    failure.attempts, failure.last_error
                );
                log::error!("Simulation run {}: {}", run_id, error);
                return SimulationRun::seal(run_id, started_at, Vec::new(), cancel.is_cancelled(), Some(error));
            }
        };

        let semaphore = Arc::new(Semaphore::new(self.config.max_workers.max(1)));
        let mut tasks = JoinSet::new();

        for (order, device) in devices.into_iter().enumerate() {
            let task = DeviceTask {
                store: self.store.clone(),
                scorer: self.scorer.clone(),
                sink: self.sink.clone(),
                config: self.config.clone(),
                cancel: cancel.clone(),
            };
            let semaphore = semaphore.clone();
            let device_id = device.device_id.clone();
            let ip_address = device.device.ip_address.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                // Inner task so a panicking scorer or store still yields an outcome
                let outcome = match tokio::spawn(task.process(device)).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        log::error!("Simulation task for {} aborted: {}", device_id, e);
                        DeviceOutcome::aborted(device_id, ip_address, e.to_string())
                    }
                };
                (order, outcome)
            });
        }

        let deadline = tokio::time::sleep(self.config.run_timeout);
        tokio::pin!(deadline);
        let mut deadline_hit = false;
        let mut outcomes = Vec::with_capacity(tasks.len());

        loop {
            tokio::select! {
                joined = tasks.join_next() => match joined {
                    Some(Ok(outcome)) => outcomes.push(outcome),
                    Some(Err(e)) => log::error!("Simulation task aborted: {}", e),
                    None => break,
                },
                _ = &mut deadline, if !deadline_hit => {
                    deadline_hit = true;
                    log::warn!(
                        "Simulation run {} exceeded {:?}, cancelling remaining write-backs",
                        run_id,
                        self.config.run_timeout
                    );
                    cancel.cancel();
                }
            }
        }

        outcomes.sort_by_key(|(order, _)| *order);
        let outcomes = outcomes.into_iter().map(|(_, outcome)| outcome).collect();

        let run = SimulationRun::seal(run_id, started_at, outcomes, cancel.is_cancelled(), None);
        log::info!(
            "Simulation run {} sealed: {} device(s), {} high risk, {} updated, {} failed, {} cancelled",
            run.run_id,
            run.total_devices,
            run.high_risk_count,
            run.updated_count,
            run.failed_count,
            run.cancelled_count
        );
        run
    }
}

// ============================================================================
// PER-DEVICE TASK
// ============================================================================

struct DeviceTask {
    store: Arc<dyn TwinStore>,
    scorer: Arc<dyn ThreatScorer>,
    sink: Option<Arc<dyn ActionSink>>,
    config: PipelineConfig,
    cancel: CancelHandle,
}

impl DeviceTask {
    async fn process(self, device: DeviceState) -> DeviceOutcome {
        let features = FeatureVector::from_device(&device);
        let prediction = self.scorer.score(&features);
        if prediction.low_confidence {
            let notice = PipelineError::ScoringInputIncomplete {
                device_id: device.device_id.clone(),
                missing: features.defaulted(),
            };
            log::debug!("{}", notice);
        }

        let actions = response::actions(&prediction, &device);

        let status = if self.cancel.is_cancelled() {
            log::debug!("{}", PipelineError::RunCancelled { device_id: device.device_id.clone() });
            DeviceStatus::Cancelled
        } else {
            self.write_back(&device.device_id, &prediction).await
        };

        if status != DeviceStatus::Cancelled {
            if let Some(sink) = &self.sink {
                sink.submit_all(&actions);
            }
        }

        DeviceOutcome {
            ip_address: device.device.ip_address.clone(),
            device_id: device.device_id,
            prediction,
            actions,
            status,
        }
    }

    async fn write_back(&self, device_id: &str, prediction: &ThreatPrediction) -> DeviceStatus {
        let patch = TwinPatch::new()
            .replace(
                PropertyPath::ThreatProbability,
                PatchValue::Float(f64::from(prediction.highest_threat)),
            )
            .replace(
                PropertyPath::LastPrediction,
                PatchValue::Text(prediction.predicted_type.display_name().to_string()),
            );

        let label = format!("write-back {}", device_id);
        let result = with_retry(&self.config.retry, self.config.store_timeout, &label, || {
            self.store.apply(device_id, &patch)
        })
        .await;

        match result {
            Ok(()) => DeviceStatus::Updated,
            Err(failure) => {
                let error = PipelineError::StoreUnavailable {
                    device_id: device_id.to_string(),
                    attempts: failure.attempts,
                    source: failure.last_error,
                };
                log::warn!("{}", error);
                DeviceStatus::WriteFailed {
                    error: error.to_string(),
                }
            }
        }
    }
}
