//! Telemetry ingestion - batch of raw messages -> twin patches
//!
//! Every message is normalized on its own; a malformed one is reported and
//! skipped. Messages are then grouped by device: devices are patched
//! concurrently (bounded by `max_workers`), while the patches of one device
//! are applied one after another in arrival order.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::logic::config::PipelineConfig;
use crate::logic::error::PipelineError;
use crate::logic::features::{FeatureNormalizer, NormalizedMessage};
use crate::logic::twin::{with_retry, TwinStore};

/// One message as received: raw text or an already-parsed document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TelemetryInput {
    Text(String),
    Json(Value),
}

impl From<&str> for TelemetryInput {
    fn from(raw: &str) -> Self {
        TelemetryInput::Text(raw.to_string())
    }
}

impl From<Value> for TelemetryInput {
    fn from(value: Value) -> Self {
        TelemetryInput::Json(value)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceIngestResult {
    pub device_id: String,
    /// Batch indexes of the messages for this device, in apply order
    pub messages: Vec<usize>,
    pub applied: usize,
    pub failed: usize,
    pub errors: Vec<PipelineError>,
}

impl DeviceIngestResult {
    /// The device's worker panicked; how many patches landed is unknown, so
    /// every message is counted as failed.
    fn aborted(device_id: String, messages: Vec<usize>, reason: String) -> Self {
        Self {
            failed: messages.len(),
            errors: vec![PipelineError::TaskAborted {
                device_id: device_id.clone(),
                reason,
            }],
            device_id,
            messages,
            applied: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub received: usize,
    /// Messages that normalized (including sentinel-id ones)
    pub accepted: usize,
    pub applied: usize,
    pub failed: usize,
    /// Malformed / missing-identity notices, in batch order
    pub issues: Vec<PipelineError>,
    /// Per device, ordered by first appearance in the batch
    pub devices: Vec<DeviceIngestResult>,
}

impl BatchReport {
    pub fn malformed(&self) -> usize {
        self.issues
            .iter()
            .filter(|e| matches!(e, PipelineError::MalformedMessage { .. }))
            .count()
    }
}

pub struct TelemetryIngestor {
    store: Arc<dyn TwinStore>,
    normalizer: FeatureNormalizer,
    config: PipelineConfig,
}

impl TelemetryIngestor {
    pub fn new(store: Arc<dyn TwinStore>, config: PipelineConfig) -> Self {
        Self {
            store,
            normalizer: FeatureNormalizer::new(),
            config,
        }
    }

    pub fn with_normalizer(mut self, normalizer: FeatureNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Ingest one batch. Never fails as a whole; problems land in the report.
    pub async fn ingest(&self, batch: Vec<TelemetryInput>) -> BatchReport {
        let mut report = BatchReport {
            received: batch.len(),
            ..BatchReport::default()
        };

        let mut groups: Vec<(String, Vec<NormalizedMessage>)> = Vec::new();
        let mut slot_of: HashMap<String, usize> = HashMap::new();

        for (index, input) in batch.iter().enumerate() {
            let normalized = match input {
                TelemetryInput::Text(raw) => self.normalizer.normalize(index, raw),
                TelemetryInput::Json(value) => self.normalizer.normalize_value(index, value),
            };

            let msg = match normalized {
                Ok(msg) => msg,
                Err(e) => {
                    log::warn!("Skipping telemetry: {}", e);
                    report.issues.push(e);
                    continue;
                }
            };

            report.accepted += 1;
            if let Some(warning) = msg.identity_warning() {
                report.issues.push(warning);
            }

            let slot = *slot_of.entry(msg.device_id.clone()).or_insert_with(|| {
                groups.push((msg.device_id.clone(), Vec::new()));
                groups.len() - 1
            });
            groups[slot].1.push(msg);
        }

        let semaphore = Arc::new(Semaphore::new(self.config.max_workers.max(1)));
        let mut tasks = JoinSet::new();

        for (order, (device_id, messages)) in groups.into_iter().enumerate() {
            let store = self.store.clone();
            let semaphore = semaphore.clone();
            let config = self.config.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let indexes: Vec<usize> = messages.iter().map(|m| m.index).collect();
                let worker = tokio::spawn(apply_device(store, config, device_id.clone(), messages));
                let result = match worker.await {
                    Ok(result) => result,
                    Err(e) => {
                        log::error!("Ingest task for {} aborted: {}", device_id, e);
                        DeviceIngestResult::aborted(device_id, indexes, e.to_string())
                    }
                };
                (order, result)
            });
        }

        let mut results = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => log::error!("Ingest task aborted: {}", e),
            }
        }
        results.sort_by_key(|(order, _)| *order);

        for (_, device) in results {
            report.applied += device.applied;
            report.failed += device.failed;
            report.devices.push(device);
        }

        log::info!(
            "Telemetry batch: {} received, {} accepted, {} applied, {} failed, {} device(s)",
            report.received,
            report.accepted,
            report.applied,
            report.failed,
            report.devices.len()
        );
        report
    }

    /// Ingest newline-delimited JSON; blank lines are ignored.
    pub async fn ingest_lines(&self, text: &str) -> BatchReport {
        let batch = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(TelemetryInput::from)
            .collect();
        self.ingest(batch).await
    }
}

async fn apply_device(
    store: Arc<dyn TwinStore>,
    config: PipelineConfig,
    device_id: String,
    messages: Vec<NormalizedMessage>,
) -> DeviceIngestResult {
    let mut result = DeviceIngestResult {
        device_id,
        messages: messages.iter().map(|m| m.index).collect(),
        applied: 0,
        failed: 0,
        errors: Vec::new(),
    };

    for msg in &messages {
        let label = format!("apply {} (message #{})", result.device_id, msg.index);
        let outcome = with_retry(&config.retry, config.store_timeout, &label, || {
            store.apply(&result.device_id, &msg.patch)
        })
        .await;

        match outcome {
            Ok(()) => result.applied += 1,
            Err(failure) => {
                log::warn!(
                    "Device {} message #{} not applied: {}",
                    result.device_id,
                    msg.index,
                    failure.last_error
                );
                result.failed += 1;
                result.errors.push(PipelineError::StoreUnavailable {
                    device_id: result.device_id.clone(),
                    attempts: failure.attempts,
                    source: failure.last_error,
                });
            }
        }
    }

    log::debug!(
        "Device {}: {}/{} patch(es) applied",
        result.device_id,
        result.applied,
        messages.len()
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::constants::UNKNOWN_DEVICE_ID;
    use crate::logic::twin::testing::FaultyStore;
    use crate::logic::twin::{InMemoryTwinStore, RetryPolicy};

    fn test_config() -> PipelineConfig {
        PipelineConfig {
            max_workers: 4,
            store_timeout: Duration::from_millis(500),
            retry: RetryPolicy {
                attempts: 3,
                first_delay: Duration::from_millis(1),
                delay_cap: Duration::from_millis(2),
            },
            ..PipelineConfig::default()
        }
    }

    fn texts(raw: &[&str]) -> Vec<TelemetryInput> {
        raw.iter().copied().map(TelemetryInput::from).collect()
    }

    #[tokio::test]
    async fn test_n_distinct_devices_make_n_twins() {
        let store = Arc::new(InMemoryTwinStore::new());
        let ingestor = TelemetryIngestor::new(store.clone(), test_config());

        let report = ingestor
            .ingest(texts(&[
                r#"{"deviceId":"a","os":"Linux"}"#,
                r#"{"deviceId":"b","latency":9}"#,
                r#"{"deviceId":"c","ipAddress":"10.0.0.3"}"#,
            ]))
            .await;

        assert_eq!(report.accepted, 3);
        assert_eq!(report.applied, 3);
        assert_eq!(store.len(), 3);

        let b = store.get("b").await.unwrap().unwrap();
        assert_eq!(b.traffic.latency, 9);
        assert_eq!(b.device.os, None);
    }

    #[tokio::test]
    async fn test_panicking_device_is_reported_not_dropped() {
        let store = Arc::new(FaultyStore::new(InMemoryTwinStore::new()).panicking_for("bad"));
        let ingestor = TelemetryIngestor::new(store.clone(), test_config());

        let report = ingestor
            .ingest(texts(&[
                r#"{"deviceId":"ok","latency":4}"#,
                r#"{"deviceId":"bad","latency":5}"#,
                r#"{"deviceId":"bad","latency":6}"#,
            ]))
            .await;

        assert_eq!(report.devices.len(), 2);
        assert_eq!(report.applied, 1);
        assert_eq!(report.failed, 2);

        let bad = &report.devices[1];
        assert_eq!(bad.device_id, "bad");
        assert_eq!(bad.messages, vec![1, 2]);
        assert_eq!(bad.errors[0].kind(), "task_aborted");
        assert_eq!(store.inner.get("ok").await.unwrap().unwrap().traffic.latency, 4);
    }

    #[tokio::test]
    async fn test_same_device_applied_in_arrival_order() {
        let store = Arc::new(InMemoryTwinStore::new());
        let ingestor = TelemetryIngestor::new(store.clone(), test_config());

        let mut batch = Vec::new();
        for i in 0..20 {
            batch.push(TelemetryInput::from(serde_json::json!({
                "deviceId": "hot",
                "latency": i,
                "attackType": format!("wave-{}", i),
            })));
        }
        batch.insert(3, TelemetryInput::from(r#"{"deviceId":"hot","os":"Windows"}"#));

        let report = ingestor.ingest(batch).await;
        assert_eq!(report.devices.len(), 1);
        assert_eq!(report.devices[0].applied, 21);

        let twin = store.get("hot").await.unwrap().unwrap();
        assert_eq!(twin.traffic.latency, 19);
        assert_eq!(twin.attack.attack_type.as_deref(), Some("wave-19"));
        assert_eq!(twin.device.os.as_deref(), Some("Windows"));
    }

    #[tokio::test]
    async fn test_malformed_skipped_and_missing_id_applied() {
        let store = Arc::new(InMemoryTwinStore::new());
        let ingestor = TelemetryIngestor::new(store.clone(), test_config());

        let report = ingestor
            .ingest(texts(&[
                r#"{"deviceId":"ok","os":"Linux"}"#,
                r#"{broken"#,
                r#"{"os":"RTOS"}"#,
            ]))
            .await;

        assert_eq!(report.received, 3);
        assert_eq!(report.accepted, 2);
        assert_eq!(report.malformed(), 1);
        assert!(report
            .issues
            .iter()
            .any(|e| matches!(e, PipelineError::MissingIdentity { index: 2, .. })));

        let unknown = store.get(UNKNOWN_DEVICE_ID).await.unwrap().unwrap();
        assert_eq!(unknown.device.os.as_deref(), Some("RTOS"));
    }

    #[tokio::test]
    async fn test_store_failure_isolated_to_one_device() {
        let store = Arc::new(FaultyStore::new(InMemoryTwinStore::new()).failing_for("bad"));
        let ingestor = TelemetryIngestor::new(store.clone(), test_config());

        let report = ingestor
            .ingest(texts(&[
                r#"{"deviceId":"good","latency":1}"#,
                r#"{"deviceId":"bad","latency":2}"#,
            ]))
            .await;

        assert_eq!(report.applied, 1);
        assert_eq!(report.failed, 1);
        let bad = &report.devices[1];
        assert_eq!(bad.device_id, "bad");
        assert!(matches!(
            bad.errors[0],
            PipelineError::StoreUnavailable { attempts: 3, .. }
        ));
        assert!(store.inner.get("good").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_ingest_lines_ignores_blank_lines() {
        let store = Arc::new(InMemoryTwinStore::new());
        let ingestor = TelemetryIngestor::new(store.clone(), test_config());

        let report = ingestor
            .ingest_lines("{\"deviceId\":\"x\"}\n\n   \n{\"deviceId\":\"y\"}\n")
            .await;
        assert_eq!(report.received, 2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_input_deserializes_strings_and_documents() {
        let batch: Vec<TelemetryInput> =
            serde_json::from_str(r#"["{\"deviceId\":\"a\"}", {"deviceId":"b"}]"#).unwrap();
        assert!(matches!(batch[0], TelemetryInput::Text(_)));
        assert!(matches!(batch[1], TelemetryInput::Json(_)));
    }
}
