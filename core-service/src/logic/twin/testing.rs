//! Fault-injecting store used by ingestion and simulation tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::store::{InMemoryTwinStore, TwinStore};
use super::types::{DeviceState, TwinPatch, TwinQuery};
use crate::logic::error::StoreError;

pub struct FaultyStore {
    pub inner: InMemoryTwinStore,
    /// `apply` for these ids always fails as unavailable
    pub failing: HashSet<String>,
    /// `apply` for these ids panics
    pub panicking: HashSet<String>,
    /// Artificial latency added to every `apply`
    pub apply_delay: Option<Duration>,
    /// `query` / `list_all` always fail as unavailable
    pub failing_queries: bool,
    pub apply_calls: AtomicU32,
}

impl FaultyStore {
    pub fn new(inner: InMemoryTwinStore) -> Self {
        Self {
            inner,
            failing: HashSet::new(),
            panicking: HashSet::new(),
            apply_delay: None,
            failing_queries: false,
            apply_calls: AtomicU32::new(0),
        }
    }

    pub fn failing_for(mut self, device_id: &str) -> Self {
        self.failing.insert(device_id.to_string());
        self
    }

    pub fn panicking_for(mut self, device_id: &str) -> Self {
        self.panicking.insert(device_id.to_string());
        self
    }

    pub fn with_apply_delay(mut self, delay: Duration) -> Self {
        self.apply_delay = Some(delay);
        self
    }

    pub fn with_failing_queries(mut self) -> Self {
        self.failing_queries = true;
        self
    }

    pub fn apply_count(&self) -> u32 {
        self.apply_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TwinStore for FaultyStore {
    async fn get(&self, device_id: &str) -> Result<Option<DeviceState>, StoreError> {
        self.inner.get(device_id).await
    }

    async fn apply(&self, device_id: &str, patch: &TwinPatch) -> Result<(), StoreError> {
        self.apply_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.apply_delay {
            tokio::time::sleep(delay).await;
        }
        if self.panicking.contains(device_id) {
            panic!("injected panic for {}", device_id);
        }
        if self.failing.contains(device_id) {
            return Err(StoreError::Unavailable(format!("injected failure for {}", device_id)));
        }
        self.inner.apply(device_id, patch).await
    }

    async fn query(&self, query: &TwinQuery) -> Result<Vec<DeviceState>, StoreError> {
        if self.failing_queries {
            return Err(StoreError::Unavailable("injected query failure".to_string()));
        }
        self.inner.query(query).await
    }
}
