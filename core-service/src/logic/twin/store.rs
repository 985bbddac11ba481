//! Twin Store
//!
//! `TwinStore` is the seam to the durable twin backend (get / apply / query).
//! `InMemoryTwinStore` is the bundled implementation.
//!
//! Writes to one device are serialized by a per-device async mutex; the map
//! lock is only held long enough to find or insert the device slot, never
//! across an await.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::Mutex;

use super::types::{DeviceState, TwinPatch, TwinQuery};
use crate::constants::DEFAULT_DEVICE_MODEL;
use crate::logic::error::StoreError;

// ============================================================================
// STORE TRAIT
// ============================================================================

#[async_trait]
pub trait TwinStore: Send + Sync {
    /// Current state of one twin.
    async fn get(&self, device_id: &str) -> Result<Option<DeviceState>, StoreError>;

    /// Replace-only patch; creates the twin if it does not exist yet.
    async fn apply(&self, device_id: &str, patch: &TwinPatch) -> Result<(), StoreError>;

    /// Twins matching `query`, ordered by device id.
    async fn query(&self, query: &TwinQuery) -> Result<Vec<DeviceState>, StoreError>;

    /// Snapshot of every twin, ordered by device id.
    async fn list_all(&self) -> Result<Vec<DeviceState>, StoreError> {
        self.query(&TwinQuery::default()).await
    }
}

// ============================================================================
// IN-MEMORY IMPLEMENTATION
// ============================================================================

type Slot = Arc<Mutex<Option<DeviceState>>>;

pub struct InMemoryTwinStore {
    twins: RwLock<BTreeMap<String, Slot>>,
    model_id: String,
}

impl InMemoryTwinStore {
    pub fn new() -> Self {
        Self::with_model(DEFAULT_DEVICE_MODEL)
    }

    /// Twins created by `apply` get this model id.
    pub fn with_model(model_id: &str) -> Self {
        Self {
            twins: RwLock::new(BTreeMap::new()),
            model_id: model_id.to_string(),
        }
    }

    /// Insert or overwrite a full twin (seeding / fixtures).
    pub async fn upsert(&self, twin: DeviceState) {
        let slot = self.slot(&twin.device_id);
        *slot.lock().await = Some(twin);
    }

    pub fn len(&self) -> usize {
        self.twins.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, device_id: &str) -> Slot {
        if let Some(slot) = self.twins.read().get(device_id) {
            return slot.clone();
        }
        self.twins
            .write()
            .entry(device_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }

    /// Drop a slot a rejected first patch left behind. Slot clones are only
    /// taken under the map lock, so with it held no other caller can be
    /// about to fill this one.
    fn forget_empty_slot(&self, device_id: &str, slot: &Slot) {
        let mut twins = self.twins.write();
        let unshared = twins
            .get(device_id)
            .map_or(false, |held| Arc::ptr_eq(held, slot) && Arc::strong_count(slot) == 2);
        if unshared {
            twins.remove(device_id);
        }
    }

    fn existing_slots(&self) -> Vec<Slot> {
        self.twins.read().values().cloned().collect()
    }
}

impl Default for InMemoryTwinStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TwinStore for InMemoryTwinStore {
    async fn get(&self, device_id: &str) -> Result<Option<DeviceState>, StoreError> {
        let slot = self.twins.read().get(device_id).cloned();
        match slot {
            Some(slot) => Ok(slot.lock().await.clone()),
            None => Ok(None),
        }
    }

    async fn apply(&self, device_id: &str, patch: &TwinPatch) -> Result<(), StoreError> {
        let slot = self.slot(device_id);
        let mut guard = slot.lock().await;

        let next = match guard.as_ref() {
            Some(current) => current.patched(patch),
            None => DeviceState::with_model(device_id, &self.model_id).patched(patch),
        };

        match next {
            Ok(next) => {
                *guard = Some(next);
                Ok(())
            }
            Err(e) => {
                if guard.is_none() {
                    self.forget_empty_slot(device_id, &slot);
                }
                Err(e)
            }
        }
    }

    async fn query(&self, query: &TwinQuery) -> Result<Vec<DeviceState>, StoreError> {
        let mut out = Vec::new();
        for slot in self.existing_slots() {
            if let Some(twin) = slot.lock().await.as_ref() {
                if query.matches(twin) {
                    out.push(twin.clone());
                }
            }
        }
        Ok(out)
    }
}
