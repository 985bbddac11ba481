//! Device twin read handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use twinshield_core::logic::simulation::DeviceView;
use twinshield_core::logic::twin::TwinQuery;

use crate::{AppError, AppResult, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct DeviceFilter {
    pub status: Option<String>,
    pub os: Option<String>,
}

/// List device twins, optionally filtered by status / os
pub async fn list(
    State(state): State<AppState>,
    Query(filter): Query<DeviceFilter>,
) -> AppResult<Json<Vec<DeviceView>>> {
    let query = TwinQuery {
        status: filter.status,
        os: filter.os,
        ..Default::default()
    };

    let twins = state
        .store
        .query(&query)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?;

    Ok(Json(twins.iter().map(DeviceView::from).collect()))
}

/// Get a single device twin
pub async fn get(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> AppResult<Json<DeviceView>> {
    let twin = state
        .store
        .get(&device_id)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?
        .ok_or_else(|| AppError::NotFound(format!("Device {} not found", device_id)))?;

    Ok(Json(DeviceView::from(&twin)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::test_state;
    use twinshield_core::logic::twin::{PatchValue, PropertyPath, TwinPatch};

    async fn seed(state: &AppState, id: &str, status: &str) {
        let patch = TwinPatch::new().replace(PropertyPath::Status, PatchValue::Text(status.into()));
        state.store.apply(id, &patch).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_filters_by_status() {
        let state = test_state();
        seed(&state, "a", "Active").await;
        seed(&state, "b", "Offline").await;

        let Json(all) = list(State(state.clone()), Query(DeviceFilter::default())).await.unwrap();
        assert_eq!(all.len(), 2);

        let filter = DeviceFilter { status: Some("Offline".into()), os: None };
        let Json(offline) = list(State(state), Query(filter)).await.unwrap();
        assert_eq!(offline.len(), 1);
        assert_eq!(offline[0].device_id, "b");
    }

    #[tokio::test]
    async fn test_get_unknown_device_is_404() {
        let result = get(State(test_state()), Path("ghost".to_string())).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
