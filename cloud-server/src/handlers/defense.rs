//! Defense action handler

use axum::{extract::State, Json};
use serde::Deserialize;
use validator::Validate;

use twinshield_core::logic::dashboard::DashboardEvent;
use twinshield_core::logic::response::{tier_for, ActionReceipt, ActionTier, DefenseAction};

use crate::{AppError, AppResult, AppState};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DefenseApplyRequest {
    #[validate(length(min = 1, max = 256))]
    pub device_id: String,
    #[validate(length(min = 1, max = 256))]
    pub action: String,
}

/// Hand an operator-chosen action to the action sink
pub async fn apply(
    State(state): State<AppState>,
    Json(req): Json<DefenseApplyRequest>,
) -> AppResult<Json<ActionReceipt>> {
    req.validate()?;

    // Unknown devices are accepted; they carry no tier information
    let tier = state
        .store
        .get(&req.device_id)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?
        .and_then(|twin| twin.prediction.threat_probability)
        .map(|p| tier_for(p as f32))
        .unwrap_or(ActionTier::Monitor);

    let action = DefenseAction {
        device_id: req.device_id,
        text: req.action,
        tier,
    };

    let receipt = state.sink.submit(&action);
    if !receipt.success {
        tracing::warn!(device_id = %action.device_id, "Defense action not delivered: {}", receipt.message);
    }

    state.dispatch(DashboardEvent::DefenseApplied(receipt.clone()));
    Ok(Json(receipt))
}
