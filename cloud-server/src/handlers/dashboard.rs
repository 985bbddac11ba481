//! Dashboard state handler

use axum::{extract::State, Json};

use twinshield_core::logic::dashboard::DashboardState;

use crate::AppState;

pub async fn get(State(state): State<AppState>) -> Json<DashboardState> {
    Json(state.dashboard.read().clone())
}
