//! Dashboard state - explicit state struct + pure transitions
//!
//! Holds what an operator UI shows: device list, latest run, applied
//! defense actions and a few live counters. `reduce` never mutates in
//! place; the server swaps the whole state under its lock.

use serde::{Deserialize, Serialize};

use crate::logic::response::ActionReceipt;
use crate::logic::simulation::{DeviceView, RunSummary};

/// Applied actions kept in the state (oldest dropped first)
pub const MAX_DEFENSE_LOG: usize = 100;

const INITIAL_NETWORK_HEALTH: u8 = 95;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealTimeData {
    /// 0..=100
    pub network_health: u8,
    /// High-risk devices in the latest run
    pub active_threats: usize,
    /// Defense actions successfully handed to a sink
    pub prevented_attacks: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardState {
    pub devices: Vec<DeviceView>,
    pub current_run: Option<RunSummary>,
    pub runs_seen: u64,
    pub defense_actions: Vec<ActionReceipt>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub real_time: RealTimeData,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self {
            devices: Vec::new(),
            current_run: None,
            runs_seen: 0,
            defense_actions: Vec::new(),
            is_loading: false,
            error: None,
            real_time: RealTimeData {
                network_health: INITIAL_NETWORK_HEALTH,
                active_threats: 0,
                prevented_attacks: 0,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub enum DashboardEvent {
    Loading(bool),
    DevicesLoaded(Vec<DeviceView>),
    RunSealed(RunSummary),
    DefenseApplied(ActionReceipt),
    NetworkHealth(u8),
    Error(Option<String>),
}

pub fn reduce(state: DashboardState, event: DashboardEvent) -> DashboardState {
    match event {
        DashboardEvent::Loading(is_loading) => DashboardState { is_loading, ..state },

        DashboardEvent::DevicesLoaded(devices) => DashboardState { devices, ..state },

        DashboardEvent::RunSealed(summary) => DashboardState {
            real_time: RealTimeData {
                active_threats: summary.high_risk_count,
                ..state.real_time
            },
            runs_seen: state.runs_seen + 1,
            current_run: Some(summary),
            is_loading: false,
            ..state
        },

        DashboardEvent::DefenseApplied(receipt) => {
            let prevented = state.real_time.prevented_attacks + u64::from(receipt.success);
            let mut defense_actions = state.defense_actions;
            defense_actions.push(receipt);
            if defense_actions.len() > MAX_DEFENSE_LOG {
                let excess = defense_actions.len() - MAX_DEFENSE_LOG;
                defense_actions.drain(..excess);
            }
            DashboardState {
                defense_actions,
                real_time: RealTimeData {
                    prevented_attacks: prevented,
                    ..state.real_time
                },
                ..state
            }
        }

        DashboardEvent::NetworkHealth(health) => DashboardState {
            real_time: RealTimeData {
                network_health: health.min(100),
                ..state.real_time
            },
            ..state
        },

        DashboardEvent::Error(error) => DashboardState {
            error,
            is_loading: false,
            ..state
        },
    }
}
