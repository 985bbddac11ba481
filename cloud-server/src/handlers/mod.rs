//! HTTP handlers

pub mod dashboard;
pub mod defense;
pub mod devices;
pub mod health;
pub mod simulation;
pub mod telemetry;
