//! TwinShield core: per-device security telemetry kept in digital twins,
//! scored for threats, turned into prioritized defense recommendations.

pub mod constants;
pub mod logic;
