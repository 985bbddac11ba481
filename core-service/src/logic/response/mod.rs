//! Response Module - defense recommendations
//!
//! # Components
//! - `types.rs`: tiers, `DefenseAction`, sink receipts
//! - `policy.rs`: threat score -> ordered action list
//! - `sink.rs`: where actions are handed off (log, bounded channel)
//!
//! Nothing here enforces anything; actions are recommendations only.

pub mod policy;
pub mod sink;
pub mod types;

pub use policy::{action_texts, actions, tier_for};
pub use sink::{ActionSink, ChannelSink, LogSink};
pub use types::{ActionReceipt, ActionTier, DefenseAction};
