//! Action Sinks - where recommendations go
//!
//! Fire-and-forget: a sink never blocks the pipeline and never fails it.
//! The receipt only says whether the action was handed over.

use tokio::sync::mpsc::{self, error::TrySendError};

use super::types::{ActionReceipt, DefenseAction};

pub trait ActionSink: Send + Sync {
    fn submit(&self, action: &DefenseAction) -> ActionReceipt;

    fn submit_all(&self, actions: &[DefenseAction]) -> usize {
        actions.iter().filter(|a| self.submit(a).success).count()
    }
}

// ============================================================================
// LOG SINK
// ============================================================================

/// Writes one structured log line per action.
#[derive(Debug, Clone, Default)]
pub struct LogSink;

impl ActionSink for LogSink {
    fn submit(&self, action: &DefenseAction) -> ActionReceipt {
        log::info!(
            "[ACTION] device={} tier={} text=\"{}\"",
            action.device_id,
            action.tier,
            action.text
        );
        ActionReceipt::accepted(&action.device_id, &action.text)
    }
}

// ============================================================================
// CHANNEL SINK
// ============================================================================

/// Bounded hand-off to an async consumer; drops when the consumer lags.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<DefenseAction>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<DefenseAction>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl ActionSink for ChannelSink {
    fn submit(&self, action: &DefenseAction) -> ActionReceipt {
        match self.tx.try_send(action.clone()) {
            Ok(()) => ActionReceipt::accepted(&action.device_id, &action.text),
            Err(TrySendError::Full(_)) => {
                log::warn!("Action channel full, dropping action for {}", action.device_id);
                ActionReceipt::dropped(&action.device_id, &action.text, "channel full")
            }
            Err(TrySendError::Closed(_)) => {
                log::warn!("Action channel closed, dropping action for {}", action.device_id);
                ActionReceipt::dropped(&action.device_id, &action.text, "channel closed")
            }
        }
    }
}
