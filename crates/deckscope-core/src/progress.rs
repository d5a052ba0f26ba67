//! Fire-and-forget progress notifications.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// One progress tick, emitted when an agent is queued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub run_id: String,
    /// `round(order / total * 100)`.
    pub progress: u8,
    pub step: String,
}

impl ProgressEvent {
    pub fn agent_queued(run_id: &str, order: u32, total: usize, agent: &str) -> Self {
        let pct = if total == 0 {
            100.0
        } else {
            (f64::from(order) / total as f64 * 100.0).round()
        };
        Self {
            run_id: run_id.to_string(),
            progress: pct.clamp(0.0, 100.0) as u8,
            step: format!("Running {agent}"),
        }
    }
}

/// Receives progress events. Publishing must never fail the caller.
pub trait ProgressSink: Send + Sync {
    fn publish(&self, event: ProgressEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn publish(&self, _event: ProgressEvent) {}
}

/// Fans events out over a tokio broadcast channel.
///
/// Events published with no live subscriber are dropped; slow subscribers
/// see `RecvError::Lagged` rather than blocking the pipeline.
#[derive(Debug, Clone)]
pub struct BroadcastProgress {
    tx: broadcast::Sender<ProgressEvent>,
}

impl BroadcastProgress {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastProgress {
    fn default() -> Self {
        Self::new(64)
    }
}

impl ProgressSink for BroadcastProgress {
    fn publish(&self, event: ProgressEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("progress event dropped: no subscribers");
        }
    }
}
