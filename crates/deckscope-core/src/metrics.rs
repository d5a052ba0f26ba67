//! Atomic counters for pipeline observability.
//!
//! A [`Metrics`] instance is owned by whoever runs pipelines (usually shared
//! as `Arc<Metrics>` between the orchestrator and its lifecycle). Counters are
//! incremented silently; [`Metrics::flush`] emits a single `info!` event with
//! every current value.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Lightweight atomic counters, no allocation and no locking.
#[derive(Debug, Default)]
pub struct Metrics {
    attempts: AtomicU64,
    timeouts: AtomicU64,
    agents_succeeded: AtomicU64,
    agents_failed: AtomicU64,
    runs_completed: AtomicU64,
    runs_failed: AtomicU64,
}

/// Point-in-time copy of every counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub attempts: u64,
    pub timeouts: u64,
    pub agents_succeeded: u64,
    pub agents_failed: u64,
    pub runs_completed: u64,
    pub runs_failed: u64,
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            attempts: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            agents_succeeded: AtomicU64::new(0),
            agents_failed: AtomicU64::new(0),
            runs_completed: AtomicU64::new(0),
            runs_failed: AtomicU64::new(0),
        }
    }

    pub fn inc_attempts(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "attempts", "counter incremented");
    }

    pub fn inc_timeouts(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "timeouts", "counter incremented");
    }

    pub fn inc_agents_succeeded(&self) {
        self.agents_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_agents_failed(&self) {
        self.agents_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_runs_completed(&self) {
        self.runs_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_runs_failed(&self) {
        self.runs_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            attempts: self.attempts.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            agents_succeeded: self.agents_succeeded.load(Ordering::Relaxed),
            agents_failed: self.agents_failed.load(Ordering::Relaxed),
            runs_completed: self.runs_completed.load(Ordering::Relaxed),
            runs_failed: self.runs_failed.load(Ordering::Relaxed),
        }
    }

    /// Emit all current counter values as a single `info!` event.
    ///
    /// Call at natural boundaries (end of a run, end of a CLI command).
    pub fn flush(&self) {
        let s = self.snapshot();
        tracing::info!(
            metric = "flush",
            attempts = s.attempts,
            timeouts = s.timeouts,
            agents_succeeded = s.agents_succeeded,
            agents_failed = s.agents_failed,
            runs_completed = s.runs_completed,
            runs_failed = s.runs_failed,
        );
    }

    pub fn reset(&self) {
        for counter in [
            &self.attempts,
            &self.timeouts,
            &self.agents_succeeded,
            &self.agents_failed,
            &self.runs_completed,
            &self.runs_failed,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
