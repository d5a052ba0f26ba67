//! Structured observability hooks for pipeline lifecycle events.
//!
//! Emission functions for run start/finish and agent start/finish/retry.
//! Run-scoped fields come from the orchestrator's `#[instrument]` span.
//!
//! Events are emitted at `info!` level (filter with `RUST_LOG`). The CLI's
//! `--json` flag switches the subscriber to JSON lines.

use tracing::{info, warn};

pub fn emit_run_started(run_id: &str, pipeline: &str, agent_count: usize) {
    info!(
        event = "run.started",
        run_id = %run_id,
        pipeline = %pipeline,
        agent_count = agent_count,
    );
}

pub fn emit_run_finished(run_id: &str, duration_ms: u64, overall_score: Option<f64>, success: bool) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        overall_score = overall_score,
        success = success,
    );
}

pub fn emit_agent_started(run_id: &str, agent: &str, order: u32) {
    info!(event = "agent.started", run_id = %run_id, agent = %agent, order = order);
}

pub fn emit_agent_finished(
    run_id: &str,
    agent: &str,
    success: bool,
    attempt: u32,
    execution_time_ms: u64,
) {
    info!(
        event = "agent.finished",
        run_id = %run_id,
        agent = %agent,
        success = success,
        attempt = attempt,
        execution_time_ms = execution_time_ms,
    );
}

/// A failed attempt that will be retried after `delay_ms`.
pub fn emit_attempt_retry(agent: &str, attempt: u32, delay_ms: u64, error: &dyn std::fmt::Display) {
    warn!(
        event = "agent.retry",
        agent = %agent,
        attempt = attempt,
        delay_ms = delay_ms,
        error = %error,
    );
}

/// Warning for a non-fatal problem while finalizing a run.
pub fn emit_run_finalize_error(run_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "run.finalize_error", run_id = %run_id, error = %error);
}
