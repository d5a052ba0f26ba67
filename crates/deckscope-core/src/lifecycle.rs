//! Execution lifecycle: timeout, retry with capped exponential backoff, and
//! per-invocation state tracking.
//!
//! Every agent invocation goes through [`ExecutionLifecycle::execute_tracked`]:
//!
//! 1. the [`ExecutionState`] moves to `Running`;
//! 2. up to `max_retries + 1` attempts race the analysis future against the
//!    descriptor's timeout (a timed-out attempt is dropped, which cancels any
//!    in-flight collaborator call);
//! 3. failed attempts are recorded and followed by a backoff sleep of
//!    `min(base * 2^attempt, max)`;
//! 4. the first success (or the last failure) makes the state terminal and
//!    produces the single [`AgentResult`] for the invocation.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use deckscope_state::IntermediateStep;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::time::Instant;

use crate::domain::{
    AgentDescriptor, AgentError, AgentPayload, AgentResult, AnalysisContext, ExecutionState,
};
use crate::metrics::Metrics;
use crate::obs;

/// Backoff between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Delay after the first failed attempt (milliseconds).
    pub base_delay_ms: u64,
    /// Upper bound on any single delay (milliseconds).
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            max_delay_ms: 10_000,
        }
    }
}

impl RetryPolicy {
    /// Delay after the failed attempt with 0-based index `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u64.checked_pow(attempt).unwrap_or(u64::MAX);
        let ms = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(ms)
    }

    /// Sum of every backoff sleep a permanently failing agent with
    /// `max_retries` retries goes through.
    pub fn total_backoff(&self, max_retries: u32) -> Duration {
        (0..max_retries).map(|i| self.delay_for(i)).sum()
    }
}

/// Append-only step log handed to each analysis attempt.
///
/// Each attempt gets a fresh trace; the lifecycle drains it into the
/// execution state once the attempt has finished or been dropped.
#[derive(Debug, Clone, Default)]
pub struct StepTrace {
    steps: Arc<Mutex<Vec<IntermediateStep>>>,
}

impl StepTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &self,
        tool: impl Into<String>,
        input: serde_json::Value,
        output: serde_json::Value,
    ) {
        if let Ok(mut steps) = self.steps.lock() {
            steps.push(IntermediateStep {
                tool: tool.into(),
                input,
                output,
                timestamp: Utc::now(),
            });
        }
    }

    pub fn len(&self) -> usize {
        self.steps.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take every recorded step, leaving the trace empty.
    pub fn drain(&self) -> Vec<IntermediateStep> {
        self.steps
            .lock()
            .map(|mut s| std::mem::take(&mut *s))
            .unwrap_or_default()
    }
}

/// Lifecycle callbacks. All methods default to no-ops.
///
/// Each `after_execute` and `on_error` call is also recorded as an
/// intermediate step (tool `"after_execute"` / `"on_error"`).
pub trait AgentHooks: Send + Sync {
    fn before_execute(&self, _descriptor: &AgentDescriptor, _input: &AnalysisContext) {}

    fn after_execute(&self, _descriptor: &AgentDescriptor, _payload: &AgentPayload) {}

    /// Called for every failed attempt, with its 1-based number.
    fn on_error(&self, _descriptor: &AgentDescriptor, _error: &AgentError, _attempt: u32) {}
}

/// Hooks that do nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl AgentHooks for NoopHooks {}

/// Wraps analysis functions with timeout, retry and state tracking.
#[derive(Clone)]
pub struct ExecutionLifecycle {
    retry: RetryPolicy,
    hooks: Arc<dyn AgentHooks>,
    metrics: Arc<Metrics>,
}

impl Default for ExecutionLifecycle {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl std::fmt::Debug for ExecutionLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionLifecycle")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl ExecutionLifecycle {
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            retry,
            hooks: Arc::new(NoopHooks),
            metrics: Arc::new(Metrics::new()),
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn AgentHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Run `analysis` under the descriptor's controls and return its result.
    pub async fn execute<F, Fut>(
        &self,
        descriptor: &AgentDescriptor,
        input: &AnalysisContext,
        analysis: F,
    ) -> AgentResult
    where
        F: Fn(StepTrace) -> Fut,
        Fut: Future<Output = Result<AgentPayload, AgentError>>,
    {
        self.execute_tracked(descriptor, input, analysis).await.0
    }

    /// Like [`execute`](Self::execute), also returning the terminal
    /// [`ExecutionState`] for persistence.
    pub async fn execute_tracked<F, Fut>(
        &self,
        descriptor: &AgentDescriptor,
        input: &AnalysisContext,
        analysis: F,
    ) -> (AgentResult, ExecutionState)
    where
        F: Fn(StepTrace) -> Fut,
        Fut: Future<Output = Result<AgentPayload, AgentError>>,
    {
        let started = Instant::now();
        let mut state = ExecutionState::new(
            serde_json::to_value(input).unwrap_or(serde_json::Value::Null),
        );
        state.start();
        self.hooks.before_execute(descriptor, input);

        let mut attempt: u32 = 0;
        loop {
            state.set_attempt(attempt);
            self.metrics.inc_attempts();

            let trace = StepTrace::new();
            let outcome = match tokio::time::timeout(descriptor.timeout(), analysis(trace.clone()))
                .await
            {
                Ok(outcome) => outcome,
                Err(_elapsed) => {
                    self.metrics.inc_timeouts();
                    Err(AgentError::Timeout {
                        timeout_ms: descriptor.timeout_ms,
                    })
                }
            };
            state.extend_steps(trace.drain());

            match outcome {
                Ok(payload) => {
                    let output = serde_json::to_value(&payload).unwrap_or(serde_json::Value::Null);
                    state.complete(output.clone());
                    self.hooks.after_execute(descriptor, &payload);
                    state.record_step("after_execute", json!({ "attempt": attempt + 1 }), output);
                    let result = AgentResult::success(payload, elapsed_ms(started), attempt + 1);
                    return (result, state);
                }
                Err(err) => {
                    let message = err.to_string();
                    state.record_error(message.clone());
                    self.hooks.on_error(descriptor, &err, attempt + 1);
                    state.record_step(
                        "on_error",
                        json!({ "attempt": attempt + 1 }),
                        json!({ "kind": err.kind(), "message": message }),
                    );

                    if attempt >= descriptor.max_retries {
                        state.fail();
                        let result = AgentResult::failure(message, elapsed_ms(started), attempt + 1);
                        return (result, state);
                    }

                    let delay = self.retry.delay_for(attempt);
                    obs::emit_attempt_retry(
                        &descriptor.name,
                        attempt + 1,
                        delay.as_millis() as u64,
                        &err,
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
