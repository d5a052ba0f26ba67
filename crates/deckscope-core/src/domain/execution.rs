//! Per-invocation execution state and the result handed to the orchestrator.

use chrono::{DateTime, Utc};
use deckscope_state::{ExecutionError, ExecutionStatus, IntermediateStep};
use serde::{Deserialize, Serialize};

use super::payload::AgentPayload;

/// Audit state of one agent invocation.
///
/// Status follows `Pending -> Running -> Completed | Failed`. Once terminal,
/// further transitions are rejected (the methods return `false`). Steps and
/// errors are append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionState {
    input: serde_json::Value,
    output: Option<serde_json::Value>,
    intermediate_steps: Vec<IntermediateStep>,
    errors: Vec<ExecutionError>,
    status: ExecutionStatus,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    retry_count: u32,
}

impl ExecutionState {
    pub fn new(input: serde_json::Value) -> Self {
        Self {
            input,
            output: None,
            intermediate_steps: Vec::new(),
            errors: Vec::new(),
            status: ExecutionStatus::Pending,
            started_at: None,
            completed_at: None,
            retry_count: 0,
        }
    }

    /// `Pending -> Running`.
    pub fn start(&mut self) -> bool {
        if self.status != ExecutionStatus::Pending {
            return false;
        }
        self.status = ExecutionStatus::Running;
        self.started_at = Some(Utc::now());
        true
    }

    /// `Running -> Completed`, storing the output.
    pub fn complete(&mut self, output: serde_json::Value) -> bool {
        if self.status != ExecutionStatus::Running {
            return false;
        }
        self.output = Some(output);
        self.status = ExecutionStatus::Completed;
        self.completed_at = Some(Utc::now());
        true
    }

    /// `Running -> Failed`.
    pub fn fail(&mut self) -> bool {
        if self.status != ExecutionStatus::Running {
            return false;
        }
        self.status = ExecutionStatus::Failed;
        self.completed_at = Some(Utc::now());
        true
    }

    /// Record the index of the attempt now in flight.
    pub fn set_attempt(&mut self, attempt: u32) {
        if !self.status.is_terminal() {
            self.retry_count = attempt;
        }
    }

    pub fn record_step(
        &mut self,
        tool: impl Into<String>,
        input: serde_json::Value,
        output: serde_json::Value,
    ) {
        self.intermediate_steps.push(IntermediateStep {
            tool: tool.into(),
            input,
            output,
            timestamp: Utc::now(),
        });
    }

    pub fn extend_steps(&mut self, steps: impl IntoIterator<Item = IntermediateStep>) {
        self.intermediate_steps.extend(steps);
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.errors.push(ExecutionError {
            message: message.into(),
            timestamp: Utc::now(),
        });
    }

    pub fn input(&self) -> &serde_json::Value {
        &self.input
    }

    pub fn output(&self) -> Option<&serde_json::Value> {
        self.output.as_ref()
    }

    pub fn intermediate_steps(&self) -> &[IntermediateStep] {
        &self.intermediate_steps
    }

    pub fn errors(&self) -> &[ExecutionError] {
        &self.errors
    }

    pub fn status(&self) -> ExecutionStatus {
        self.status
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Message of the most recent failed attempt.
    pub fn last_error(&self) -> Option<&str> {
        self.errors.last().map(|e| e.message.as_str())
    }
}

/// Timing and attempt information attached to every result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    pub execution_time_ms: u64,
    /// 1-based number of the attempt that produced this result.
    pub attempt: u32,
}

/// Outcome of one agent invocation, produced exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    pub success: bool,
    pub data: Option<AgentPayload>,
    pub error: Option<String>,
    pub metadata: ExecutionMetadata,
}

impl AgentResult {
    pub fn success(data: AgentPayload, execution_time_ms: u64, attempt: u32) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            metadata: ExecutionMetadata {
                execution_time_ms,
                attempt,
            },
        }
    }

    pub fn failure(error: impl Into<String>, execution_time_ms: u64, attempt: u32) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            metadata: ExecutionMetadata {
                execution_time_ms,
                attempt,
            },
        }
    }
}
