//! Storage trait definitions for deckscope
//!
//! `PipelineStore` is the single persistence boundary the orchestrator
//! writes through: runs, per-agent execution records, score records and
//! finding records, all queryable by run id.
//!
//! The trait is async and backend-agnostic. An in-memory fake is provided
//! for testing via the `fakes` module.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::StorageError;
use crate::records::{
    ExecutionRecord, FindingRecord, NewPipelineRun, PipelineKind, PipelineRunRecord, ScoreRecord,
};

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Content digest (SHA-256 hex string).
///
/// The inner field is private to guarantee the string is always valid
/// lowercase hex produced by `from_bytes` or validated via `TryFrom<String>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Compute the SHA-256 digest of the given bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        use sha2::Digest;
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentDigest(hex::encode(hasher.finalize()))
    }

    /// Return the full hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 12 hex chars).
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl TryFrom<String> for ContentDigest {
    type Error = StorageError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        if s.len() != 64 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(StorageError::InvalidDigest { digest: s });
        }
        Ok(ContentDigest(s.to_ascii_lowercase()))
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    /// Generate a new random RunId
    pub fn new() -> Self {
        RunId(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pipeline run persistence.
///
/// Guarantees:
/// - A run transitions `Pending -> Running -> Completed | Failed`; `fail_run`
///   is also accepted from `Pending`. Terminal runs are immutable.
/// - Execution, score and finding writes require the run to be `Running`.
/// - Execution records are keyed by `(run_id, execution_order)`; a record
///   that reached a terminal status cannot be overwritten.
/// - Reads return executions ordered by `execution_order`, scores and
///   findings in insertion order.
/// - `delete_run` removes the run and everything it owns.
#[async_trait]
pub trait PipelineStore: Send + Sync {
    /// Create a new run in `Pending` state.
    async fn create_run(&self, run: NewPipelineRun) -> StorageResult<PipelineRunRecord>;

    /// Move a run from `Pending` to `Running`.
    async fn start_run(&self, run_id: &RunId) -> StorageResult<()>;

    /// Mark a running run as completed with its overall score.
    async fn complete_run(&self, run_id: &RunId, overall_score: f64) -> StorageResult<()>;

    /// Mark a pending or running run as failed.
    async fn fail_run(&self, run_id: &RunId, error_message: &str) -> StorageResult<()>;

    /// Retrieve a run record by ID.
    async fn get_run(&self, run_id: &RunId) -> StorageResult<PipelineRunRecord>;

    /// List runs (newest first), optionally filtered by pipeline kind.
    async fn list_runs(&self, pipeline: Option<PipelineKind>)
        -> StorageResult<Vec<PipelineRunRecord>>;

    /// Delete a run together with its executions, scores and findings.
    async fn delete_run(&self, run_id: &RunId) -> StorageResult<()>;

    /// Insert or update the execution record at `record.execution_order`.
    async fn save_execution(&self, record: ExecutionRecord) -> StorageResult<()>;

    /// All execution records of a run, ordered by `execution_order`.
    async fn get_executions(&self, run_id: &RunId) -> StorageResult<Vec<ExecutionRecord>>;

    /// Append a score record to a running run.
    async fn save_score(&self, run_id: &RunId, score: ScoreRecord) -> StorageResult<()>;

    /// All score records of a run.
    async fn get_scores(&self, run_id: &RunId) -> StorageResult<Vec<ScoreRecord>>;

    /// Append finding records to a running run.
    async fn save_findings(&self, run_id: &RunId, findings: Vec<FindingRecord>)
        -> StorageResult<()>;

    /// Replace the full finding set of a running run.
    async fn replace_findings(
        &self,
        run_id: &RunId,
        findings: Vec<FindingRecord>,
    ) -> StorageResult<()>;

    /// All finding records of a run.
    async fn get_findings(&self, run_id: &RunId) -> StorageResult<Vec<FindingRecord>>;
}
