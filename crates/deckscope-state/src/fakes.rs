//! In-memory fake for the storage trait (testing only)
//!
//! `MemoryPipelineStore` satisfies the `PipelineStore` contract without any
//! external dependencies.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::StorageError;
use crate::records::{
    ExecutionRecord, FindingRecord, NewPipelineRun, PipelineKind, PipelineRunRecord, RunStatus,
    ScoreRecord,
};
use crate::storage_traits::*;

#[derive(Debug)]
struct RunState {
    record: PipelineRunRecord,
    executions: BTreeMap<u32, ExecutionRecord>,
    scores: Vec<ScoreRecord>,
    findings: Vec<FindingRecord>,
}

impl RunState {
    fn ensure_running(&self) -> StorageResult<()> {
        if self.record.status != RunStatus::Running {
            return Err(StorageError::InvalidRunState {
                run_id: self.record.run_id.0.clone(),
                status: self.record.status.to_string(),
                expected: RunStatus::Running.to_string(),
            });
        }
        Ok(())
    }
}

/// In-memory pipeline store backed by a `HashMap<RunId, RunState>`.
#[derive(Debug, Default)]
pub struct MemoryPipelineStore {
    runs: Mutex<HashMap<String, RunState>>,
}

impl MemoryPipelineStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_run<T>(
        &self,
        run_id: &RunId,
        f: impl FnOnce(&mut RunState) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let mut runs = self
            .runs
            .lock()
            .map_err(|e| StorageError::Backend(format!("store lock poisoned: {e}")))?;
        let state = runs
            .get_mut(&run_id.0)
            .ok_or_else(|| StorageError::RunNotFound {
                run_id: run_id.0.clone(),
            })?;
        f(state)
    }
}

#[async_trait]
impl PipelineStore for MemoryPipelineStore {
    async fn create_run(&self, run: NewPipelineRun) -> StorageResult<PipelineRunRecord> {
        let run_id = RunId::new();
        let record = PipelineRunRecord {
            run_id: run_id.clone(),
            pipeline: run.pipeline,
            failure_policy: run.failure_policy,
            agents: run.agents,
            definition_digest: run.definition_digest,
            document_id: run.document_id,
            status: RunStatus::Pending,
            overall_score: None,
            error_message: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        };
        let mut runs = self
            .runs
            .lock()
            .map_err(|e| StorageError::Backend(format!("store lock poisoned: {e}")))?;
        runs.insert(
            run_id.0.clone(),
            RunState {
                record: record.clone(),
                executions: BTreeMap::new(),
                scores: Vec::new(),
                findings: Vec::new(),
            },
        );
        Ok(record)
    }

    async fn start_run(&self, run_id: &RunId) -> StorageResult<()> {
        self.with_run(run_id, |state| {
            if state.record.status != RunStatus::Pending {
                return Err(StorageError::InvalidRunState {
                    run_id: run_id.0.clone(),
                    status: state.record.status.to_string(),
                    expected: RunStatus::Pending.to_string(),
                });
            }
            state.record.status = RunStatus::Running;
            state.record.started_at = Some(Utc::now());
            Ok(())
        })
    }

    async fn complete_run(&self, run_id: &RunId, overall_score: f64) -> StorageResult<()> {
        self.with_run(run_id, |state| {
            state.ensure_running()?;
            state.record.status = RunStatus::Completed;
            state.record.overall_score = Some(overall_score);
            state.record.completed_at = Some(Utc::now());
            Ok(())
        })
    }

    async fn fail_run(&self, run_id: &RunId, error_message: &str) -> StorageResult<()> {
        self.with_run(run_id, |state| {
            if state.record.status.is_terminal() {
                return Err(StorageError::InvalidRunState {
                    run_id: run_id.0.clone(),
                    status: state.record.status.to_string(),
                    expected: "pending or running".to_string(),
                });
            }
            state.record.status = RunStatus::Failed;
            state.record.error_message = Some(error_message.to_string());
            state.record.completed_at = Some(Utc::now());
            Ok(())
        })
    }

    async fn get_run(&self, run_id: &RunId) -> StorageResult<PipelineRunRecord> {
        self.with_run(run_id, |state| Ok(state.record.clone()))
    }

    async fn list_runs(
        &self,
        pipeline: Option<PipelineKind>,
    ) -> StorageResult<Vec<PipelineRunRecord>> {
        let runs = self
            .runs
            .lock()
            .map_err(|e| StorageError::Backend(format!("store lock poisoned: {e}")))?;
        let mut records: Vec<PipelineRunRecord> = runs
            .values()
            .filter(|s| pipeline.map(|p| s.record.pipeline == p).unwrap_or(true))
            .map(|s| s.record.clone())
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn delete_run(&self, run_id: &RunId) -> StorageResult<()> {
        let mut runs = self
            .runs
            .lock()
            .map_err(|e| StorageError::Backend(format!("store lock poisoned: {e}")))?;
        runs.remove(&run_id.0)
            .map(|_| ())
            .ok_or_else(|| StorageError::RunNotFound {
                run_id: run_id.0.clone(),
            })
    }

    async fn save_execution(&self, record: ExecutionRecord) -> StorageResult<()> {
        let run_id = record.run_id.clone();
        self.with_run(&run_id, |state| {
            state.ensure_running()?;
            if let Some(existing) = state.executions.get(&record.execution_order) {
                if existing.status.is_terminal() {
                    return Err(StorageError::ExecutionFinalized {
                        run_id: run_id.0.clone(),
                        execution_order: record.execution_order,
                        status: existing.status.to_string(),
                    });
                }
            }
            state.executions.insert(record.execution_order, record);
            Ok(())
        })
    }

    async fn get_executions(&self, run_id: &RunId) -> StorageResult<Vec<ExecutionRecord>> {
        self.with_run(run_id, |state| {
            Ok(state.executions.values().cloned().collect())
        })
    }

    async fn save_score(&self, run_id: &RunId, score: ScoreRecord) -> StorageResult<()> {
        self.with_run(run_id, |state| {
            state.ensure_running()?;
            state.scores.push(score);
            Ok(())
        })
    }

    async fn get_scores(&self, run_id: &RunId) -> StorageResult<Vec<ScoreRecord>> {
        self.with_run(run_id, |state| Ok(state.scores.clone()))
    }

    async fn save_findings(
        &self,
        run_id: &RunId,
        findings: Vec<FindingRecord>,
    ) -> StorageResult<()> {
        self.with_run(run_id, |state| {
            state.ensure_running()?;
            state.findings.extend(findings);
            Ok(())
        })
    }

    async fn replace_findings(
        &self,
        run_id: &RunId,
        findings: Vec<FindingRecord>,
    ) -> StorageResult<()> {
        self.with_run(run_id, |state| {
            state.ensure_running()?;
            state.findings = findings;
            Ok(())
        })
    }

    async fn get_findings(&self, run_id: &RunId) -> StorageResult<Vec<FindingRecord>> {
        self.with_run(run_id, |state| Ok(state.findings.clone()))
    }
}
