//! Run recorder: bridges lifecycle results to [`PipelineStore`] persistence.

use std::sync::Arc;

use deckscope_state::{
    ExecutionRecord, NewPipelineRun, PipelineRunRecord, PipelineStore, RunId, StorageResult,
};
use tokio::time::Instant;

use crate::domain::{AgentPayload, ExecutionState};
use crate::pipeline::PipelineDefinition;

/// Records one pipeline run into a [`PipelineStore`].
///
/// Usage:
/// 1. [`RunRecorder::start`] creates the run and moves it to `Running`.
/// 2. Per agent: [`queue_execution`](Self::queue_execution), then
///    [`save_payload`](Self::save_payload) on success, then
///    [`finish_execution`](Self::finish_execution).
/// 3. [`finish_ok`](Self::finish_ok) or [`finish_err`](Self::finish_err).
pub struct RunRecorder {
    store: Arc<dyn PipelineStore>,
    run: PipelineRunRecord,
    started: Instant,
}

impl RunRecorder {
    pub async fn start(
        store: Arc<dyn PipelineStore>,
        definition: &PipelineDefinition,
        document_id: &str,
    ) -> StorageResult<Self> {
        let run = store
            .create_run(NewPipelineRun {
                pipeline: definition.kind(),
                failure_policy: definition.failure_policy(),
                agents: definition.agent_names(),
                definition_digest: definition.digest(),
                document_id: document_id.to_string(),
            })
            .await?;
        store.start_run(&run.run_id).await?;
        crate::obs::emit_run_started(&run.run_id.0, definition.kind().as_str(), definition.len());
        Ok(Self {
            store,
            run,
            started: Instant::now(),
        })
    }

    pub fn run_id(&self) -> &RunId {
        &self.run.run_id
    }

    /// Persist a `Running` execution record before the agent is invoked.
    pub async fn queue_execution(
        &self,
        order: u32,
        agent: &str,
        input: serde_json::Value,
    ) -> StorageResult<()> {
        self.store
            .save_execution(ExecutionRecord::running(
                self.run.run_id.clone(),
                agent,
                order,
                input,
            ))
            .await
    }

    /// Persist the score and finding records a successful payload carries.
    pub async fn save_payload(&self, agent: &str, payload: &AgentPayload) -> StorageResult<()> {
        for score in payload.score_records(agent) {
            self.store.save_score(&self.run.run_id, score).await?;
        }
        let findings = payload.findings();
        if !findings.is_empty() {
            self.store
                .save_findings(&self.run.run_id, findings.to_vec())
                .await?;
        }
        Ok(())
    }

    /// Overwrite the queued record with the terminal execution state.
    pub async fn finish_execution(
        &self,
        order: u32,
        agent: &str,
        state: &ExecutionState,
    ) -> StorageResult<()> {
        self.store
            .save_execution(execution_record(&self.run.run_id, agent, order, state))
            .await
    }

    /// Complete the run. If the completion write fails the run stays
    /// `Running` and can still be [`finish_err`](Self::finish_err)ed.
    pub async fn finish_ok(&self, overall_score: f64) -> StorageResult<PipelineRunRecord> {
        self.store
            .complete_run(&self.run.run_id, overall_score)
            .await?;
        let run = self.store.get_run(&self.run.run_id).await?;
        crate::obs::emit_run_finished(
            &self.run.run_id.0,
            self.elapsed_ms(),
            Some(overall_score),
            true,
        );
        Ok(run)
    }

    pub async fn finish_err(&self, message: &str) -> StorageResult<PipelineRunRecord> {
        self.store.fail_run(&self.run.run_id, message).await?;
        crate::obs::emit_run_finished(&self.run.run_id.0, self.elapsed_ms(), None, false);
        self.store.get_run(&self.run.run_id).await
    }

    fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Storage form of a lifecycle [`ExecutionState`].
pub fn execution_record(
    run_id: &RunId,
    agent: &str,
    order: u32,
    state: &ExecutionState,
) -> ExecutionRecord {
    let mut record = ExecutionRecord::running(run_id.clone(), agent, order, state.input().clone());
    record.status = state.status();
    record.retry_count = state.retry_count();
    record.error_message = match state.status() {
        deckscope_state::ExecutionStatus::Failed => state.last_error().map(str::to_string),
        _ => None,
    };
    record.output = state.output().cloned();
    record.intermediate_steps = state.intermediate_steps().to_vec();
    record.errors = state.errors().to_vec();
    if let Some(started_at) = state.started_at() {
        record.started_at = started_at;
    }
    record.completed_at = state.completed_at();
    record
}
