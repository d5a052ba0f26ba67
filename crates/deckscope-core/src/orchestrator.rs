//! Stage orchestrator: runs a pipeline's agents in order, persists their
//! audit trail and aggregates the results into a finished run.

use std::sync::Arc;

use deckscope_state::{
    FailurePolicy, PipelineKind, PipelineRunRecord, PipelineStore, RunId, ScoreCategory,
    ScoreRecord, StorageError,
};
use tracing::{instrument, warn};

use crate::calculator::weighted_overall;
use crate::category_map::CategoryMapper;
use crate::config::DeckscopeConfig;
use crate::dedup;
use crate::domain::{AnalysisContext, ConfigError, OrchestratorError};
use crate::lifecycle::ExecutionLifecycle;
use crate::metrics::Metrics;
use crate::obs;
use crate::pipeline::PipelineDefinition;
use crate::progress::{NoopProgress, ProgressEvent, ProgressSink};
use crate::recording::RunRecorder;

/// Runs pipelines against a [`PipelineStore`].
///
/// Agents of one run execute strictly sequentially in definition order. A
/// failed agent is skipped or aborts the run according to the definition's
/// [`FailurePolicy`].
pub struct StageOrchestrator {
    store: Arc<dyn PipelineStore>,
    lifecycle: ExecutionLifecycle,
    progress: Arc<dyn ProgressSink>,
    mapper: CategoryMapper,
    metrics: Arc<Metrics>,
}

impl StageOrchestrator {
    pub fn new(store: Arc<dyn PipelineStore>) -> Self {
        let metrics = Arc::new(Metrics::new());
        Self {
            store,
            lifecycle: ExecutionLifecycle::default().with_metrics(metrics.clone()),
            progress: Arc::new(NoopProgress),
            mapper: CategoryMapper::default(),
            metrics,
        }
    }

    /// Orchestrator using the retry policy and mapping table from `config`.
    pub fn from_config(
        store: Arc<dyn PipelineStore>,
        config: &DeckscopeConfig,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(store)
            .with_lifecycle(ExecutionLifecycle::new(config.retry))
            .with_mapper(config.category_mapper()?))
    }

    pub fn with_lifecycle(mut self, lifecycle: ExecutionLifecycle) -> Self {
        self.lifecycle = lifecycle.with_metrics(self.metrics.clone());
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_mapper(mut self, mapper: CategoryMapper) -> Self {
        self.mapper = mapper;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.lifecycle = self.lifecycle.with_metrics(metrics.clone());
        self.metrics = metrics;
        self
    }

    pub fn store(&self) -> &Arc<dyn PipelineStore> {
        &self.store
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn mapper(&self) -> &CategoryMapper {
        &self.mapper
    }

    /// Run every agent of `definition` against `context`.
    ///
    /// Returns the completed run record. When the run is aborted by a failing
    /// agent or its aggregation fails, the run is marked failed and the error
    /// is returned.
    #[instrument(
        skip(self, definition, context),
        fields(
            pipeline = %definition.kind(),
            document_id = %context.document_id,
            run_id = tracing::field::Empty,
        )
    )]
    pub async fn run_pipeline(
        &self,
        definition: &PipelineDefinition,
        context: &AnalysisContext,
    ) -> Result<PipelineRunRecord, OrchestratorError> {
        let recorder =
            RunRecorder::start(self.store.clone(), definition, &context.document_id).await?;
        let run_id = recorder.run_id().clone();
        tracing::Span::current().record("run_id", tracing::field::display(&run_id));

        let input = serde_json::to_value(context).unwrap_or(serde_json::Value::Null);
        let total = definition.len();

        for (order, agent) in definition.ordered() {
            let descriptor = agent.descriptor();
            let name = descriptor.name.as_str();

            if let Err(e) = recorder.queue_execution(order, name, input.clone()).await {
                return Err(self.abort_on_storage(&recorder, e).await);
            }
            self.progress
                .publish(ProgressEvent::agent_queued(&run_id.0, order, total, name));
            obs::emit_agent_started(&run_id.0, name, order);

            let (result, state) = self
                .lifecycle
                .execute_tracked(descriptor, context, |trace| agent.analyze(context, trace))
                .await;
            obs::emit_agent_finished(
                &run_id.0,
                name,
                result.success,
                result.metadata.attempt,
                result.metadata.execution_time_ms,
            );

            if let Some(payload) = &result.data {
                if let Err(e) = recorder.save_payload(name, payload).await {
                    return Err(self.abort_on_storage(&recorder, e).await);
                }
            }
            if let Err(e) = recorder.finish_execution(order, name, &state).await {
                return Err(self.abort_on_storage(&recorder, e).await);
            }

            if result.success {
                self.metrics.inc_agents_succeeded();
                continue;
            }
            self.metrics.inc_agents_failed();
            let message = result.error.unwrap_or_else(|| "unknown error".to_string());

            match definition.failure_policy() {
                FailurePolicy::ContinueOnFailure => {
                    warn!(
                        event = "agent.skipped",
                        run_id = %run_id,
                        agent = %name,
                        error = %message,
                    );
                }
                FailurePolicy::AbortOnFailure => {
                    let run_message = format!("agent {name} failed: {message}");
                    self.finish_failed(&recorder, &run_message).await;
                    return Err(OrchestratorError::StageAborted {
                        run_id: run_id.0,
                        agent: name.to_string(),
                        message,
                    });
                }
            }
        }

        match self.aggregate(definition.kind(), &run_id).await {
            Ok(overall) => match recorder.finish_ok(overall).await {
                Ok(run) => {
                    self.metrics.inc_runs_completed();
                    Ok(run)
                }
                Err(e) => Err(self.abort_on_storage(&recorder, e).await),
            },
            Err(e) => {
                let message = format!("aggregation failed: {e}");
                self.finish_failed(&recorder, &message).await;
                Err(OrchestratorError::AggregationFailed {
                    run_id: run_id.0,
                    message: e.to_string(),
                })
            }
        }
    }

    /// Compute the overall score and write the stage's derived records.
    async fn aggregate(&self, kind: PipelineKind, run_id: &RunId) -> Result<f64, StorageError> {
        let deck_scores: Vec<ScoreRecord> = self
            .store
            .get_scores(run_id)
            .await?
            .into_iter()
            .filter(|s| matches!(s.category, ScoreCategory::Deck(_)))
            .collect();
        let overall = weighted_overall(&deck_scores);

        if kind == PipelineKind::Category {
            for record in self.mapper.rubric_records(&deck_scores) {
                self.store.save_score(run_id, record).await?;
            }
        }

        let findings = self.store.get_findings(run_id).await?;
        if !findings.is_empty() {
            let consolidated = dedup::sort_by_severity(dedup::dedupe(findings));
            self.store.replace_findings(run_id, consolidated).await?;
        }

        Ok(overall)
    }

    async fn finish_failed(&self, recorder: &RunRecorder, message: &str) {
        self.metrics.inc_runs_failed();
        if let Err(e) = recorder.finish_err(message).await {
            obs::emit_run_finalize_error(&recorder.run_id().0, &e);
        }
    }

    async fn abort_on_storage(
        &self,
        recorder: &RunRecorder,
        err: StorageError,
    ) -> OrchestratorError {
        self.finish_failed(recorder, &format!("storage error: {err}"))
            .await;
        OrchestratorError::Storage(err)
    }
}
