//! End-to-end pipeline runs through the stage orchestrator.
//!
//! Most runs use the in-memory fake store on a paused clock so retry
//! backoff is instant; one run goes through the SurrealDB store.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use deckscope_core::agent::FnAgent;
use deckscope_core::{
    Agent, AgentDescriptor, AgentError, AgentPayload, AnalysisContext, BroadcastProgress,
    CategoryResult, CategoryScore, DeckCategory, DeckscopeConfig, ExecutionLifecycle,
    FailurePolicy, FindingRecord, FindingType, FindingsResult, OrchestratorError,
    PipelineDefinition, PipelineKind, PipelineStore, RetryPolicy, RubricCategory, RunStatus,
    ScoreCategory, ScoreResult, ScriptedModelClient, Severity, StageOrchestrator, TextRetriever,
};
use deckscope_state::fakes::MemoryPipelineStore;
use deckscope_state::{
    ExecutionRecord, ExecutionStatus, NewPipelineRun, PipelineRunRecord, RunId, ScoreRecord,
    StorageError, StorageResult, SurrealPipelineStore,
};
use futures::FutureExt;

fn ctx() -> AnalysisContext {
    AnalysisContext::new("deck-1").with_company("Acme Robotics")
}

fn category_score(category: DeckCategory, score: f64, weight: f64) -> CategoryScore {
    CategoryScore {
        category,
        score,
        weight,
        justification: format!("{category} looks fine"),
    }
}

fn scoring_agent(
    category: DeckCategory,
    score: f64,
    weight: f64,
    calls: Arc<AtomicU32>,
) -> Arc<dyn Agent> {
    Arc::new(FnAgent::new(
        AgentDescriptor::new(category.as_str(), "test scorer").with_timeout_ms(1_000),
        move |_ctx, trace| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                trace.record("call_model", serde_json::json!({}), serde_json::json!(score));
                Ok(AgentPayload::Score(ScoreResult {
                    score: category_score(category, score, weight),
                    findings: vec![],
                }))
            }
            .boxed()
        },
    ))
}

fn category_agent(
    category: DeckCategory,
    score: f64,
    weight: f64,
    calls: Arc<AtomicU32>,
) -> Arc<dyn Agent> {
    Arc::new(FnAgent::new(
        AgentDescriptor::new(category.as_str(), "test categorizer").with_timeout_ms(1_000),
        move |_ctx, _trace| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(AgentPayload::Category(CategoryResult {
                    score: category_score(category, score, weight),
                    highlights: vec![],
                }))
            }
            .boxed()
        },
    ))
}

fn failing_agent(name: &str, calls: Arc<AtomicU32>) -> Arc<dyn Agent> {
    Arc::new(FnAgent::new(
        AgentDescriptor::new(name, "always fails")
            .with_timeout_ms(1_000)
            .with_max_retries(2),
        move |_ctx, _trace| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AgentError::ModelCall("upstream unavailable".to_string()))
            }
            .boxed()
        },
    ))
}

fn finding(kind: FindingType, title: &str, severity: Severity, source: &str) -> FindingRecord {
    FindingRecord {
        finding_type: kind,
        title: title.to_string(),
        description: "Details from the deck.".to_string(),
        severity,
        recommendations: vec![],
        evidence: None,
        source: source.to_string(),
    }
}

fn findings_agent(name: &str, findings: Vec<FindingRecord>) -> Arc<dyn Agent> {
    Arc::new(FnAgent::new(
        AgentDescriptor::new(name, "test analyst").with_timeout_ms(1_000),
        move |_ctx, _trace| {
            let findings = findings.clone();
            async move {
                Ok(AgentPayload::Findings(FindingsResult {
                    summary: "analysis".to_string(),
                    findings,
                    score: None,
                }))
            }
            .boxed()
        },
    ))
}

fn counter() -> Arc<AtomicU32> {
    Arc::new(AtomicU32::new(0))
}

// -------------------------------------------------------------------------
// Scoring: continue on failure
// -------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn scoring_run_skips_failed_agent() {
    let store = Arc::new(MemoryPipelineStore::new());
    let orchestrator = StageOrchestrator::new(store.clone());
    let failed_calls = counter();
    let definition = PipelineDefinition::new(
        PipelineKind::Scoring,
        vec![
            scoring_agent(DeckCategory::Problem, 80.0, 0.25, counter()),
            failing_agent("market", failed_calls.clone()),
            scoring_agent(DeckCategory::Team, 60.0, 0.25, counter()),
            scoring_agent(DeckCategory::Traction, 70.0, 0.25, counter()),
        ],
    )
    .unwrap();

    let run = orchestrator.run_pipeline(&definition, &ctx()).await.unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    let overall = run.overall_score.unwrap();
    assert!((overall - 70.0).abs() < 1e-9, "overall {overall}");
    assert_eq!(failed_calls.load(Ordering::SeqCst), 3);

    let executions = store.get_executions(&run.run_id).await.unwrap();
    assert_eq!(executions.len(), 4);
    let orders: Vec<u32> = executions.iter().map(|e| e.execution_order).collect();
    assert_eq!(orders, vec![1, 2, 3, 4]);

    let failed: Vec<_> = executions
        .iter()
        .filter(|e| e.status == ExecutionStatus::Failed)
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].agent_name, "market");
    assert_eq!(failed[0].retry_count, 2);
    assert_eq!(failed[0].errors.len(), 3);
    assert_eq!(
        failed[0].error_message.as_deref(),
        Some("model call failed: upstream unavailable")
    );

    let completed = &executions[0];
    assert_eq!(completed.status, ExecutionStatus::Completed);
    assert!(completed.output.is_some());
    assert!(completed.completed_at.is_some());
    assert_eq!(completed.intermediate_steps[0].tool, "call_model");

    assert_eq!(store.get_scores(&run.run_id).await.unwrap().len(), 3);

    let metrics = orchestrator.metrics().snapshot();
    assert_eq!(metrics.agents_succeeded, 3);
    assert_eq!(metrics.agents_failed, 1);
    assert_eq!(metrics.runs_completed, 1);
    assert_eq!(metrics.attempts, 6);
}

#[tokio::test(start_paused = true)]
async fn scoring_run_with_every_agent_failing_completes_at_zero() {
    let store = Arc::new(MemoryPipelineStore::new());
    let orchestrator = StageOrchestrator::new(store.clone());
    let definition = PipelineDefinition::new(
        PipelineKind::Scoring,
        vec![failing_agent("a", counter()), failing_agent("b", counter())],
    )
    .unwrap();

    let run = orchestrator.run_pipeline(&definition, &ctx()).await.unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.overall_score, Some(0.0));
    assert!(store.get_scores(&run.run_id).await.unwrap().is_empty());
}

// -------------------------------------------------------------------------
// Category: abort on failure
// -------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn category_run_aborts_on_first_failure() {
    let store = Arc::new(MemoryPipelineStore::new());
    let orchestrator = StageOrchestrator::new(store.clone());
    let later: Vec<Arc<AtomicU32>> = (0..3).map(|_| counter()).collect();
    let definition = PipelineDefinition::new(
        PipelineKind::Category,
        vec![
            category_agent(DeckCategory::Market, 80.0, 0.2, counter()),
            category_agent(DeckCategory::Product, 70.0, 0.2, counter()),
            failing_agent("team", counter()),
            category_agent(DeckCategory::Traction, 60.0, 0.15, later[0].clone()),
            category_agent(DeckCategory::BusinessModel, 60.0, 0.1, later[1].clone()),
            category_agent(DeckCategory::Financials, 50.0, 0.15, later[2].clone()),
        ],
    )
    .unwrap();

    let err = orchestrator
        .run_pipeline(&definition, &ctx())
        .await
        .unwrap_err();

    let run_id = match err {
        OrchestratorError::StageAborted {
            run_id,
            agent,
            message,
        } => {
            assert_eq!(agent, "team");
            assert_eq!(message, "model call failed: upstream unavailable");
            run_id
        }
        other => panic!("expected StageAborted, got {other:?}"),
    };
    for calls in &later {
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    let run_id = deckscope_core::RunId(run_id);
    let run = store.get_run(&run_id).await.unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.overall_score.is_none());
    assert!(run
        .error_message
        .as_deref()
        .unwrap()
        .contains("agent team failed"));

    let executions = store.get_executions(&run_id).await.unwrap();
    assert_eq!(executions.len(), 3);
    assert_eq!(executions[2].status, ExecutionStatus::Failed);
    assert_eq!(executions[2].retry_count, 2);

    let metrics = orchestrator.metrics().snapshot();
    assert_eq!(metrics.runs_failed, 1);
    assert_eq!(metrics.runs_completed, 0);
}

#[tokio::test(start_paused = true)]
async fn category_run_can_be_configured_to_continue() {
    let store = Arc::new(MemoryPipelineStore::new());
    let orchestrator = StageOrchestrator::new(store.clone());
    let definition = PipelineDefinition::new(
        PipelineKind::Category,
        vec![
            category_agent(DeckCategory::Market, 80.0, 0.5, counter()),
            failing_agent("team", counter()),
        ],
    )
    .unwrap()
    .with_failure_policy(FailurePolicy::ContinueOnFailure);

    let run = orchestrator.run_pipeline(&definition, &ctx()).await.unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.overall_score, Some(80.0));
}

#[tokio::test]
async fn category_run_writes_rubric_scores() {
    let store = Arc::new(MemoryPipelineStore::new());
    let orchestrator = StageOrchestrator::new(store.clone());
    let definition = PipelineDefinition::new(
        PipelineKind::Category,
        vec![
            category_agent(DeckCategory::Market, 80.0, 0.5, counter()),
            category_agent(DeckCategory::Team, 60.0, 0.5, counter()),
        ],
    )
    .unwrap();

    let run = orchestrator.run_pipeline(&definition, &ctx()).await.unwrap();
    assert_eq!(run.overall_score, Some(70.0));

    let scores = store.get_scores(&run.run_id).await.unwrap();
    let deck: Vec<_> = scores
        .iter()
        .filter(|s| matches!(s.category, ScoreCategory::Deck(_)))
        .collect();
    assert_eq!(deck.len(), 2);

    let rubric = |target: RubricCategory| {
        scores
            .iter()
            .find(|s| s.category == ScoreCategory::Rubric(target))
    };
    let team = rubric(RubricCategory::TeamExecution).unwrap();
    assert!((team.score - 60.0).abs() < 1e-9);
    assert_eq!(team.source_agent, "category_mapper");
    assert!(rubric(RubricCategory::MarketOpportunity).is_some());
    assert!(rubric(RubricCategory::ExitPotential).is_none());
    assert!(rubric(RubricCategory::ImpactEsg).is_none());
}

// -------------------------------------------------------------------------
// Analysis: finding consolidation
// -------------------------------------------------------------------------

#[tokio::test]
async fn analysis_run_dedupes_and_sorts_findings() {
    let store = Arc::new(MemoryPipelineStore::new());
    let orchestrator = StageOrchestrator::new(store.clone());
    let definition = PipelineDefinition::new(
        PipelineKind::Analysis,
        vec![
            findings_agent(
                "weaknesses",
                vec![
                    finding(FindingType::Weakness, "Thin moat", Severity::Minor, "weaknesses"),
                    finding(FindingType::Weakness, "No CFO", Severity::Major, "weaknesses"),
                ],
            ),
            findings_agent(
                "red_flags",
                vec![
                    finding(FindingType::Weakness, "  NO CFO ", Severity::Critical, "red_flags"),
                    finding(FindingType::Threat, "Regulatory risk", Severity::Critical, "red_flags"),
                ],
            ),
        ],
    )
    .unwrap();

    let run = orchestrator.run_pipeline(&definition, &ctx()).await.unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.overall_score, Some(0.0));

    let findings = store.get_findings(&run.run_id).await.unwrap();
    let titles: Vec<&str> = findings.iter().map(|f| f.title.as_str()).collect();
    // "No CFO" and "  NO CFO " normalize to the same key; the first wins.
    assert_eq!(titles, vec!["Regulatory risk", "No CFO", "Thin moat"]);
    assert_eq!(findings[1].source, "weaknesses");
    assert_eq!(findings[1].severity, Severity::Major);
}

#[tokio::test]
async fn scoring_run_consolidates_agent_findings() {
    let store = Arc::new(MemoryPipelineStore::new());
    let orchestrator = StageOrchestrator::new(store.clone());
    let scorer = |name: &'static str, category: DeckCategory, findings: Vec<FindingRecord>| {
        Arc::new(FnAgent::new(
            AgentDescriptor::new(name, "scorer with findings"),
            move |_ctx, _trace| {
                let findings = findings.clone();
                async move {
                    Ok(AgentPayload::Score(ScoreResult {
                        score: category_score(category, 60.0, 0.5),
                        findings,
                    }))
                }
                .boxed()
            },
        )) as Arc<dyn Agent>
    };
    let definition = PipelineDefinition::new(
        PipelineKind::Scoring,
        vec![
            scorer(
                "team",
                DeckCategory::Team,
                vec![finding(FindingType::Weakness, "No CFO", Severity::Minor, "team")],
            ),
            scorer(
                "financials",
                DeckCategory::Financials,
                vec![
                    finding(FindingType::Weakness, "no cfo", Severity::Major, "financials"),
                    finding(FindingType::Threat, "Short runway", Severity::Critical, "financials"),
                ],
            ),
        ],
    )
    .unwrap();

    let run = orchestrator.run_pipeline(&definition, &ctx()).await.unwrap();
    assert_eq!(run.overall_score, Some(60.0));

    let findings = store.get_findings(&run.run_id).await.unwrap();
    let titles: Vec<&str> = findings.iter().map(|f| f.title.as_str()).collect();
    assert_eq!(titles, vec!["Short runway", "No CFO"]);
    assert_eq!(findings[1].source, "team");
}

// -------------------------------------------------------------------------
// Storage failures
// -------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BrokenCall {
    SaveExecution,
    SaveScore,
    GetScores,
    ReplaceFindings,
    CompleteRun,
}

/// Memory store whose `broken` call always fails with a backend error.
struct BrokenStore {
    inner: MemoryPipelineStore,
    broken: BrokenCall,
}

impl BrokenStore {
    fn new(broken: BrokenCall) -> Self {
        Self {
            inner: MemoryPipelineStore::new(),
            broken,
        }
    }

    fn check(&self, call: BrokenCall) -> StorageResult<()> {
        if self.broken == call {
            return Err(StorageError::Backend("disk full".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PipelineStore for BrokenStore {
    async fn create_run(&self, run: NewPipelineRun) -> StorageResult<PipelineRunRecord> {
        self.inner.create_run(run).await
    }

    async fn start_run(&self, run_id: &RunId) -> StorageResult<()> {
        self.inner.start_run(run_id).await
    }

    async fn complete_run(&self, run_id: &RunId, overall_score: f64) -> StorageResult<()> {
        self.check(BrokenCall::CompleteRun)?;
        self.inner.complete_run(run_id, overall_score).await
    }

    async fn fail_run(&self, run_id: &RunId, error_message: &str) -> StorageResult<()> {
        self.inner.fail_run(run_id, error_message).await
    }

    async fn get_run(&self, run_id: &RunId) -> StorageResult<PipelineRunRecord> {
        self.inner.get_run(run_id).await
    }

    async fn list_runs(
        &self,
        pipeline: Option<PipelineKind>,
    ) -> StorageResult<Vec<PipelineRunRecord>> {
        self.inner.list_runs(pipeline).await
    }

    async fn delete_run(&self, run_id: &RunId) -> StorageResult<()> {
        self.inner.delete_run(run_id).await
    }

    async fn save_execution(&self, record: ExecutionRecord) -> StorageResult<()> {
        self.check(BrokenCall::SaveExecution)?;
        self.inner.save_execution(record).await
    }

    async fn get_executions(&self, run_id: &RunId) -> StorageResult<Vec<ExecutionRecord>> {
        self.inner.get_executions(run_id).await
    }

    async fn save_score(&self, run_id: &RunId, score: ScoreRecord) -> StorageResult<()> {
        self.check(BrokenCall::SaveScore)?;
        self.inner.save_score(run_id, score).await
    }

    async fn get_scores(&self, run_id: &RunId) -> StorageResult<Vec<ScoreRecord>> {
        self.check(BrokenCall::GetScores)?;
        self.inner.get_scores(run_id).await
    }

    async fn save_findings(
        &self,
        run_id: &RunId,
        findings: Vec<FindingRecord>,
    ) -> StorageResult<()> {
        self.inner.save_findings(run_id, findings).await
    }

    async fn replace_findings(
        &self,
        run_id: &RunId,
        findings: Vec<FindingRecord>,
    ) -> StorageResult<()> {
        self.check(BrokenCall::ReplaceFindings)?;
        self.inner.replace_findings(run_id, findings).await
    }

    async fn get_findings(&self, run_id: &RunId) -> StorageResult<Vec<FindingRecord>> {
        self.inner.get_findings(run_id).await
    }
}

/// Run a one-agent pipeline against a store with `broken` failing and
/// return the error together with the persisted run.
async fn run_with_broken(
    broken: BrokenCall,
    kind: PipelineKind,
    agent: Arc<dyn Agent>,
) -> (OrchestratorError, PipelineRunRecord, deckscope_core::MetricsSnapshot) {
    let store = Arc::new(BrokenStore::new(broken));
    let orchestrator = StageOrchestrator::new(store.clone());
    let definition = PipelineDefinition::new(kind, vec![agent]).unwrap();

    let err = orchestrator
        .run_pipeline(&definition, &ctx())
        .await
        .unwrap_err();
    let runs = store.list_runs(None).await.unwrap();
    assert_eq!(runs.len(), 1);
    let run = runs.into_iter().next().unwrap();
    (err, run, orchestrator.metrics().snapshot())
}

#[tokio::test]
async fn failed_completion_write_marks_run_failed() {
    let (err, run, metrics) = run_with_broken(
        BrokenCall::CompleteRun,
        PipelineKind::Scoring,
        scoring_agent(DeckCategory::Team, 80.0, 0.5, counter()),
    )
    .await;

    assert!(matches!(err, OrchestratorError::Storage(StorageError::Backend(_))));
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.overall_score, None);
    assert_eq!(
        run.error_message.as_deref(),
        Some("storage error: backend error: disk full")
    );
    assert!(run.completed_at.is_some());
    assert_eq!(metrics.runs_failed, 1);
    assert_eq!(metrics.runs_completed, 0);
}

#[tokio::test]
async fn unreadable_scores_fail_aggregation() {
    let (err, run, metrics) = run_with_broken(
        BrokenCall::GetScores,
        PipelineKind::Scoring,
        scoring_agent(DeckCategory::Team, 80.0, 0.5, counter()),
    )
    .await;

    match err {
        OrchestratorError::AggregationFailed { run_id, message } => {
            assert_eq!(run_id, run.run_id.0);
            assert_eq!(message, "backend error: disk full");
        }
        other => panic!("expected AggregationFailed, got {other:?}"),
    }
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(
        run.error_message.as_deref(),
        Some("aggregation failed: backend error: disk full")
    );
    assert_eq!(metrics.runs_failed, 1);
}

#[tokio::test]
async fn failed_finding_consolidation_fails_aggregation() {
    let (err, run, metrics) = run_with_broken(
        BrokenCall::ReplaceFindings,
        PipelineKind::Analysis,
        findings_agent(
            "weaknesses",
            vec![finding(FindingType::Weakness, "Thin moat", Severity::Minor, "weaknesses")],
        ),
    )
    .await;

    assert!(matches!(err, OrchestratorError::AggregationFailed { .. }));
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(
        run.error_message.as_deref(),
        Some("aggregation failed: backend error: disk full")
    );
    assert_eq!(metrics.runs_failed, 1);
}

#[tokio::test]
async fn storage_errors_during_agent_loop_fail_the_run() {
    for broken in [BrokenCall::SaveExecution, BrokenCall::SaveScore] {
        let calls = counter();
        let (err, run, metrics) = run_with_broken(
            broken,
            PipelineKind::Scoring,
            scoring_agent(DeckCategory::Team, 80.0, 0.5, calls.clone()),
        )
        .await;

        assert!(
            matches!(err, OrchestratorError::Storage(StorageError::Backend(_))),
            "{broken:?}: {err:?}"
        );
        assert_eq!(run.status, RunStatus::Failed, "{broken:?}");
        assert_eq!(
            run.error_message.as_deref(),
            Some("storage error: backend error: disk full")
        );
        assert_eq!(metrics.runs_failed, 1);
        // The agent never runs when its execution record cannot be queued.
        let expected_calls = u32::from(broken == BrokenCall::SaveScore);
        assert_eq!(calls.load(Ordering::SeqCst), expected_calls);
    }
}

// -------------------------------------------------------------------------
// Progress, storage backends and the standard batteries
// -------------------------------------------------------------------------

#[tokio::test]
async fn progress_events_follow_agent_order() {
    let store = Arc::new(MemoryPipelineStore::new());
    let progress = Arc::new(BroadcastProgress::default());
    let mut rx = progress.subscribe();
    let orchestrator = StageOrchestrator::new(store).with_progress(progress.clone());
    let definition = PipelineDefinition::new(
        PipelineKind::Scoring,
        vec![
            scoring_agent(DeckCategory::Problem, 50.0, 0.1, counter()),
            scoring_agent(DeckCategory::Solution, 50.0, 0.1, counter()),
            scoring_agent(DeckCategory::Market, 50.0, 0.1, counter()),
        ],
    )
    .unwrap();

    let run = orchestrator.run_pipeline(&definition, &ctx()).await.unwrap();

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    let ticks: Vec<(u8, &str)> = events
        .iter()
        .map(|e| (e.progress, e.step.as_str()))
        .collect();
    assert_eq!(
        ticks,
        vec![
            (33, "Running problem"),
            (67, "Running solution"),
            (100, "Running market"),
        ]
    );
    assert!(events.iter().all(|e| e.run_id == run.run_id.0));
}

#[tokio::test]
async fn scoring_run_persists_to_surreal_store() {
    let store = Arc::new(SurrealPipelineStore::in_memory().await.unwrap());
    let orchestrator = StageOrchestrator::new(store.clone()).with_lifecycle(
        ExecutionLifecycle::new(RetryPolicy {
            base_delay_ms: 1,
            max_delay_ms: 2,
        }),
    );
    let definition = PipelineDefinition::new(
        PipelineKind::Scoring,
        vec![
            scoring_agent(DeckCategory::Team, 90.0, 0.5, counter()),
            failing_agent("market", counter()),
            scoring_agent(DeckCategory::Product, 70.0, 0.5, counter()),
        ],
    )
    .unwrap();

    let run = orchestrator.run_pipeline(&definition, &ctx()).await.unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.overall_score, Some(80.0));

    let stored = store.get_run(&run.run_id).await.unwrap();
    assert_eq!(stored, run);

    let executions = store.get_executions(&run.run_id).await.unwrap();
    assert_eq!(executions.len(), 3);
    assert_eq!(executions[1].status, ExecutionStatus::Failed);
    assert_eq!(executions[1].retry_count, 2);
}

#[tokio::test]
async fn standard_scoring_battery_runs_offline() {
    let store = Arc::new(MemoryPipelineStore::new());
    let retriever = Arc::new(TextRetriever::new().with_document(
        "deck-1",
        "Acme Robotics builds warehouse robots.\n\nThe team has two exits.\n\nRevenue grew 3x.",
    ));
    let model = Arc::new(
        ScriptedModelClient::new()
            .with_fallback(r#"```json
{"score": 72, "justification": "solid"}
```"#),
    );
    let config = DeckscopeConfig::default();
    let definition =
        PipelineDefinition::standard(PipelineKind::Scoring, retriever, model.clone(), &config)
            .unwrap();
    assert_eq!(definition.len(), 10);

    let orchestrator = StageOrchestrator::from_config(store.clone(), &config).unwrap();
    let run = orchestrator.run_pipeline(&definition, &ctx()).await.unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert!((run.overall_score.unwrap() - 72.0).abs() < 1e-9);
    assert_eq!(model.calls("team"), 1);

    let executions = store.get_executions(&run.run_id).await.unwrap();
    assert_eq!(executions.len(), 10);
    let tools: Vec<&str> = executions[0]
        .intermediate_steps
        .iter()
        .map(|s| s.tool.as_str())
        .collect();
    assert_eq!(tools, vec!["retrieve", "call_model", "after_execute"]);
}
