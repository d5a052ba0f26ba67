//! Trait contract tests for PipelineStore.
//!
//! Every test runs against the in-memory fake and the in-memory SurrealDB
//! store. Any conforming implementation must pass these.

use deckscope_state::fakes::MemoryPipelineStore;
use deckscope_state::*;

fn new_run(kind: PipelineKind) -> NewPipelineRun {
    let agents = vec!["market".to_string(), "team".to_string()];
    NewPipelineRun {
        pipeline: kind,
        failure_policy: FailurePolicy::default_for(kind),
        definition_digest: ContentDigest::from_bytes(agents.join(",").as_bytes()),
        agents,
        document_id: "deck-1".to_string(),
    }
}

fn score(category: DeckCategory, value: f64) -> ScoreRecord {
    ScoreRecord {
        category: ScoreCategory::Deck(category),
        score: value,
        weight: 0.5,
        justification: "because".to_string(),
        source_agent: category.to_string(),
    }
}

fn finding(title: &str, severity: Severity) -> FindingRecord {
    FindingRecord {
        finding_type: FindingType::Weakness,
        title: title.to_string(),
        description: format!("{title} description"),
        severity,
        recommendations: vec!["fix it".to_string()],
        evidence: Some(Evidence {
            quote: "quoted".to_string(),
            location_ref: None,
        }),
        source: "weaknesses".to_string(),
    }
}

async fn started(store: &dyn PipelineStore, kind: PipelineKind) -> RunId {
    let run = store.create_run(new_run(kind)).await.unwrap();
    store.start_run(&run.run_id).await.unwrap();
    run.run_id
}

async fn created_run_is_pending(store: &dyn PipelineStore) {
    let run = store.create_run(new_run(PipelineKind::Scoring)).await.unwrap();
    assert_eq!(run.status, RunStatus::Pending);
    assert!(run.started_at.is_none());

    let fetched = store.get_run(&run.run_id).await.unwrap();
    assert_eq!(fetched.status, RunStatus::Pending);
    assert_eq!(fetched.agents, vec!["market", "team"]);
    assert_eq!(fetched.definition_digest, run.definition_digest);
    assert_eq!(fetched.failure_policy, FailurePolicy::ContinueOnFailure);
}

async fn lifecycle_pending_running_completed(store: &dyn PipelineStore) {
    let run_id = started(store, PipelineKind::Scoring).await;
    let run = store.get_run(&run_id).await.unwrap();
    assert_eq!(run.status, RunStatus::Running);
    assert!(run.started_at.is_some());

    store.complete_run(&run_id, 71.0).await.unwrap();
    let run = store.get_run(&run_id).await.unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.overall_score, Some(71.0));
    assert!(run.completed_at.is_some());
}

async fn terminal_runs_are_immutable(store: &dyn PipelineStore) {
    let run_id = started(store, PipelineKind::Category).await;
    store.fail_run(&run_id, "agent 3 failed").await.unwrap();

    let err = store.complete_run(&run_id, 50.0).await.unwrap_err();
    assert!(matches!(err, StorageError::InvalidRunState { .. }));
    let err = store.fail_run(&run_id, "again").await.unwrap_err();
    assert!(matches!(err, StorageError::InvalidRunState { .. }));
    let err = store
        .save_score(&run_id, score(DeckCategory::Team, 10.0))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::InvalidRunState { .. }));

    let run = store.get_run(&run_id).await.unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.error_message.as_deref(), Some("agent 3 failed"));
    assert!(run.overall_score.is_none());
}

async fn start_requires_pending(store: &dyn PipelineStore) {
    let run_id = started(store, PipelineKind::Scoring).await;
    let err = store.start_run(&run_id).await.unwrap_err();
    assert!(matches!(err, StorageError::InvalidRunState { .. }));
}

async fn pending_run_can_fail(store: &dyn PipelineStore) {
    let run = store.create_run(new_run(PipelineKind::Analysis)).await.unwrap();
    store.fail_run(&run.run_id, "never started").await.unwrap();
    let run = store.get_run(&run.run_id).await.unwrap();
    assert_eq!(run.status, RunStatus::Failed);
}

async fn unknown_run_is_not_found(store: &dyn PipelineStore) {
    let bogus = RunId::new();
    let err = store.get_run(&bogus).await.unwrap_err();
    assert!(matches!(err, StorageError::RunNotFound { .. }));
    let err = store.start_run(&bogus).await.unwrap_err();
    assert!(matches!(err, StorageError::RunNotFound { .. }));
}

async fn executions_upsert_and_order(store: &dyn PipelineStore) {
    let run_id = started(store, PipelineKind::Scoring).await;

    let second = ExecutionRecord::running(run_id.clone(), "team", 2, serde_json::json!({}));
    let first = ExecutionRecord::running(run_id.clone(), "market", 1, serde_json::json!({}));
    store.save_execution(second).await.unwrap();
    store.save_execution(first.clone()).await.unwrap();

    let mut done = first;
    done.status = ExecutionStatus::Completed;
    done.retry_count = 1;
    done.output = Some(serde_json::json!({"score": 80}));
    done.errors.push(ExecutionError {
        message: "timeout after 10ms".to_string(),
        timestamp: chrono::Utc::now(),
    });
    store.save_execution(done).await.unwrap();

    let execs = store.get_executions(&run_id).await.unwrap();
    assert_eq!(execs.len(), 2);
    assert_eq!(execs[0].execution_order, 1);
    assert_eq!(execs[0].status, ExecutionStatus::Completed);
    assert_eq!(execs[0].retry_count, 1);
    assert_eq!(execs[0].errors.len(), 1);
    assert_eq!(execs[1].agent_name, "team");
    assert_eq!(execs[1].status, ExecutionStatus::Running);
}

async fn finalized_execution_cannot_be_overwritten(store: &dyn PipelineStore) {
    let run_id = started(store, PipelineKind::Scoring).await;
    let mut record = ExecutionRecord::running(run_id.clone(), "market", 1, serde_json::json!({}));
    record.status = ExecutionStatus::Failed;
    store.save_execution(record).await.unwrap();

    let again = ExecutionRecord::running(run_id.clone(), "market", 1, serde_json::json!({}));
    let err = store.save_execution(again).await.unwrap_err();
    assert!(matches!(err, StorageError::ExecutionFinalized { .. }));
}

async fn scores_keep_insertion_order(store: &dyn PipelineStore) {
    let run_id = started(store, PipelineKind::Scoring).await;
    store
        .save_score(&run_id, score(DeckCategory::Market, 80.0))
        .await
        .unwrap();
    store
        .save_score(&run_id, score(DeckCategory::Team, 60.0))
        .await
        .unwrap();
    store
        .save_score(
            &run_id,
            ScoreRecord {
                category: ScoreCategory::Rubric(RubricCategory::TeamExecution),
                score: 60.0,
                weight: 0.3,
                justification: "mapped".to_string(),
                source_agent: "category_mapper".to_string(),
            },
        )
        .await
        .unwrap();

    let scores = store.get_scores(&run_id).await.unwrap();
    assert_eq!(scores.len(), 3);
    assert_eq!(scores[0].category, ScoreCategory::Deck(DeckCategory::Market));
    assert_eq!(scores[1].score, 60.0);
    assert_eq!(
        scores[2].category,
        ScoreCategory::Rubric(RubricCategory::TeamExecution)
    );
}

async fn findings_append_and_replace(store: &dyn PipelineStore) {
    let run_id = started(store, PipelineKind::Analysis).await;
    store
        .save_findings(
            &run_id,
            vec![finding("a", Severity::Minor), finding("b", Severity::Major)],
        )
        .await
        .unwrap();
    store
        .save_findings(&run_id, vec![finding("c", Severity::Critical)])
        .await
        .unwrap();

    let titles: Vec<String> = store
        .get_findings(&run_id)
        .await
        .unwrap()
        .into_iter()
        .map(|f| f.title)
        .collect();
    assert_eq!(titles, vec!["a", "b", "c"]);

    store
        .replace_findings(&run_id, vec![finding("c", Severity::Critical)])
        .await
        .unwrap();
    let findings = store.get_findings(&run_id).await.unwrap();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0], finding("c", Severity::Critical));
}

async fn scores_and_findings_interleave(store: &dyn PipelineStore) {
    let run_id = started(store, PipelineKind::Scoring).await;
    store
        .save_findings(&run_id, vec![finding("first", Severity::Major)])
        .await
        .unwrap();
    store
        .save_score(&run_id, score(DeckCategory::Market, 70.0))
        .await
        .unwrap();
    store
        .save_findings(&run_id, vec![finding("second", Severity::Minor)])
        .await
        .unwrap();
    store
        .save_score(&run_id, score(DeckCategory::Team, 50.0))
        .await
        .unwrap();

    let scores: Vec<f64> = store
        .get_scores(&run_id)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.score)
        .collect();
    assert_eq!(scores, vec![70.0, 50.0]);
    let titles: Vec<String> = store
        .get_findings(&run_id)
        .await
        .unwrap()
        .into_iter()
        .map(|f| f.title)
        .collect();
    assert_eq!(titles, vec!["first", "second"]);
}

async fn delete_cascades(store: &dyn PipelineStore) {
    let run_id = started(store, PipelineKind::Analysis).await;
    store
        .save_execution(ExecutionRecord::running(
            run_id.clone(),
            "market",
            1,
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    store
        .save_findings(&run_id, vec![finding("a", Severity::Info)])
        .await
        .unwrap();

    store.delete_run(&run_id).await.unwrap();

    let err = store.get_run(&run_id).await.unwrap_err();
    assert!(matches!(err, StorageError::RunNotFound { .. }));
    let err = store.get_findings(&run_id).await.unwrap_err();
    assert!(matches!(err, StorageError::RunNotFound { .. }));
}

async fn list_runs_filters_by_kind(store: &dyn PipelineStore) {
    store.create_run(new_run(PipelineKind::Scoring)).await.unwrap();
    store.create_run(new_run(PipelineKind::Category)).await.unwrap();
    store.create_run(new_run(PipelineKind::Category)).await.unwrap();

    let all = store.list_runs(None).await.unwrap();
    assert_eq!(all.len(), 3);
    let category = store.list_runs(Some(PipelineKind::Category)).await.unwrap();
    assert_eq!(category.len(), 2);
    assert!(category.iter().all(|r| r.pipeline == PipelineKind::Category));
}

macro_rules! contract_tests {
    ($($name:ident),+ $(,)?) => {
        mod memory {
            use super::*;
            $(
                #[tokio::test]
                async fn $name() {
                    let store = MemoryPipelineStore::new();
                    super::$name(&store).await;
                }
            )+
        }

        mod surreal {
            use super::*;
            $(
                #[tokio::test]
                async fn $name() {
                    let store = SurrealPipelineStore::in_memory().await.unwrap();
                    super::$name(&store).await;
                }
            )+
        }
    };
}

contract_tests!(
    created_run_is_pending,
    lifecycle_pending_running_completed,
    terminal_runs_are_immutable,
    start_requires_pending,
    pending_run_can_fail,
    unknown_run_is_not_found,
    executions_upsert_and_order,
    finalized_execution_cannot_be_overwritten,
    scores_keep_insertion_order,
    findings_append_and_replace,
    scores_and_findings_interleave,
    delete_cascades,
    list_runs_filters_by_kind,
);
