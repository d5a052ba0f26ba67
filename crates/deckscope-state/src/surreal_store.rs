//! SurrealDB-backed PipelineStore implementation
//!
//! Uses the row types in `schema` for persistence, converting to/from
//! `records` types at the boundary.

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

use crate::error::{StateError, StorageError};
use crate::migrations;
use crate::records::{
    ExecutionRecord, FindingRecord, NewPipelineRun, PipelineKind, PipelineRunRecord, RunStatus,
    ScoreRecord,
};
use crate::schema::{expect_status, ExecutionRow, FindingRow, PipelineRunRow, ScoreRow};
use crate::storage_traits::{PipelineStore, RunId, StorageResult};

const NAMESPACE: &str = "deckscope";
const DATABASE: &str = "main";

const SCORE_SEQ: &str = "SELECT seq FROM scores WHERE run_id = $rid";
const FINDING_SEQ: &str = "SELECT seq FROM findings WHERE run_id = $rid";

fn backend(e: surrealdb::Error) -> StorageError {
    StorageError::Backend(e.to_string())
}

/// SurrealDB-backed implementation of [`PipelineStore`].
pub struct SurrealPipelineStore {
    db: Surreal<Any>,
}

impl SurrealPipelineStore {
    /// Create an in-memory instance for testing.
    ///
    /// Connects to `mem://`, selects `deckscope/main`, and runs `init_schema`.
    pub async fn in_memory() -> crate::Result<Self> {
        Self::connect("mem://").await
    }

    /// Connect to any SurrealDB endpoint (`mem://`, `surrealkv://path`,
    /// `ws://host:port`, ...).
    pub async fn connect(url: &str) -> crate::Result<Self> {
        if let Some(path) = url.strip_prefix("surrealkv://") {
            std::fs::create_dir_all(path).map_err(|e| {
                StateError::Connection(format!(
                    "Failed to create database directory {}: {}",
                    path, e
                ))
            })?;
        }

        let db = surrealdb::engine::any::connect(url)
            .await
            .map_err(|e| StateError::Connection(format!("Failed to connect to {}: {}", url, e)))?;

        db.use_ns(NAMESPACE)
            .use_db(DATABASE)
            .await
            .map_err(|e| StateError::Connection(e.to_string()))?;

        migrations::init_schema(&db).await?;
        info!("SurrealPipelineStore connected ({})", url);
        Ok(Self { db })
    }

    /// Connect using `DECKSCOPE_DB_URL`, falling back to local persistence
    /// in `.deckscope/db`.
    pub async fn from_env() -> crate::Result<Self> {
        let url = std::env::var("DECKSCOPE_DB_URL")
            .unwrap_or_else(|_| "surrealkv://.deckscope/db".to_string());
        Self::connect(&url).await
    }

    // -- private helpers -----------------------------------------------------

    async fn select_where<T: DeserializeOwned>(
        &self,
        sql: &'static str,
        rid: &RunId,
    ) -> StorageResult<Vec<T>> {
        let mut res = self
            .db
            .query(sql)
            .bind(("rid", rid.0.clone()))
            .await
            .map_err(backend)?;
        res.take(0).map_err(backend)
    }

    async fn fetch_run(&self, rid: &RunId) -> StorageResult<PipelineRunRow> {
        let rows: Vec<PipelineRunRow> = self
            .select_where("SELECT * OMIT id FROM pipeline_runs WHERE run_id = $rid", rid)
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StorageError::RunNotFound {
                run_id: rid.0.clone(),
            })
    }

    async fn fetch_running(&self, rid: &RunId) -> StorageResult<PipelineRunRow> {
        let row = self.fetch_run(rid).await?;
        expect_status(&rid.0, &row.status, &[RunStatus::Running.as_str()])?;
        Ok(row)
    }

    async fn write_run(&self, row: PipelineRunRow) -> StorageResult<()> {
        let rid = row.run_id.clone();
        self.db
            .query("UPDATE pipeline_runs CONTENT $row WHERE run_id = $rid")
            .bind(("row", row))
            .bind(("rid", rid))
            .await
            .map_err(backend)?
            .check()
            .map_err(backend)?;
        Ok(())
    }

    async fn next_seq(&self, sql: &'static str, rid: &RunId) -> StorageResult<u64> {
        #[derive(serde::Deserialize)]
        struct Seq {
            seq: u64,
        }
        let rows: Vec<Seq> = self.select_where(sql, rid).await?;
        Ok(rows.iter().map(|r| r.seq + 1).max().unwrap_or(0))
    }

    async fn insert_findings(
        &self,
        rid: &RunId,
        findings: Vec<FindingRecord>,
    ) -> StorageResult<()> {
        let start = self.next_seq(FINDING_SEQ, rid).await?;
        for (offset, finding) in findings.iter().enumerate() {
            let row = FindingRow::new(rid, start + offset as u64, finding);
            let _created: Option<FindingRow> = self
                .db
                .create("findings")
                .content(row)
                .await
                .map_err(backend)?;
        }
        Ok(())
    }
}

#[async_trait]
impl PipelineStore for SurrealPipelineStore {
    async fn create_run(&self, run: NewPipelineRun) -> StorageResult<PipelineRunRecord> {
        let record = PipelineRunRecord {
            run_id: RunId::new(),
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

        debug!(run_id = %record.run_id, pipeline = %record.pipeline, "creating run");

        let _created: Option<PipelineRunRow> = self
            .db
            .create("pipeline_runs")
            .content(PipelineRunRow::from(&record))
            .await
            .map_err(backend)?;

        Ok(record)
    }

    async fn start_run(&self, run_id: &RunId) -> StorageResult<()> {
        let mut row = self.fetch_run(run_id).await?;
        expect_status(&run_id.0, &row.status, &[RunStatus::Pending.as_str()])?;
        row.status = RunStatus::Running.to_string();
        row.started_at = Some(Utc::now());
        self.write_run(row).await
    }

    async fn complete_run(&self, run_id: &RunId, overall_score: f64) -> StorageResult<()> {
        let mut row = self.fetch_running(run_id).await?;
        row.status = RunStatus::Completed.to_string();
        row.overall_score = Some(overall_score);
        row.completed_at = Some(Utc::now());
        self.write_run(row).await
    }

    async fn fail_run(&self, run_id: &RunId, error_message: &str) -> StorageResult<()> {
        let mut row = self.fetch_run(run_id).await?;
        expect_status(
            &run_id.0,
            &row.status,
            &[RunStatus::Pending.as_str(), RunStatus::Running.as_str()],
        )?;
        row.status = RunStatus::Failed.to_string();
        row.error_message = Some(error_message.to_string());
        row.completed_at = Some(Utc::now());
        self.write_run(row).await
    }

    async fn get_run(&self, run_id: &RunId) -> StorageResult<PipelineRunRecord> {
        self.fetch_run(run_id).await?.into_record()
    }

    async fn list_runs(
        &self,
        pipeline: Option<PipelineKind>,
    ) -> StorageResult<Vec<PipelineRunRecord>> {
        let rows: Vec<PipelineRunRow> = if let Some(kind) = pipeline {
            let mut res = self
                .db
                .query(
                    "SELECT * OMIT id FROM pipeline_runs WHERE pipeline = $kind ORDER BY created_at DESC",
                )
                .bind(("kind", kind.to_string()))
                .await
                .map_err(backend)?;
            res.take(0).map_err(backend)?
        } else {
            let mut res = self
                .db
                .query("SELECT * OMIT id FROM pipeline_runs ORDER BY created_at DESC")
                .await
                .map_err(backend)?;
            res.take(0).map_err(backend)?
        };

        rows.into_iter().map(PipelineRunRow::into_record).collect()
    }

    async fn delete_run(&self, run_id: &RunId) -> StorageResult<()> {
        self.fetch_run(run_id).await?;

        self.db
            .query(
                "DELETE executions WHERE run_id = $rid; \
                 DELETE scores WHERE run_id = $rid; \
                 DELETE findings WHERE run_id = $rid; \
                 DELETE pipeline_runs WHERE run_id = $rid;",
            )
            .bind(("rid", run_id.0.clone()))
            .await
            .map_err(backend)?
            .check()
            .map_err(backend)?;
        Ok(())
    }

    async fn save_execution(&self, record: ExecutionRecord) -> StorageResult<()> {
        self.fetch_running(&record.run_id).await?;

        let order = record.execution_order;
        let mut res = self
            .db
            .query("SELECT * OMIT id FROM executions WHERE run_id = $rid AND execution_order = $ord")
            .bind(("rid", record.run_id.0.clone()))
            .bind(("ord", order))
            .await
            .map_err(backend)?;
        let existing: Vec<ExecutionRow> = res.take(0).map_err(backend)?;

        let row = ExecutionRow::from_record(&record)?;
        match existing.into_iter().next() {
            Some(current) => {
                let status: crate::records::ExecutionStatus = current.status.parse()?;
                if status.is_terminal() {
                    return Err(StorageError::ExecutionFinalized {
                        run_id: record.run_id.0.clone(),
                        execution_order: order,
                        status: current.status,
                    });
                }
                self.db
                    .query(
                        "UPDATE executions CONTENT $row WHERE run_id = $rid AND execution_order = $ord",
                    )
                    .bind(("row", row))
                    .bind(("rid", record.run_id.0.clone()))
                    .bind(("ord", order))
                    .await
                    .map_err(backend)?
                    .check()
                    .map_err(backend)?;
            }
            None => {
                let _created: Option<ExecutionRow> = self
                    .db
                    .create("executions")
                    .content(row)
                    .await
                    .map_err(backend)?;
            }
        }
        Ok(())
    }

    async fn get_executions(&self, run_id: &RunId) -> StorageResult<Vec<ExecutionRecord>> {
        self.fetch_run(run_id).await?;
        let rows: Vec<ExecutionRow> = self
            .select_where(
                "SELECT * OMIT id FROM executions WHERE run_id = $rid ORDER BY execution_order ASC",
                run_id,
            )
            .await?;
        rows.into_iter().map(ExecutionRow::into_record).collect()
    }

    async fn save_score(&self, run_id: &RunId, score: ScoreRecord) -> StorageResult<()> {
        self.fetch_running(run_id).await?;
        let seq = self.next_seq(SCORE_SEQ, run_id).await?;
        let _created: Option<ScoreRow> = self
            .db
            .create("scores")
            .content(ScoreRow::new(run_id, seq, &score))
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn get_scores(&self, run_id: &RunId) -> StorageResult<Vec<ScoreRecord>> {
        self.fetch_run(run_id).await?;
        let rows: Vec<ScoreRow> = self
            .select_where(
                "SELECT * OMIT id FROM scores WHERE run_id = $rid ORDER BY seq ASC",
                run_id,
            )
            .await?;
        rows.into_iter().map(ScoreRow::into_record).collect()
    }

    async fn save_findings(
        &self,
        run_id: &RunId,
        findings: Vec<FindingRecord>,
    ) -> StorageResult<()> {
        self.fetch_running(run_id).await?;
        self.insert_findings(run_id, findings).await
    }

    async fn replace_findings(
        &self,
        run_id: &RunId,
        findings: Vec<FindingRecord>,
    ) -> StorageResult<()> {
        self.fetch_running(run_id).await?;
        self.db
            .query("DELETE findings WHERE run_id = $rid")
            .bind(("rid", run_id.0.clone()))
            .await
            .map_err(backend)?
            .check()
            .map_err(backend)?;
        self.insert_findings(run_id, findings).await
    }

    async fn get_findings(&self, run_id: &RunId) -> StorageResult<Vec<FindingRecord>> {
        self.fetch_run(run_id).await?;
        let rows: Vec<FindingRow> = self
            .select_where(
                "SELECT * OMIT id FROM findings WHERE run_id = $rid ORDER BY seq ASC",
                run_id,
            )
            .await?;
        rows.into_iter().map(FindingRow::into_record).collect()
    }
}
