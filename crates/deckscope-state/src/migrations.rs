//! SurrealDB schema migrations and initialization
//!
//! Sets up the four tables a pipeline run spreads across, with the
//! indexes the store queries by.

use crate::error::StateError;
use crate::Result;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

/// Initialize all deckscope tables in SurrealDB
///
/// Safe to call multiple times (idempotent).
pub async fn init_schema(db: &Surreal<Any>) -> Result<()> {
    info!("Initializing deckscope SurrealDB schema");

    init_pipeline_runs_table(db).await?;
    init_executions_table(db).await?;
    init_scores_table(db).await?;
    init_findings_table(db).await?;

    info!("deckscope schema initialization complete");
    Ok(())
}

async fn apply(db: &Surreal<Any>, table: &str, sql: &str) -> Result<()> {
    db.query(sql)
        .await?
        .check()
        .map_err(|e| StateError::SchemaSetup(format!("{table}: {e}")))?;
    info!("✓ {table} table initialized");
    Ok(())
}

/// Initialize `pipeline_runs`
///
/// ```text
/// TABLE pipeline_runs {
///   run_id:            STRING (unique)
///   pipeline:          STRING (scoring | analysis | category)
///   failure_policy:    STRING
///   agents:            ARRAY<STRING>
///   definition_digest: STRING (indexed)
///   document_id:       STRING (indexed)
///   status:            STRING (pending | running | completed | failed)
///   overall_score:     FLOAT?
///   error_message:     STRING?
///   created_at:        DATETIME (indexed)
///   started_at:        DATETIME?
///   completed_at:      DATETIME?
/// }
/// ```
///
/// Status transitions are enforced by the store, not the schema.
async fn init_pipeline_runs_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing pipeline_runs table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS pipeline_runs SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_run_id ON TABLE pipeline_runs COLUMNS run_id UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_pipeline ON TABLE pipeline_runs COLUMNS pipeline;
        DEFINE INDEX IF NOT EXISTS idx_definition_digest ON TABLE pipeline_runs COLUMNS definition_digest;
        DEFINE INDEX IF NOT EXISTS idx_document_id ON TABLE pipeline_runs COLUMNS document_id;
        DEFINE INDEX IF NOT EXISTS idx_created_at ON TABLE pipeline_runs COLUMNS created_at;
    "#;

    apply(db, "pipeline_runs", sql).await
}

/// Initialize `executions`
///
/// `(run_id, execution_order)` is unique: one audit record per agent slot.
async fn init_executions_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing executions table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS executions SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_run_order ON TABLE executions COLUMNS run_id, execution_order UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_run_id ON TABLE executions COLUMNS run_id;
        DEFINE INDEX IF NOT EXISTS idx_status ON TABLE executions COLUMNS status;
    "#;

    apply(db, "executions", sql).await
}

/// Initialize `scores`
async fn init_scores_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing scores table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS scores SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_run_seq ON TABLE scores COLUMNS run_id, seq UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_run_id ON TABLE scores COLUMNS run_id;
    "#;

    apply(db, "scores", sql).await
}

/// Initialize `findings`
async fn init_findings_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing findings table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS findings SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_run_seq ON TABLE findings COLUMNS run_id, seq UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_run_id ON TABLE findings COLUMNS run_id;
        DEFINE INDEX IF NOT EXISTS idx_severity ON TABLE findings COLUMNS severity;
    "#;

    apply(db, "findings", sql).await
}
