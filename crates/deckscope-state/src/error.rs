//! Error types for deckscope-state

use thiserror::Error;

/// Errors raised while connecting to or preparing a backend.
#[derive(Error, Debug)]
pub enum StateError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Database query error
    #[error("Database query failed: {0}")]
    Query(String),

    /// Serialization error
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Schema setup error
    #[error("Schema setup failed: {0}")]
    SchemaSetup(String),
}

impl From<surrealdb::Error> for StateError {
    fn from(err: surrealdb::Error) -> Self {
        StateError::Query(err.to_string())
    }
}

impl From<serde_json::Error> for StateError {
    fn from(err: serde_json::Error) -> Self {
        StateError::Serialization(err.to_string())
    }
}

/// Errors returned by [`crate::PipelineStore`] operations.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("run not found: {run_id}")]
    RunNotFound { run_id: String },

    #[error("execution {execution_order} not found in run {run_id}")]
    ExecutionNotFound { run_id: String, execution_order: u32 },

    #[error("run {run_id} is {status}, expected {expected}")]
    InvalidRunState {
        run_id: String,
        status: String,
        expected: String,
    },

    #[error("execution {execution_order} of run {run_id} is already {status}")]
    ExecutionFinalized {
        run_id: String,
        execution_order: u32,
        status: String,
    },

    #[error("invalid digest: {digest}")]
    InvalidDigest { digest: String },

    #[error("invalid {field} value: {value}")]
    InvalidValue { field: String, value: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("backend error: {0}")]
    Backend(String),
}
