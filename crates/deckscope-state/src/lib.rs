//! deckscope-state: persistence layer for deckscope pipeline runs
//!
//! Everything the orchestrator persists goes through the [`PipelineStore`]
//! trait: run records, per-agent execution records, score records and
//! finding records.
//!
//! ## Key Components
//!
//! - `PipelineStore`: async, backend-agnostic storage boundary
//! - `MemoryPipelineStore`: in-memory fake for tests
//! - `SurrealPipelineStore`: SurrealDB backend (`mem://`, `surrealkv://`, remote)
//! - `records`: the persisted data model

mod error;
pub mod fakes;
mod migrations;
pub mod records;
mod schema;
pub mod storage_traits;
pub mod surreal_store;

pub use error::{StateError, StorageError};
pub use records::{
    DeckCategory, Evidence, ExecutionError, ExecutionRecord, ExecutionStatus, FailurePolicy,
    FindingRecord, FindingType, IntermediateStep, NewPipelineRun, PipelineKind,
    PipelineRunRecord, RubricCategory, RunStatus, ScoreCategory, ScoreRecord, Severity,
};
pub use storage_traits::{ContentDigest, PipelineStore, RunId, StorageResult};
pub use surreal_store::SurrealPipelineStore;

/// Result type for deckscope-state setup operations
pub type Result<T> = std::result::Result<T, StateError>;
