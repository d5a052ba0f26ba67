//! Domain models for deckscope.
//!
//! Canonical definitions for the core entities:
//! - `AgentDescriptor`: static description of an agent (timeout, retries)
//! - `AnalysisContext`: the shared input every agent of a run receives
//! - `AgentPayload`: the typed result an agent hands back
//! - `ExecutionState` / `AgentResult`: per-invocation audit state and outcome

pub mod agent;
pub mod context;
pub mod error;
pub mod execution;
pub mod payload;

pub use agent::AgentDescriptor;
pub use context::AnalysisContext;
pub use error::{AgentError, ConfigError, DeckscopeError, OrchestratorError, Result};
pub use execution::{AgentResult, ExecutionMetadata, ExecutionState};
pub use payload::{AgentPayload, CategoryResult, CategoryScore, FindingsResult, ScoreResult};
