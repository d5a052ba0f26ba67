//! deckscope core library
//!
//! Orchestration and resilience around LLM-backed pitch-deck analysis agents.
//!
//! ## Key Components
//!
//! - `lifecycle`: timeout, retry with capped backoff, per-invocation state
//! - `orchestrator`: sequential stage runner with failure policies
//! - `calculator`, `dedup`, `category_map`: pure aggregation helpers
//! - `agent`: the agent trait, prompt agent and collaborator traits
//! - `recording`: bridges lifecycle results into a `PipelineStore`

pub mod agent;
pub mod calculator;
pub mod category_map;
pub mod config;
pub mod dedup;
pub mod domain;
pub mod lifecycle;
pub mod metrics;
pub mod obs;
pub mod orchestrator;
pub mod pipeline;
pub mod progress;
pub mod recording;
pub mod telemetry;

pub use agent::{
    Agent, AgentSpec, FnAgent, ModelClient, ModelRequest, PromptAgent, RetrievalResponse,
    RetrievedChunk, Retriever, ScriptedModelClient, TextRetriever,
};
pub use calculator::{
    clamp, clamp_score, clamp_weight, percentile_rank, weighted_overall, Weighted,
};
pub use category_map::{CategoryMapper, MappedScore, MappingTarget, MAPPER_SOURCE};
pub use config::DeckscopeConfig;
pub use dedup::FindingKey;
pub use domain::{
    AgentDescriptor, AgentError, AgentPayload, AgentResult, AnalysisContext, CategoryResult,
    CategoryScore, ConfigError, DeckscopeError, ExecutionMetadata, ExecutionState,
    FindingsResult, OrchestratorError, Result, ScoreResult,
};
pub use lifecycle::{AgentHooks, ExecutionLifecycle, NoopHooks, RetryPolicy, StepTrace};
pub use metrics::{Metrics, MetricsSnapshot};
pub use orchestrator::StageOrchestrator;
pub use pipeline::PipelineDefinition;
pub use progress::{BroadcastProgress, NoopProgress, ProgressEvent, ProgressSink};
pub use recording::RunRecorder;

pub use deckscope_state::{
    DeckCategory, Evidence, FailurePolicy, FindingRecord, FindingType, PipelineKind,
    PipelineRunRecord, PipelineStore, RubricCategory, RunId, RunStatus, ScoreCategory,
    ScoreRecord, Severity,
};
