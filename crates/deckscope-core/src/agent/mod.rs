//! Agents and the collaborators they call.
//!
//! An [`Agent`] is one single-purpose analysis unit. The orchestrator never
//! calls [`Agent::analyze`] directly: every invocation goes through the
//! [`ExecutionLifecycle`](crate::lifecycle::ExecutionLifecycle), which owns
//! timeout, retry and state tracking.

pub mod catalog;
pub mod collaborators;
pub mod parse;
pub mod prompt_agent;
pub mod retrieval;
pub mod scripted;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::domain::{AgentDescriptor, AgentError, AgentPayload, AnalysisContext};
use crate::lifecycle::StepTrace;

pub use catalog::{agent_specs, AgentSpec};
pub use collaborators::{ModelClient, ModelRequest, RetrievalResponse, RetrievedChunk, Retriever};
pub use prompt_agent::PromptAgent;
pub use retrieval::TextRetriever;
pub use scripted::ScriptedModelClient;

/// A single analysis unit.
#[async_trait]
pub trait Agent: Send + Sync {
    fn descriptor(&self) -> &AgentDescriptor;

    /// One analysis attempt. `trace` collects the attempt's tool steps.
    async fn analyze(
        &self,
        ctx: &AnalysisContext,
        trace: StepTrace,
    ) -> Result<AgentPayload, AgentError>;
}

type AnalyzeFn = dyn Fn(AnalysisContext, StepTrace) -> BoxFuture<'static, Result<AgentPayload, AgentError>>
    + Send
    + Sync;

/// Agent backed by a closure. Handy for tests and one-off pipelines.
pub struct FnAgent {
    descriptor: AgentDescriptor,
    analyze: Box<AnalyzeFn>,
}

impl FnAgent {
    pub fn new<F>(descriptor: AgentDescriptor, analyze: F) -> Self
    where
        F: Fn(AnalysisContext, StepTrace) -> BoxFuture<'static, Result<AgentPayload, AgentError>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            descriptor,
            analyze: Box::new(analyze),
        }
    }
}

impl std::fmt::Debug for FnAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnAgent")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Agent for FnAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn analyze(
        &self,
        ctx: &AnalysisContext,
        trace: StepTrace,
    ) -> Result<AgentPayload, AgentError> {
        (self.analyze)(ctx.clone(), trace).await
    }
}
