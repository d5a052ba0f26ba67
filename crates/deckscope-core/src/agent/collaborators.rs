//! External collaborators consumed by agents.
//!
//! Both are opaque services: a document retriever scoped to one uploaded
//! deck, and a language model that turns prompts into text.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::AgentError;

/// One retrieved passage with its relevance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub content: String,
    pub score: f64,
}

/// Retriever reply. `success: false` fails the attempt that issued it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResponse {
    pub success: bool,
    #[serde(default)]
    pub results: Vec<RetrievedChunk>,
    #[serde(default)]
    pub error: Option<String>,
}

impl RetrievalResponse {
    pub fn ok(results: Vec<RetrievedChunk>) -> Self {
        Self {
            success: true,
            results,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            results: Vec::new(),
            error: Some(error.into()),
        }
    }

    pub fn into_result(self) -> Result<Vec<RetrievedChunk>, AgentError> {
        if self.success {
            Ok(self.results)
        } else {
            Err(AgentError::Retrieval(
                self.error
                    .unwrap_or_else(|| "retriever reported failure".to_string()),
            ))
        }
    }
}

#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str, document_id: &str) -> RetrievalResponse;
}

/// Everything the model collaborator needs for one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRequest {
    /// Calling agent, for routing and logging.
    pub agent: String,
    pub system_prompt: String,
    pub user_prompt: String,
    #[serde(default)]
    pub temperature: Option<f32>,
}

#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Returns the raw model text. Errors should be [`AgentError::ModelCall`].
    async fn call_model(&self, request: &ModelRequest) -> Result<String, AgentError>;
}
