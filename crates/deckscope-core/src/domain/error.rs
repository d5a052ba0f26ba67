//! Domain-level error taxonomy for deckscope.

use deckscope_state::StorageError;

/// Why a single agent attempt failed.
///
/// Every variant is recoverable at the attempt level: the execution
/// lifecycle retries it with backoff until the agent's retries run out.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AgentError {
    #[error("retrieval failed: {0}")]
    Retrieval(String),

    #[error("model call failed: {0}")]
    ModelCall(String),

    #[error("could not parse model output: {0}")]
    Parse(String),

    #[error("timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

impl AgentError {
    /// Short stable label, used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::Retrieval(_) => "retrieval_failure",
            AgentError::ModelCall(_) => "model_call_failure",
            AgentError::Parse(_) => "parse_failure",
            AgentError::Timeout { .. } => "timeout",
        }
    }
}

/// Pipeline-level failures returned by the stage orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("run {run_id} aborted: agent {agent} failed: {message}")]
    StageAborted {
        run_id: String,
        agent: String,
        message: String,
    },

    #[error("run {run_id} aggregation failed: {message}")]
    AggregationFailed { run_id: String, message: String },

    #[error("invalid pipeline definition: {0}")]
    InvalidDefinition(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// deckscope domain errors.
#[derive(Debug, thiserror::Error)]
pub enum DeckscopeError {
    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for deckscope domain operations.
pub type Result<T> = std::result::Result<T, DeckscopeError>;
