//! Static agent descriptors.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Immutable description of an agent, created once at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    /// Unique name within a pipeline (also the `source` on its records).
    pub name: String,

    pub description: String,

    /// Wall-clock limit for a single attempt (milliseconds).
    pub timeout_ms: u64,

    /// Retries after the first attempt (0 = run once).
    pub max_retries: u32,

    /// Sampling temperature forwarded to the model collaborator.
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl AgentDescriptor {
    pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;
    pub const DEFAULT_MAX_RETRIES: u32 = 2;

    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            timeout_ms: Self::DEFAULT_TIMEOUT_MS,
            max_retries: Self::DEFAULT_MAX_RETRIES,
            temperature: None,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Total attempts the lifecycle will make (`max_retries + 1`).
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}
