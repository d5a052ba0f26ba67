//! Runtime configuration.
//!
//! ```toml
//! [retry]
//! base_delay_ms = 1000
//! max_delay_ms = 10000
//!
//! [pipelines.category]
//! failure_policy = "continue_on_failure"
//!
//! [agents.team]
//! timeout_ms = 30000
//! max_retries = 1
//! temperature = 0.2
//!
//! [category_mapping]
//! team = [{ target = "team_execution", percentage = 1.0 }]
//! ```
//!
//! Every section is optional; missing values fall back to built-in defaults.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use deckscope_state::{DeckCategory, FailurePolicy, PipelineKind};
use serde::{Deserialize, Serialize};

use crate::category_map::{CategoryMapper, MappingTarget};
use crate::domain::{AgentDescriptor, ConfigError};
use crate::lifecycle::RetryPolicy;

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "DECKSCOPE_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeckscopeConfig {
    pub retry: RetryPolicy,
    /// Keyed by pipeline kind (`scoring`, `analysis`, `category`).
    pub pipelines: HashMap<String, PipelineOverrides>,
    pub agents: HashMap<String, AgentOverrides>,
    /// Replaces the built-in deck -> rubric table when present.
    pub category_mapping: Option<BTreeMap<String, Vec<MappingTarget>>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineOverrides {
    pub failure_policy: Option<FailurePolicy>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentOverrides {
    pub timeout_ms: Option<u64>,
    pub max_retries: Option<u32>,
    pub temperature: Option<f32>,
}

impl DeckscopeConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Load `path` if given, else the file named by `DECKSCOPE_CONFIG`, else
    /// defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match std::env::var(CONFIG_ENV) {
            Ok(env_path) if !env_path.trim().is_empty() => Self::load(env_path.trim()),
            _ => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::Invalid(format!(
                "retry.base_delay_ms ({}) exceeds retry.max_delay_ms ({})",
                self.retry.base_delay_ms, self.retry.max_delay_ms
            )));
        }
        for kind in self.pipelines.keys() {
            kind.parse::<PipelineKind>().map_err(|_| {
                ConfigError::Invalid(format!("unknown pipeline '{kind}' in [pipelines]"))
            })?;
        }
        for (name, agent) in &self.agents {
            if agent.timeout_ms == Some(0) {
                return Err(ConfigError::Invalid(format!(
                    "agents.{name}.timeout_ms must be positive"
                )));
            }
        }
        self.category_mapper().map(|_| ())
    }

    /// Failure policy for `kind`: the configured override or the kind's default.
    pub fn failure_policy(&self, kind: PipelineKind) -> FailurePolicy {
        self.pipelines
            .get(kind.as_str())
            .and_then(|p| p.failure_policy)
            .unwrap_or_else(|| FailurePolicy::default_for(kind))
    }

    /// Apply `[agents.<name>]` overrides to a descriptor.
    pub fn apply_agent_overrides(&self, descriptor: &mut AgentDescriptor) {
        let Some(overrides) = self.agents.get(&descriptor.name) else {
            return;
        };
        if let Some(timeout_ms) = overrides.timeout_ms {
            descriptor.timeout_ms = timeout_ms;
        }
        if let Some(max_retries) = overrides.max_retries {
            descriptor.max_retries = max_retries;
        }
        if let Some(temperature) = overrides.temperature {
            descriptor.temperature = Some(temperature);
        }
    }

    /// The configured mapping table, or the built-in one.
    pub fn category_mapper(&self) -> Result<CategoryMapper, ConfigError> {
        let Some(raw) = &self.category_mapping else {
            return Ok(CategoryMapper::default());
        };
        let mut table = BTreeMap::new();
        for (source, targets) in raw {
            let category: DeckCategory = source.parse().map_err(|_| {
                ConfigError::Invalid(format!("unknown deck category '{source}' in category_mapping"))
            })?;
            table.insert(category, targets.clone());
        }
        CategoryMapper::new(table)
    }
}
