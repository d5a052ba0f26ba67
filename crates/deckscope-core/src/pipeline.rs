//! Pipeline definitions: an ordered, named battery of agents.

use std::collections::HashSet;
use std::sync::Arc;

use deckscope_state::{ContentDigest, FailurePolicy, PipelineKind};

use crate::agent::{agent_specs, Agent, ModelClient, PromptAgent, Retriever};
use crate::config::DeckscopeConfig;
use crate::domain::OrchestratorError;

/// The unit the orchestrator runs. Agent orders are their 1-based positions.
#[derive(Clone)]
pub struct PipelineDefinition {
    kind: PipelineKind,
    failure_policy: FailurePolicy,
    agents: Vec<Arc<dyn Agent>>,
}

impl std::fmt::Debug for PipelineDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineDefinition")
            .field("kind", &self.kind)
            .field("failure_policy", &self.failure_policy)
            .field("agents", &self.agent_names())
            .finish()
    }
}

impl PipelineDefinition {
    /// Definition with the kind's default failure policy.
    ///
    /// Fails on an empty agent list or duplicate agent names.
    pub fn new(kind: PipelineKind, agents: Vec<Arc<dyn Agent>>) -> Result<Self, OrchestratorError> {
        if agents.is_empty() {
            return Err(OrchestratorError::InvalidDefinition(format!(
                "{kind} pipeline has no agents"
            )));
        }
        let mut seen = HashSet::new();
        for agent in &agents {
            let name = &agent.descriptor().name;
            if !seen.insert(name.clone()) {
                return Err(OrchestratorError::InvalidDefinition(format!(
                    "duplicate agent name {name} in {kind} pipeline"
                )));
            }
        }
        Ok(Self {
            kind,
            failure_policy: FailurePolicy::default_for(kind),
            agents,
        })
    }

    /// The built-in battery for `kind`, wired to the given collaborators and
    /// with per-agent and per-pipeline overrides from `config` applied.
    pub fn standard(
        kind: PipelineKind,
        retriever: Arc<dyn Retriever>,
        model: Arc<dyn ModelClient>,
        config: &DeckscopeConfig,
    ) -> Result<Self, OrchestratorError> {
        let agents: Vec<Arc<dyn Agent>> = agent_specs(kind)
            .into_iter()
            .map(|mut spec| {
                config.apply_agent_overrides(&mut spec.descriptor);
                Arc::new(PromptAgent::new(spec, retriever.clone(), model.clone())) as Arc<dyn Agent>
            })
            .collect();
        Ok(Self::new(kind, agents)?.with_failure_policy(config.failure_policy(kind)))
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn kind(&self) -> PipelineKind {
        self.kind
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    pub fn agents(&self) -> &[Arc<dyn Agent>] {
        &self.agents
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn agent_names(&self) -> Vec<String> {
        self.agents
            .iter()
            .map(|a| a.descriptor().name.clone())
            .collect()
    }

    /// `(order, agent)` pairs with 1-based orders.
    pub fn ordered(&self) -> impl Iterator<Item = (u32, &Arc<dyn Agent>)> {
        (1u32..).zip(self.agents.iter())
    }

    /// SHA-256 over the kind and the ordered agent names.
    pub fn digest(&self) -> ContentDigest {
        let mut canonical = String::from(self.kind.as_str());
        for name in self.agent_names() {
            canonical.push('\n');
            canonical.push_str(&name);
        }
        ContentDigest::from_bytes(canonical.as_bytes())
    }
}
