//! Typed agent payloads.
//!
//! Each pipeline kind has its own result shape; the orchestrator matches on
//! [`AgentPayload`] to decide which records to persist.

use deckscope_state::{DeckCategory, FindingRecord, ScoreCategory, ScoreRecord};
use serde::{Deserialize, Serialize};

use crate::calculator::{clamp, clamp_weight};

/// A score for one deck category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub category: DeckCategory,
    pub score: f64,
    pub weight: f64,
    pub justification: String,
}

impl CategoryScore {
    /// Storage form, with score clamped to `[0, 100]` and weight to `[0, 1]`.
    pub fn to_record(&self, source_agent: &str) -> ScoreRecord {
        ScoreRecord {
            category: ScoreCategory::Deck(self.category),
            score: clamp(self.score, 0.0, 100.0),
            weight: clamp_weight(self.weight),
            justification: self.justification.clone(),
            source_agent: source_agent.to_string(),
        }
    }
}

/// Result of a scoring agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub score: CategoryScore,
    #[serde(default)]
    pub findings: Vec<FindingRecord>,
}

/// Result of an analysis agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindingsResult {
    pub summary: String,
    pub findings: Vec<FindingRecord>,
    #[serde(default)]
    pub score: Option<CategoryScore>,
}

/// Result of a category agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryResult {
    pub score: CategoryScore,
    #[serde(default)]
    pub highlights: Vec<String>,
}

/// What an agent hands back to the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentPayload {
    Score(ScoreResult),
    Findings(FindingsResult),
    Category(CategoryResult),
}

impl AgentPayload {
    /// Score records this payload contributes, already clamped.
    pub fn score_records(&self, source_agent: &str) -> Vec<ScoreRecord> {
        match self {
            AgentPayload::Score(r) => vec![r.score.to_record(source_agent)],
            AgentPayload::Findings(r) => r
                .score
                .iter()
                .map(|s| s.to_record(source_agent))
                .collect(),
            AgentPayload::Category(r) => vec![r.score.to_record(source_agent)],
        }
    }

    /// Findings this payload contributes.
    pub fn findings(&self) -> &[FindingRecord] {
        match self {
            AgentPayload::Score(r) => &r.findings,
            AgentPayload::Findings(r) => &r.findings,
            AgentPayload::Category(_) => &[],
        }
    }
}
