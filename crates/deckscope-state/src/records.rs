//! Persisted record types for pipeline runs.
//!
//! These are the shapes written through [`crate::PipelineStore`]:
//! - `PipelineRunRecord`: one run of a pipeline against one document
//! - `ExecutionRecord`: the audit trail of one agent invocation inside a run
//! - `ScoreRecord`: a category score produced by an agent (or the mapper)
//! - `FindingRecord`: a single observation with severity and evidence

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::storage_traits::{ContentDigest, RunId};

/// Implements `as_str`, `Display` and `FromStr` for a snake_case unit enum.
macro_rules! string_enum {
    ($ty:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        impl $ty {
            /// Stable snake_case name used on the wire and in storage.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $s),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = StorageError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok($ty::$variant),)+
                    other => Err(StorageError::InvalidValue {
                        field: stringify!($ty).to_string(),
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Pipelines
// ---------------------------------------------------------------------------

/// The three fixed agent batteries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineKind {
    Scoring,
    Analysis,
    Category,
}

string_enum!(PipelineKind {
    Scoring => "scoring",
    Analysis => "analysis",
    Category => "category",
});

/// What the orchestrator does when an agent exhausts its retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log the failure, skip the agent and keep going.
    ContinueOnFailure,
    /// Mark the run failed and stop immediately.
    AbortOnFailure,
}

string_enum!(FailurePolicy {
    ContinueOnFailure => "continue_on_failure",
    AbortOnFailure => "abort_on_failure",
});

impl FailurePolicy {
    /// Policy each pipeline kind has historically run with.
    pub fn default_for(kind: PipelineKind) -> Self {
        match kind {
            PipelineKind::Scoring | PipelineKind::Analysis => FailurePolicy::ContinueOnFailure,
            PipelineKind::Category => FailurePolicy::AbortOnFailure,
        }
    }
}

/// Run lifecycle: `Pending -> Running -> Completed | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

string_enum!(RunStatus {
    Pending => "pending",
    Running => "running",
    Completed => "completed",
    Failed => "failed",
});

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

/// Full run record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRunRecord {
    pub run_id: RunId,
    pub pipeline: PipelineKind,
    pub failure_policy: FailurePolicy,
    /// Agent names in execution order.
    pub agents: Vec<String>,
    /// Digest of the pipeline definition (kind + ordered agent names).
    pub definition_digest: ContentDigest,
    /// Document the run analyzed.
    pub document_id: String,
    pub status: RunStatus,
    pub overall_score: Option<f64>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Fields supplied when a run is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPipelineRun {
    pub pipeline: PipelineKind,
    pub failure_policy: FailurePolicy,
    pub agents: Vec<String>,
    pub definition_digest: ContentDigest,
    pub document_id: String,
}

// ---------------------------------------------------------------------------
// Executions
// ---------------------------------------------------------------------------

/// Agent execution lifecycle: `Pending -> Running -> Completed | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

string_enum!(ExecutionStatus {
    Pending => "pending",
    Running => "running",
    Completed => "completed",
    Failed => "failed",
});

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::Failed)
    }
}

/// One tool interaction recorded during an agent attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntermediateStep {
    pub tool: String,
    pub input: serde_json::Value,
    pub output: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// One failed attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionError {
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Persisted audit trail of one agent invocation inside a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub run_id: RunId,
    pub agent_name: String,
    /// 1-based position of the agent in its pipeline.
    pub execution_order: u32,
    pub status: ExecutionStatus,
    pub retry_count: u32,
    pub error_message: Option<String>,
    pub input: serde_json::Value,
    pub output: Option<serde_json::Value>,
    pub intermediate_steps: Vec<IntermediateStep>,
    pub errors: Vec<ExecutionError>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ExecutionRecord {
    /// A freshly queued execution in `Running` state.
    pub fn running(
        run_id: RunId,
        agent_name: impl Into<String>,
        execution_order: u32,
        input: serde_json::Value,
    ) -> Self {
        Self {
            run_id,
            agent_name: agent_name.into(),
            execution_order,
            status: ExecutionStatus::Running,
            retry_count: 0,
            error_message: None,
            input,
            output: None,
            intermediate_steps: Vec::new(),
            errors: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Scores
// ---------------------------------------------------------------------------

/// Source taxonomy: the dimensions a pitch deck is scored on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeckCategory {
    Problem,
    Solution,
    Market,
    Product,
    Traction,
    BusinessModel,
    Team,
    Competition,
    Financials,
    GoToMarket,
}

string_enum!(DeckCategory {
    Problem => "problem",
    Solution => "solution",
    Market => "market",
    Product => "product",
    Traction => "traction",
    BusinessModel => "business_model",
    Team => "team",
    Competition => "competition",
    Financials => "financials",
    GoToMarket => "go_to_market",
});

impl DeckCategory {
    pub const ALL: [DeckCategory; 10] = [
        DeckCategory::Problem,
        DeckCategory::Solution,
        DeckCategory::Market,
        DeckCategory::Product,
        DeckCategory::Traction,
        DeckCategory::BusinessModel,
        DeckCategory::Team,
        DeckCategory::Competition,
        DeckCategory::Financials,
        DeckCategory::GoToMarket,
    ];
}

/// Target taxonomy: the investor-facing rubric deck scores are remapped onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RubricCategory {
    MarketOpportunity,
    ProductTechnology,
    TeamExecution,
    BusinessTraction,
    FinancialHealth,
    CompetitivePosition,
    ExitPotential,
    ImpactEsg,
}

string_enum!(RubricCategory {
    MarketOpportunity => "market_opportunity",
    ProductTechnology => "product_technology",
    TeamExecution => "team_execution",
    BusinessTraction => "business_traction",
    FinancialHealth => "financial_health",
    CompetitivePosition => "competitive_position",
    ExitPotential => "exit_potential",
    ImpactEsg => "impact_esg",
});

impl RubricCategory {
    pub const ALL: [RubricCategory; 8] = [
        RubricCategory::MarketOpportunity,
        RubricCategory::ProductTechnology,
        RubricCategory::TeamExecution,
        RubricCategory::BusinessTraction,
        RubricCategory::FinancialHealth,
        RubricCategory::CompetitivePosition,
        RubricCategory::ExitPotential,
        RubricCategory::ImpactEsg,
    ];
}

/// Category of a stored score, tagged with its taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "taxonomy", content = "name", rename_all = "snake_case")]
pub enum ScoreCategory {
    Deck(DeckCategory),
    Rubric(RubricCategory),
}

impl ScoreCategory {
    pub fn taxonomy(&self) -> &'static str {
        match self {
            ScoreCategory::Deck(_) => "deck",
            ScoreCategory::Rubric(_) => "rubric",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScoreCategory::Deck(c) => c.as_str(),
            ScoreCategory::Rubric(c) => c.as_str(),
        }
    }

    /// Rebuild from the `(taxonomy, name)` pair used in storage.
    pub fn parse(taxonomy: &str, name: &str) -> Result<Self, StorageError> {
        match taxonomy {
            "deck" => Ok(ScoreCategory::Deck(name.parse()?)),
            "rubric" => Ok(ScoreCategory::Rubric(name.parse()?)),
            other => Err(StorageError::InvalidValue {
                field: "taxonomy".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for ScoreCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.taxonomy(), self.name())
    }
}

/// A category score. `score` is in `[0, 100]`, `weight` in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub category: ScoreCategory,
    pub score: f64,
    pub weight: f64,
    pub justification: String,
    pub source_agent: String,
}

// ---------------------------------------------------------------------------
// Findings
// ---------------------------------------------------------------------------

/// SWOT-style classification of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingType {
    Strength,
    Weakness,
    Opportunity,
    Threat,
}

string_enum!(FindingType {
    Strength => "strength",
    Weakness => "weakness",
    Opportunity => "opportunity",
    Threat => "threat",
});

/// Finding severity, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Major,
    Minor,
    Info,
}

string_enum!(Severity {
    Critical => "critical",
    Major => "major",
    Minor => "minor",
    Info => "info",
});

impl Severity {
    /// `critical = 0 < major = 1 < minor = 2 < info = 3`.
    pub fn rank(self) -> u8 {
        match self {
            Severity::Critical => 0,
            Severity::Major => 1,
            Severity::Minor => 2,
            Severity::Info => 3,
        }
    }
}

/// Supporting quote for a finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub quote: String,
    /// Slide number, page or section reference.
    pub location_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindingRecord {
    #[serde(rename = "type")]
    pub finding_type: FindingType,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub evidence: Option<Evidence>,
    pub source: String,
}
