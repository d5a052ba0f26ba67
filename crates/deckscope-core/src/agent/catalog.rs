//! Built-in agent batteries for the three pipelines.

use deckscope_state::{DeckCategory, FindingType, PipelineKind};
use serde::{Deserialize, Serialize};

use crate::domain::AgentDescriptor;

/// Static description of a prompt-driven agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub descriptor: AgentDescriptor,
    pub pipeline: PipelineKind,
    /// Deck category this agent scores (scoring and category agents).
    #[serde(default)]
    pub category: Option<DeckCategory>,
    /// Weight of the produced score in the overall score.
    #[serde(default)]
    pub weight: f64,
    /// Type assigned to findings the model leaves untyped.
    #[serde(default)]
    pub finding_type: Option<FindingType>,
    /// Retrieval query.
    pub focus: String,
    /// Role description placed at the top of the system prompt.
    pub instructions: String,
}

impl AgentSpec {
    fn scored(
        pipeline: PipelineKind,
        name: &str,
        category: DeckCategory,
        weight: f64,
        focus: &str,
    ) -> Self {
        Self {
            descriptor: AgentDescriptor::new(
                name,
                format!("Scores the {} section of the deck", category),
            ),
            pipeline,
            category: Some(category),
            weight,
            finding_type: None,
            focus: focus.to_string(),
            instructions: format!(
                "You are a venture analyst assessing the {} of a startup pitch deck.",
                category.as_str().replace('_', " ")
            ),
        }
    }

    fn finder(name: &str, finding_type: FindingType, focus: &str, instructions: &str) -> Self {
        Self {
            descriptor: AgentDescriptor::new(name, format!("Lists {name} found in the deck")),
            pipeline: PipelineKind::Analysis,
            category: None,
            weight: 0.0,
            finding_type: Some(finding_type),
            focus: focus.to_string(),
            instructions: instructions.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }
}

/// The default agent battery of `kind`, in execution order.
pub fn agent_specs(kind: PipelineKind) -> Vec<AgentSpec> {
    match kind {
        PipelineKind::Scoring => scoring_agents(),
        PipelineKind::Analysis => analysis_agents(),
        PipelineKind::Category => category_agents(),
    }
}

fn scoring_agents() -> Vec<AgentSpec> {
    use DeckCategory as D;
    let s = |name: &'static str, category: DeckCategory, weight: f64, focus: &'static str| {
        AgentSpec::scored(PipelineKind::Scoring, name, category, weight, focus)
    };
    vec![
        s("problem", D::Problem, 0.10, "problem pain point customer need"),
        s("solution", D::Solution, 0.10, "solution approach value proposition"),
        s("market", D::Market, 0.15, "market size TAM SAM SOM growth"),
        s("product", D::Product, 0.10, "product features technology roadmap"),
        s("traction", D::Traction, 0.15, "traction revenue users growth customers"),
        s("business_model", D::BusinessModel, 0.10, "business model pricing revenue streams"),
        s("team", D::Team, 0.15, "team founders experience advisors"),
        s("competition", D::Competition, 0.05, "competition competitors differentiation moat"),
        s("financials", D::Financials, 0.05, "financials projections burn runway funding ask"),
        s("go_to_market", D::GoToMarket, 0.05, "go to market sales channels distribution"),
    ]
}

fn analysis_agents() -> Vec<AgentSpec> {
    use FindingType as F;
    vec![
        AgentSpec::finder(
            "strengths",
            F::Strength,
            "advantages traction team strengths",
            "You identify the strongest points of a startup pitch deck.",
        ),
        AgentSpec::finder(
            "weaknesses",
            F::Weakness,
            "risks gaps missing weaknesses",
            "You identify weaknesses and gaps in a startup pitch deck.",
        ),
        AgentSpec::finder(
            "opportunities",
            F::Opportunity,
            "market expansion opportunities partnerships",
            "You identify growth opportunities a startup could pursue.",
        ),
        AgentSpec::finder(
            "threats",
            F::Threat,
            "competition regulation threats dependencies",
            "You identify external threats to a startup's plan.",
        ),
        AgentSpec::finder(
            "red_flags",
            F::Threat,
            "inconsistencies unrealistic claims valuation",
            "You look for red flags an investor would raise about a pitch deck.",
        ),
    ]
}

fn category_agents() -> Vec<AgentSpec> {
    use DeckCategory as D;
    let s = |name: &'static str, category: DeckCategory, weight: f64, focus: &'static str| {
        AgentSpec::scored(PipelineKind::Category, name, category, weight, focus)
    };
    vec![
        s("market", D::Market, 0.20, "market size TAM SAM SOM growth"),
        s("product", D::Product, 0.20, "product features technology roadmap"),
        s("team", D::Team, 0.20, "team founders experience advisors"),
        s("traction", D::Traction, 0.15, "traction revenue users growth customers"),
        s("business_model", D::BusinessModel, 0.10, "business model pricing revenue streams"),
        s("financials", D::Financials, 0.15, "financials projections burn runway funding ask"),
    ]
}
