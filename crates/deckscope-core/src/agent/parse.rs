//! Extraction and validation of JSON payloads from model text.
//!
//! Models are asked for a single JSON object, usually fenced. Anything that
//! cannot be turned into a valid [`AgentPayload`] is an
//! [`AgentError::Parse`], which fails the attempt and triggers a retry.

use deckscope_state::{Evidence, FindingRecord, FindingType, PipelineKind, Severity};
use serde::Deserialize;

use super::catalog::AgentSpec;
use crate::calculator::{clamp_score, clamp_weight};
use crate::domain::{
    AgentError, AgentPayload, CategoryResult, CategoryScore, FindingsResult, ScoreResult,
};

/// Locate the JSON object in `text`: a ```json fence, any fence whose body
/// starts with `{`, or the outermost braces.
pub fn extract_json(text: &str) -> Option<&str> {
    if let Some(start) = text.find("```json") {
        let after_fence = &text[start + 7..];
        if let Some(end) = after_fence.find("```") {
            return Some(after_fence[..end].trim());
        }
    }
    if let Some(start) = text.find("```") {
        let after_fence = &text[start + 3..];
        let body = match after_fence.find('\n') {
            Some(nl) => &after_fence[nl + 1..],
            None => after_fence,
        };
        if let Some(end) = body.find("```") {
            let content = body[..end].trim();
            if content.starts_with('{') {
                return Some(content);
            }
        }
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

#[derive(Debug, Deserialize)]
struct RawEvidence {
    quote: String,
    #[serde(default, alias = "locationRef")]
    location_ref: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawFinding {
    #[serde(default, rename = "type")]
    finding_type: Option<String>,
    title: String,
    #[serde(default)]
    description: String,
    severity: String,
    #[serde(default)]
    recommendations: Vec<String>,
    #[serde(default)]
    evidence: Option<RawEvidence>,
}

#[derive(Debug, Deserialize)]
struct RawScore {
    score: f64,
    #[serde(default)]
    justification: String,
    #[serde(default)]
    findings: Vec<RawFinding>,
}

#[derive(Debug, Deserialize)]
struct RawCategory {
    score: f64,
    #[serde(default)]
    justification: String,
    #[serde(default)]
    highlights: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawFindings {
    #[serde(default)]
    summary: String,
    findings: Vec<RawFinding>,
}

/// Turn raw model text into the payload `spec`'s pipeline expects.
///
/// Scores are clamped to `[0, 100]` and the agent's weight to `[0, 1]`.
/// Unknown finding types or severities and empty titles are rejected.
pub fn parse_payload(spec: &AgentSpec, text: &str) -> Result<AgentPayload, AgentError> {
    let json = extract_json(text)
        .ok_or_else(|| AgentError::Parse("no JSON object in model output".to_string()))?;

    match spec.pipeline {
        PipelineKind::Scoring => {
            let raw: RawScore = from_json(json)?;
            Ok(AgentPayload::Score(ScoreResult {
                score: category_score(spec, raw.score, raw.justification)?,
                findings: findings(spec, raw.findings)?,
            }))
        }
        PipelineKind::Category => {
            let raw: RawCategory = from_json(json)?;
            Ok(AgentPayload::Category(CategoryResult {
                score: category_score(spec, raw.score, raw.justification)?,
                highlights: raw.highlights,
            }))
        }
        PipelineKind::Analysis => {
            let raw: RawFindings = from_json(json)?;
            Ok(AgentPayload::Findings(FindingsResult {
                summary: raw.summary,
                findings: findings(spec, raw.findings)?,
                score: None,
            }))
        }
    }
}

fn from_json<T: serde::de::DeserializeOwned>(json: &str) -> Result<T, AgentError> {
    serde_json::from_str(json).map_err(|e| AgentError::Parse(e.to_string()))
}

fn category_score(
    spec: &AgentSpec,
    score: f64,
    justification: String,
) -> Result<CategoryScore, AgentError> {
    let category = spec.category.ok_or_else(|| {
        AgentError::Parse(format!("agent {} has no score category", spec.name()))
    })?;
    Ok(CategoryScore {
        category,
        score: clamp_score(score),
        weight: clamp_weight(spec.weight),
        justification,
    })
}

fn findings(spec: &AgentSpec, raw: Vec<RawFinding>) -> Result<Vec<FindingRecord>, AgentError> {
    raw.into_iter().map(|f| finding(spec, f)).collect()
}

fn finding(spec: &AgentSpec, raw: RawFinding) -> Result<FindingRecord, AgentError> {
    let title = raw.title.trim();
    if title.is_empty() {
        return Err(AgentError::Parse("finding with empty title".to_string()));
    }

    let finding_type = match raw.finding_type.as_deref() {
        Some(t) => t
            .trim()
            .to_lowercase()
            .parse::<FindingType>()
            .map_err(|_| AgentError::Parse(format!("unknown finding type '{t}'")))?,
        None => spec.finding_type.ok_or_else(|| {
            AgentError::Parse(format!("finding '{title}' has no type"))
        })?,
    };

    let severity = raw
        .severity
        .trim()
        .to_lowercase()
        .parse::<Severity>()
        .map_err(|_| AgentError::Parse(format!("unknown severity '{}'", raw.severity)))?;

    Ok(FindingRecord {
        finding_type,
        title: title.to_string(),
        description: raw.description.trim().to_string(),
        severity,
        recommendations: raw.recommendations,
        evidence: raw.evidence.map(|e| Evidence {
            quote: e.quote,
            location_ref: e.location_ref,
        }),
        source: spec.name().to_string(),
    })
}
