//! SurrealDB row shapes.
//!
//! Rows store enums as their snake_case strings and nested collections as
//! JSON; conversion to and from [`crate::records`] happens at the boundary
//! in [`crate::surreal_store`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::records::{
    Evidence, ExecutionRecord, FindingRecord, PipelineRunRecord, ScoreCategory, ScoreRecord,
};
use crate::storage_traits::{ContentDigest, RunId, StorageResult};

/// Serialize chrono DateTime as a SurrealDB datetime
mod surreal_datetime {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let sd = SurrealDatetime::from(*date);
        serde::Serialize::serialize(&sd, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = SurrealDatetime::deserialize(deserializer)?;
        Ok(DateTime::from(sd))
    }
}

/// Serialize an optional chrono DateTime as a SurrealDB datetime
mod surreal_datetime_opt {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(d) => {
                let sd = SurrealDatetime::from(*d);
                serde::Serialize::serialize(&Some(sd), serializer)
            }
            None => serde::Serialize::serialize(&None::<SurrealDatetime>, serializer),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = Option::<SurrealDatetime>::deserialize(deserializer)?;
        Ok(sd.map(DateTime::from))
    }
}

/// `pipeline_runs` row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRunRow {
    pub run_id: String,
    pub pipeline: String,
    pub failure_policy: String,
    pub agents: Vec<String>,
    pub definition_digest: String,
    pub document_id: String,
    pub status: String,
    #[serde(default)]
    pub overall_score: Option<f64>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(with = "surreal_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "surreal_datetime_opt")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, with = "surreal_datetime_opt")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&PipelineRunRecord> for PipelineRunRow {
    fn from(r: &PipelineRunRecord) -> Self {
        Self {
            run_id: r.run_id.0.clone(),
            pipeline: r.pipeline.to_string(),
            failure_policy: r.failure_policy.to_string(),
            agents: r.agents.clone(),
            definition_digest: r.definition_digest.as_str().to_string(),
            document_id: r.document_id.clone(),
            status: r.status.to_string(),
            overall_score: r.overall_score,
            error_message: r.error_message.clone(),
            created_at: r.created_at,
            started_at: r.started_at,
            completed_at: r.completed_at,
        }
    }
}

impl PipelineRunRow {
    pub fn into_record(self) -> StorageResult<PipelineRunRecord> {
        Ok(PipelineRunRecord {
            run_id: RunId(self.run_id),
            pipeline: self.pipeline.parse()?,
            failure_policy: self.failure_policy.parse()?,
            agents: self.agents,
            definition_digest: ContentDigest::try_from(self.definition_digest)?,
            document_id: self.document_id,
            status: self.status.parse()?,
            overall_score: self.overall_score,
            error_message: self.error_message,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
        })
    }
}

/// `executions` row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRow {
    pub run_id: String,
    pub agent_name: String,
    pub execution_order: u32,
    pub status: String,
    pub retry_count: u32,
    #[serde(default)]
    pub error_message: Option<String>,
    pub input: serde_json::Value,
    #[serde(default)]
    pub output: Option<serde_json::Value>,
    /// JSON array of `IntermediateStep`
    pub intermediate_steps: serde_json::Value,
    /// JSON array of `ExecutionError`
    pub errors: serde_json::Value,
    #[serde(with = "surreal_datetime")]
    pub started_at: DateTime<Utc>,
    #[serde(default, with = "surreal_datetime_opt")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ExecutionRow {
    pub fn from_record(r: &ExecutionRecord) -> StorageResult<Self> {
        Ok(Self {
            run_id: r.run_id.0.clone(),
            agent_name: r.agent_name.clone(),
            execution_order: r.execution_order,
            status: r.status.to_string(),
            retry_count: r.retry_count,
            error_message: r.error_message.clone(),
            input: r.input.clone(),
            output: r.output.clone(),
            intermediate_steps: serde_json::to_value(&r.intermediate_steps)?,
            errors: serde_json::to_value(&r.errors)?,
            started_at: r.started_at,
            completed_at: r.completed_at,
        })
    }

    pub fn into_record(self) -> StorageResult<ExecutionRecord> {
        Ok(ExecutionRecord {
            run_id: RunId(self.run_id),
            agent_name: self.agent_name,
            execution_order: self.execution_order,
            status: self.status.parse()?,
            retry_count: self.retry_count,
            error_message: self.error_message,
            input: self.input,
            output: self.output,
            intermediate_steps: serde_json::from_value(self.intermediate_steps)?,
            errors: serde_json::from_value(self.errors)?,
            started_at: self.started_at,
            completed_at: self.completed_at,
        })
    }
}

/// `scores` row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreRow {
    pub run_id: String,
    pub seq: u64,
    pub taxonomy: String,
    pub category: String,
    pub score: f64,
    pub weight: f64,
    pub justification: String,
    pub source_agent: String,
}

impl ScoreRow {
    pub fn new(run_id: &RunId, seq: u64, r: &ScoreRecord) -> Self {
        Self {
            run_id: run_id.0.clone(),
            seq,
            taxonomy: r.category.taxonomy().to_string(),
            category: r.category.name().to_string(),
            score: r.score,
            weight: r.weight,
            justification: r.justification.clone(),
            source_agent: r.source_agent.clone(),
        }
    }

    pub fn into_record(self) -> StorageResult<ScoreRecord> {
        Ok(ScoreRecord {
            category: ScoreCategory::parse(&self.taxonomy, &self.category)?,
            score: self.score,
            weight: self.weight,
            justification: self.justification,
            source_agent: self.source_agent,
        })
    }
}

/// `findings` row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindingRow {
    pub run_id: String,
    pub seq: u64,
    pub finding_type: String,
    pub title: String,
    pub description: String,
    pub severity: String,
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub evidence_quote: Option<String>,
    #[serde(default)]
    pub evidence_location: Option<String>,
    pub source: String,
}

impl FindingRow {
    pub fn new(run_id: &RunId, seq: u64, f: &FindingRecord) -> Self {
        Self {
            run_id: run_id.0.clone(),
            seq,
            finding_type: f.finding_type.to_string(),
            title: f.title.clone(),
            description: f.description.clone(),
            severity: f.severity.to_string(),
            recommendations: f.recommendations.clone(),
            evidence_quote: f.evidence.as_ref().map(|e| e.quote.clone()),
            evidence_location: f.evidence.as_ref().and_then(|e| e.location_ref.clone()),
            source: f.source.clone(),
        }
    }

    pub fn into_record(self) -> StorageResult<FindingRecord> {
        let evidence = self.evidence_quote.map(|quote| Evidence {
            quote,
            location_ref: self.evidence_location,
        });
        Ok(FindingRecord {
            finding_type: self.finding_type.parse()?,
            title: self.title,
            description: self.description,
            severity: self.severity.parse()?,
            recommendations: self.recommendations,
            evidence,
            source: self.source,
        })
    }
}

/// Rejects rows whose status is not the expected one.
pub(crate) fn expect_status(
    run_id: &str,
    status: &str,
    expected: &[&str],
) -> Result<(), StorageError> {
    if expected.contains(&status) {
        return Ok(());
    }
    Err(StorageError::InvalidRunState {
        run_id: run_id.to_string(),
        status: status.to_string(),
        expected: expected.join(" or "),
    })
}
