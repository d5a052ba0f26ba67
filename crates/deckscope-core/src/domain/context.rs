//! Shared analysis context.

use serde::{Deserialize, Serialize};

/// Input every agent of a run receives.
///
/// Owned by the caller; agents only read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisContext {
    /// Document the retrieval collaborator is scoped to.
    pub document_id: String,

    #[serde(default)]
    pub company_name: Option<String>,

    /// Free-form caller data (industry, stage, ask, ...).
    #[serde(default)]
    pub attributes: serde_json::Value,
}

impl AnalysisContext {
    pub fn new(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            company_name: None,
            attributes: serde_json::Value::Null,
        }
    }

    pub fn with_company(mut self, name: impl Into<String>) -> Self {
        self.company_name = Some(name.into());
        self
    }

    pub fn with_attributes(mut self, attributes: serde_json::Value) -> Self {
        self.attributes = attributes;
        self
    }

    /// Company name for prompts, or a neutral placeholder.
    pub fn company_label(&self) -> &str {
        self.company_name.as_deref().unwrap_or("the company")
    }
}
