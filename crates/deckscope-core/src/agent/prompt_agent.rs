//! The generic LLM-backed agent.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use deckscope_state::PipelineKind;
use serde_json::json;

use super::catalog::AgentSpec;
use super::collaborators::{ModelClient, ModelRequest, RetrievedChunk, Retriever};
use super::parse::parse_payload;
use super::Agent;
use crate::domain::{AgentDescriptor, AgentError, AgentPayload, AnalysisContext};
use crate::lifecycle::StepTrace;

/// Retrieves deck passages for its focus, prompts the model and parses the
/// reply into the payload its pipeline expects.
pub struct PromptAgent {
    spec: AgentSpec,
    retriever: Arc<dyn Retriever>,
    model: Arc<dyn ModelClient>,
}

impl PromptAgent {
    pub fn new(spec: AgentSpec, retriever: Arc<dyn Retriever>, model: Arc<dyn ModelClient>) -> Self {
        Self {
            spec,
            retriever,
            model,
        }
    }

    pub fn spec(&self) -> &AgentSpec {
        &self.spec
    }

    fn system_prompt(&self) -> String {
        let format = match self.spec.pipeline {
            PipelineKind::Scoring => {
                r#"{"score": 0-100, "justification": "...", "findings": [{"type": "strength|weakness|opportunity|threat", "title": "...", "description": "...", "severity": "critical|major|minor|info", "recommendations": ["..."], "evidence": {"quote": "...", "location_ref": "..."}}]}"#
            }
            PipelineKind::Category => {
                r#"{"score": 0-100, "justification": "...", "highlights": ["..."]}"#
            }
            PipelineKind::Analysis => {
                r#"{"summary": "...", "findings": [{"type": "strength|weakness|opportunity|threat", "title": "...", "description": "...", "severity": "critical|major|minor|info", "recommendations": ["..."], "evidence": {"quote": "...", "location_ref": "..."}}]}"#
            }
        };
        format!(
            "{}\nRespond with a single JSON object in a ```json fence, shaped as:\n{}",
            self.spec.instructions, format
        )
    }

    fn user_prompt(&self, ctx: &AnalysisContext, chunks: &[RetrievedChunk]) -> String {
        let mut prompt = format!("Company: {}\n", ctx.company_label());
        if !ctx.attributes.is_null() {
            let _ = writeln!(prompt, "Context: {}", ctx.attributes);
        }
        let _ = writeln!(prompt, "Focus: {}\n\nDeck excerpts:", self.spec.focus);
        if chunks.is_empty() {
            prompt.push_str("(no relevant excerpts found)\n");
        }
        for (i, chunk) in chunks.iter().enumerate() {
            let _ = writeln!(prompt, "[{}] {}", i + 1, chunk.content);
        }
        prompt
    }
}

#[async_trait]
impl Agent for PromptAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.spec.descriptor
    }

    async fn analyze(
        &self,
        ctx: &AnalysisContext,
        trace: StepTrace,
    ) -> Result<AgentPayload, AgentError> {
        let response = self
            .retriever
            .retrieve(&self.spec.focus, &ctx.document_id)
            .await;
        trace.record(
            "retrieve",
            json!({ "query": self.spec.focus, "document_id": ctx.document_id }),
            json!({ "success": response.success, "results": response.results.len(), "error": response.error }),
        );
        let chunks = response.into_result()?;

        let request = ModelRequest {
            agent: self.spec.name().to_string(),
            system_prompt: self.system_prompt(),
            user_prompt: self.user_prompt(ctx, &chunks),
            temperature: self.spec.descriptor.temperature,
        };
        let text = self.model.call_model(&request).await?;
        trace.record(
            "call_model",
            json!({ "prompt_chars": request.user_prompt.len(), "temperature": request.temperature }),
            json!({ "response_chars": text.len() }),
        );

        parse_payload(&self.spec, &text)
    }
}
