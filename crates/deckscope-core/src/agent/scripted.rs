//! Model client that replays canned replies per agent.
//!
//! Used by the CLI's offline run and by tests. Each agent has a queue of
//! replies; the last reply in a queue repeats forever, so a single `fail`
//! scripts a permanently failing agent.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use super::collaborators::{ModelClient, ModelRequest};
use crate::domain::AgentError;

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedReply {
    Text(String),
    Fail(String),
    /// Never answers. Only a timeout ends the call.
    Hang,
}

#[derive(Debug, Default)]
pub struct ScriptedModelClient {
    replies: Mutex<HashMap<String, VecDeque<ScriptedReply>>>,
    calls: Mutex<HashMap<String, usize>>,
    fallback: Option<String>,
}

impl ScriptedModelClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply used for agents with no script.
    pub fn with_fallback(mut self, text: impl Into<String>) -> Self {
        self.fallback = Some(text.into());
        self
    }

    pub fn reply(self, agent: &str, text: impl Into<String>) -> Self {
        self.push(agent, ScriptedReply::Text(text.into()))
    }

    /// Convenience for replying with a JSON value.
    pub fn reply_json(self, agent: &str, value: &serde_json::Value) -> Self {
        self.reply(agent, value.to_string())
    }

    pub fn fail(self, agent: &str, message: impl Into<String>) -> Self {
        self.push(agent, ScriptedReply::Fail(message.into()))
    }

    pub fn hang(self, agent: &str) -> Self {
        self.push(agent, ScriptedReply::Hang)
    }

    fn push(self, agent: &str, reply: ScriptedReply) -> Self {
        if let Ok(mut replies) = self.replies.lock() {
            replies.entry(agent.to_string()).or_default().push_back(reply);
        }
        self
    }

    /// Build from a JSON object mapping agent names to replies. String
    /// values are replayed verbatim; anything else is serialized.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, AgentError> {
        let map = value.as_object().ok_or_else(|| {
            AgentError::Parse("scripted replies must be a JSON object".to_string())
        })?;
        let mut client = Self::new();
        for (agent, reply) in map {
            client = match reply {
                serde_json::Value::String(text) => client.reply(agent, text.clone()),
                other => client.reply_json(agent, other),
            };
        }
        Ok(client)
    }

    /// Number of model calls `agent` has made.
    pub fn calls(&self, agent: &str) -> usize {
        self.calls
            .lock()
            .map(|c| c.get(agent).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    fn next_reply(&self, agent: &str) -> Option<ScriptedReply> {
        let mut replies = self.replies.lock().ok()?;
        let queue = replies.get_mut(agent)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl ModelClient for ScriptedModelClient {
    async fn call_model(&self, request: &ModelRequest) -> Result<String, AgentError> {
        if let Ok(mut calls) = self.calls.lock() {
            *calls.entry(request.agent.clone()).or_default() += 1;
        }

        let reply = self
            .next_reply(&request.agent)
            .or_else(|| self.fallback.clone().map(ScriptedReply::Text));

        match reply {
            Some(ScriptedReply::Text(text)) => Ok(text),
            Some(ScriptedReply::Fail(message)) => Err(AgentError::ModelCall(message)),
            Some(ScriptedReply::Hang) => std::future::pending().await,
            None => Err(AgentError::ModelCall(format!(
                "no scripted reply for agent {}",
                request.agent
            ))),
        }
    }
}
