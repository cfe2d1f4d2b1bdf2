//! Model client boundary
//!
//! The loop only needs one capability from the LLM service: given the
//! conversation so far, either answer or ask for tools.

use crate::error::OrchestrationError;
use crate::models::{ToolCall, Turn};
use crate::tools::ToolSchema;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;

pub mod anthropic;
pub use anthropic::AnthropicClient;

/// Passed through to the model unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            model: "claude-3-sonnet-20240229".to_string(),
            max_tokens: 2000,
            temperature: 0.8,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    pub turns: &'a [Turn],
    pub system: &'a str,
    pub tools: &'a [ToolSchema],
    pub params: &'a GenerationParams,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModelResponse {
    FinalAnswer(String),
    /// One or more tool calls, in the order the model issued them.
    ToolUse(Vec<ToolCall>),
}

#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn respond(&self, request: ModelRequest<'_>) -> Result<ModelResponse>;
}

/// What a [`ScriptedModel`] saw on one invocation.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub turns: Vec<Turn>,
    pub system: String,
    pub tool_names: Vec<&'static str>,
    pub params: GenerationParams,
}

enum ScriptStep {
    Respond(ModelResponse),
    Fail(String),
}

/// Model client that replays a fixed script, for tests and offline runs.
#[derive(Default)]
pub struct ScriptedModel {
    steps: Mutex<VecDeque<ScriptStep>>,
    repeat: Option<ModelResponse>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then_answer(self, text: impl Into<String>) -> Self {
        self.push(ScriptStep::Respond(ModelResponse::FinalAnswer(text.into())))
    }

    pub fn then_call(self, calls: Vec<ToolCall>) -> Self {
        self.push(ScriptStep::Respond(ModelResponse::ToolUse(calls)))
    }

    pub fn then_fail(self, error: impl Into<String>) -> Self {
        self.push(ScriptStep::Fail(error.into()))
    }

    /// Keep returning `response` once the script runs out.
    pub fn then_repeat(mut self, response: ModelResponse) -> Self {
        self.repeat = Some(response);
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    fn push(self, step: ScriptStep) -> Self {
        if let Ok(mut steps) = self.steps.lock() {
            steps.push_back(step);
        }
        self
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn respond(&self, request: ModelRequest<'_>) -> Result<ModelResponse> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(RecordedRequest {
                turns: request.turns.to_vec(),
                system: request.system.to_string(),
                tool_names: request.tools.iter().map(|t| t.name).collect(),
                params: request.params.clone(),
            });
        }

        let step = self
            .steps
            .lock()
            .map_err(|_| OrchestrationError::Llm("script lock poisoned".to_string()))?
            .pop_front();

        match step {
            Some(ScriptStep::Respond(response)) => Ok(response),
            Some(ScriptStep::Fail(error)) => Err(OrchestrationError::Llm(error)),
            None => self
                .repeat
                .clone()
                .ok_or_else(|| OrchestrationError::Llm("model script exhausted".to_string())),
        }
    }
}
