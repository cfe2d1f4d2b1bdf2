//! Core data models for the conversation loop

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use uuid::Uuid;

//
// ================= Turns =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One role-tagged message in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }
}

//
// ================= Tool I/O =================
//

/// A model-issued request to run one tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        let arguments = match arguments {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("input".to_string(), other);
                map
            }
        };

        Self {
            name: name.into(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ToolPayload {
    Success(Value),
    Failure(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    pub tool_name: String,
    pub payload: ToolPayload,
}

impl ToolResult {
    pub fn success(tool_name: impl Into<String>, data: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            payload: ToolPayload::Success(data),
        }
    }

    pub fn failure(tool_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            payload: ToolPayload::Failure(error.into()),
        }
    }

    /// Canonical text encoding of the payload (two-space indented JSON).
    ///
    /// Failures are encoded as `{"tool": <name>, "error": <description>}` so the
    /// model can tell which call produced them.
    pub fn to_content(&self) -> String {
        let value = match &self.payload {
            ToolPayload::Success(data) => data.clone(),
            ToolPayload::Failure(error) => json!({
                "tool": self.tool_name,
                "error": error,
            }),
        };

        serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
    }

    pub fn into_turn(self) -> Turn {
        Turn::user(self.to_content())
    }
}

//
// ================= Audit =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InvocationOutcome {
    Answered,
    Rejected,
    ModelFailed,
    RoundLimitReached,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub round: u32,
    pub tool_name: String,
    pub arguments: Map<String, Value>,
    pub status: ExecutionStatus,
    pub error: Option<String>,
    pub execution_time_ms: u64,
}

/// Everything the loop did during one `continue_conversation` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationRecord {
    pub invocation_id: Uuid,
    pub history_hash: String,
    pub history_len: usize,
    pub rounds: u32,
    pub tool_calls: Vec<ToolCallRecord>,
    pub outcome: InvocationOutcome,
    pub turns_generated: usize,
    pub created_at: DateTime<Utc>,
    pub execution_time_ms: u64,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for InvocationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InvocationOutcome::Answered => "answered",
            InvocationOutcome::Rejected => "rejected",
            InvocationOutcome::ModelFailed => "model_failed",
            InvocationOutcome::RoundLimitReached => "round_limit_reached",
        };
        write!(f, "{}", s)
    }
}
