//! Tool dispatcher
//!
//! Turns one model-issued tool call into exactly one remote call.
//! Arguments are forwarded untouched; checking them against the schema is
//! left to the model and the remote tool.

use crate::error::{DispatchFailure, FailureKind};
use crate::models::{ToolCall, ToolResult};
use crate::tools::FunctionRegistry;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

pub struct ToolDispatcher {
    registry: Arc<FunctionRegistry>,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<FunctionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    pub async fn invoke(&self, call: &ToolCall) -> Result<ToolResult, DispatchFailure> {
        let failure = |kind, description: String| DispatchFailure {
            tool_name: call.name.clone(),
            kind,
            description,
        };

        let entry = self.registry.resolve(&call.name).map_err(|e| {
            warn!(tool_name = %call.name, error = %e, "Tool resolution failed");
            failure(FailureKind::UnknownTool, e.to_string())
        })?;

        let Some(handle) = entry.handle() else {
            let reason = entry.bind_error().unwrap_or("remote handle not bound");
            warn!(tool_name = %call.name, reason, "Tool unavailable");
            return Err(failure(
                FailureKind::Unavailable,
                format!("Tool {} is unavailable: {}", entry.name(), reason),
            ));
        };

        debug!(
            tool_name = %call.name,
            binding = %handle.binding(),
            arguments = %serde_json::Value::Object(call.arguments.clone()),
            "Executing tool"
        );

        let start = Instant::now();
        let output = handle.call(&call.arguments).await.map_err(|e| {
            warn!(tool_name = %call.name, error = %e, "Tool execution failed");
            failure(FailureKind::Execution, e.to_string())
        })?;

        debug!(
            tool_name = %call.name,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Tool execution complete"
        );

        Ok(ToolResult::success(entry.name(), output))
    }
}
