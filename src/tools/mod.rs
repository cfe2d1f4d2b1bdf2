//! Function registry
//!
//! Binds every configured [`ToolId`] to a handle on the remote-execution
//! platform once at startup. A tool whose lookup fails is kept with an absent
//! handle so the rest of the registry stays usable.

use crate::error::OrchestrationError;
use crate::Result;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

pub mod remote;
pub mod schema;

pub use remote::{HttpPlatform, InMemoryPlatform};
pub use schema::{ParamSpec, ParamType, RemoteBinding, ToolId, ToolSchema};

/// A resolved, callable remote function.
#[async_trait::async_trait]
pub trait RemoteFunction: Send + Sync {
    fn binding(&self) -> RemoteBinding;
    async fn call(&self, arguments: &Map<String, Value>) -> Result<Value>;
}

/// The platform that hosts the data tools.
#[async_trait::async_trait]
pub trait RemotePlatform: Send + Sync {
    async fn lookup(&self, binding: RemoteBinding) -> Result<Arc<dyn RemoteFunction>>;
}

pub struct RegistryEntry {
    pub tool: ToolId,
    pub schema: ToolSchema,
    handle: Option<Arc<dyn RemoteFunction>>,
    bind_error: Option<String>,
}

impl RegistryEntry {
    pub fn name(&self) -> &'static str {
        self.tool.name()
    }

    pub fn handle(&self) -> Option<Arc<dyn RemoteFunction>> {
        self.handle.clone()
    }

    pub fn is_available(&self) -> bool {
        self.handle.is_some()
    }

    /// Why the handle is absent, if it is.
    pub fn bind_error(&self) -> Option<&str> {
        self.bind_error.as_deref()
    }
}

/// Tool id → (handle, schema). Read-only after construction.
pub struct FunctionRegistry {
    entries: HashMap<ToolId, RegistryEntry>,
}

impl FunctionRegistry {
    /// Resolve every tool in `tools` against `platform`.
    pub async fn build(platform: &dyn RemotePlatform, tools: &[ToolId]) -> Self {
        let mut entries = HashMap::with_capacity(tools.len());

        for &tool in tools {
            if entries.contains_key(&tool) {
                continue;
            }

            let binding = tool.binding();
            let (handle, bind_error) = match platform.lookup(binding).await {
                Ok(handle) => (Some(handle), None),
                Err(e) => {
                    warn!(
                        tool_name = %tool,
                        binding = %binding,
                        error = %e,
                        "Remote function lookup failed, tool will be unavailable"
                    );
                    (None, Some(e.to_string()))
                }
            };

            entries.insert(
                tool,
                RegistryEntry {
                    tool,
                    schema: tool.schema(),
                    handle,
                    bind_error,
                },
            );
        }

        let available = entries.values().filter(|e| e.is_available()).count();
        info!(
            configured = entries.len(),
            available,
            "Function registry built"
        );

        Self { entries }
    }

    pub fn entry(&self, tool: ToolId) -> Option<&RegistryEntry> {
        self.entries.get(&tool)
    }

    /// Look up a tool by the name the model used.
    pub fn resolve(&self, name: &str) -> Result<&RegistryEntry> {
        let tool: ToolId = name.parse()?;
        self.entry(tool)
            .ok_or_else(|| OrchestrationError::ToolNotFound(format!("{} is not registered", tool)))
    }

    /// Schemas for the requested tools that have a bound handle, in request order.
    pub fn advertised_schemas(&self, tools: &[ToolId]) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = Vec::with_capacity(tools.len());

        for &tool in tools {
            match self.entry(tool) {
                Some(entry) if entry.is_available() => {
                    if !schemas.iter().any(|s| s.name == entry.name()) {
                        schemas.push(entry.schema.clone());
                    }
                }
                Some(_) => warn!(tool_name = %tool, "Not advertising unavailable tool"),
                None => warn!(tool_name = %tool, "Not advertising unregistered tool"),
            }
        }

        schemas
    }

    pub fn list(&self) -> Vec<ToolId> {
        let mut tools: Vec<ToolId> = self.entries.keys().copied().collect();
        tools.sort_by_key(|tool| tool.name());
        tools
    }

    pub fn unavailable(&self) -> Vec<ToolId> {
        let mut tools: Vec<ToolId> = self
            .entries
            .values()
            .filter(|entry| !entry.is_available())
            .map(|entry| entry.tool)
            .collect();
        tools.sort_by_key(|tool| tool.name());
        tools
    }
}
