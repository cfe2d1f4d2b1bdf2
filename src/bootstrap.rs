//! Wiring shared by the binaries

use crate::agent::Orchestrator;
use crate::audit::AuditLog;
use crate::config::AnalystConfig;
use crate::execution::ToolDispatcher;
use crate::model::AnthropicClient;
use crate::tools::{FunctionRegistry, HttpPlatform, InMemoryPlatform, RemotePlatform};
use crate::Result;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins; otherwise `default_level`.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Build the registry, model client and loop from configuration.
pub async fn build_orchestrator(config: &AnalystConfig) -> Result<Orchestrator> {
    let platform: Box<dyn RemotePlatform> = match &config.tools_api_base_url {
        Some(base_url) => {
            info!(base_url = %base_url, "Using HTTP tool platform");
            Box::new(HttpPlatform::new(base_url, config.tools_timeout)?)
        }
        None => {
            warn!("TOOLS_API_BASE_URL is not configured, no tools will be available");
            Box::new(InMemoryPlatform::new())
        }
    };

    let registry = FunctionRegistry::build(platform.as_ref(), &config.registry_tools()).await;
    let unavailable = registry.unavailable();
    if !unavailable.is_empty() {
        warn!(?unavailable, "Some tools could not be bound");
    }

    let model = AnthropicClient::new(
        config.anthropic_api_key.clone(),
        config.anthropic_base_url.clone(),
        config.model_timeout,
    )?;

    Ok(Orchestrator::new(
        Arc::new(model),
        ToolDispatcher::new(Arc::new(registry)),
        config.loop_settings.clone(),
        AuditLog::with_capacity(config.audit_capacity),
    ))
}
