//! Environment configuration
//!
//! Binaries load `.env` first (dotenv), then build an [`AnalystConfig`].

use crate::agent::{LoopSettings, ToolFailurePolicy};
use crate::audit::DEFAULT_AUDIT_CAPACITY;
use crate::error::OrchestrationError;
use crate::model::GenerationParams;
use crate::prompt::SystemPrompt;
use crate::tools::ToolId;
use crate::Result;
use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AnalystConfig {
    pub anthropic_api_key: String,
    pub anthropic_base_url: Option<String>,
    pub model_timeout: Duration,
    pub tools_api_base_url: Option<String>,
    pub tools_timeout: Duration,
    pub loop_settings: LoopSettings,
    pub api_port: u16,
    /// Invocation records kept in memory before the oldest are evicted.
    pub audit_capacity: usize,
}

impl AnalystConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the process environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let defaults = GenerationParams::default();
        let params = GenerationParams {
            model: get("ANALYST_MODEL").unwrap_or(defaults.model),
            max_tokens: parse_or("ANALYST_MAX_TOKENS", get("ANALYST_MAX_TOKENS"), defaults.max_tokens)?,
            temperature: parse_or("ANALYST_TEMPERATURE", get("ANALYST_TEMPERATURE"), defaults.temperature)?,
        };

        let mut loop_settings = LoopSettings {
            params,
            ..LoopSettings::default()
        };
        loop_settings.max_rounds =
            parse_or("ANALYST_MAX_ROUNDS", get("ANALYST_MAX_ROUNDS"), loop_settings.max_rounds)?;
        if let Some(policy) = get("ANALYST_TOOL_FAILURES") {
            loop_settings.failure_policy = policy.parse::<ToolFailurePolicy>()?;
        }
        if let Some(tools) = get("ANALYST_TOOLS") {
            loop_settings.tools = parse_tool_list(&tools)?;
        }
        if let Some(prompt) = get("ANALYST_SYSTEM_PROMPT") {
            loop_settings.system_prompt = SystemPrompt::Fixed(prompt);
        }

        let api_port = parse_or("PORT", get("PORT").or_else(|| get("API_PORT")), 8080)?;

        Ok(Self {
            anthropic_api_key: get("ANTHROPIC_API_KEY").unwrap_or_default(),
            anthropic_base_url: get("ANTHROPIC_BASE_URL"),
            model_timeout: Duration::from_secs(parse_or(
                "ANTHROPIC_TIMEOUT_SECS",
                get("ANTHROPIC_TIMEOUT_SECS"),
                120,
            )?),
            tools_api_base_url: get("TOOLS_API_BASE_URL"),
            tools_timeout: Duration::from_secs(parse_or(
                "TOOLS_API_TIMEOUT_SECS",
                get("TOOLS_API_TIMEOUT_SECS"),
                30,
            )?),
            loop_settings,
            api_port,
            audit_capacity: parse_or(
                "ANALYST_AUDIT_CAPACITY",
                get("ANALYST_AUDIT_CAPACITY"),
                DEFAULT_AUDIT_CAPACITY,
            )?,
        })
    }

    /// Every tool the registry should try to bind: the advertised ones first,
    /// then the rest of the catalogue.
    pub fn registry_tools(&self) -> Vec<ToolId> {
        let mut tools = self.loop_settings.tools.clone();
        for tool in ToolId::ALL {
            if !tools.contains(&tool) {
                tools.push(tool);
            }
        }
        tools
    }
}

fn parse_or<T: FromStr>(key: &str, value: Option<String>, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| OrchestrationError::Config(format!("{}='{}': {}", key, raw, e))),
        None => Ok(default),
    }
}

fn parse_tool_list(raw: &str) -> Result<Vec<ToolId>> {
    let mut tools = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        let tool = name
            .parse::<ToolId>()
            .map_err(|_| OrchestrationError::Config(format!("ANALYST_TOOLS: unknown tool '{}'", name)))?;
        if !tools.contains(&tool) {
            tools.push(tool);
        }
    }
    Ok(tools)
}

/// Convenience for tests and embedding: config from a fixed set of pairs.
pub fn config_from_pairs(pairs: &[(&str, &str)]) -> Result<AnalystConfig> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    AnalystConfig::from_lookup(|key| map.get(key).cloned())
}
