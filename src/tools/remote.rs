//! Remote-execution platforms
//!
//! `HttpPlatform` talks to the tool-hosting service over HTTP.
//! `InMemoryPlatform` serves closures and is used for tests and offline runs.

use super::{RemoteBinding, RemoteFunction, RemotePlatform, ToolId};
use crate::error::OrchestrationError;
use crate::Result;
use reqwest::{Client, StatusCode};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Clone)]
pub struct HttpPlatform {
    client: Client,
    base_url: String,
}

impl HttpPlatform {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn function_url(&self, binding: RemoteBinding) -> String {
        format!(
            "{}/apps/{}/functions/{}",
            self.base_url, binding.app, binding.function
        )
    }
}

#[async_trait::async_trait]
impl RemotePlatform for HttpPlatform {
    async fn lookup(&self, binding: RemoteBinding) -> Result<Arc<dyn RemoteFunction>> {
        let url = self.function_url(binding);
        debug!(binding = %binding, url = %url, "Looking up remote function");

        let response = self.client.get(&url).send().await.map_err(|e| {
            OrchestrationError::Tool(format!("Lookup of {} failed: {}", binding, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(OrchestrationError::Tool(format!(
                "Lookup of {} returned {}",
                binding, status
            )));
        }

        Ok(Arc::new(HttpFunction {
            client: self.client.clone(),
            call_url: format!("{}/call", url),
            binding,
        }))
    }
}

struct HttpFunction {
    client: Client,
    call_url: String,
    binding: RemoteBinding,
}

#[async_trait::async_trait]
impl RemoteFunction for HttpFunction {
    fn binding(&self) -> RemoteBinding {
        self.binding
    }

    async fn call(&self, arguments: &Map<String, Value>) -> Result<Value> {
        let response = self
            .client
            .post(&self.call_url)
            .header("Content-Type", "application/json")
            .json(arguments)
            .send()
            .await
            .map_err(|e| {
                OrchestrationError::Tool(format!("Request to {} failed: {}", self.binding, e))
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            OrchestrationError::Tool(format!("Reading response from {} failed: {}", self.binding, e))
        })?;

        decode_response(self.binding, status, &text)
    }
}

fn decode_response(binding: RemoteBinding, status: StatusCode, text: &str) -> Result<Value> {
    match serde_json::from_str::<Value>(text) {
        Ok(body) => unwrap_envelope(binding, status, body),
        Err(_) if !status.is_success() => Err(OrchestrationError::Tool(format!(
            "{} returned {}: {}",
            binding,
            status,
            text.trim()
        ))),
        Err(e) => Err(OrchestrationError::Tool(format!(
            "Invalid JSON response from {}: {}",
            binding, e
        ))),
    }
}

/// The platform answers `{"result": ...}` on success and `{"error": ...}` on failure.
fn unwrap_envelope(binding: RemoteBinding, status: StatusCode, body: Value) -> Result<Value> {
    if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
        let detail = error
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(OrchestrationError::Tool(format!("{} failed: {}", binding, detail)));
    }

    if !status.is_success() {
        return Err(OrchestrationError::Tool(format!(
            "{} returned {}: {}",
            binding, status, body
        )));
    }

    match body {
        Value::Object(mut map) if map.contains_key("result") => {
            Ok(map.remove("result").unwrap_or(Value::Null))
        }
        other => Ok(other),
    }
}

type LocalFn = dyn Fn(&Map<String, Value>) -> Result<Value> + Send + Sync;

struct LocalFunction {
    binding: RemoteBinding,
    handler: Arc<LocalFn>,
}

#[async_trait::async_trait]
impl RemoteFunction for LocalFunction {
    fn binding(&self) -> RemoteBinding {
        self.binding
    }

    async fn call(&self, arguments: &Map<String, Value>) -> Result<Value> {
        (self.handler)(arguments)
    }
}

/// Platform backed by in-process closures.
#[derive(Default)]
pub struct InMemoryPlatform {
    functions: HashMap<(&'static str, &'static str), Arc<LocalFn>>,
    lookups: AtomicUsize,
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_function<F>(mut self, tool: ToolId, handler: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> Result<Value> + Send + Sync + 'static,
    {
        let binding = tool.binding();
        self.functions
            .insert((binding.app, binding.function), Arc::new(handler));
        self
    }

    /// Number of `lookup` calls served so far.
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RemotePlatform for InMemoryPlatform {
    async fn lookup(&self, binding: RemoteBinding) -> Result<Arc<dyn RemoteFunction>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);

        let handler = self
            .functions
            .get(&(binding.app, binding.function))
            .cloned()
            .ok_or_else(|| {
                OrchestrationError::ToolNotFound(format!("{} is not deployed", binding))
            })?;

        Ok(Arc::new(LocalFunction { binding, handler }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn binding() -> RemoteBinding {
        ToolId::GetOptions.binding()
    }

    #[test]
    fn test_envelope_result_is_unwrapped() {
        let value = unwrap_envelope(binding(), StatusCode::OK, json!({"result": [1, 2]})).unwrap();
        assert_eq!(value, json!([1, 2]));
    }

    #[test]
    fn test_bare_body_passes_through() {
        let value = unwrap_envelope(binding(), StatusCode::OK, json!({"calls": 3})).unwrap();
        assert_eq!(value, json!({"calls": 3}));
    }

    #[test]
    fn test_error_body_fails_even_with_ok_status() {
        let err = unwrap_envelope(binding(), StatusCode::OK, json!({"error": "no chain for XYZ"}))
            .unwrap_err();
        assert!(err.to_string().contains("no chain for XYZ"));
        assert!(err.to_string().contains("options/get_options"));
    }

    #[test]
    fn test_non_success_status_fails() {
        let err = unwrap_envelope(
            binding(),
            StatusCode::BAD_GATEWAY,
            json!({"result": null}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("502"));
    }

    #[test]
    fn test_non_json_error_body_keeps_status() {
        let err = decode_response(
            binding(),
            StatusCode::SERVICE_UNAVAILABLE,
            "<html>upstream unavailable</html>",
        )
        .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("503"), "{}", message);
        assert!(message.contains("upstream unavailable"), "{}", message);
    }

    #[test]
    fn test_non_json_success_body_is_invalid() {
        let err = decode_response(binding(), StatusCode::OK, "not json").unwrap_err();
        assert!(err.to_string().contains("Invalid JSON response"));
    }

    #[test]
    fn test_json_body_goes_through_envelope() {
        let value = decode_response(binding(), StatusCode::OK, r#"{"result": {"calls": 1}}"#).unwrap();
        assert_eq!(value, json!({"calls": 1}));
    }

    #[test]
    fn test_function_url_layout() {
        let platform = HttpPlatform::new("http://tools.local/", Duration::from_secs(5)).unwrap();
        assert_eq!(
            platform.function_url(ToolId::GetTickerAnalysis.binding()),
            "http://tools.local/apps/ticker-analysis/functions/generate_investment_report"
        );
    }

    #[tokio::test]
    async fn test_in_memory_platform_serves_closures() {
        let platform = InMemoryPlatform::new()
            .with_function(ToolId::GetNews, |args| Ok(json!({ "echo": args.get("search_term") })));

        let function = platform.lookup(ToolId::GetNews.binding()).await.unwrap();
        let mut args = Map::new();
        args.insert("search_term".into(), json!("nvda"));

        assert_eq!(function.call(&args).await.unwrap(), json!({"echo": "nvda"}));
        assert!(platform.lookup(ToolId::GetOptions.binding()).await.is_err());
        assert_eq!(platform.lookup_count(), 2);
    }
}
