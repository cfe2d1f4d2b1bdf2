//! Anthropic Messages API client
//!
//! Uses a long-lived reqwest::Client for connection pooling.

use super::{ModelClient, ModelRequest, ModelResponse};
use crate::error::OrchestrationError;
use crate::models::{Role, ToolCall, Turn};
use crate::tools::ToolSchema;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{error, info};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl AnthropicClient {
    pub fn new(api_key: String, base_url: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

#[async_trait]
impl ModelClient for AnthropicClient {
    async fn respond(&self, request: ModelRequest<'_>) -> Result<ModelResponse> {
        if self.api_key.is_empty() {
            return Err(OrchestrationError::Llm(
                "ANTHROPIC_API_KEY not configured".to_string(),
            ));
        }

        let body = MessagesRequest::from_request(&request);
        let url = format!("{}/v1/messages", self.base_url);

        info!(
            model = %request.params.model,
            turns = request.turns.len(),
            tools = request.tools.len(),
            "Calling Anthropic API"
        );

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Anthropic API request failed: {}", e);
                OrchestrationError::Llm(format!("Anthropic API request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Anthropic API error response: {}", error_text);
            return Err(OrchestrationError::Llm(format!(
                "Anthropic API returned {}: {}",
                status, error_text
            )));
        }

        let parsed: MessagesResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Anthropic response: {}", e);
            OrchestrationError::Llm(format!("Anthropic parse error: {}", e))
        })?;

        info!(stop_reason = ?parsed.stop_reason, "Anthropic response received");

        parsed.into_model_response()
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
}

impl<'a> MessagesRequest<'a> {
    fn from_request(request: &ModelRequest<'a>) -> Self {
        Self {
            model: &request.params.model,
            max_tokens: request.params.max_tokens,
            temperature: request.params.temperature,
            system: request.system,
            messages: merge_turns(request.turns),
            tools: request.tools.iter().map(WireTool::from).collect(),
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
struct WireMessage {
    role: Role,
    content: Vec<TextBlock>,
}

#[derive(Debug, Serialize, PartialEq)]
struct TextBlock {
    #[serde(rename = "type")]
    kind: &'static str,
    text: String,
}

#[derive(Debug, Serialize)]
struct WireTool {
    name: &'static str,
    description: &'static str,
    input_schema: Value,
}

impl From<&ToolSchema> for WireTool {
    fn from(schema: &ToolSchema) -> Self {
        Self {
            name: schema.name,
            description: schema.description,
            input_schema: schema.input_schema(),
        }
    }
}

/// Consecutive turns with the same role become one message with several text
/// blocks; blank turns are dropped since the API rejects empty text.
fn merge_turns(turns: &[Turn]) -> Vec<WireMessage> {
    let mut messages: Vec<WireMessage> = Vec::new();

    for turn in turns.iter().filter(|t| !t.is_blank()) {
        let block = TextBlock {
            kind: "text",
            text: turn.content.clone(),
        };

        match messages.last_mut() {
            Some(last) if last.role == turn.role => last.content.push(block),
            _ => messages.push(WireMessage {
                role: turn.role,
                content: vec![block],
            }),
        }
    }

    messages
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    ToolUse {
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Other,
}

impl MessagesResponse {
    fn into_model_response(self) -> Result<ModelResponse> {
        if self.stop_reason.as_deref() == Some("tool_use") {
            let calls: Vec<ToolCall> = self
                .content
                .into_iter()
                .filter_map(|block| match block {
                    ResponseBlock::ToolUse { name, input } => Some(ToolCall::new(name, input)),
                    _ => None,
                })
                .collect();

            if calls.is_empty() {
                return Err(OrchestrationError::Llm(
                    "stop_reason was tool_use but no tool_use blocks were returned".to_string(),
                ));
            }

            return Ok(ModelResponse::ToolUse(calls));
        }

        self.content
            .into_iter()
            .find_map(|block| match block {
                ResponseBlock::Text { text } => Some(ModelResponse::FinalAnswer(text)),
                _ => None,
            })
            .ok_or_else(|| OrchestrationError::Llm("Response contained no text block".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GenerationParams;
    use crate::tools::ToolId;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let turns = vec![
            Turn::user("What's trending?"),
            Turn::user("[\n  \"AAA\"\n]"),
            Turn::assistant("   "),
            Turn::assistant("AAA is up."),
            Turn::user("Options on AAA?"),
        ];
        let tools = vec![ToolId::GetOptions.schema()];
        let params = GenerationParams::default();
        let request = ModelRequest {
            turns: &turns,
            system: "You are an analyst",
            tools: &tools,
            params: &params,
        };

        let json = serde_json::to_value(MessagesRequest::from_request(&request)).unwrap();

        assert_eq!(json["model"], "claude-3-sonnet-20240229");
        assert_eq!(json["max_tokens"], 2000);
        assert_eq!(json["system"], "You are an analyst");
        assert_eq!(json["messages"].as_array().unwrap().len(), 3);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"].as_array().unwrap().len(), 2);
        assert_eq!(json["messages"][1]["content"][0]["text"], "AAA is up.");
        assert_eq!(json["tools"][0]["name"], "get_options");
        assert_eq!(json["tools"][0]["input_schema"]["required"], json!(["ticker_symbol"]));
    }

    #[test]
    fn test_tools_omitted_when_none_advertised() {
        let turns = vec![Turn::user("hi")];
        let params = GenerationParams::default();
        let request = ModelRequest {
            turns: &turns,
            system: "",
            tools: &[],
            params: &params,
        };

        let json = serde_json::to_value(MessagesRequest::from_request(&request)).unwrap();
        assert!(json.get("tools").is_none());
    }

    #[test]
    fn test_tool_use_response_keeps_call_order() {
        let response: MessagesResponse = serde_json::from_value(json!({
            "stop_reason": "tool_use",
            "content": [
                {"type": "text", "text": "Let me check."},
                {"type": "tool_use", "id": "t1", "name": "get_news", "input": {"search_term": "fed"}},
                {"type": "tool_use", "id": "t2", "name": "process_wsb_data", "input": {}}
            ]
        }))
        .unwrap();

        let ModelResponse::ToolUse(calls) = response.into_model_response().unwrap() else {
            panic!("expected tool use");
        };
        let names: Vec<&str> = calls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["get_news", "process_wsb_data"]);
        assert_eq!(calls[0].arguments["search_term"], "fed");
    }

    #[test]
    fn test_final_answer_uses_first_text_block() {
        let response: MessagesResponse = serde_json::from_value(json!({
            "stop_reason": "end_turn",
            "content": [
                {"type": "thinking", "thinking": "..."},
                {"type": "text", "text": "Top movers today are AAA, BBB"}
            ]
        }))
        .unwrap();

        assert_eq!(
            response.into_model_response().unwrap(),
            ModelResponse::FinalAnswer("Top movers today are AAA, BBB".to_string())
        );
    }

    #[test]
    fn test_malformed_responses_are_errors() {
        let no_calls: MessagesResponse =
            serde_json::from_value(json!({"stop_reason": "tool_use", "content": []})).unwrap();
        assert!(no_calls.into_model_response().is_err());

        let no_text: MessagesResponse =
            serde_json::from_value(json!({"stop_reason": "end_turn", "content": []})).unwrap();
        assert!(no_text.into_model_response().is_err());
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let client = AnthropicClient::new(String::new(), None, Duration::from_secs(5)).unwrap();
        let turns = vec![Turn::user("hi")];
        let params = GenerationParams::default();

        let err = client
            .respond(ModelRequest {
                turns: &turns,
                system: "",
                tools: &[],
                params: &params,
            })
            .await
            .unwrap_err();

        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
    }
}
