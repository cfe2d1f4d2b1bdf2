//! REST API server for the market analyst
//!
//! Stateless: every request carries the full conversation history and gets
//! back only the turns generated for it.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use crate::agent::Orchestrator;
use crate::models::Turn;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Turn>,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
}

/// =============================
/// Health Endpoint
/// =============================

async fn health(State(state): State<ApiState>) -> Json<serde_json::Value> {
    let tools: Vec<&str> = state
        .orchestrator
        .advertised_tools()
        .iter()
        .map(|schema| schema.name)
        .collect();

    Json(serde_json::json!({
        "status": "healthy",
        "tools": tools,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Chat Endpoint
/// =============================

async fn chat_handler(
    State(state): State<ApiState>,
    Json(req): Json<ChatRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    if req.messages.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("No messages supplied".into())),
        );
    }

    info!(history_len = req.messages.len(), "Received chat request");

    let invocation = state.orchestrator.invoke(&req.messages).await;

    (
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({
            "invocation_id": invocation.invocation_id,
            "messages": invocation.turns,
        }))),
    )
}

/// =============================
/// Audit Endpoint
/// =============================

async fn audit_handler(
    State(state): State<ApiState>,
    Path(invocation_id): Path<Uuid>,
) -> (StatusCode, Json<ApiResponse>) {
    match state.orchestrator.audit_log().get(invocation_id).await {
        Some(record) => (StatusCode::OK, Json(ApiResponse::success(record))),
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!(
                "No audit record for invocation {}",
                invocation_id
            ))),
        ),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(orchestrator: Arc<Orchestrator>) -> Router {
    let state = ApiState { orchestrator };

    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat_handler))
        .route("/api/audit/:invocation_id", get(audit_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    orchestrator: Arc<Orchestrator>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(orchestrator);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{LoopSettings, BLANK_INPUT_MESSAGE};
    use crate::audit::AuditLog;
    use crate::execution::ToolDispatcher;
    use crate::model::ScriptedModel;
    use crate::models::{Role, ToolCall};
    use crate::tools::{FunctionRegistry, InMemoryPlatform, ToolId};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn router(model: ScriptedModel) -> Router {
        let platform = InMemoryPlatform::new()
            .with_function(ToolId::GetTopTrendingTickers, |_| Ok(json!(["AAA", "BBB"])));
        let registry = FunctionRegistry::build(&platform, &ToolId::ALL).await;
        let orchestrator = Orchestrator::new(
            Arc::new(model),
            ToolDispatcher::new(Arc::new(registry)),
            LoopSettings::default(),
            AuditLog::new(),
        );
        create_router(Arc::new(orchestrator))
    }

    async fn post_chat(router: Router, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_chat_returns_generated_turns() {
        let model = ScriptedModel::new()
            .then_call(vec![ToolCall::new("get_top_trending_tickers", json!({}))])
            .then_answer("AAA leads.");

        let (status, body) = post_chat(
            router(model).await,
            json!({"messages": [{"role": "user", "content": "What's trending?"}]}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let turns: Vec<Turn> = serde_json::from_value(body["data"]["messages"].clone()).unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[1], Turn::assistant("AAA leads."));
        assert!(body["data"]["invocation_id"].as_str().is_some());
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_audit_record_is_retrievable_by_invocation_id() {
        let model = ScriptedModel::new()
            .then_call(vec![ToolCall::new("get_top_trending_tickers", json!({}))])
            .then_answer("AAA leads.");
        let app = router(model).await;

        let (_, body) = post_chat(
            app.clone(),
            json!({"messages": [{"role": "user", "content": "What's trending?"}]}),
        )
        .await;
        let invocation_id = body["data"]["invocation_id"].as_str().unwrap().to_string();

        let (status, audit) = get_json(app, &format!("/api/audit/{}", invocation_id)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(audit["data"]["invocation_id"], invocation_id.as_str());
        assert_eq!(audit["data"]["outcome"], "answered");
        assert_eq!(audit["data"]["rounds"], 2);
        assert_eq!(audit["data"]["tool_calls"][0]["tool_name"], "get_top_trending_tickers");
    }

    #[tokio::test]
    async fn test_unknown_audit_id_is_not_found() {
        let uri = format!("/api/audit/{}", Uuid::new_v4());
        let (status, body) = get_json(router(ScriptedModel::new()).await, &uri).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_chat_blank_last_turn() {
        let (status, body) = post_chat(
            router(ScriptedModel::new()).await,
            json!({"messages": [{"role": "user", "content": "  "}]}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["messages"][0]["content"], BLANK_INPUT_MESSAGE);
    }

    #[tokio::test]
    async fn test_chat_rejects_empty_history() {
        let (status, body) = post_chat(router(ScriptedModel::new()).await, json!({"messages": []})).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_health_lists_advertised_tools() {
        let (_, body) = get_json(router(ScriptedModel::new()).await, "/health").await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["tools"], json!(["get_top_trending_tickers"]));
    }
}
