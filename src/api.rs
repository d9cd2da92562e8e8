//! REST API server for the routing orchestrator
//!
//! Exposes threads, chat turns, goals and routing metrics over HTTP.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::agent::Orchestrator;
use crate::error::OrchestrationError;
use crate::goals::NewGoal;
use crate::models::ConversationState;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub thread_id: Option<String>,
    pub message: String,
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

type ApiResult = (StatusCode, Json<ApiResponse>);

fn ok<T: Serialize>(data: T) -> ApiResult {
    (StatusCode::OK, Json(ApiResponse::success(data)))
}

fn failure(error: OrchestrationError) -> ApiResult {
    let status = match &error {
        OrchestrationError::ConfigurationError(_) => StatusCode::SERVICE_UNAVAILABLE,
        OrchestrationError::GoalError(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    warn!(error = %error, status = %status, "Request failed");
    (status, Json(ApiResponse::error(error.to_string())))
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
}

/// The answer plus how it was routed
#[derive(Debug, Serialize)]
struct ChatReply {
    thread_id: String,
    response: Option<String>,
    route: Option<crate::models::RouteKind>,
    confidence: Option<f64>,
    agents: Vec<crate::models::AgentType>,
    supervisor_reasoning: Option<String>,
}

impl ChatReply {
    fn from_state(thread_id: String, state: ConversationState) -> Self {
        Self {
            thread_id,
            route: state.router_decision.as_ref().map(|d| d.route),
            confidence: state.router_decision.as_ref().map(|d| d.confidence),
            supervisor_reasoning: state.supervisor_decision.map(|d| d.reasoning),
            agents: state.agents_completed,
            response: state.final_response,
        }
    }
}

/// =============================
/// Handlers
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn create_thread(State(state): State<ApiState>) -> ApiResult {
    let thread_id = state.orchestrator.new_thread();
    info!(thread_id = %thread_id, "Thread created");
    ok(serde_json::json!({ "thread_id": thread_id }))
}

async fn chat(State(state): State<ApiState>, Json(req): Json<ChatRequest>) -> ApiResult {
    if req.message.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Message must not be empty".into())),
        );
    }

    let thread_id = match req.thread_id {
        Some(id) if !id.trim().is_empty() => id,
        _ => state.orchestrator.new_thread(),
    };

    match state.orchestrator.ask(&thread_id, &req.message).await {
        Ok(conversation) => ok(ChatReply::from_state(thread_id, conversation)),
        Err(e) => failure(e),
    }
}

async fn get_thread(State(state): State<ApiState>, Path(thread_id): Path<String>) -> ApiResult {
    match state.orchestrator.state(&thread_id).await {
        Ok(Some(conversation)) => ok(conversation),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!("Thread {} not found", thread_id))),
        ),
        Err(e) => failure(e),
    }
}

async fn add_goal(
    State(state): State<ApiState>,
    Path(thread_id): Path<String>,
    Json(goal): Json<NewGoal>,
) -> ApiResult {
    match state.orchestrator.add_goal(&thread_id, goal).await {
        Ok(goal) => ok(goal),
        Err(e) => failure(e),
    }
}

async fn list_goals(State(state): State<ApiState>, Path(thread_id): Path<String>) -> ApiResult {
    ok(state.orchestrator.goals(&thread_id).await)
}

#[derive(Debug, Deserialize)]
pub struct ProgressUpdate {
    pub current_savings: f64,
}

async fn update_goal(
    State(state): State<ApiState>,
    Path((thread_id, goal_id)): Path<(String, u32)>,
    Json(update): Json<ProgressUpdate>,
) -> ApiResult {
    match state
        .orchestrator
        .update_goal_progress(&thread_id, goal_id, update.current_savings)
        .await
    {
        Ok(goal) => ok(goal),
        Err(e) => failure(e),
    }
}

async fn delete_goal(
    State(state): State<ApiState>,
    Path((thread_id, goal_id)): Path<(String, u32)>,
) -> ApiResult {
    match state.orchestrator.delete_goal(&thread_id, goal_id).await {
        Ok(goal) => ok(goal),
        Err(e) => failure(e),
    }
}

async fn goal_priorities(State(state): State<ApiState>, Path(thread_id): Path<String>) -> ApiResult {
    ok(state.orchestrator.prioritize_goals(&thread_id).await)
}

async fn metrics(State(state): State<ApiState>) -> ApiResult {
    let metrics = state.orchestrator.metrics().await;
    ok(serde_json::json!({
        "fast_path_rate": metrics.fast_path_rate(),
        "supervisor_path_rate": metrics.supervisor_path_rate(),
        "counters": metrics,
    }))
}

/// =============================
/// Router
/// =============================

pub fn create_router(orchestrator: Arc<Orchestrator>) -> Router {
    let state = ApiState { orchestrator };

    Router::new()
        .route("/health", get(health))
        .route("/api/threads", post(create_thread))
        .route("/api/threads/:id", get(get_thread))
        .route("/api/threads/:id/goals", post(add_goal).get(list_goals))
        .route(
            "/api/threads/:id/goals/:goal_id",
            put(update_goal).delete(delete_goal),
        )
        .route("/api/threads/:id/priorities", get(goal_priorities))
        .route("/api/chat", post(chat))
        .route("/api/metrics", get(metrics))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
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

    info!("API server listening on http://0.0.0.0:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::Dispatcher;
    use crate::generation::ScriptedGenerator;
    use crate::goals::GoalStore;
    use crate::handlers::HandlerTable;
    use crate::memory::ContextTrimmer;
    use crate::state::InMemoryThreadStore;
    use crate::supervisor::Supervisor;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn app() -> Router {
        let dispatcher = Dispatcher::new(
            Supervisor::new(Arc::new(ScriptedGenerator::repeating(
                r#"{"primary_agent": "market", "reasoning": "company"}"#,
            ))),
            HandlerTable::echo(),
            ContextTrimmer::new(),
        );
        let orchestrator = Orchestrator::new(
            Arc::new(InMemoryThreadStore::new()),
            dispatcher,
            Arc::new(GoalStore::new()),
        );
        create_router(Arc::new(orchestrator))
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, ApiResponse) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_chat_creates_thread_and_answers() {
        let (status, body) = send(
            app(),
            post_json("/api/chat", serde_json::json!({ "message": "Tell me about Apple" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let data = body.data.unwrap();
        assert_eq!(data["response"], "market response");
        assert_eq!(data["route"], "supervisor");
        assert_eq!(data["agents"], serde_json::json!(["market"]));
        assert!(!data["thread_id"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected() {
        let (status, body) = send(
            app(),
            post_json("/api/chat", serde_json::json!({ "message": "  " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!body.success);
    }

    #[tokio::test]
    async fn test_unknown_thread_is_not_found() {
        let request = Request::builder()
            .uri("/api/threads/missing")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(app(), request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_goal_is_bad_request() {
        let (status, body) = send(
            app(),
            post_json(
                "/api/threads/t1/goals",
                serde_json::json!({
                    "name": "Car",
                    "target_amount": -5.0,
                    "target_date": "2099-01-01"
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.error.unwrap().contains("Target amount"));
    }
}
