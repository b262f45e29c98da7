//! REST API server for the risk assessment orchestrator
//!
//! Thin invocation surface over the orchestration graph: start an
//! assessment, resume a checkpointed session, health check.

use axum::{extract::State, http::StatusCode, routing::get, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use uuid::Uuid;

use crate::error::OrchestrationError;
use crate::graph::OrchestrationGraph;
use crate::report;
use crate::state::SessionState;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AssessRequest {
    pub query: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ResumeRequest {
    pub session_id: String,
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
    pub graph: Arc<OrchestrationGraph>,
}

fn session_payload(state: &SessionState) -> serde_json::Value {
    let findings: serde_json::Map<String, serde_json::Value> = state
        .agent_outputs
        .iter()
        .map(|(role, finding)| {
            (
                role.ident().to_string(),
                serde_json::json!({
                    "analysis": finding.analysis,
                    "risk_score": finding.risk_score,
                    "risk_level": finding.risk_level,
                    "forced": finding.forced,
                }),
            )
        })
        .collect();

    serde_json::json!({
        "session_id": state.session_id,
        "status": state.status,
        "query": state.query,
        "global_step_count": state.global_step_count,
        "completed_roles": state.completed_roles,
        "findings": findings,
        "routing_history": state.routing_history,
        "report": report::render(state),
    })
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Assessment Endpoint
/// =============================

async fn run_assessment(
    State(state): State<ApiState>,
    Json(req): Json<AssessRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    info!("Received assessment request: {}", req.query);

    if req.query.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("query must not be empty".into())),
        );
    }

    match state.graph.run(&req.query).await {
        Ok(session) => (
            StatusCode::OK,
            Json(ApiResponse::success(session_payload(&session))),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!("Assessment failed: {}", e))),
        ),
    }
}

/// =============================
/// Resume Endpoint
/// =============================

async fn resume_session(
    State(state): State<ApiState>,
    Json(req): Json<ResumeRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let Ok(session_id) = Uuid::parse_str(req.session_id.trim()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(format!(
                "invalid session id: {}",
                req.session_id
            ))),
        );
    };

    info!("Resuming session {}", session_id);

    match state.graph.resume(session_id).await {
        Ok(session) => (
            StatusCode::OK,
            Json(ApiResponse::success(session_payload(&session))),
        ),
        Err(OrchestrationError::SessionNotFound(id)) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!("session not found: {}", id))),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!("Resume failed: {}", e))),
        ),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(graph: Arc<OrchestrationGraph>) -> Router {
    let state = ApiState { graph };

    Router::new()
        .route("/health", get(health))
        .route("/api/assess", post(run_assessment))
        .route("/api/resume", post(resume_session))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    graph: Arc<OrchestrationGraph>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(graph);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
