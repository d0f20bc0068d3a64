//! HTTP query surface.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/answer` | Answer a question for a user session |
//! | `POST` | `/search` | Filtered retrieval hits without generation |
//! | `DELETE` | `/sessions/{user_id}` | End a session and forget its memory |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "generation_failed", "message": "😥 抱歉，…" } }
//! ```
//!
//! Error codes: `bad_request` (400), `generation_failed` (502), `internal` (500).
//! Messages are the end-user texts from [`RagError::user_message`]; details
//! go to the log only.
//!
//! Empty and vague questions are not errors: `/answer` returns their canned
//! replies with `kind` set accordingly.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted for browser clients.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::answer::{AnswerKind, AnswerOptions, Assistant, EnhancementStatus};
use crate::config::Config;
use crate::error::RagError;
use crate::itinerary::{split_days, DaySection, QueryIntent};
use crate::models::Evidence;
use crate::retrieve::MAX_TOP_K;

#[derive(Clone)]
struct AppState {
    assistant: Arc<Assistant>,
    top_k: usize,
}

/// Load the assistant and serve until the process is terminated.
pub async fn run_server(config: &Config) -> Result<(), RagError> {
    let assistant = Arc::new(Assistant::from_config(config)?);
    let app = build_router(assistant, config.retrieval.top_k);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .map_err(anyhow::Error::from)?;
    tracing::info!(bind = %config.server.bind, "server listening");
    println!("Guide server listening on http://{}", config.server.bind);

    axum::serve(listener, app)
        .await
        .map_err(anyhow::Error::from)?;
    Ok(())
}

/// Routes over a ready assistant. `top_k` is the `/search` default.
pub fn build_router(assistant: Arc<Assistant>, top_k: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/answer", post(handle_answer))
        .route("/search", post(handle_search))
        .route("/sessions/{user_id}", delete(handle_end_session))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { assistant, top_k })
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        tracing::error!(error = %err, "request failed");
        let (status, code) = match &err {
            RagError::Generation(_) => (StatusCode::BAD_GATEWAY, "generation_failed"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        AppError {
            status,
            code: code.to_string(),
            message: err.user_message().to_string(),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /answer ============

#[derive(Deserialize)]
struct AnswerRequest {
    query: String,
    /// A fresh session id is issued when absent.
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    enhance: bool,
    #[serde(default)]
    evidence: bool,
}

#[derive(Serialize)]
struct AnswerResponse {
    kind: AnswerKind,
    text: String,
    evidence: Vec<Evidence>,
    user_id: String,
    enhancement: EnhancementStatus,
    intent: Option<QueryIntent>,
    /// Day sections of an itinerary answer; empty otherwise.
    days: Vec<DaySection>,
}

async fn handle_answer(
    State(state): State<AppState>,
    Json(req): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>, AppError> {
    let user_id = req
        .user_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let opts = AnswerOptions {
        enhance: req.enhance,
        want_evidence: req.evidence,
    };
    let answer = state.assistant.answer(&req.query, &user_id, opts).await?;

    let days = if answer.kind == AnswerKind::Answered {
        split_days(&answer.text)
    } else {
        Vec::new()
    };

    Ok(Json(AnswerResponse {
        kind: answer.kind,
        text: answer.text,
        evidence: answer.evidence,
        user_id,
        enhancement: answer.enhancement,
        intent: answer.intent,
        days,
    }))
}

// ============ POST /search ============

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default)]
    top_k: Option<usize>,
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<Evidence>,
}

async fn handle_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    let query = req.query.trim();
    if query.is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    let top_k = req.top_k.unwrap_or(state.top_k);
    if top_k == 0 || top_k > MAX_TOP_K {
        return Err(bad_request(format!("top_k must be between 1 and {}", MAX_TOP_K)));
    }

    let retrieval = state
        .assistant
        .retriever()
        .retrieve(query, "", top_k)
        .await
        .map_err(RagError::from)?;

    Ok(Json(SearchResponse {
        results: retrieval.evidence(),
    }))
}

// ============ DELETE /sessions/{user_id} ============

#[derive(Serialize)]
struct EndSessionResponse {
    cleared: bool,
}

async fn handle_end_session(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Json<EndSessionResponse> {
    Json(EndSessionResponse {
        cleared: state.assistant.end_session(&user_id),
    })
}
