//! JSON HTTP API over the [`Assistant`].
//!
//! # Endpoints
//!
//! | Method | Path | Body | Response |
//! |--------|------|------|----------|
//! | `GET`  | `/health` | none | `{status, version}` |
//! | `POST` | `/chat` | `{query, history?, use_context?}` | `{answer}` |
//! | `POST` | `/sql` | `{query}` | `{answer}` |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `upstream_error` (502), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted for browser clients.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use docchat_core::models::ChatTurn;

use crate::assistant::Assistant;
use crate::openai::LlmError;

#[derive(Clone)]
struct AppState {
    assistant: Arc<Assistant>,
}

/// Bind to `bind_addr` and serve until the process is terminated.
pub async fn run_server(assistant: Arc<Assistant>, bind_addr: &str) -> anyhow::Result<()> {
    let app = router(assistant);

    tracing::info!(addr = bind_addr, "server listening");
    println!("docchat server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn router(assistant: Arc<Assistant>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/chat", post(handle_chat))
        .route("/sql", post(handle_sql))
        .layer(cors)
        .with_state(AppState { assistant })
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
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

/// Chat-model failures surface as 502, everything else as 500.
fn classify_error(err: anyhow::Error) -> AppError {
    let message = format!("{:#}", err);
    tracing::error!(error = %message, "request failed");
    if err.downcast_ref::<LlmError>().is_some() {
        AppError {
            status: StatusCode::BAD_GATEWAY,
            code: "upstream_error",
            message,
        }
    } else {
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal",
            message,
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

// ============ POST /chat ============

#[derive(Deserialize)]
struct ChatRequest {
    query: String,
    #[serde(default)]
    history: Vec<ChatTurn>,
    #[serde(default = "default_use_context")]
    use_context: bool,
}

fn default_use_context() -> bool {
    true
}

#[derive(Serialize)]
struct AnswerResponse {
    answer: String,
}

async fn handle_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<AnswerResponse>, AppError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    let answer = state
        .assistant
        .chat(&req.query, &req.history, req.use_context)
        .await
        .map_err(classify_error)?;
    Ok(Json(AnswerResponse { answer }))
}

// ============ POST /sql ============

#[derive(Deserialize)]
struct SqlRequest {
    query: String,
}

async fn handle_sql(
    State(state): State<AppState>,
    Json(req): Json<SqlRequest>,
) -> Result<Json<AnswerResponse>, AppError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    let answer = state
        .assistant
        .sql_query(&req.query)
        .await
        .map_err(classify_error)?;
    Ok(Json(AnswerResponse { answer }))
}
