//! Webhook HTTP server.
//!
//! The CMS calls these endpoints whenever a report changes. Request bodies
//! are taken raw so payload errors carry the same messages as the CLI.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/reports/update` | Publish or republish `{"id": ...}` |
//! | `POST` | `/reports/delete` | Unpublish `{"id": ..., "created": ...}` |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "ID is missing" } }
//! ```
//!
//! | Failure | Status | Code |
//! |---------|--------|------|
//! | bad payload, report still exists | 400 | `bad_request` |
//! | CMS unreachable or erroring | 502 | `upstream` |
//! | page published but not valid AMP | 422 | `validation_failed` |
//! | object store or sitemap failure | 500 | `store_error` |

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use informant_core::error::PublishError;

use crate::config::Config;
use crate::pipeline::Pipeline;

#[derive(Clone)]
struct AppState {
    pipeline: Arc<Pipeline>,
}

/// Router with all endpoints, for embedding or tests.
pub fn router(pipeline: Arc<Pipeline>) -> Router {
    Router::new()
        .route("/reports/update", post(handle_update))
        .route("/reports/delete", post(handle_delete))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { pipeline })
}

/// Serve on `[server].bind` until the process is terminated.
pub async fn run_server(config: &Config, pipeline: Arc<Pipeline>) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("listening on http://{}", bind_addr);
    axum::serve(listener, router(pipeline)).await?;
    Ok(())
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

impl From<PublishError> for AppError {
    fn from(err: PublishError) -> Self {
        let (status, code) = match err {
            PublishError::BadInput(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            PublishError::UpstreamFetch(_) => (StatusCode::BAD_GATEWAY, "upstream"),
            PublishError::Validation { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "validation_failed")
            }
            PublishError::StoreNotFound(_)
            | PublishError::Store { .. }
            | PublishError::Sitemap { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "store_error"),
        };
        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
        } else {
            tracing::warn!(error = %err, "request rejected");
        }
        AppError {
            status,
            code,
            message: err.to_string(),
        }
    }
}

#[derive(Serialize)]
struct Success<T> {
    success: bool,
    #[serde(flatten)]
    outcome: T,
}

fn success<T: Serialize>(outcome: T) -> Json<Success<T>> {
    Json(Success {
        success: true,
        outcome,
    })
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

// ============ POST /reports/* ============

async fn handle_update(State(state): State<AppState>, body: String) -> Response {
    match state.pipeline.update_report(&body).await {
        Ok(outcome) => success(outcome).into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}

async fn handle_delete(State(state): State<AppState>, body: String) -> Response {
    match state.pipeline.delete_report(&body).await {
        Ok(outcome) => success(outcome).into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}
