//! `POST /parse-mermaid`: diagram source in, scene graph out.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use flowscene::{RenderEngine, Scene};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3000;

/// Added on top of the render process deadline so the subprocess normally gives up first.
pub const TIMEOUT_SLACK: Duration = Duration::from_secs(2);

const NO_CODE: &str = "No Mermaid code provided";
const PARSE_FAILED: &str = "Failed to parse Mermaid code";

#[derive(Clone)]
pub struct AppState {
    engine: Arc<dyn RenderEngine + Send + Sync>,
    request_timeout: Duration,
}

impl AppState {
    pub fn new(engine: Arc<dyn RenderEngine + Send + Sync>, request_timeout: Duration) -> Self {
        Self {
            engine,
            request_timeout,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ParseBody {
    #[serde(default)]
    code: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: &'static str,
}

impl ApiError {
    fn bad_request() -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: NO_CODE,
        }
    }

    fn failed() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: PARSE_FAILED,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/parse-mermaid", post(parse_mermaid))
        .with_state(state)
}

/// Bodies that are not JSON, or JSON without a string `code`, count as missing code.
pub async fn parse_mermaid(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Scene>, ApiError> {
    let code = serde_json::from_slice::<ParseBody>(&body)
        .ok()
        .and_then(|b| b.code)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(ApiError::bad_request)?;

    let engine = state.engine.clone();
    let task = tokio::task::spawn_blocking(move || flowscene::reconcile(engine.as_ref(), &code));
    match tokio::time::timeout(state.request_timeout, task).await {
        Ok(Ok(Ok(scene))) => Ok(Json(scene)),
        Ok(Ok(Err(err))) if err.is_client_error() => Err(ApiError::bad_request()),
        Ok(Ok(Err(err))) => {
            tracing::error!(error = %err, "reconcile failed");
            Err(ApiError::failed())
        }
        Ok(Err(err)) => {
            tracing::error!(error = %err, "reconcile task aborted");
            Err(ApiError::failed())
        }
        Err(_) => {
            tracing::error!(
                timeout = ?state.request_timeout,
                "reconcile exceeded the request deadline"
            );
            Err(ApiError::failed())
        }
    }
}

pub async fn run(port: u16, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(%port, "flowscene listening");
    axum::serve(listener, app(state)).await
}
