//! HTTP adapter for the compilation runner
//!
//! Exposes `POST /api/compile` plus two read-only endpoints and maps runner
//! errors onto status codes. Failure details other than build output stay
//! in the logs.

use std::future::Future;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{error, info, instrument, warn};

use crate::runner::{CompileError, ErrorKind, Runner};
use crate::types::CompilationResult;

/// Body returned for completed builds, successful or not
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileResponse {
    pub success: bool,
    /// Stdout on success, the combined transcript on failure
    pub output: String,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub job_id: String,
    pub duration_ms: u64,
    pub truncated: bool,
    pub artifacts: Vec<String>,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<&'static str>,
}

impl CompileResponse {
    fn new(result: &CompilationResult, hint: Option<&'static str>) -> Self {
        Self {
            success: result.is_success(),
            output: result.output(),
            stdout: result.stdout.clone(),
            stderr: result.stderr.clone(),
            exit_code: result.exit_code,
            job_id: result.job_id.clone(),
            duration_ms: result.duration.as_millis() as u64,
            truncated: result.truncated(),
            artifacts: result.artifacts.clone(),
            warnings: result.warnings.clone(),
            hint,
        }
    }
}

/// Body returned by `GET /api/toolchain`
#[derive(Debug, Clone, Serialize)]
pub struct ToolchainResponse {
    pub id: String,
    pub name: String,
    pub command: Vec<String>,
}

/// A runner error on its way to the client
#[derive(Debug)]
pub struct ApiError(CompileError);

impl From<CompileError> for ApiError {
    fn from(err: CompileError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let (status, message) = match err.kind() {
            ErrorKind::InvalidInput => (StatusCode::BAD_REQUEST, err.to_string()),
            ErrorKind::Timeout => (StatusCode::GATEWAY_TIMEOUT, err.to_string()),
            ErrorKind::BuildFailed => {
                let hint = err.hint();
                if let CompileError::BuildFailed(result) = err {
                    let body = CompileResponse::new(&result, hint);
                    return (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response();
                }
                (StatusCode::INTERNAL_SERVER_ERROR, "Compilation failed".to_owned())
            }
            ErrorKind::WorkspaceError => {
                error!(error = %err, "failed to prepare workspace");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to prepare workspace".to_owned(),
                )
            }
            ErrorKind::InternalError => {
                error!(error = %err, "compilation failed internally");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_owned(),
                )
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Build the HTTP router
pub fn router(runner: Runner) -> Router {
    let body_limit = runner.config().server.body_limit;

    Router::new()
        .route("/api/compile", post(compile))
        .route("/api/toolchain", get(toolchain))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(runner)
}

/// Serve the router on `listener` until `shutdown` resolves
///
/// On shutdown the workspace manager is closed, so jobs still waiting for a
/// slot fail instead of starting while in-flight jobs finish.
pub async fn serve<F>(listener: TcpListener, runner: Runner, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "listening");
    }
    let app = router(runner.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("shutting down, no new jobs will start");
            runner.workspaces().close();
        })
        .await
}

#[instrument(skip_all, fields(len = body.len()))]
async fn compile(
    State(runner): State<Runner>,
    body: Bytes,
) -> Result<Json<CompileResponse>, ApiError> {
    let value: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| CompileError::InvalidInput(format!("invalid JSON body: {e}")))?;

    match runner.compile_value(&value).await {
        Ok(result) => {
            info!(job_id = result.job_id, duration_ms = result.duration.as_millis() as u64, "compiled");
            Ok(Json(CompileResponse::new(&result, None)))
        }
        Err(e) => {
            warn!(kind = ?e.kind(), error = %e, "compilation rejected");
            Err(e.into())
        }
    }
}

async fn toolchain(State(runner): State<Runner>) -> Result<Json<ToolchainResponse>, ApiError> {
    let config = runner.config();
    let toolchain = config.toolchain().map_err(CompileError::from)?;

    Ok(Json(ToolchainResponse {
        id: config.default_toolchain.clone(),
        name: toolchain.name.clone(),
        command: toolchain.command.clone(),
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
