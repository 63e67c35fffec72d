//! Webhook surface: `GET /ping` and `POST /webhook`.
//!
//! Validates the request, derives a unique output path from its identifiers,
//! runs the blocking assembly on a worker thread and maps failures to status
//! codes. No state is shared between requests besides the assembler itself.

use crate::assembler::{Assembler, AssemblyReport};
use crate::asset::AssetPool;
use crate::decode::AudioLoader;
use crate::error::{AssemblyError, Result};
use crate::export::AudioSink;
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

pub const REQUIRED_FIELDS: [&str; 5] =
    ["request_id", "user_id", "sesh_id", "timestamp", "callback_url"];

/// Something that can build a mix at a given path.
pub trait MixService: Send + Sync {
    fn assemble(&self, destination: &Path) -> Result<AssemblyReport>;
}

impl<P, L, S> MixService for Assembler<P, L, S>
where
    P: AssetPool + Send + Sync,
    L: AudioLoader + Send + Sync,
    S: AudioSink + Send + Sync,
{
    fn assemble(&self, destination: &Path) -> Result<AssemblyReport> {
        Assembler::assemble(self, destination)
    }
}

#[derive(Clone)]
pub struct ServerState {
    mixer: Arc<dyn MixService>,
    output_dir: Arc<PathBuf>,
    extension: &'static str,
}

impl ServerState {
    pub fn new(mixer: Arc<dyn MixService>, output_dir: PathBuf, extension: &'static str) -> Self {
        ServerState {
            mixer,
            output_dir: Arc::new(output_dir),
            extension,
        }
    }
}

pub fn make_app(state: ServerState) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/webhook", post(webhook))
        .with_state(state)
}

pub async fn run_server(state: ServerState, port: u16) -> std::io::Result<()> {
    std::fs::create_dir_all(state.output_dir.as_path())?;
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, make_app(state)).await
}

async fn ping() -> Json<Value> {
    Json(json!({ "message": "pong" }))
}

fn error_response(status: StatusCode, message: &str, kind: Option<&str>) -> Response {
    let body = match kind {
        Some(kind) => json!({ "error": message, "kind": kind }),
        None => json!({ "error": message }),
    };
    (status, Json(body)).into_response()
}

/// An identifier that is safe to embed in a file name.
fn id_component(value: &Value) -> Option<String> {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let unsafe_chars = raw.contains(['/', '\\', '\0']) || raw.contains("..");
    if raw.is_empty() || unsafe_chars {
        return None;
    }
    Some(raw)
}

fn status_for(err: &AssemblyError) -> StatusCode {
    match err {
        AssemblyError::NotFound { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn webhook(State(state): State<ServerState>, body: Bytes) -> Response {
    info!("Received webhook request");

    let data: Value = match serde_json::from_slice(&body) {
        Ok(data) => data,
        Err(e) => {
            warn!("Invalid JSON received: {}", e);
            return error_response(StatusCode::BAD_REQUEST, "Invalid JSON", None);
        }
    };
    let fields = match data.as_object() {
        Some(fields) if !fields.is_empty() => fields,
        _ => {
            warn!("Webhook body is not a JSON object");
            return error_response(StatusCode::BAD_REQUEST, "Invalid JSON", None);
        }
    };

    for field in REQUIRED_FIELDS {
        if !fields.contains_key(field) {
            warn!("Missing field: {}", field);
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("Missing field: {}", field),
                None,
            );
        }
    }

    let mut ids = Vec::with_capacity(3);
    for field in ["request_id", "user_id", "sesh_id"] {
        match id_component(&fields[field]) {
            Some(id) => ids.push(id),
            None => {
                warn!("Invalid field: {}", field);
                return error_response(
                    StatusCode::BAD_REQUEST,
                    &format!("Invalid field: {}", field),
                    None,
                );
            }
        }
    }

    let file_name = format!(
        "affirmation_{}_{}_{}.{}",
        ids[0], ids[1], ids[2], state.extension
    );
    let destination = state.output_dir.join(file_name);
    info!(path = %destination.display(), "Starting audio processing");

    let mixer = state.mixer.clone();
    let job_destination = destination.clone();
    let result = tokio::task::spawn_blocking(move || mixer.assemble(&job_destination)).await;

    match result {
        Ok(Ok(report)) => {
            info!(path = %report.output.display(), "Audio processing completed successfully");
            (
                StatusCode::OK,
                Json(json!({
                    "message": "Audio processing completed successfully",
                    "file_link": &report.output,
                    "report": report,
                })),
            )
                .into_response()
        }
        Ok(Err(e)) => {
            error!(kind = e.kind(), "Error processing webhook: {}", e);
            error_response(status_for(&e), &e.to_string(), Some(e.kind()))
        }
        Err(e) => {
            error!("Assembly task failed: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "assembly task failed",
                None,
            )
        }
    }
}
