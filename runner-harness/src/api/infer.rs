//! POST /v1/infer and /v1/infer/stream - debug entry points that exercise
//! the Dispatcher's two call shapes. `/infer/stream` collects the whole
//! stream into a JSON array rather than speaking SSE/chunked transfer -
//! wiring a real streaming transport is the host IPC layer's job, out of
//! scope here.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use engine_common::{Capability, InferenceRequest, InferenceResult};
use serde::Deserialize;
use tokio_stream::StreamExt;

use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/v1/infer", post(infer))
        .route("/v1/infer/stream", post(infer_stream))
}

#[derive(Debug, Deserialize)]
struct InferBody {
    capability: Capability,
    request: InferenceRequest,
    #[serde(default)]
    preferred_runner: Option<String>,
}

async fn infer(State(state): State<Arc<AppState>>, Json(body): Json<InferBody>) -> Json<InferenceResult> {
    let result = state
        .dispatcher
        .process(body.request, body.capability, body.preferred_runner.as_deref())
        .await;
    Json(result)
}

async fn infer_stream(
    State(state): State<Arc<AppState>>,
    Json(body): Json<InferBody>,
) -> Json<Vec<InferenceResult>> {
    let mut stream = state
        .dispatcher
        .process_stream(body.request, body.capability, body.preferred_runner);
    let mut chunks = Vec::new();
    while let Some(chunk) = stream.next().await {
        chunks.push(chunk);
    }
    Json(chunks)
}
