//! POST /v1/cancel/:request_id - flips the cancel flag for an in-flight
//! request, if one is registered under that id.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use engine_common::RequestId;
use serde_json::{json, Value};

use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/v1/cancel/:request_id", post(cancel))
}

async fn cancel(State(state): State<Arc<AppState>>, Path(request_id): Path<String>) -> Json<Value> {
    let cancelled = state.dispatcher.cancel(&RequestId(request_id)).await;
    Json(json!({ "cancelled": cancelled }))
}
