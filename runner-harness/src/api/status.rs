//! GET /status - the current `ServiceState`, for a host debugging a stuck
//! dispatcher without wiring up a full notification bridge.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/status", get(status))
}

async fn status(State(state): State<Arc<AppState>>) -> Json<engine_common::ServiceState> {
    Json(state.status.current())
}
