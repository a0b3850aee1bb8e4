//! GET /v1/models - lists the catalog entries the harness knows about.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/v1/models", get(list_models))
}

#[derive(Debug, Serialize)]
struct ModelSummary {
    id: String,
    runner: String,
    ram_gb: u32,
    name: Option<String>,
}

async fn list_models(State(state): State<Arc<AppState>>) -> Json<Vec<ModelSummary>> {
    let models = state
        .catalog
        .all()
        .iter()
        .map(|m| ModelSummary {
            id: m.id.clone(),
            runner: m.runner.clone(),
            ram_gb: m.ram_gb,
            name: m.name.clone(),
        })
        .collect();
    Json(models)
}
