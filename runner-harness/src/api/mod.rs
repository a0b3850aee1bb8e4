//! A tiny status/debug HTTP surface for the harness. Not a production IPC
//! surface - that layer is explicitly out of scope for the core.

pub mod cancel;
pub mod health;
pub mod infer;
pub mod models;
pub mod status;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(health::router())
        .merge(status::router())
        .merge(models::router())
        .merge(infer::router())
        .merge(cancel::router())
}
