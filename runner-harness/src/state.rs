//! Shared application state passed to all handlers.

use std::sync::Arc;

use engine_core::{Dispatcher, ModelCatalog, StatusPublisher};

pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub catalog: Arc<ModelCatalog>,
    pub status: Arc<StatusPublisher>,
}
