//! Harness binary: registers mock Runner implementations against
//! `engine-core`'s Dispatcher and exposes a small status/debug HTTP
//! surface. Plays the role a concrete host (IPC surface, persistent
//! settings, process supervision) would play in production, but is not
//! itself part of the specified core.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use engine_common::EngineSettings;
use engine_core::{
    CancellationRegistry, Dispatcher, ModelCatalog, ModelManager, Registry, StatusPublisher,
    SysinfoResourceMonitor,
};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

mod api;
mod catalog_seed;
mod config;
mod engines;
mod settings;
mod state;

use config::Config;
use engines::{CloudLlmRunner, KeywordGuardianRunner, LocalLlmRunner};
use settings::InMemorySettingsStore;
use state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let engine_config = engine_core::EngineConfig::load().map_err(|e| {
        format!(
            "failed to load engine configuration: {e}. \
             Make sure engine.toml exists or set ENGINE__... environment variables."
        )
    })?;
    engine_core::logging::init(&engine_config.logging.level);

    let config = Config::load().map_err(|e| format!("failed to load harness configuration: {e}"))?;

    let catalog = Arc::new(ModelCatalog::load_from_path(&engine_config.manifest_path).unwrap_or_else(|_| {
        tracing::info!(
            "no catalog manifest at {}, falling back to the built-in demo catalog",
            engine_config.manifest_path
        );
        ModelCatalog::from_manifest(catalog_seed::demo_manifest("https://example.invalid/models"))
    }));

    let model_manager = Arc::new(ModelManager::new(
        Arc::clone(&catalog),
        engine_config.models_dir.clone().into(),
        engine_config.metadata_file.clone().into(),
    ));

    let registry = Arc::new(Registry::new());
    registry.register(Arc::new(LocalLlmRunner::new("local-llm", 10))).await?;
    registry
        .register(Arc::new(CloudLlmRunner::new("cloud-llm", 20, Duration::from_millis(150))))
        .await?;
    registry.register(Arc::new(KeywordGuardianRunner::new("guardian"))).await?;

    let status = Arc::new(StatusPublisher::new());
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&registry),
        Arc::clone(&catalog),
        model_manager,
        Arc::new(SysinfoResourceMonitor::new()),
        Arc::new(InMemorySettingsStore::new(EngineSettings::default())),
        Arc::new(CancellationRegistry::new()),
        Arc::clone(&status),
        engine_config.dispatcher.to_dispatcher_config(),
    ));

    let state = Arc::new(AppState {
        dispatcher,
        catalog,
        status,
    });

    let app = Router::new()
        .merge(api::router())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("{}:{}", config.api.host, config.api.port);
    tracing::info!("runner-harness listening on {}", addr);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
