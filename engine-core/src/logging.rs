//! `tracing` initialization for the dispatcher core. A host embeds this
//! once at process startup; `engine-core` itself never installs a
//! subscriber on its own (a library doing so would fight the host's own
//! init).

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs a `fmt` layer filtered by `RUST_LOG`, falling back to `level`
/// when the env var is unset or invalid.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
