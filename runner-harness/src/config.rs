//! Configuration owned by the harness binary itself - just the HTTP bind
//! address. Dispatcher-level settings (RAM headroom, download timeouts,
//! model paths) are `engine_core::EngineConfig`'s concern, loaded
//! separately under its own `ENGINE__` prefix.

use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8090
}

impl Config {
    /// Load from `harness.toml` (if present), then `HARNESS__SECTION__KEY`
    /// environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let config = ConfigLoader::builder()
            .set_default("api.host", default_host())?
            .set_default("api.port", default_port() as i64)?
            .add_source(File::with_name("harness").required(false))
            .add_source(Environment::with_prefix("HARNESS").separator("__").try_parsing(true))
            .build()?;

        config.try_deserialize()
    }
}
