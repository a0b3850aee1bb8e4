//! Host-facing configuration for the dispatcher core (§2, §5 "Tunables").
//! Layered the same way the wider stack does it: defaults, then an optional
//! `config.toml`, then `ENGINE__SECTION__KEY` environment overrides.

use std::time::Duration;

use config::{Config as ConfigLoader, ConfigError as ConfigCrateError, Environment, File};
use serde::Deserialize;

use crate::dispatcher::DispatcherConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_models_dir")]
    pub models_dir: String,
    #[serde(default = "default_metadata_file")]
    pub metadata_file: String,
    #[serde(default = "default_manifest_path")]
    pub manifest_path: String,
    #[serde(default)]
    pub dispatcher: DispatcherSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatcherSettings {
    #[serde(default = "default_ram_headroom_factor")]
    pub ram_headroom_factor: f64,
    #[serde(default = "default_fallback_ram_gb")]
    pub fallback_ram_gb: u32,
    #[serde(default = "default_eviction_wait_secs")]
    pub eviction_wait_secs: u64,
    #[serde(default = "default_unload_settle_ms")]
    pub unload_settle_ms: u64,
    #[serde(default = "default_inline_download_timeout_secs")]
    pub inline_download_timeout_secs: u64,
    #[serde(default = "default_download_poll_interval_secs")]
    pub download_poll_interval_secs: u64,
}

impl DispatcherSettings {
    pub fn to_dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            ram_headroom_factor: self.ram_headroom_factor,
            fallback_ram_gb: self.fallback_ram_gb,
            eviction_wait: Duration::from_secs(self.eviction_wait_secs),
            unload_settle: Duration::from_millis(self.unload_settle_ms),
            inline_download_timeout: Duration::from_secs(self.inline_download_timeout_secs),
            download_poll_interval: Duration::from_secs(self.download_poll_interval_secs),
            ..DispatcherConfig::default()
        }
    }
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            ram_headroom_factor: default_ram_headroom_factor(),
            fallback_ram_gb: default_fallback_ram_gb(),
            eviction_wait_secs: default_eviction_wait_secs(),
            unload_settle_ms: default_unload_settle_ms(),
            inline_download_timeout_secs: default_inline_download_timeout_secs(),
            download_poll_interval_secs: default_download_poll_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_models_dir() -> String {
    "./data/models".to_string()
}
fn default_metadata_file() -> String {
    "./data/models/metadata.json".to_string()
}
fn default_manifest_path() -> String {
    "./data/catalog.json".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_ram_headroom_factor() -> f64 {
    1.2
}
fn default_fallback_ram_gb() -> u32 {
    2
}
fn default_eviction_wait_secs() -> u64 {
    2
}
fn default_unload_settle_ms() -> u64 {
    100
}
fn default_inline_download_timeout_secs() -> u64 {
    30 * 60
}
fn default_download_poll_interval_secs() -> u64 {
    1
}

#[derive(Debug, thiserror::Error)]
pub enum EngineConfigError {
    #[error("configuration error: {0}")]
    LoadError(String),
}

impl From<ConfigCrateError> for EngineConfigError {
    fn from(err: ConfigCrateError) -> Self {
        EngineConfigError::LoadError(err.to_string())
    }
}

impl EngineConfig {
    /// Loads `engine.toml` (if present) then applies `ENGINE__SECTION__KEY`
    /// environment overrides, e.g. `ENGINE__DISPATCHER__FALLBACK_RAM_GB=4`.
    pub fn load() -> Result<Self, EngineConfigError> {
        let config = ConfigLoader::builder()
            .set_default("models_dir", default_models_dir())?
            .set_default("metadata_file", default_metadata_file())?
            .set_default("manifest_path", default_manifest_path())?
            .set_default("dispatcher.ram_headroom_factor", default_ram_headroom_factor())?
            .set_default("dispatcher.fallback_ram_gb", default_fallback_ram_gb() as i64)?
            .set_default("dispatcher.eviction_wait_secs", default_eviction_wait_secs() as i64)?
            .set_default("dispatcher.unload_settle_ms", default_unload_settle_ms() as i64)?
            .set_default(
                "dispatcher.inline_download_timeout_secs",
                default_inline_download_timeout_secs() as i64,
            )?
            .set_default(
                "dispatcher.download_poll_interval_secs",
                default_download_poll_interval_secs() as i64,
            )?
            .set_default("logging.level", default_log_level())?
            .add_source(File::with_name("engine").required(false))
            .add_source(Environment::with_prefix("ENGINE").separator("__").try_parsing(true))
            .build()?;

        config.try_deserialize().map_err(EngineConfigError::from)
    }
}
