//! Catalog and per-model download-state types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single file that makes up a model, as declared in the catalog manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelFile {
    #[serde(rename = "fileName", skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default = "ModelFile::default_type")]
    pub r#type: String,
    /// First-winner mirrors: the manager tries each url in order until one
    /// responds, rather than requiring all to be reachable.
    pub urls: Vec<String>,
}

impl ModelFile {
    fn default_type() -> String {
        "model".to_string()
    }

    /// The name to use on disk. Falls back to the last path segment of the
    /// first url when `file_name` is absent, matching what a manifest author
    /// expects for single-file models that omit it.
    pub fn resolved_file_name(&self) -> String {
        if let Some(name) = &self.file_name {
            return name.clone();
        }
        self.urls
            .first()
            .and_then(|u| u.rsplit('/').next())
            .unwrap_or("model.bin")
            .to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryPoint {
    pub r#type: String,
    pub value: String,
}

/// A catalog entry: immutable metadata about a model the ModelManager may
/// be asked to fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDefinition {
    pub id: String,
    pub runner: String,
    pub files: Vec<ModelFile>,
    #[serde(rename = "ramGB")]
    pub ram_gb: u32,
    pub backend: String,
    #[serde(rename = "entry_point", skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<EntryPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Root shape of both the catalog manifest and the local downloaded-models
/// metadata file (§6): `{"models": [...]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelManifest {
    pub models: Vec<ModelDefinition>,
}

/// Download/lifecycle state machine for a single model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModelStatus {
    Available,
    Downloading,
    Paused,
    Downloaded,
    Installing,
    Ready,
    Error,
}

/// Observable, per-model state. `ModelManager` is the sole writer; callers
/// only ever see a cloned snapshot (§5 copy-on-write policy).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelState {
    pub status: ModelStatus,
    /// 0..100
    pub progress: u8,
    /// Bytes per second, 0 when unknown or not downloading.
    pub speed: u64,
    /// Seconds remaining, -1 when unknown.
    pub eta: i64,
    pub storage_bytes: u64,
    pub category: Option<String>,
    pub is_default: bool,
    pub last_updated: DateTime<Utc>,
    pub error_message: Option<String>,
}

impl ModelState {
    pub fn available() -> Self {
        Self {
            status: ModelStatus::Available,
            progress: 0,
            speed: 0,
            eta: -1,
            storage_bytes: 0,
            category: None,
            is_default: false,
            last_updated: Utc::now(),
            error_message: None,
        }
    }
}
