//! Per-model download state machine: sequential multi-file fetches,
//! validation, deletion, and progress reporting (§4.5).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use engine_common::{ModelDefinition, ModelManifest, ModelState, ModelStatus};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::catalog::ModelCatalog;

#[derive(Debug, thiserror::Error)]
pub enum ModelManagerError {
    #[error("model '{0}' is not in the catalog")]
    UnknownModel(String),
    #[error("download failed for model '{model}', file '{file}': {cause}")]
    DownloadFailed {
        model: String,
        file: String,
        cause: String,
    },
    #[error("validation failed for model '{0}': a declared file is missing after download")]
    ValidationFailed(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Observer for a single download job. All methods have default no-op
/// bodies so callers only implement the events they care about.
pub trait DownloadListener: Send + Sync {
    fn on_start(&self, _model_id: &str) {}
    fn on_file_progress(&self, _model_id: &str, _progress: &FileProgress) {}
    fn on_file_completed(&self, _model_id: &str, _file_name: &str) {}
    fn on_completed(&self, _model_id: &str) {}
    fn on_error(&self, _model_id: &str, _cause: &str, _file_name: &str) {}
    fn on_cancelled(&self, _model_id: &str) {}
}

#[derive(Debug, Clone)]
pub struct FileProgress {
    pub file_name: String,
    pub downloaded_bytes: u64,
    pub total_bytes: Option<u64>,
    pub speed_bytes_per_sec: u64,
    /// Seconds remaining, or `-1` when `total_bytes` is unknown.
    pub eta_secs: i64,
}

/// A handle to an in-flight or completed download, returned by
/// [`ModelManager::download`]. Cheap to clone; cancelling/pausing any
/// clone affects the same underlying job.
#[derive(Clone)]
pub struct DownloadHandle {
    cancel: Arc<AtomicBool>,
    pause: Arc<AtomicBool>,
}

impl DownloadHandle {
    fn new() -> Self {
        Self {
            cancel: Arc::new(AtomicBool::new(false)),
            pause: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn pause(&self) {
        self.pause.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.pause.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.pause.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CleanupReport {
    pub space_freed: u64,
    pub temp_files_removed: u32,
    pub models_cleaned_up: u32,
}

/// Owns `models_dir` on disk, the local metadata file, the observable
/// `model_states` map, and the in-flight `downloads` map. The only writer
/// of `model_states` is this type (§4.5 concurrency note: copy-on-write
/// snapshots through a single writer path).
pub struct ModelManager {
    catalog: Arc<ModelCatalog>,
    models_dir: PathBuf,
    metadata_file: PathBuf,
    http_client: reqwest::Client,
    chunk_size: usize,
    model_states: RwLock<HashMap<String, ModelState>>,
    downloads: RwLock<HashMap<String, DownloadHandle>>,
}

impl ModelManager {
    pub fn new(catalog: Arc<ModelCatalog>, models_dir: PathBuf, metadata_file: PathBuf) -> Self {
        Self {
            catalog,
            models_dir,
            metadata_file,
            http_client: reqwest::Client::new(),
            chunk_size: 64 * 1024,
            model_states: RwLock::new(HashMap::new()),
            downloads: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get_state(&self, id: &str) -> ModelState {
        self.model_states
            .read()
            .await
            .get(id)
            .cloned()
            .unwrap_or_else(ModelState::available)
    }

    pub async fn get_models_by_category(&self) -> HashMap<Option<String>, Vec<String>> {
        let states = self.model_states.read().await;
        let mut by_category: HashMap<Option<String>, Vec<String>> = HashMap::new();
        for model in self.catalog.all() {
            let state = states.get(&model.id);
            let category = state.and_then(|s| s.category.clone());
            by_category.entry(category).or_default().push(model.id.clone());
        }
        by_category
    }

    pub async fn get_default(&self, category: &str) -> Option<String> {
        let states = self.model_states.read().await;
        states
            .iter()
            .find(|(_, state)| state.is_default && state.category.as_deref() == Some(category))
            .map(|(id, _)| id.clone())
    }

    fn model_dir(&self, model_id: &str) -> PathBuf {
        self.models_dir.join(model_id)
    }

    /// Starts an asynchronous download job; idempotent if the model is
    /// already `DOWNLOADING` (returns the existing handle, §8 idempotence).
    pub async fn download(
        self: &Arc<Self>,
        model_id: &str,
        listener: Option<Arc<dyn DownloadListener>>,
    ) -> Result<DownloadHandle, ModelManagerError> {
        let definition = self
            .catalog
            .get(model_id)
            .cloned()
            .ok_or_else(|| ModelManagerError::UnknownModel(model_id.to_string()))?;

        {
            let downloads = self.downloads.read().await;
            if let Some(existing) = downloads.get(model_id) {
                if !existing.is_cancelled() {
                    return Ok(existing.clone());
                }
            }
        }

        let handle = DownloadHandle::new();
        {
            let mut downloads = self.downloads.write().await;
            downloads.insert(model_id.to_string(), handle.clone());
        }

        self.set_state(model_id, |s| {
            s.status = ModelStatus::Downloading;
            s.progress = 0;
            s.error_message = None;
        })
        .await;
        if let Some(l) = &listener {
            l.on_start(model_id);
        }

        let manager = Arc::clone(self);
        let model_id_owned = model_id.to_string();
        let job_handle = handle.clone();
        tokio::spawn(async move {
            manager
                .run_download_job(&model_id_owned, &definition, job_handle, listener)
                .await;
        });

        Ok(handle)
    }

    /// If `category`'s default is already `DOWNLOADED`/`READY`, notifies
    /// completion immediately; otherwise kicks off its download (§4.5).
    pub async fn ensure_default_ready(
        self: &Arc<Self>,
        category: &str,
        listener: Option<Arc<dyn DownloadListener>>,
    ) -> Result<(), ModelManagerError> {
        let Some(default_id) = self.get_default(category).await else {
            return Ok(());
        };
        let state = self.get_state(&default_id).await;
        if matches!(state.status, ModelStatus::Downloaded | ModelStatus::Ready) {
            if let Some(l) = &listener {
                l.on_completed(&default_id);
            }
            return Ok(());
        }
        self.download(&default_id, listener).await?;
        Ok(())
    }

    async fn run_download_job(
        self: Arc<Self>,
        model_id: &str,
        definition: &ModelDefinition,
        handle: DownloadHandle,
        listener: Option<Arc<dyn DownloadListener>>,
    ) {
        let dir = self.model_dir(model_id);
        if let Err(e) = tokio::fs::create_dir_all(&dir).await {
            self.fail_download(model_id, &handle, &listener, &e.to_string(), "").await;
            return;
        }

        for file in &definition.files {
            let file_name = file.resolved_file_name();
            if handle.is_cancelled() {
                self.cancel_download(model_id, &dir, &handle, &listener).await;
                return;
            }
            match self
                .download_one_file(model_id, &dir, &file_name, &file.urls, &handle, &listener)
                .await
            {
                Ok(true) => {
                    if let Some(l) = &listener {
                        l.on_file_completed(model_id, &file_name);
                    }
                }
                Ok(false) => {
                    // cancelled mid-file; cleanup already performed by the
                    // chunk loop.
                    self.cancel_download(model_id, &dir, &handle, &listener).await;
                    return;
                }
                Err(cause) => {
                    self.fail_download(model_id, &handle, &listener, &cause, &file_name).await;
                    return;
                }
            }
        }

        // Step 5: validate every declared file exists.
        let missing = definition
            .files
            .iter()
            .find(|f| !dir.join(f.resolved_file_name()).exists());
        if let Some(missing) = missing {
            self.fail_download(
                model_id,
                &handle,
                &listener,
                "Validation failed",
                &missing.resolved_file_name(),
            )
            .await;
            return;
        }

        if let Err(e) = self.persist_metadata().await {
            warn!(model_id, error = %e, "failed to persist model manifest metadata");
        }

        self.set_state(model_id, |s| {
            s.status = ModelStatus::Downloaded;
            s.progress = 100;
            s.last_updated = chrono::Utc::now();
        })
        .await;
        self.downloads.write().await.remove(model_id);
        if let Some(l) = &listener {
            l.on_completed(model_id);
        }
        info!(model_id, "model download completed");
    }

    /// Returns `Ok(true)` on success, `Ok(false)` if cancelled mid-file,
    /// `Err(cause)` on a network/IO failure (§4.5 step 2-4).
    async fn download_one_file(
        &self,
        model_id: &str,
        dir: &Path,
        file_name: &str,
        urls: &[String],
        handle: &DownloadHandle,
        listener: &Option<Arc<dyn DownloadListener>>,
    ) -> Result<bool, String> {
        let final_path = dir.join(file_name);
        if final_path.exists() {
            return Ok(true);
        }
        let part_path = dir.join(format!("{file_name}.part"));

        let url = urls.first().ok_or("no urls declared for file")?;
        let existing_size = tokio::fs::metadata(&part_path)
            .await
            .map(|m| m.len())
            .unwrap_or(0);

        let mut request = self.http_client.get(url);
        if existing_size > 0 {
            request = request.header("Range", format!("bytes={existing_size}-"));
        }
        let response = request.send().await.map_err(|e| e.to_string())?;
        let resuming = existing_size > 0 && response.status().as_u16() == 206;

        let total_bytes = response
            .content_length()
            .map(|len| if resuming { len + existing_size } else { len });

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .append(resuming)
            .truncate(!resuming)
            .open(&part_path)
            .await
            .map_err(|e| e.to_string())?;

        let mut downloaded = if resuming { existing_size } else { 0 };
        let mut last_emit = Instant::now();
        let mut bytes_since_last_emit = 0u64;
        let mut stream = response.bytes_stream();

        use futures_util::StreamExt;
        while let Some(chunk) = stream.next().await {
            if handle.is_cancelled() {
                drop(file);
                let _ = tokio::fs::remove_file(&part_path).await;
                return Ok(false);
            }
            while handle.is_paused() {
                if handle.is_cancelled() {
                    drop(file);
                    let _ = tokio::fs::remove_file(&part_path).await;
                    return Ok(false);
                }
                tokio::time::sleep(Duration::from_millis(200)).await;
            }

            let chunk = chunk.map_err(|e| e.to_string())?;
            file.write_all(&chunk).await.map_err(|e| e.to_string())?;
            downloaded += chunk.len() as u64;
            bytes_since_last_emit += chunk.len() as u64;

            let elapsed = last_emit.elapsed();
            if elapsed >= Duration::from_millis(500) {
                let speed = (bytes_since_last_emit as f64 / elapsed.as_secs_f64().max(0.001)) as u64;
                let eta = match total_bytes {
                    Some(total) if speed > 0 => ((total.saturating_sub(downloaded)) / speed) as i64,
                    _ => -1,
                };
                let progress = FileProgress {
                    file_name: file_name.to_string(),
                    downloaded_bytes: downloaded,
                    total_bytes,
                    speed_bytes_per_sec: speed,
                    eta_secs: eta,
                };
                if let Some(l) = listener {
                    l.on_file_progress(model_id, &progress);
                }
                let pct = total_bytes
                    .map(|t| ((downloaded as f64 / t as f64) * 100.0) as u8)
                    .unwrap_or(0);
                self.set_state(model_id, |s| {
                    s.progress = pct;
                    s.speed = speed;
                    s.eta = eta;
                })
                .await;
                last_emit = Instant::now();
                bytes_since_last_emit = 0;
            }
        }

        file.flush().await.map_err(|e| e.to_string())?;
        drop(file);
        tokio::fs::rename(&part_path, &final_path)
            .await
            .map_err(|e| e.to_string())?;
        Ok(true)
    }

    async fn cancel_download(
        &self,
        model_id: &str,
        _dir: &Path,
        handle: &DownloadHandle,
        listener: &Option<Arc<dyn DownloadListener>>,
    ) {
        let _ = handle;
        self.set_state(model_id, |s| {
            s.status = ModelStatus::Available;
            s.progress = 0;
        })
        .await;
        self.downloads.write().await.remove(model_id);
        if let Some(l) = listener {
            l.on_cancelled(model_id);
        }
    }

    async fn fail_download(
        &self,
        model_id: &str,
        _handle: &DownloadHandle,
        listener: &Option<Arc<dyn DownloadListener>>,
        cause: &str,
        file_name: &str,
    ) {
        self.set_state(model_id, |s| {
            s.status = ModelStatus::Error;
            s.error_message = Some(cause.to_string());
        })
        .await;
        self.downloads.write().await.remove(model_id);
        if let Some(l) = listener {
            l.on_error(model_id, cause, file_name);
        }
        warn!(model_id, cause, file_name, "model download failed");
    }

    /// Cancels any in-flight job, removes on-disk files, updates metadata.
    pub async fn delete(&self, model_id: &str) -> Result<bool, ModelManagerError> {
        if let Some(handle) = self.downloads.read().await.get(model_id) {
            handle.cancel();
        }
        let dir = self.model_dir(model_id);
        if dir.exists() {
            tokio::fs::remove_dir_all(&dir).await?;
        }
        self.set_state(model_id, |s| {
            *s = ModelState::available();
        })
        .await;
        self.persist_metadata().await?;
        Ok(true)
    }

    /// Removes stray `.part` files and model directories with no catalog
    /// entry.
    pub async fn cleanup_storage(&self) -> Result<CleanupReport, ModelManagerError> {
        let mut report = CleanupReport::default();
        let mut entries = match tokio::fs::read_dir(&self.models_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(report),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let id = entry.file_name().to_string_lossy().to_string();
            if self.catalog.get(&id).is_none() {
                let size = dir_size(&path).await.unwrap_or(0);
                tokio::fs::remove_dir_all(&path).await?;
                report.space_freed += size;
                report.models_cleaned_up += 1;
                continue;
            }
            let mut files = tokio::fs::read_dir(&path).await?;
            while let Some(file) = files.next_entry().await? {
                let file_path = file.path();
                if file_path.extension().and_then(|e| e.to_str()) == Some("part") {
                    let size = tokio::fs::metadata(&file_path).await.map(|m| m.len()).unwrap_or(0);
                    tokio::fs::remove_file(&file_path).await?;
                    report.space_freed += size;
                    report.temp_files_removed += 1;
                }
            }
        }
        Ok(report)
    }

    async fn set_state(&self, model_id: &str, mutate: impl FnOnce(&mut ModelState)) {
        let mut states = self.model_states.write().await;
        let entry = states.entry(model_id.to_string()).or_insert_with(ModelState::available);
        mutate(entry);
        entry.last_updated = chrono::Utc::now();
    }

    async fn persist_metadata(&self) -> std::io::Result<()> {
        let states = self.model_states.read().await;
        let downloaded: Vec<ModelDefinition> = self
            .catalog
            .all()
            .iter()
            .filter(|m| {
                states
                    .get(&m.id)
                    .is_some_and(|s| matches!(s.status, ModelStatus::Downloaded | ModelStatus::Ready))
            })
            .cloned()
            .collect();
        let manifest = ModelManifest { models: downloaded };
        let json = serde_json::to_string_pretty(&manifest)?;
        if let Some(parent) = self.metadata_file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.metadata_file, json).await
    }
}

async fn dir_size(path: &Path) -> std::io::Result<u64> {
    let mut total = 0u64;
    let mut entries = tokio::fs::read_dir(path).await?;
    while let Some(entry) = entries.next_entry().await? {
        if let Ok(metadata) = entry.metadata().await {
            total += metadata.len();
        }
    }
    Ok(total)
}
