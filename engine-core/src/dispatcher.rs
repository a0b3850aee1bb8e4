//! Orchestrates a single request end to end: Guardian gate -> select a
//! runner -> ensure the target model is on disk and loaded (with RAM-gated
//! eviction) -> run or stream (§4.7).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use engine_common::{
    Capability, EngineSettings, GuardianMode, InferenceRequest, InferenceResult, ModelStatus, RequestId,
    Runner, RunnerFault, ServiceState, SettingsStore, Strictness, Vendor,
};
use serde_json::{Map, Value};
use tokio::sync::{mpsc, RwLock};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info_span, warn, Instrument};

use crate::cancellation::{CancelHandle, CancellationRegistry};
use crate::catalog::ModelCatalog;
use crate::error::DispatchError;
use crate::guardian::{EffectiveGuardianConfig, GuardianOutcome, GuardianPipeline};
use crate::model_manager::ModelManager;
use crate::registry::Registry;
use crate::resource::ResourceMonitor;
use crate::selector::Selector;
use crate::status::StatusPublisher;

/// Tunable thresholds (§4.7.4, §5). Overridable for tests and for hosts
/// that want a stricter/looser gate.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// RAM headroom factor applied to a model's declared `ramGB` before
    /// deciding eviction is necessary (§4.7.4 step 3: `avail < 1.2 * required`).
    pub ram_headroom_factor: f64,
    /// Fallback RAM requirement when a model id isn't in the catalog.
    pub fallback_ram_gb: u32,
    /// How long to wait after evicting competitors for the OS to reclaim
    /// memory before re-probing (§4.7.4 step 3).
    pub eviction_wait: Duration,
    /// Pause after `unload()` to let native resources settle before the RAM
    /// gate and reload (§4.7.1 step 7).
    pub unload_settle: Duration,
    /// Hard upper bound on an inline (request-blocking) download (§4.7.1
    /// step 6, §5 "Timeouts").
    pub inline_download_timeout: Duration,
    /// Poll interval while waiting for an inline download to finish (§5
    /// suspension point (c): "inside the download polling loop (every 1s)").
    pub download_poll_interval: Duration,
    /// How often the stream relay loop re-checks the cancel flag when no
    /// item has arrived from the producer (§5 suspension point (d)).
    pub stream_poll_interval: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            ram_headroom_factor: 1.2,
            fallback_ram_gb: 2,
            eviction_wait: Duration::from_secs(2),
            unload_settle: Duration::from_millis(100),
            inline_download_timeout: Duration::from_secs(30 * 60),
            download_poll_interval: Duration::from_secs(1),
            stream_poll_interval: Duration::from_millis(200),
        }
    }
}

/// Outcome of the shared prelude (§4.7.1 steps 1-7 / §4.7.2's "same prelude
/// as 4.7.1 through step 7") that both entry points build on.
enum DispatchOutcome {
    Ready(Arc<dyn Runner>, InferenceRequest),
    Blocked(InferenceResult),
    Failed(DispatchError),
    Cancelled,
}

/// Orchestrates request processing. Owned as a singleton by the host for
/// the service's lifetime (§9 "Global state").
pub struct Dispatcher {
    registry: Arc<Registry>,
    catalog: Arc<ModelCatalog>,
    model_manager: Arc<ModelManager>,
    resource_monitor: Arc<dyn ResourceMonitor>,
    settings_store: Arc<dyn SettingsStore>,
    cancellation: Arc<CancellationRegistry>,
    status: Arc<StatusPublisher>,
    active_runners: RwLock<HashMap<String, Arc<dyn Runner>>>,
    active_count: AtomicU32,
    config: DispatcherConfig,
}

impl Dispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<Registry>,
        catalog: Arc<ModelCatalog>,
        model_manager: Arc<ModelManager>,
        resource_monitor: Arc<dyn ResourceMonitor>,
        settings_store: Arc<dyn SettingsStore>,
        cancellation: Arc<CancellationRegistry>,
        status: Arc<StatusPublisher>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            registry,
            catalog,
            model_manager,
            resource_monitor,
            settings_store,
            cancellation,
            status,
            active_runners: RwLock::new(HashMap::new()),
            active_count: AtomicU32::new(0),
            config,
        }
    }

    /// Lets an external caller (e.g. an IPC handler) cancel an in-flight
    /// request by id (§4.8).
    pub async fn cancel(&self, request_id: &RequestId) -> bool {
        self.cancellation.cancel(request_id).await
    }

    /// §4.7.1: Guardian -> select -> ensure model -> ensure loaded -> run.
    pub async fn process(
        &self,
        request: InferenceRequest,
        capability: Capability,
        preferred_runner: Option<&str>,
    ) -> InferenceResult {
        let request_id = Self::resolve_request_id(&request);
        let cancel = CancelHandle::new();
        self.cancellation.register(request_id.clone(), cancel.clone()).await;
        let _prev_active = self.begin_processing();

        let span = info_span!("dispatch.process", request_id = %request_id, %capability);
        let result = async {
            match self.prepare(&request, capability, preferred_runner, &cancel).await {
                DispatchOutcome::Ready(runner, enriched) => match runner.run(&enriched).await {
                    Ok(result) => result,
                    Err(fault) => DispatchError::runtime_error(fault.message).into_result(),
                },
                DispatchOutcome::Blocked(result) => result,
                DispatchOutcome::Failed(err) => {
                    self.status.publish(ServiceState::Error {
                        message: err.message.clone(),
                        recoverable: err.recoverable,
                    });
                    err.into_result()
                }
                DispatchOutcome::Cancelled => cancelled_result(),
            }
        }
        .instrument(span)
        .await;

        self.cancellation.unregister(&request_id).await;
        self.end_processing();
        result
    }

    /// §4.7.2: same prelude, then forwards the runner's stream until the
    /// terminal (`partial = false`) item, dropping the producer on
    /// cancellation.
    pub fn process_stream(
        self: &Arc<Self>,
        request: InferenceRequest,
        capability: Capability,
        preferred_runner: Option<String>,
    ) -> ReceiverStream<InferenceResult> {
        let (tx, rx) = mpsc::channel(16);
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            dispatcher
                .run_stream_task(request, capability, preferred_runner, tx)
                .await;
        });
        ReceiverStream::new(rx)
    }

    async fn run_stream_task(
        self: Arc<Self>,
        request: InferenceRequest,
        capability: Capability,
        preferred_runner: Option<String>,
        tx: mpsc::Sender<InferenceResult>,
    ) {
        let request_id = Self::resolve_request_id(&request);
        let cancel = CancelHandle::new();
        self.cancellation.register(request_id.clone(), cancel.clone()).await;
        self.begin_processing();

        let span = info_span!("dispatch.process_stream", request_id = %request_id, %capability);
        async {
            match self
                .prepare(&request, capability, preferred_runner.as_deref(), &cancel)
                .await
            {
                DispatchOutcome::Ready(runner, enriched) => {
                    self.relay_stream(runner, enriched, &cancel, &tx).await;
                }
                DispatchOutcome::Blocked(result) => {
                    let _ = tx.send(result).await;
                }
                DispatchOutcome::Failed(err) => {
                    let _ = tx.send(err.into_result()).await;
                }
                DispatchOutcome::Cancelled => {}
            }
        }
        .instrument(span)
        .await;

        self.cancellation.unregister(&request_id).await;
        self.end_processing();
    }

    /// Spawns the runner's own `run_stream` as a separate task (so it can
    /// be force-dropped with `JoinHandle::abort` on cancellation, matching
    /// §5's "the underlying runner's stream is dropped") and relays each
    /// item until the terminal one.
    async fn relay_stream(
        &self,
        runner: Arc<dyn Runner>,
        request: InferenceRequest,
        cancel: &CancelHandle,
        tx: &mpsc::Sender<InferenceResult>,
    ) {
        if runner.as_streaming().is_none() {
            let _ = tx
                .send(DispatchError::streaming_not_supported(&runner.info().name).into_result())
                .await;
            return;
        }

        let (inner_tx, mut inner_rx) = mpsc::channel::<Result<InferenceResult, RunnerFault>>(16);
        let producer_runner = Arc::clone(&runner);
        let producer = tokio::spawn(async move {
            if let Some(streaming) = producer_runner.as_streaming() {
                streaming.run_stream(&request, inner_tx).await;
            }
        });

        loop {
            if cancel.is_cancelled() {
                producer.abort();
                break;
            }
            match tokio::time::timeout(self.config.stream_poll_interval, inner_rx.recv()).await {
                Ok(Some(Ok(result))) => {
                    let terminal = !result.partial;
                    if tx.send(result).await.is_err() {
                        producer.abort();
                        break;
                    }
                    if terminal {
                        break;
                    }
                }
                Ok(Some(Err(fault))) => {
                    let _ = tx.send(DispatchError::runtime_error(fault.message).into_result()).await;
                    break;
                }
                Ok(None) => break,
                Err(_elapsed) => continue,
            }
        }
    }

    /// Shared prelude for both entry points (§4.7.1 steps 1-7 / §4.7.2).
    async fn prepare(
        &self,
        request: &InferenceRequest,
        capability: Capability,
        preferred_runner_name: Option<&str>,
        cancel: &CancelHandle,
    ) -> DispatchOutcome {
        if cancel.is_cancelled() {
            return DispatchOutcome::Cancelled;
        }

        let settings = self.settings_store.load_settings().await;

        if let Some(outcome) = self.check_guardian(request, &settings, cancel).await {
            return outcome;
        }

        if cancel.is_cancelled() {
            return DispatchOutcome::Cancelled;
        }

        // Selection (§4.2) is performed before model-id resolution
        // (§4.7.3), even though §4.7.1 numbers them the other way: §4.7.3's
        // "the runner is identified as cloud" check needs an identified
        // runner, and a model's catalog entry names a runner by string, not
        // an instance, so the two steps are swapped here (see DESIGN.md).
        let preferred = match preferred_runner_name {
            Some(name) => match self.registry.lookup(name).await {
                Some(r) => Some(r),
                None => return DispatchOutcome::Failed(DispatchError::runner_not_found(name)),
            },
            None => None,
        };
        let candidates = self.registry.list_for(capability).await;
        // No network-availability probe is specified by the core (§4.3
        // covers RAM only); assumed reachable unless a host wires one in
        // later (DESIGN.md Open Question).
        let network_available = true;
        let runner = match Selector::select(candidates, capability, preferred.as_ref(), network_available).await
        {
            Ok(r) => r,
            Err(e) => return DispatchOutcome::Failed(e.into()),
        };

        let model_id = self.resolve_effective_model(&runner, request, &settings);
        let enriched = request.with_resolved_model(&model_id);

        if cancel.is_cancelled() {
            return DispatchOutcome::Cancelled;
        }

        if !model_id.is_empty() {
            if let Err(e) = self.ensure_model_on_disk(&model_id, cancel).await {
                return DispatchOutcome::Failed(e);
            }
        }

        if cancel.is_cancelled() {
            return DispatchOutcome::Cancelled;
        }

        if let Err(e) = self
            .ensure_model_loaded(&runner, &model_id, &enriched, &settings)
            .await
        {
            return DispatchOutcome::Failed(e);
        }

        self.active_runners
            .write()
            .await
            .insert(runner.info().name.clone(), Arc::clone(&runner));

        DispatchOutcome::Ready(runner, enriched)
    }

    async fn check_guardian(
        &self,
        request: &InferenceRequest,
        settings: &EngineSettings,
        cancel: &CancelHandle,
    ) -> Option<DispatchOutcome> {
        let base = EffectiveGuardianConfig {
            mode: settings.guardian_config.mode.unwrap_or(GuardianMode::Disabled),
            strictness: settings.guardian_config.strictness.unwrap_or(Strictness::Medium),
        };
        let cfg = GuardianPipeline::effective_config(base, request);
        if !cfg.mode.checks_input() {
            return None;
        }
        if cancel.is_cancelled() {
            return Some(DispatchOutcome::Cancelled);
        }

        match self.registry.list_for(Capability::Guardian).await.into_iter().next() {
            Some(guardian_runner) => {
                let pipeline = GuardianPipeline::new(guardian_runner);
                match pipeline.check_input(request, cfg).await {
                    Ok(GuardianOutcome::Failed(analysis)) => {
                        Some(DispatchOutcome::Blocked(GuardianPipeline::blocked_result(&analysis)))
                    }
                    Ok(GuardianOutcome::Passed) => None,
                    Err(fault) => Some(DispatchOutcome::Failed(DispatchError::runtime_error(fault.message))),
                }
            }
            None => {
                warn!(
                    "guardian mode requires an input check but no GUARDIAN-capability runner is \
                     registered; failing open"
                );
                None
            }
        }
    }

    /// §4.7.3 effective model resolution, run against an already-selected
    /// runner (see `prepare`'s doc comment on the step swap).
    fn resolve_effective_model(
        &self,
        runner: &Arc<dyn Runner>,
        request: &InferenceRequest,
        settings: &EngineSettings,
    ) -> String {
        let info = runner.info();

        if let Some(requested) = request.model_override() {
            let requested = requested.trim();
            if !requested.is_empty() && (info.vendor == Vendor::Cloud || self.catalog.contains(requested)) {
                return requested.to_string();
            }
        }

        if let Some(configured) = settings.model_for_runner(&info.name) {
            if !configured.trim().is_empty() {
                return configured.to_string();
            }
        }

        if let Some(default_id) = &info.default_model_id {
            if self.catalog.contains(default_id) {
                return default_id.clone();
            }
        }

        if let Some(hinted) = self.catalog.hinted_default_for(&info.name) {
            return hinted.id.clone();
        }

        let compatible = self.catalog.compatible_with(&info.name);
        if info.vendor == Vendor::Cloud {
            if let Some(first) = compatible.first() {
                return first.id.clone();
            }
        } else if let Some(smallest) = compatible.iter().min_by_key(|m| m.ram_gb) {
            return smallest.id.clone();
        }

        String::new()
    }

    /// §4.7.1 step 6: block this request until the model is on disk, up to
    /// a 30-minute hard cap, polling once a second (§5 suspension point c).
    async fn ensure_model_on_disk(&self, model_id: &str, cancel: &CancelHandle) -> Result<(), DispatchError> {
        if self.catalog.get(model_id).is_none() {
            // Not a catalog entry (e.g. a cloud runner's intrinsic model
            // name) - nothing for the ModelManager to fetch.
            return Ok(());
        }

        let state = self.model_manager.get_state(model_id).await;
        if matches!(state.status, ModelStatus::Downloaded | ModelStatus::Ready) {
            return Ok(());
        }

        self.status.publish(ServiceState::Downloading {
            model_name: model_id.to_string(),
            pct: state.progress,
            total: None,
        });

        self.model_manager
            .download(model_id, None)
            .await
            .map_err(|e| DispatchError::model_download_failed(model_id, e.to_string()))?;

        let deadline = Instant::now() + self.config.inline_download_timeout;
        loop {
            if cancel.is_cancelled() {
                return Err(DispatchError::model_download_failed(model_id, "request cancelled"));
            }
            if Instant::now() >= deadline {
                return Err(DispatchError::model_download_failed(
                    model_id,
                    "inline download exceeded the 30 minute cap",
                ));
            }
            tokio::time::sleep(self.config.download_poll_interval).await;
            let state = self.model_manager.get_state(model_id).await;
            match state.status {
                ModelStatus::Downloaded | ModelStatus::Ready => {
                    self.status.publish(self.current_active_state());
                    return Ok(());
                }
                ModelStatus::Error => {
                    return Err(DispatchError::model_download_failed(
                        model_id,
                        state.error_message.unwrap_or_else(|| "download failed".to_string()),
                    ));
                }
                _ => {
                    self.status.publish(ServiceState::Downloading {
                        model_name: model_id.to_string(),
                        pct: state.progress,
                        total: None,
                    });
                }
            }
        }
    }

    /// §4.7.1 step 7: swap the loaded model if needed, enforcing the RAM
    /// gate (§4.7.4) for non-cloud runners first.
    async fn ensure_model_loaded(
        &self,
        runner: &Arc<dyn Runner>,
        model_id: &str,
        enriched: &InferenceRequest,
        settings: &EngineSettings,
    ) -> Result<(), DispatchError> {
        let already_loaded = runner.is_loaded().await;
        let loaded_id = runner.loaded_model_id().await;
        let matches_target = model_id.is_empty() || loaded_id.as_deref() == Some(model_id);
        if already_loaded && matches_target {
            return Ok(());
        }

        if already_loaded {
            if let Err(fault) = runner.unload().await {
                warn!(
                    runner = %runner.info().name,
                    error = %fault,
                    "failed to unload runner before reload; continuing"
                );
            }
            self.active_runners.write().await.remove(&runner.info().name);
            tokio::time::sleep(self.config.unload_settle).await;
        }

        if runner.info().vendor != Vendor::Cloud {
            self.enforce_ram_gate(runner, model_id).await?;
        }

        let mut overrides = settings
            .per_runner_parameters
            .get(&runner.info().name)
            .cloned()
            .unwrap_or_default();
        for (key, value) in enriched.params.iter() {
            overrides.insert(key.clone(), value.clone());
        }

        match runner.load(model_id, &overrides).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(DispatchError::model_load_failed(model_id, "runner declined to load")),
            Err(fault) => Err(DispatchError::model_load_failed(model_id, fault.message)),
        }
    }

    /// §4.7.4: skipped for cloud runners; otherwise evicts competing
    /// runners best-effort and re-probes once.
    async fn enforce_ram_gate(&self, candidate: &Arc<dyn Runner>, model_id: &str) -> Result<(), DispatchError> {
        let required = self
            .catalog
            .get(model_id)
            .map(|m| m.ram_gb)
            .unwrap_or(self.config.fallback_ram_gb);

        let available = self.resource_monitor.available_ram_gb().await;
        if available >= self.config.ram_headroom_factor * required as f64 {
            return Ok(());
        }

        let candidate_name = candidate.info().name.clone();
        let to_evict: Vec<Arc<dyn Runner>> = {
            let active = self.active_runners.read().await;
            active
                .values()
                .filter(|r| r.info().name != candidate_name)
                .cloned()
                .collect()
        };
        for runner in &to_evict {
            if runner.is_loaded().await {
                if let Err(fault) = runner.unload().await {
                    warn!(
                        runner = %runner.info().name,
                        error = %fault,
                        "eviction unload failed; continuing best-effort"
                    );
                }
            }
            self.active_runners.write().await.remove(&runner.info().name);
        }
        tokio::time::sleep(self.config.eviction_wait).await;

        let available = self.resource_monitor.available_ram_gb().await;
        if available < required as f64 {
            return Err(DispatchError::insufficient_resources(required, available));
        }
        Ok(())
    }

    fn begin_processing(&self) -> u32 {
        let prev = self.active_count.fetch_add(1, Ordering::SeqCst);
        self.status.publish(ServiceState::Processing { active: prev + 1 });
        prev
    }

    fn end_processing(&self) {
        let now = self.active_count.fetch_sub(1, Ordering::SeqCst) - 1;
        self.status.publish(if now == 0 {
            ServiceState::Ready
        } else {
            ServiceState::Processing { active: now }
        });
    }

    fn current_active_state(&self) -> ServiceState {
        let active = self.active_count.load(Ordering::SeqCst);
        if active == 0 {
            ServiceState::Ready
        } else {
            ServiceState::Processing { active }
        }
    }

    fn resolve_request_id(request: &InferenceRequest) -> RequestId {
        match &request.session_id {
            Some(id) if !id.is_empty() => RequestId(id.clone()),
            _ => RequestId::new(),
        }
    }
}

fn cancelled_result() -> InferenceResult {
    let mut metadata = Map::new();
    metadata.insert("cancelled".to_string(), Value::Bool(true));
    InferenceResult {
        outputs: Map::new(),
        metadata,
        partial: false,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use engine_common::{
        Capability, GuardianAction, GuardianAnalysis, GuardianCategory, GuardianStatus, ModelDefinition,
        ModelFile, ModelManifest, RunnerInfo, StreamingRunner,
    };

    use super::*;

    struct StubRunner {
        info: RunnerInfo,
        loaded: StdMutex<Option<String>>,
        run_outputs: Map<String, Value>,
        load_result: bool,
    }

    impl StubRunner {
        fn new(name: &str, capabilities: &[Capability], vendor: Vendor, priority: u32) -> Self {
            Self {
                info: RunnerInfo {
                    name: name.to_string(),
                    vendor,
                    requires_internet: vendor == Vendor::Cloud,
                    requires_special_hardware: false,
                    priority,
                    capabilities: capabilities.iter().copied().collect(),
                    default_model_id: None,
                },
                loaded: StdMutex::new(None),
                run_outputs: {
                    let mut m = Map::new();
                    m.insert("text".to_string(), Value::String("ok".to_string()));
                    m
                },
                load_result: true,
            }
        }

        fn preloaded(mut self, model_id: &str) -> Self {
            self.loaded = StdMutex::new(Some(model_id.to_string()));
            self
        }
    }

    #[async_trait]
    impl Runner for StubRunner {
        fn info(&self) -> &RunnerInfo {
            &self.info
        }

        async fn is_supported(&self) -> Result<bool, RunnerFault> {
            Ok(true)
        }

        async fn load(&self, model_id: &str, _overrides: &Map<String, Value>) -> Result<bool, RunnerFault> {
            *self.loaded.lock().unwrap() = Some(model_id.to_string());
            Ok(self.load_result)
        }

        async fn unload(&self) -> Result<(), RunnerFault> {
            *self.loaded.lock().unwrap() = None;
            Ok(())
        }

        async fn is_loaded(&self) -> bool {
            self.loaded.lock().unwrap().is_some()
        }

        async fn loaded_model_id(&self) -> Option<String> {
            self.loaded.lock().unwrap().clone()
        }

        async fn run(&self, _request: &InferenceRequest) -> Result<InferenceResult, RunnerFault> {
            Ok(InferenceResult::terminal(self.run_outputs.clone()))
        }
    }

    struct StreamingStubRunner(StubRunner);

    #[async_trait]
    impl Runner for StreamingStubRunner {
        fn info(&self) -> &RunnerInfo {
            self.0.info()
        }
        async fn is_supported(&self) -> Result<bool, RunnerFault> {
            self.0.is_supported().await
        }
        async fn load(&self, model_id: &str, overrides: &Map<String, Value>) -> Result<bool, RunnerFault> {
            self.0.load(model_id, overrides).await
        }
        async fn unload(&self) -> Result<(), RunnerFault> {
            self.0.unload().await
        }
        async fn is_loaded(&self) -> bool {
            self.0.is_loaded().await
        }
        async fn loaded_model_id(&self) -> Option<String> {
            self.0.loaded_model_id().await
        }
        async fn run(&self, request: &InferenceRequest) -> Result<InferenceResult, RunnerFault> {
            self.0.run(request).await
        }
        fn as_streaming(&self) -> Option<&dyn StreamingRunner> {
            Some(self)
        }
    }

    #[async_trait]
    impl StreamingRunner for StreamingStubRunner {
        async fn run_stream(
            &self,
            _request: &InferenceRequest,
            sink: mpsc::Sender<Result<InferenceResult, RunnerFault>>,
        ) {
            for i in 0..3 {
                let mut outputs = Map::new();
                outputs.insert("chunk".to_string(), Value::from(i));
                let _ = sink.send(Ok(InferenceResult::partial(outputs))).await;
            }
            let _ = sink.send(Ok(InferenceResult::terminal(Map::new()))).await;
        }
    }

    struct FixedResourceMonitor(std::sync::atomic::AtomicU64);

    impl FixedResourceMonitor {
        fn gb(value_gb_times_100: u64) -> Self {
            Self(std::sync::atomic::AtomicU64::new(value_gb_times_100))
        }
    }

    #[async_trait]
    impl ResourceMonitor for FixedResourceMonitor {
        async fn available_ram_gb(&self) -> f64 {
            self.0.load(Ordering::SeqCst) as f64 / 100.0
        }
    }

    struct StaticSettings(EngineSettings);

    #[async_trait]
    impl SettingsStore for StaticSettings {
        async fn load_settings(&self) -> EngineSettings {
            self.0.clone()
        }
        async fn save_settings(&self, _settings: EngineSettings) {}
    }

    fn model(id: &str, runner: &str, ram_gb: u32, base_url: &str) -> ModelDefinition {
        ModelDefinition {
            id: id.to_string(),
            runner: runner.to_string(),
            files: vec![ModelFile {
                file_name: Some("weights.bin".into()),
                group: None,
                pattern: None,
                r#type: "model".into(),
                urls: vec![format!("{base_url}/weights.bin")],
            }],
            ram_gb,
            backend: "ggml".into(),
            entry_point: None,
            name: None,
            version: None,
        }
    }

    /// A server that answers any GET with a small body, standing in for a
    /// model host so download-triggering tests never touch the network.
    async fn mock_model_server() -> wiremock::MockServer {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_bytes(vec![1u8; 64]))
            .mount(&server)
            .await;
        server
    }

    async fn build_dispatcher(
        catalog_models: Vec<ModelDefinition>,
        settings: EngineSettings,
        ram_gb: f64,
    ) -> (Arc<Dispatcher>, Arc<Registry>, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let catalog = Arc::new(ModelCatalog::from_manifest(ModelManifest { models: catalog_models }));
        let model_manager = Arc::new(ModelManager::new(
            Arc::clone(&catalog),
            tmp.path().join("models"),
            tmp.path().join("metadata.json"),
        ));
        let registry = Arc::new(Registry::new());
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&registry),
            catalog,
            model_manager,
            Arc::new(FixedResourceMonitor::gb((ram_gb * 100.0) as u64)),
            Arc::new(StaticSettings(settings)),
            Arc::new(CancellationRegistry::new()),
            Arc::new(StatusPublisher::new()),
            DispatcherConfig {
                eviction_wait: Duration::from_millis(5),
                unload_settle: Duration::from_millis(1),
                download_poll_interval: Duration::from_millis(5),
                stream_poll_interval: Duration::from_millis(5),
                ..DispatcherConfig::default()
            },
        ));
        (dispatcher, registry, tmp)
    }

    fn default_settings() -> EngineSettings {
        EngineSettings::default()
    }

    /// S1: a ready, already-loaded local runner answers without reload.
    #[tokio::test]
    async fn s1_happy_llm_uses_already_loaded_local_runner() {
        // No catalog models: the runner is already holding "m1", so nothing
        // needs to be resolved or fetched before the run.
        let (dispatcher, registry, _tmp) = build_dispatcher(vec![], default_settings(), 8.0).await;
        registry
            .register(Arc::new(
                StubRunner::new("local-llm", &[Capability::Llm], Vendor::LocalCpu, 10).preloaded("m1"),
            ))
            .await
            .unwrap();
        registry
            .register(Arc::new(StubRunner::new("cloud-llm", &[Capability::Llm], Vendor::Cloud, 20)))
            .await
            .unwrap();

        let mut request = InferenceRequest::default();
        request
            .inputs
            .insert("text".to_string(), Value::String("hi".to_string()));
        let result = dispatcher.process(request, Capability::Llm, None).await;

        assert!(!result.partial);
        assert!(result.error.is_none());
        assert_eq!(result.outputs.get("text"), Some(&Value::String("ok".to_string())));
    }

    /// S2: cold model triggers a load call before the run.
    #[tokio::test]
    async fn s2_cold_model_is_loaded_before_running() {
        let server = mock_model_server().await;
        let (dispatcher, registry, _tmp) = build_dispatcher(
            vec![model("m1", "local-llm", 2, &server.uri())],
            default_settings(),
            3.0,
        )
        .await;
        let runner = Arc::new(StubRunner::new("local-llm", &[Capability::Llm], Vendor::LocalCpu, 10));
        registry.register(runner.clone()).await.unwrap();

        let mut request = InferenceRequest::default();
        request
            .params
            .insert("model".to_string(), Value::String("m1".to_string()));
        let result = dispatcher.process(request, Capability::Llm, None).await;

        assert!(result.error.is_none());
        assert_eq!(runner.loaded_model_id().await, Some("m1".to_string()));
    }

    /// S3: insufficient RAM evicts the other loaded runner; if reclaim still
    /// isn't enough the call fails with INSUFFICIENT_RESOURCES.
    #[tokio::test]
    async fn s3_low_ram_evicts_other_active_runner() {
        let server = mock_model_server().await;
        let (dispatcher, registry, _tmp) = build_dispatcher(
            vec![
                model("ma", "runner-a", 3, &server.uri()),
                model("mb", "runner-b", 2, &server.uri()),
            ],
            default_settings(),
            1.0,
        )
        .await;
        let runner_a = Arc::new(StubRunner::new("runner-a", &[Capability::Llm], Vendor::LocalCpu, 10).preloaded("ma"));
        let runner_b = Arc::new(StubRunner::new("runner-b", &[Capability::Llm], Vendor::LocalCpu, 5));
        registry.register(runner_a.clone()).await.unwrap();
        registry.register(runner_b.clone()).await.unwrap();

        // Seed active_runners as if `runner_a` had been loaded by an
        // earlier request.
        dispatcher
            .active_runners
            .write()
            .await
            .insert("runner-a".to_string(), runner_a.clone());

        let mut request = InferenceRequest::default();
        request
            .params
            .insert("model".to_string(), Value::String("mb".to_string()));
        let result = dispatcher.process(request, Capability::Llm, None).await;

        // 1.0 GB available stays below `mb`'s 2 GB requirement even after
        // evicting `runner-a`, so the gate must fail.
        assert!(result.error.is_some());
        assert_eq!(result.error.unwrap().code, "INSUFFICIENT_RESOURCES");
        assert!(!runner_a.is_loaded().await);
    }

    /// S4: a blocked Guardian analysis short-circuits before any runner for
    /// the requested capability is invoked.
    #[tokio::test]
    async fn s4_guardian_block_short_circuits() {
        let mut settings = default_settings();
        settings.guardian_config.mode = Some(GuardianMode::InputOnly);
        let (dispatcher, registry, _tmp) = build_dispatcher(vec![], settings, 8.0).await;

        struct BlockingGuardian(RunnerInfo);
        #[async_trait]
        impl Runner for BlockingGuardian {
            fn info(&self) -> &RunnerInfo {
                &self.0
            }
            async fn is_supported(&self) -> Result<bool, RunnerFault> {
                Ok(true)
            }
            async fn load(&self, _: &str, _: &Map<String, Value>) -> Result<bool, RunnerFault> {
                Ok(true)
            }
            async fn unload(&self) -> Result<(), RunnerFault> {
                Ok(())
            }
            async fn is_loaded(&self) -> bool {
                true
            }
            async fn loaded_model_id(&self) -> Option<String> {
                None
            }
            async fn run(&self, _request: &InferenceRequest) -> Result<InferenceResult, RunnerFault> {
                let analysis = GuardianAnalysis {
                    status: GuardianStatus::Blocked,
                    risk_score: 0.9,
                    categories: [GuardianCategory::HateSpeech].into_iter().collect(),
                    action: GuardianAction::Block,
                    filtered_text: None,
                };
                let outputs = serde_json::to_value(&analysis).unwrap().as_object().unwrap().clone();
                Ok(InferenceResult::terminal(outputs))
            }
        }

        registry
            .register(Arc::new(BlockingGuardian(RunnerInfo {
                name: "guardian".into(),
                vendor: Vendor::LocalCpu,
                requires_internet: false,
                requires_special_hardware: false,
                priority: 0,
                capabilities: [Capability::Guardian].into_iter().collect(),
                default_model_id: None,
            })))
            .await
            .unwrap();
        registry
            .register(Arc::new(StubRunner::new("local-llm", &[Capability::Llm], Vendor::LocalCpu, 10)))
            .await
            .unwrap();

        let mut request = InferenceRequest::default();
        request
            .inputs
            .insert("text".to_string(), Value::String("be mean".to_string()));
        let result = dispatcher.process(request, Capability::Llm, None).await;

        assert!(result.error.is_none());
        assert_eq!(
            result.outputs.get("safety_status"),
            Some(&Value::String("BLOCKED".to_string()))
        );
        assert_eq!(
            result.outputs.get("risk_categories"),
            Some(&Value::Array(vec![serde_json::to_value(GuardianCategory::HateSpeech).unwrap()]))
        );
    }

    /// S5: cancellation mid-stream stops emissions and leaves no trace in
    /// the CancellationRegistry.
    #[tokio::test]
    async fn s5_stream_cancellation_stops_emissions() {
        let (dispatcher, registry, _tmp) = build_dispatcher(vec![], default_settings(), 8.0).await;
        registry
            .register(Arc::new(StreamingStubRunner(StubRunner::new(
                "local-llm",
                &[Capability::Llm],
                Vendor::LocalCpu,
                10,
            ))))
            .await
            .unwrap();

        let request_id = "s5-request".to_string();
        let mut request = InferenceRequest::default();
        request.session_id = Some(request_id.clone());

        let mut stream = dispatcher.clone().process_stream(request, Capability::Llm, None);
        use tokio_stream::StreamExt;

        let first = stream.next().await;
        assert!(first.is_some());

        assert!(dispatcher.cancel(&RequestId(request_id.clone())).await);

        // No further terminal item should ever arrive now that the cancel
        // flag is observed; draining what's left must end quickly.
        let drained = tokio::time::timeout(Duration::from_secs(2), async {
            let mut count = 0;
            while stream.next().await.is_some() {
                count += 1;
            }
            count
        })
        .await
        .unwrap();
        assert!(drained <= 3);

        assert!(!dispatcher.cancellation.contains(&RequestId(request_id)).await);
    }
}
