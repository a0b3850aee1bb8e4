//! Thread-safe store of runners indexed by name and capability (§4.1).

use std::collections::HashMap;
use std::sync::Arc;

use engine_common::{Capability, Runner};
use tokio::sync::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("runner '{0}' exposes no capabilities")]
    NoCapabilities(String),
}

/// The two indexes, folded under a single lock (§4.1: "a single
/// readers-writer lock") so a reader can never observe one index updated
/// and the other stale mid-`register`/`unregister`.
#[derive(Default)]
struct RegistryInner {
    by_name: HashMap<String, Arc<dyn Runner>>,
    by_capability: HashMap<Capability, Vec<Arc<dyn Runner>>>,
}

/// Stores runners in two indexes: `by_name` (unique) and `by_capability`
/// (ordered by registration). Read operations take a shared read lock and
/// run concurrently; registration/removal take an exclusive write lock.
pub struct Registry {
    inner: RwLock<RegistryInner>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry").field("inner", &"<RwLock<...>>").finish()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
        }
    }

    /// Rejects a runner that declares no capabilities (§4.1).
    pub async fn register(&self, runner: Arc<dyn Runner>) -> Result<(), RegistryError> {
        let info = runner.info();
        if info.capabilities.is_empty() {
            return Err(RegistryError::NoCapabilities(info.name.clone()));
        }
        let name = info.name.clone();
        let capabilities: Vec<Capability> = info.capabilities.iter().copied().collect();

        let mut inner = self.inner.write().await;
        inner.by_name.insert(name, Arc::clone(&runner));
        for cap in capabilities {
            inner.by_capability.entry(cap).or_default().push(Arc::clone(&runner));
        }
        Ok(())
    }

    pub async fn unregister(&self, name: &str) -> bool {
        let mut inner = self.inner.write().await;
        let Some(runner) = inner.by_name.remove(name) else {
            return false;
        };
        for runners in inner.by_capability.values_mut() {
            runners.retain(|r| r.info().name != runner.info().name);
        }
        true
    }

    pub async fn lookup(&self, name: &str) -> Option<Arc<dyn Runner>> {
        self.inner.read().await.by_name.get(name).cloned()
    }

    /// Runners for `capability`, in registration order.
    pub async fn list_for(&self, capability: Capability) -> Vec<Arc<dyn Runner>> {
        self.inner
            .read()
            .await
            .by_capability
            .get(&capability)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn all(&self) -> Vec<Arc<dyn Runner>> {
        self.inner.read().await.by_name.values().cloned().collect()
    }

    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.by_name.clear();
        inner.by_capability.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use async_trait::async_trait;
    use engine_common::{InferenceRequest, InferenceResult, RunnerFault, RunnerInfo, Vendor};

    use super::*;

    struct StubRunner {
        info: RunnerInfo,
    }

    #[async_trait]
    impl Runner for StubRunner {
        fn info(&self) -> &RunnerInfo {
            &self.info
        }

        async fn is_supported(&self) -> Result<bool, RunnerFault> {
            Ok(true)
        }

        async fn load(
            &self,
            _model_id: &str,
            _overrides: &serde_json::Map<String, serde_json::Value>,
        ) -> Result<bool, RunnerFault> {
            Ok(true)
        }

        async fn unload(&self) -> Result<(), RunnerFault> {
            Ok(())
        }

        async fn is_loaded(&self) -> bool {
            false
        }

        async fn loaded_model_id(&self) -> Option<String> {
            None
        }

        async fn run(&self, _request: &InferenceRequest) -> Result<InferenceResult, RunnerFault> {
            Ok(InferenceResult::terminal(serde_json::Map::new()))
        }
    }

    fn stub(name: &str, capabilities: &[Capability]) -> Arc<dyn Runner> {
        Arc::new(StubRunner {
            info: RunnerInfo {
                name: name.to_string(),
                vendor: Vendor::LocalCpu,
                requires_internet: false,
                requires_special_hardware: false,
                priority: 10,
                capabilities: capabilities.iter().copied().collect(),
                default_model_id: None,
            },
        })
    }

    #[tokio::test]
    async fn registering_with_no_capabilities_is_rejected() {
        let registry = Registry::new();
        let runner = stub("empty", &[]);
        let err = registry.register(runner).await.unwrap_err();
        assert!(matches!(err, RegistryError::NoCapabilities(_)));
    }

    #[tokio::test]
    async fn list_for_contains_runner_iff_it_declares_the_capability() {
        let registry = Registry::new();
        registry
            .register(stub("local-llm", &[Capability::Llm]))
            .await
            .unwrap();
        registry
            .register(stub("local-vlm", &[Capability::Vlm]))
            .await
            .unwrap();

        let llm_runners = registry.list_for(Capability::Llm).await;
        assert_eq!(llm_runners.len(), 1);
        assert_eq!(llm_runners[0].info().name, "local-llm");

        let vlm_runners = registry.list_for(Capability::Vlm).await;
        assert_eq!(vlm_runners.len(), 1);

        let asr_runners = registry.list_for(Capability::Asr).await;
        assert!(asr_runners.is_empty());
    }

    #[tokio::test]
    async fn unregister_removes_from_both_indexes() {
        let registry = Registry::new();
        registry
            .register(stub("local-llm", &[Capability::Llm]))
            .await
            .unwrap();

        assert!(registry.unregister("local-llm").await);
        assert!(registry.lookup("local-llm").await.is_none());
        assert!(registry.list_for(Capability::Llm).await.is_empty());
        assert!(!registry.unregister("local-llm").await);
    }

    #[tokio::test]
    async fn clear_empties_both_indexes() {
        let registry = Registry::new();
        registry
            .register(stub("local-llm", &[Capability::Llm]))
            .await
            .unwrap();
        registry.clear().await;
        assert!(registry.all().await.is_empty());
        assert!(registry.list_for(Capability::Llm).await.is_empty());
    }

    #[allow(dead_code)]
    fn assert_capability_set_nonempty(set: &BTreeSet<Capability>) {
        assert!(!set.is_empty());
    }
}
