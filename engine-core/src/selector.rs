//! Priority-based runner selection (§4.2).

use std::sync::Arc;

use engine_common::{Capability, DispatchErrorCode, Runner, Vendor};

#[derive(Debug, thiserror::Error)]
pub enum SelectorError {
    #[error("no runner named '{0}' is registered")]
    RunnerNotFound(String),
    #[error("no registered runner supports capability {0}")]
    CapabilityNotSupported(Capability),
    #[error("the selected runner cannot operate on this hardware")]
    HardwareNotSupported,
}

impl SelectorError {
    pub fn code(&self) -> DispatchErrorCode {
        match self {
            SelectorError::RunnerNotFound(_) => DispatchErrorCode::RunnerNotFound,
            SelectorError::CapabilityNotSupported(_) => DispatchErrorCode::CapabilityNotSupported,
            SelectorError::HardwareNotSupported => DispatchErrorCode::HardwareNotSupported,
        }
    }
}

/// Fixed vendor rank table (§4.2: "LLM: local-accelerator < local-CPU <
/// cloud < unknown"). Applied uniformly across capabilities; ties break by
/// registration order, which is preserved by `Registry::list_for`.
fn vendor_rank(vendor: Vendor) -> u8 {
    match vendor {
        Vendor::LocalAccelerator => 0,
        Vendor::LocalCpu => 1,
        Vendor::Cloud => 2,
        Vendor::Unknown => 3,
    }
}

pub struct Selector;

impl Selector {
    /// Picks the best runner for `capability` out of `candidates`, which
    /// must already be in registration order. `preferred_runner` bypasses
    /// ranking entirely when present (§4.2 step 1). `network_available`
    /// gates runners that declare `requires_internet`.
    pub async fn select(
        candidates: Vec<Arc<dyn Runner>>,
        capability: Capability,
        preferred_runner: Option<&Arc<dyn Runner>>,
        network_available: bool,
    ) -> Result<Arc<dyn Runner>, SelectorError> {
        if let Some(preferred) = preferred_runner {
            return Self::check_supported(Arc::clone(preferred), capability).await;
        }

        if candidates.is_empty() {
            return Err(SelectorError::CapabilityNotSupported(capability));
        }

        let mut ranked = candidates;
        ranked.sort_by(|a, b| {
            let ia = a.info();
            let ib = b.info();
            ia.priority
                .cmp(&ib.priority)
                .then_with(|| vendor_rank(ia.vendor).cmp(&vendor_rank(ib.vendor)))
        });

        for runner in ranked {
            let info = runner.info();
            if info.requires_internet && !network_available {
                continue;
            }
            match runner.is_supported().await {
                // An explicit `false` is authoritative; keep looking.
                Ok(false) => continue,
                // `Ok(true)` or a faulting probe are both treated as supported
                // (fail-safe rule, §4.2 step 3).
                Ok(true) | Err(_) => return Ok(runner),
            }
        }

        Err(SelectorError::HardwareNotSupported)
    }

    async fn check_supported(
        runner: Arc<dyn Runner>,
        capability: Capability,
    ) -> Result<Arc<dyn Runner>, SelectorError> {
        if !runner.info().supports(capability) {
            return Err(SelectorError::CapabilityNotSupported(capability));
        }
        match runner.is_supported().await {
            Ok(false) => Err(SelectorError::HardwareNotSupported),
            Ok(true) | Err(_) => Ok(runner),
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use engine_common::{InferenceRequest, InferenceResult, RunnerFault, RunnerInfo};

    use super::*;

    struct StubRunner {
        info: RunnerInfo,
        supported: Result<bool, ()>,
    }

    #[async_trait]
    impl Runner for StubRunner {
        fn info(&self) -> &RunnerInfo {
            &self.info
        }

        async fn is_supported(&self) -> Result<bool, RunnerFault> {
            match self.supported {
                Ok(b) => Ok(b),
                Err(()) => Err(RunnerFault::new("probe faulted")),
            }
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

    fn runner(
        name: &str,
        priority: u32,
        vendor: Vendor,
        requires_internet: bool,
        supported: Result<bool, ()>,
    ) -> Arc<dyn Runner> {
        Arc::new(StubRunner {
            info: RunnerInfo {
                name: name.to_string(),
                vendor,
                requires_internet,
                requires_special_hardware: false,
                priority,
                capabilities: [Capability::Llm].into_iter().collect(),
                default_model_id: None,
            },
            supported,
        })
    }

    #[tokio::test]
    async fn picks_lowest_priority_supported_runner() {
        let local = runner("local", 10, Vendor::LocalAccelerator, false, Ok(true));
        let cloud = runner("cloud", 20, Vendor::Cloud, true, Ok(true));
        let picked = Selector::select(vec![cloud, local], Capability::Llm, None, true)
            .await
            .unwrap();
        assert_eq!(picked.info().name, "local");
    }

    #[tokio::test]
    async fn breaks_priority_ties_by_vendor_rank() {
        let cpu = runner("cpu", 10, Vendor::LocalCpu, false, Ok(true));
        let accel = runner("accel", 10, Vendor::LocalAccelerator, false, Ok(true));
        let picked = Selector::select(vec![cpu, accel], Capability::Llm, None, true)
            .await
            .unwrap();
        assert_eq!(picked.info().name, "accel");
    }

    #[tokio::test]
    async fn explicit_unsupported_is_skipped_but_faulting_probe_is_fail_safe() {
        let unsupported = runner("unsupported", 5, Vendor::LocalAccelerator, false, Ok(false));
        let faulting = runner("faulting", 10, Vendor::LocalCpu, false, Err(()));
        let picked = Selector::select(vec![unsupported, faulting], Capability::Llm, None, true)
            .await
            .unwrap();
        assert_eq!(picked.info().name, "faulting");
    }

    #[tokio::test]
    async fn runner_requiring_internet_is_skipped_when_network_unavailable() {
        let cloud_only = runner("cloud", 5, Vendor::Cloud, true, Ok(true));
        let local = runner("local", 10, Vendor::LocalCpu, false, Ok(true));
        let picked = Selector::select(vec![cloud_only, local], Capability::Llm, None, false)
            .await
            .unwrap();
        assert_eq!(picked.info().name, "local");
    }

    #[tokio::test]
    async fn empty_candidates_yields_capability_not_supported() {
        let err = Selector::select(vec![], Capability::Llm, None, true)
            .await
            .unwrap_err();
        assert!(matches!(err, SelectorError::CapabilityNotSupported(_)));
    }

    #[tokio::test]
    async fn preferred_runner_not_declaring_capability_is_rejected() {
        // `runner(...)` only ever declares `Capability::Llm`; asking the
        // selector for `Vlm` against it must fail regardless of ranking.
        let llm_only = runner("llm-runner", 10, Vendor::LocalCpu, false, Ok(true));
        let err = Selector::select(vec![], Capability::Vlm, Some(&llm_only), true)
            .await
            .unwrap_err();
        assert!(matches!(err, SelectorError::CapabilityNotSupported(_)));
    }

    #[tokio::test]
    async fn no_candidate_passes_yields_hardware_not_supported() {
        let r = runner("r", 10, Vendor::LocalCpu, false, Ok(false));
        let err = Selector::select(vec![r], Capability::Llm, None, true)
            .await
            .unwrap_err();
        assert!(matches!(err, SelectorError::HardwareNotSupported));
    }
}
