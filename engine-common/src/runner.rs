//! The Runner contract: the boundary between the dispatcher core and a
//! concrete inference backend (local accelerator, local CPU, cloud API).

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::capability::Capability;
use crate::request::{InferenceRequest, InferenceResult};

/// A fixed vendor class. Used only to break ties in the Selector's vendor
/// rank table (§4.2) - it carries no behavior of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vendor {
    LocalAccelerator,
    LocalCpu,
    Cloud,
    Unknown,
}

/// Immutable metadata describing a registered runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerInfo {
    pub name: String,
    pub vendor: Vendor,
    pub requires_internet: bool,
    pub requires_special_hardware: bool,
    /// Smaller is higher priority.
    pub priority: u32,
    pub capabilities: BTreeSet<Capability>,
    pub default_model_id: Option<String>,
}

impl RunnerInfo {
    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// A concrete inference backend. Implementors must make `load`/`unload`
/// idempotent and `is_loaded`/`loaded_model_id` cheap to query - the
/// Dispatcher calls them on every request.
#[async_trait]
pub trait Runner: Send + Sync {
    fn info(&self) -> &RunnerInfo;

    fn capabilities(&self) -> &BTreeSet<Capability> {
        &self.info().capabilities
    }

    /// Whether this runner can currently operate (hardware present, driver
    /// loaded, etc). An error here is treated as "assume supported" - only
    /// an explicit `Ok(false)` is authoritative (§4.2 fail-safe rule).
    async fn is_supported(&self) -> Result<bool, RunnerFault>;

    async fn load(
        &self,
        model_id: &str,
        overrides: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<bool, RunnerFault>;

    async fn unload(&self) -> Result<(), RunnerFault>;

    async fn is_loaded(&self) -> bool;

    async fn loaded_model_id(&self) -> Option<String>;

    async fn run(&self, request: &InferenceRequest) -> Result<InferenceResult, RunnerFault>;

    /// Returns a streaming view of this runner when it also implements
    /// [`StreamingRunner`], `None` otherwise. A concrete streaming impl
    /// overrides this to return `Some(self)`; the Dispatcher tests for the
    /// marker at runtime through this method rather than downcasting
    /// (§9 Design Notes).
    fn as_streaming(&self) -> Option<&dyn StreamingRunner> {
        None
    }
}

/// Marker trait for runners that also support cooperative streaming.
/// Kept orthogonal to [`Runner`] so the Dispatcher can test for it at
/// runtime (`downcast` / trait-object upcasting) without every runner
/// being forced to implement a streaming method it cannot honor.
#[async_trait]
pub trait StreamingRunner: Runner {
    /// Produce a bounded channel of results. The receiving half is wrapped
    /// by the Dispatcher into a cancellation-aware sequence; this method
    /// itself does not know about cancellation, it just stops sending once
    /// the receiver is dropped.
    async fn run_stream(
        &self,
        request: &InferenceRequest,
        sink: tokio::sync::mpsc::Sender<Result<InferenceResult, RunnerFault>>,
    );
}

/// A runner-side failure. Distinct from [`crate::error::DispatchErrorCode`]:
/// this is what a `Runner` impl returns, the Dispatcher translates it into
/// a stable error code for the caller.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct RunnerFault {
    pub message: String,
}

impl RunnerFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runner_info_supports_checks_capability_set() {
        let info = RunnerInfo {
            name: "local".into(),
            vendor: Vendor::LocalAccelerator,
            requires_internet: false,
            requires_special_hardware: true,
            priority: 10,
            capabilities: [Capability::Llm].into_iter().collect(),
            default_model_id: None,
        };
        assert!(info.supports(Capability::Llm));
        assert!(!info.supports(Capability::Vlm));
    }
}
