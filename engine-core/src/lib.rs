//! Orchestration core for the on-device inference dispatcher: registry,
//! selector, guardian gate, model manager, resource gate, and the
//! request/stream orchestrator built on top of them.
//!
//! No HTTP/IPC surface lives here - that belongs to the host binary
//! (`runner-harness` in this workspace).

pub mod cancellation;
pub mod catalog;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod guardian;
pub mod logging;
pub mod model_manager;
pub mod registry;
pub mod resource;
pub mod selector;
pub mod status;

pub use cancellation::{CancelHandle, CancellationRegistry};
pub use catalog::{CatalogError, ModelCatalog};
pub use config::{DispatcherSettings, EngineConfig, EngineConfigError, LoggingConfig};
pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use error::DispatchError;
pub use guardian::{EffectiveGuardianConfig, GuardianOutcome, GuardianPipeline};
pub use model_manager::{
    CleanupReport, DownloadHandle, DownloadListener, FileProgress, ModelManager, ModelManagerError,
};
pub use registry::{Registry, RegistryError};
pub use resource::{ResourceMonitor, SysinfoResourceMonitor};
pub use selector::{Selector, SelectorError};
pub use status::StatusPublisher;
