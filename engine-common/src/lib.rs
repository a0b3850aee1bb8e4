//! Shared types for the on-device inference dispatcher.
//!
//! Pure data and trait-boundary definitions only - no orchestration logic
//! lives here, that belongs to `engine-core`.

pub mod capability;
pub mod error;
pub mod guardian;
pub mod model;
pub mod request;
pub mod runner;
pub mod settings;

pub use capability::Capability;
pub use error::DispatchErrorCode;
pub use guardian::{GuardianAction, GuardianAnalysis, GuardianCategory, GuardianMode, GuardianStatus};
pub use model::{EntryPoint, ModelDefinition, ModelFile, ModelManifest, ModelState, ModelStatus};
pub use request::{GuardianConfig, InferenceRequest, InferenceResult, RequestId, ResultError, Strictness};
pub use runner::{Runner, RunnerFault, RunnerInfo, StreamingRunner, Vendor};
pub use settings::{EngineSettings, GuardianSettings, ServiceState, SettingsStore, StatusSink};
