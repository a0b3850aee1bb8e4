//! Stable error code strings (§6), shared between the Dispatcher's internal
//! `DispatchError` (in `engine-core`) and anything that serializes results
//! across a process boundary.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DispatchErrorCode {
    RunnerNotFound,
    CapabilityNotSupported,
    StreamingNotSupported,
    HardwareNotSupported,
    InsufficientResources,
    ModelDownloadFailed,
    ModelLoadFailed,
    ModelNotLoaded,
    InvalidInput,
    RuntimeError,
    GuardianBlocked,
}

impl std::fmt::Display for DispatchErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DispatchErrorCode::RunnerNotFound => "RUNNER_NOT_FOUND",
            DispatchErrorCode::CapabilityNotSupported => "CAPABILITY_NOT_SUPPORTED",
            DispatchErrorCode::StreamingNotSupported => "STREAMING_NOT_SUPPORTED",
            DispatchErrorCode::HardwareNotSupported => "HARDWARE_NOT_SUPPORTED",
            DispatchErrorCode::InsufficientResources => "INSUFFICIENT_RESOURCES",
            DispatchErrorCode::ModelDownloadFailed => "MODEL_DOWNLOAD_FAILED",
            DispatchErrorCode::ModelLoadFailed => "MODEL_LOAD_FAILED",
            DispatchErrorCode::ModelNotLoaded => "MODEL_NOT_LOADED",
            DispatchErrorCode::InvalidInput => "INVALID_INPUT",
            DispatchErrorCode::RuntimeError => "RUNTIME_ERROR",
            DispatchErrorCode::GuardianBlocked => "GUARDIAN_BLOCKED",
        };
        write!(f, "{s}")
    }
}
