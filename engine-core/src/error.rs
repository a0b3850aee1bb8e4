//! The Dispatcher's own error envelope (§7): a `thiserror`-derived enum
//! carrying the stable code strings from §6, constructed through
//! per-variant helpers rather than hand-assembled at each call site.

use engine_common::DispatchErrorCode;

use crate::model_manager::ModelManagerError;
use crate::selector::SelectorError;

/// Everything the Dispatcher can fail with. Distinct from
/// [`engine_common::RunnerFault`], which is what a `Runner` impl returns -
/// this type is what `process`/`process_stream` surface to their caller.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct DispatchError {
    pub code: DispatchErrorCode,
    pub message: String,
    pub cause: Option<String>,
    pub recoverable: bool,
}

impl DispatchError {
    fn new(code: DispatchErrorCode, message: impl Into<String>, recoverable: bool) -> Self {
        Self {
            code,
            message: message.into(),
            cause: None,
            recoverable,
        }
    }

    fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn runner_not_found(name: &str) -> Self {
        Self::new(
            DispatchErrorCode::RunnerNotFound,
            format!("no runner named '{name}' is registered"),
            true,
        )
    }

    pub fn capability_not_supported(capability: engine_common::Capability) -> Self {
        Self::new(
            DispatchErrorCode::CapabilityNotSupported,
            format!("no registered runner supports capability {capability}"),
            true,
        )
    }

    pub fn streaming_not_supported(runner_name: &str) -> Self {
        Self::new(
            DispatchErrorCode::StreamingNotSupported,
            format!("runner '{runner_name}' does not support streaming"),
            true,
        )
    }

    pub fn hardware_not_supported() -> Self {
        Self::new(
            DispatchErrorCode::HardwareNotSupported,
            "the selected runner cannot operate on this hardware",
            true,
        )
    }

    pub fn insufficient_resources(required_gb: u32, available_gb: f64) -> Self {
        Self::new(
            DispatchErrorCode::InsufficientResources,
            format!(
                "not enough RAM to load model: need ~{required_gb} GB, {available_gb:.2} GB available after eviction"
            ),
            true,
        )
    }

    pub fn model_download_failed(model_id: &str, cause: impl Into<String>) -> Self {
        Self::new(
            DispatchErrorCode::ModelDownloadFailed,
            format!("failed to download model '{model_id}'"),
            true,
        )
        .with_cause(cause)
    }

    pub fn model_load_failed(model_id: &str, cause: impl Into<String>) -> Self {
        Self::new(
            DispatchErrorCode::ModelLoadFailed,
            format!("failed to load model '{model_id}'"),
            true,
        )
        .with_cause(cause)
    }

    pub fn model_not_loaded(runner_name: &str) -> Self {
        Self::new(
            DispatchErrorCode::ModelNotLoaded,
            format!("runner '{runner_name}' has no model loaded"),
            true,
        )
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(DispatchErrorCode::InvalidInput, message, true)
    }

    pub fn runtime_error(cause: impl Into<String>) -> Self {
        let cause = cause.into();
        Self::new(DispatchErrorCode::RuntimeError, cause.clone(), true).with_cause(cause)
    }

    /// Turns this error into the `InferenceResult`-shaped envelope the
    /// Dispatcher returns to its caller (§7: errors are values, not
    /// exceptions-for-control-flow).
    pub fn into_result(self) -> engine_common::InferenceResult {
        engine_common::InferenceResult::error(engine_common::ResultError {
            code: self.code.to_string(),
            message: self.message,
            cause: self.cause,
            recoverable: self.recoverable,
        })
    }
}

impl From<SelectorError> for DispatchError {
    fn from(err: SelectorError) -> Self {
        match &err {
            SelectorError::RunnerNotFound(name) => DispatchError::runner_not_found(name),
            SelectorError::CapabilityNotSupported(cap) => DispatchError::capability_not_supported(*cap),
            SelectorError::HardwareNotSupported => DispatchError::hardware_not_supported(),
        }
    }
}

impl From<ModelManagerError> for DispatchError {
    fn from(err: ModelManagerError) -> Self {
        DispatchError::model_download_failed("unknown", err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn into_result_carries_stable_code_string() {
        let err = DispatchError::insufficient_resources(4, 1.2);
        let result = err.into_result();
        let error = result.error.unwrap();
        assert_eq!(error.code, "INSUFFICIENT_RESOURCES");
        assert!(error.recoverable);
    }

    #[test]
    fn model_load_failed_carries_cause() {
        let err = DispatchError::model_load_failed("m1", "native init failed");
        assert_eq!(err.cause.as_deref(), Some("native init failed"));
    }
}
