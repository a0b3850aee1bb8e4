//! Request/result envelopes exchanged between the Dispatcher and a Runner.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Uniquely identifies an in-flight request. Minted by the Dispatcher,
/// shared (weakly) with the CancellationRegistry for the request's
/// lifetime only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single inference request. `params` MAY carry a `"model"` override key;
/// the Dispatcher resolves the effective model id from this plus the
/// runner's default and the caller's settings (§4.7.3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InferenceRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub inputs: Map<String, Value>,
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guardian_config: Option<GuardianConfig>,
}

impl InferenceRequest {
    pub fn model_override(&self) -> Option<&str> {
        self.params.get("model").and_then(Value::as_str)
    }

    pub fn text(&self) -> Option<&str> {
        self.inputs.get("text").and_then(Value::as_str)
    }

    /// Builds a copy of this request enriched with a resolved model id,
    /// without mutating the caller's original (§9 Design Notes: construct
    /// a new enriched request rather than mutate the parameter map).
    pub fn with_resolved_model(&self, model_id: &str) -> Self {
        let mut params = self.params.clone();
        params.insert("model".to_string(), Value::String(model_id.to_string()));
        Self {
            session_id: self.session_id.clone(),
            inputs: self.inputs.clone(),
            params,
            guardian_config: self.guardian_config.clone(),
        }
    }
}

/// Inline error carried by an [`InferenceResult`]. Errors are values here,
/// never exceptions-for-control-flow (§7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    pub recoverable: bool,
}

/// The outcome of a single `run`/`run_stream` emission.
///
/// `partial` is the stream terminator signal: during a streaming call
/// exactly one emitted result has `partial = false`, and it is the last one
/// (§8 invariant 4).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InferenceResult {
    #[serde(default)]
    pub outputs: Map<String, Value>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub partial: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ResultError>,
}

impl InferenceResult {
    pub fn terminal(outputs: Map<String, Value>) -> Self {
        Self {
            outputs,
            metadata: Map::new(),
            partial: false,
            error: None,
        }
    }

    pub fn partial(outputs: Map<String, Value>) -> Self {
        Self {
            outputs,
            metadata: Map::new(),
            partial: true,
            error: None,
        }
    }

    pub fn error(error: ResultError) -> Self {
        Self {
            outputs: Map::new(),
            metadata: Map::new(),
            partial: false,
            error: Some(error),
        }
    }
}

/// Guardian strictness, carried on a per-request basis (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strictness {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardianConfig {
    pub mode: crate::guardian::GuardianMode,
    #[serde(default = "GuardianConfig::default_strictness")]
    pub strictness: Strictness,
}

impl GuardianConfig {
    fn default_strictness() -> Strictness {
        Strictness::Medium
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_override_reads_params_model_key() {
        let mut req = InferenceRequest::default();
        req.params.insert("model".into(), Value::String("m2".into()));
        assert_eq!(req.model_override(), Some("m2"));
    }

    #[test]
    fn with_resolved_model_does_not_mutate_original() {
        let req = InferenceRequest::default();
        let enriched = req.with_resolved_model("m1");
        assert_eq!(req.model_override(), None);
        assert_eq!(enriched.model_override(), Some("m1"));
    }

    #[test]
    fn terminal_result_is_not_partial() {
        let result = InferenceResult::terminal(Map::new());
        assert!(!result.partial);
        assert!(result.error.is_none());
    }
}
