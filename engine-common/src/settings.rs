//! External collaborator contracts (§6): settings persistence and service
//! state publication. Both are owned by the host; the core only defines the
//! trait boundary.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::guardian::GuardianMode;
use crate::request::Strictness;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardianSettings {
    pub mode: Option<GuardianMode>,
    pub strictness: Option<Strictness>,
}

/// Settings owned by an external store; the Dispatcher only ever reads
/// through [`SettingsStore`], it never persists anything itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineSettings {
    #[serde(default)]
    pub per_runner_parameters: HashMap<String, Map<String, Value>>,
    #[serde(default)]
    pub guardian_config: GuardianSettings,
    #[serde(default)]
    pub default_model_per_category: HashMap<String, String>,
}

impl EngineSettings {
    pub fn model_for_runner(&self, runner_name: &str) -> Option<&str> {
        self.per_runner_parameters
            .get(runner_name)
            .and_then(|params| params.get("model"))
            .and_then(Value::as_str)
    }
}

/// Persistent settings storage. Out of scope for the core to implement
/// (§1); the host supplies a concrete impl (database, preference file,
/// platform settings provider, etc).
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load_settings(&self) -> EngineSettings;
    async fn save_settings(&self, settings: EngineSettings);
}

/// Published by [`crate::runner`] consumers through `engine-core`'s
/// `StatusPublisher`. Monotone: only the publisher mutates it, this type
/// just describes the possible values (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum ServiceState {
    Ready,
    Processing {
        active: u32,
    },
    Downloading {
        model_name: String,
        pct: u8,
        total: Option<u64>,
    },
    Error {
        message: String,
        recoverable: bool,
    },
}

impl Default for ServiceState {
    fn default() -> Self {
        ServiceState::Ready
    }
}

/// Receives [`ServiceState`] transitions. Idempotent per-state: a sink MAY
/// be called twice with the same state without it meaning anything changed
/// (§6: "idempotent per-state").
pub trait StatusSink: Send + Sync {
    fn on_state(&self, state: ServiceState);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_for_runner_reads_nested_model_key() {
        let mut settings = EngineSettings::default();
        let mut params = Map::new();
        params.insert("model".into(), Value::String("m7".into()));
        settings.per_runner_parameters.insert("local-llm".into(), params);
        assert_eq!(settings.model_for_runner("local-llm"), Some("m7"));
        assert_eq!(settings.model_for_runner("missing"), None);
    }

    #[test]
    fn service_state_serializes_with_tag() {
        let state = ServiceState::Processing { active: 3 };
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains(r#""state":"processing""#));
        assert!(json.contains(r#""active":3"#));
    }
}
