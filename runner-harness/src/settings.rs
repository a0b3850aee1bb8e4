//! In-memory `SettingsStore` for demonstration/tests only (§6 "never the
//! production one"). A real host persists this to a database or platform
//! preference store.

use async_trait::async_trait;
use engine_common::{EngineSettings, SettingsStore};
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemorySettingsStore {
    settings: RwLock<EngineSettings>,
}

impl InMemorySettingsStore {
    pub fn new(initial: EngineSettings) -> Self {
        Self {
            settings: RwLock::new(initial),
        }
    }
}

#[async_trait]
impl SettingsStore for InMemorySettingsStore {
    async fn load_settings(&self) -> EngineSettings {
        self.settings.read().await.clone()
    }

    async fn save_settings(&self, settings: EngineSettings) {
        *self.settings.write().await = settings;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let store = InMemorySettingsStore::default();
        let mut settings = EngineSettings::default();
        settings
            .default_model_per_category
            .insert("llm".to_string(), "m1".to_string());

        store.save_settings(settings).await;
        let loaded = store.load_settings().await;
        assert_eq!(loaded.default_model_per_category.get("llm"), Some(&"m1".to_string()));
    }
}
