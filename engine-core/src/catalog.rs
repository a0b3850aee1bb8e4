//! Read-only list of model definitions (§4.4).

use engine_common::{ModelDefinition, ModelManifest};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read catalog manifest: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse catalog manifest: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Immutable, in-memory view of the model manifest (§6). Loaded once at
/// startup; a changed manifest requires a fresh `ModelCatalog`.
pub struct ModelCatalog {
    models: Vec<ModelDefinition>,
}

impl ModelCatalog {
    pub fn from_manifest(manifest: ModelManifest) -> Self {
        Self {
            models: manifest.models,
        }
    }

    pub fn load_from_path(path: impl AsRef<std::path::Path>) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path)?;
        let manifest: ModelManifest = serde_json::from_str(&raw)?;
        Ok(Self::from_manifest(manifest))
    }

    pub fn get(&self, id: &str) -> Option<&ModelDefinition> {
        self.models.iter().find(|m| m.id == id)
    }

    pub fn all(&self) -> &[ModelDefinition] {
        &self.models
    }

    /// Models whose declared `runner` matches `runner_name`.
    pub fn compatible_with(&self, runner_name: &str) -> Vec<&ModelDefinition> {
        self.models.iter().filter(|m| m.runner == runner_name).collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// A catalog id hinting "default"/"base"/"spin" among the models
    /// compatible with `runner_name` (§4.7.3 step 3, middle tier - tried
    /// before the cloud/local RAM-based fallback).
    pub fn hinted_default_for(&self, runner_name: &str) -> Option<&ModelDefinition> {
        self.compatible_with(runner_name).into_iter().find(|m| {
            let lower = m.id.to_lowercase();
            lower.contains("default") || lower.contains("base") || lower.contains("spin")
        })
    }

}

#[cfg(test)]
mod tests {
    use engine_common::ModelFile;

    use super::*;

    fn def(id: &str, runner: &str, ram_gb: u32) -> ModelDefinition {
        ModelDefinition {
            id: id.to_string(),
            runner: runner.to_string(),
            files: vec![ModelFile {
                file_name: Some("weights.bin".into()),
                group: None,
                pattern: None,
                r#type: "model".into(),
                urls: vec!["https://example.com/weights.bin".into()],
            }],
            ram_gb,
            backend: "ggml".into(),
            entry_point: None,
            name: None,
            version: None,
        }
    }

    #[test]
    fn get_finds_by_id() {
        let catalog = ModelCatalog::from_manifest(ModelManifest {
            models: vec![def("m1", "local-llm", 4)],
        });
        assert!(catalog.get("m1").is_some());
        assert!(catalog.get("missing").is_none());
    }

    #[test]
    fn hinted_default_prefers_id_containing_default_base_or_spin() {
        let catalog = ModelCatalog::from_manifest(ModelManifest {
            models: vec![def("llama-7b", "local-llm", 8), def("llama-7b-base", "local-llm", 8)],
        });
        let chosen = catalog.hinted_default_for("local-llm").unwrap();
        assert_eq!(chosen.id, "llama-7b-base");
    }

    #[test]
    fn compatible_with_filters_by_runner_name() {
        let catalog = ModelCatalog::from_manifest(ModelManifest {
            models: vec![def("a", "local-llm", 16), def("b", "cloud-llm", 0)],
        });
        let compatible = catalog.compatible_with("local-llm");
        assert_eq!(compatible.len(), 1);
        assert_eq!(compatible[0].id, "a");
    }
}
