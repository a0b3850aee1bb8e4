//! A small built-in manifest used when no `manifest_path` file is present,
//! so the harness runs out of the box without any external catalog.

use engine_common::{EntryPoint, ModelDefinition, ModelFile, ModelManifest};

pub fn demo_manifest(download_base_url: &str) -> ModelManifest {
    let weights = |id: &str| ModelFile {
        file_name: Some(format!("{id}.bin")),
        group: None,
        pattern: None,
        r#type: "model".to_string(),
        urls: vec![format!("{download_base_url}/{id}.bin")],
    };

    ModelManifest {
        models: vec![
            ModelDefinition {
                id: "local-default".to_string(),
                runner: "local-llm".to_string(),
                files: vec![weights("local-default")],
                ram_gb: 2,
                backend: "mock".to_string(),
                entry_point: Some(EntryPoint {
                    r#type: "mock".to_string(),
                    value: "local-default".to_string(),
                }),
                name: Some("Local Default".to_string()),
                version: Some("1.0".to_string()),
            },
            ModelDefinition {
                id: "local-large".to_string(),
                runner: "local-llm".to_string(),
                files: vec![weights("local-large")],
                ram_gb: 8,
                backend: "mock".to_string(),
                entry_point: None,
                name: Some("Local Large".to_string()),
                version: Some("1.0".to_string()),
            },
            ModelDefinition {
                id: "cloud-default".to_string(),
                runner: "cloud-llm".to_string(),
                // No local artifact: a cloud backend has nothing for the
                // ModelManager to fetch, it just needs a model id to pass
                // through with each request.
                files: vec![],
                ram_gb: 0,
                backend: "mock".to_string(),
                entry_point: None,
                name: Some("Cloud Default".to_string()),
                version: Some("1.0".to_string()),
            },
        ],
    }
}
