//! A cloud-vendor LLM runner. Requires network, needs no local load step -
//! it is always "loaded" once a model id has been selected for it - and
//! simulates the latency of an actual API round trip.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use engine_common::{Capability, InferenceRequest, InferenceResult, Runner, RunnerFault, RunnerInfo, Vendor};
use serde_json::{Map, Value};
use tokio::sync::Mutex;

pub struct CloudLlmRunner {
    info: RunnerInfo,
    model: Mutex<Option<String>>,
    latency: Duration,
}

impl CloudLlmRunner {
    pub fn new(name: impl Into<String>, priority: u32, latency: Duration) -> Self {
        Self {
            info: RunnerInfo {
                name: name.into(),
                vendor: Vendor::Cloud,
                requires_internet: true,
                requires_special_hardware: false,
                priority,
                capabilities: BTreeSet::from([Capability::Llm]),
                default_model_id: None,
            },
            model: Mutex::new(None),
            latency,
        }
    }
}

#[async_trait]
impl Runner for CloudLlmRunner {
    fn info(&self) -> &RunnerInfo {
        &self.info
    }

    async fn is_supported(&self) -> Result<bool, RunnerFault> {
        Ok(true)
    }

    async fn load(&self, model_id: &str, _overrides: &Map<String, Value>) -> Result<bool, RunnerFault> {
        *self.model.lock().await = Some(model_id.to_string());
        Ok(true)
    }

    async fn unload(&self) -> Result<(), RunnerFault> {
        *self.model.lock().await = None;
        Ok(())
    }

    async fn is_loaded(&self) -> bool {
        self.model.lock().await.is_some()
    }

    async fn loaded_model_id(&self) -> Option<String> {
        self.model.lock().await.clone()
    }

    async fn run(&self, request: &InferenceRequest) -> Result<InferenceResult, RunnerFault> {
        tokio::time::sleep(self.latency).await;
        let text = request.text().unwrap_or("");
        let model = self.model.lock().await.clone().unwrap_or_else(|| "unknown".to_string());
        let mut outputs = Map::new();
        outputs.insert(
            "text".to_string(),
            Value::String(format!("[{model} via {}] {text}", self.info.name)),
        );
        Ok(InferenceResult::terminal(outputs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_reports_the_loaded_model_in_its_output() {
        let runner = CloudLlmRunner::new("cloud-llm", 20, Duration::from_millis(1));
        runner.load("gpt-mock", &Map::new()).await.unwrap();

        let mut request = InferenceRequest::default();
        request.inputs.insert("text".to_string(), Value::String("hi".into()));
        let result = runner.run(&request).await.unwrap();

        assert_eq!(
            result.outputs.get("text"),
            Some(&Value::String("[gpt-mock via cloud-llm] hi".to_string()))
        );
    }
}
