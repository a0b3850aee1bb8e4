//! A local, CPU-vendor LLM runner. Tracks a "loaded model id" in memory and
//! echoes the input text back wrapped in a canned reply, splitting it into
//! a handful of streamed chunks when asked to stream.

use std::collections::BTreeSet;

use async_trait::async_trait;
use engine_common::{
    Capability, InferenceRequest, InferenceResult, Runner, RunnerFault, RunnerInfo, StreamingRunner,
    Vendor,
};
use serde_json::{Map, Value};
use tokio::sync::{mpsc, Mutex};

pub struct LocalLlmRunner {
    info: RunnerInfo,
    loaded: Mutex<Option<String>>,
}

impl LocalLlmRunner {
    pub fn new(name: impl Into<String>, priority: u32) -> Self {
        Self {
            info: RunnerInfo {
                name: name.into(),
                vendor: Vendor::LocalCpu,
                requires_internet: false,
                requires_special_hardware: false,
                priority,
                capabilities: BTreeSet::from([Capability::Llm]),
                default_model_id: None,
            },
            loaded: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Runner for LocalLlmRunner {
    fn info(&self) -> &RunnerInfo {
        &self.info
    }

    async fn is_supported(&self) -> Result<bool, RunnerFault> {
        Ok(true)
    }

    async fn load(&self, model_id: &str, _overrides: &Map<String, Value>) -> Result<bool, RunnerFault> {
        *self.loaded.lock().await = Some(model_id.to_string());
        Ok(true)
    }

    async fn unload(&self) -> Result<(), RunnerFault> {
        *self.loaded.lock().await = None;
        Ok(())
    }

    async fn is_loaded(&self) -> bool {
        self.loaded.lock().await.is_some()
    }

    async fn loaded_model_id(&self) -> Option<String> {
        self.loaded.lock().await.clone()
    }

    async fn run(&self, request: &InferenceRequest) -> Result<InferenceResult, RunnerFault> {
        let text = request.text().unwrap_or("");
        let mut outputs = Map::new();
        outputs.insert(
            "text".to_string(),
            Value::String(format!("[{}] you said: {text}", self.info.name)),
        );
        Ok(InferenceResult::terminal(outputs))
    }

    fn as_streaming(&self) -> Option<&dyn StreamingRunner> {
        Some(self)
    }
}

#[async_trait]
impl StreamingRunner for LocalLlmRunner {
    async fn run_stream(
        &self,
        request: &InferenceRequest,
        sink: mpsc::Sender<Result<InferenceResult, RunnerFault>>,
    ) {
        let text = request.text().unwrap_or("").to_string();
        let words: Vec<&str> = text.split_whitespace().collect();
        let mut so_far = String::new();
        for word in &words {
            so_far.push_str(word);
            so_far.push(' ');
            let mut outputs = Map::new();
            outputs.insert("text".to_string(), Value::String(so_far.trim_end().to_string()));
            if sink.send(Ok(InferenceResult::partial(outputs))).await.is_err() {
                return;
            }
        }
        let mut outputs = Map::new();
        outputs.insert(
            "text".to_string(),
            Value::String(format!("[{}] you said: {text}", self.info.name)),
        );
        let _ = sink.send(Ok(InferenceResult::terminal(outputs))).await;
    }
}
