//! A keyword-matching Guardian runner. Nowhere near a production safety
//! classifier - it exists so the Guardian gate has something concrete to
//! call and exercises the block/pass paths end to end.

use std::collections::BTreeSet;

use async_trait::async_trait;
use engine_common::{
    Capability, GuardianAction, GuardianAnalysis, GuardianCategory, GuardianStatus, InferenceRequest,
    InferenceResult, Runner, RunnerFault, RunnerInfo, Vendor,
};
use serde_json::{Map, Value};

const BLOCKED_KEYWORDS: &[(&str, GuardianCategory)] = &[
    ("mean", GuardianCategory::Toxicity),
    ("hate", GuardianCategory::HateSpeech),
    ("kill", GuardianCategory::Violence),
];

pub struct KeywordGuardianRunner {
    info: RunnerInfo,
}

impl KeywordGuardianRunner {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            info: RunnerInfo {
                name: name.into(),
                vendor: Vendor::LocalCpu,
                requires_internet: false,
                requires_special_hardware: false,
                priority: 0,
                capabilities: BTreeSet::from([Capability::Guardian]),
                default_model_id: None,
            },
        }
    }
}

#[async_trait]
impl Runner for KeywordGuardianRunner {
    fn info(&self) -> &RunnerInfo {
        &self.info
    }

    async fn is_supported(&self) -> Result<bool, RunnerFault> {
        Ok(true)
    }

    async fn load(&self, _model_id: &str, _overrides: &Map<String, Value>) -> Result<bool, RunnerFault> {
        Ok(true)
    }

    async fn unload(&self) -> Result<(), RunnerFault> {
        Ok(())
    }

    async fn is_loaded(&self) -> bool {
        true
    }

    async fn loaded_model_id(&self) -> Option<String> {
        None
    }

    async fn run(&self, request: &InferenceRequest) -> Result<InferenceResult, RunnerFault> {
        let text = request.text().unwrap_or("").to_lowercase();
        let hit = BLOCKED_KEYWORDS.iter().find(|(word, _)| text.contains(word));

        let analysis = match hit {
            Some((_, category)) => GuardianAnalysis {
                status: GuardianStatus::Blocked,
                risk_score: 0.9,
                categories: BTreeSet::from([*category]),
                action: GuardianAction::Block,
                filtered_text: None,
            },
            None => GuardianAnalysis {
                status: GuardianStatus::Safe,
                risk_score: 0.0,
                categories: BTreeSet::new(),
                action: GuardianAction::None,
                filtered_text: None,
            },
        };

        let outputs = serde_json::to_value(&analysis)
            .expect("GuardianAnalysis always serializes")
            .as_object()
            .expect("GuardianAnalysis serializes to an object")
            .clone();
        Ok(InferenceResult::terminal(outputs))
    }
}
