//! The Guardian gate: a GuardianRunner wrapper plus the pipeline that
//! decides allow/block for an inbound request (§4.6).

use std::sync::Arc;

use engine_common::{
    Capability, GuardianAnalysis, GuardianConfig, GuardianMode, InferenceRequest, InferenceResult,
    Runner, RunnerFault, Strictness,
};
use serde_json::{Map, Value};

/// Resolved configuration for a single check, after collapsing the legacy
/// `Full` alias down to `InputOnly` (§4.6).
#[derive(Debug, Clone, Copy)]
pub struct EffectiveGuardianConfig {
    pub mode: GuardianMode,
    pub strictness: Strictness,
}

pub enum GuardianOutcome {
    Passed,
    Failed(GuardianAnalysis),
}

pub struct GuardianPipeline {
    runner: Arc<dyn Runner>,
}

impl GuardianPipeline {
    pub fn new(runner: Arc<dyn Runner>) -> Self {
        Self { runner }
    }

    /// `(base_config, request) -> EffectiveConfig`. The request's own
    /// `guardian_config`, when present, takes precedence over the
    /// host-supplied base config. A free function of its inputs - the
    /// Dispatcher calls this before it has identified a GUARDIAN-capability
    /// runner, so it cannot take `&self`.
    pub fn effective_config(
        base: EffectiveGuardianConfig,
        request: &InferenceRequest,
    ) -> EffectiveGuardianConfig {
        match &request.guardian_config {
            Some(GuardianConfig { mode, strictness }) => EffectiveGuardianConfig {
                mode: mode.normalized(),
                strictness: *strictness,
            },
            None => EffectiveGuardianConfig {
                mode: base.mode.normalized(),
                strictness: base.strictness,
            },
        }
    }

    pub async fn check_input(
        &self,
        request: &InferenceRequest,
        cfg: EffectiveGuardianConfig,
    ) -> Result<GuardianOutcome, RunnerFault> {
        if !cfg.mode.checks_input() {
            return Ok(GuardianOutcome::Passed);
        }

        let text = request.text().unwrap_or_default();
        let strictness_str = match cfg.strictness {
            Strictness::Low => "low",
            Strictness::Medium => "medium",
            Strictness::High => "high",
        };

        let mut inputs = Map::new();
        inputs.insert("text".to_string(), Value::String(text.to_string()));
        inputs.insert(
            "strictness".to_string(),
            Value::String(strictness_str.to_string()),
        );
        let guardian_request = InferenceRequest {
            session_id: request.session_id.clone(),
            inputs,
            params: Map::new(),
            guardian_config: None,
        };

        let result = self.runner.run(&guardian_request).await?;
        let analysis = parse_analysis(&result);

        match analysis {
            Some(analysis) if analysis.is_blocked() => Ok(GuardianOutcome::Failed(analysis)),
            _ => Ok(GuardianOutcome::Passed),
        }
    }

    /// Synthesizes the success-shaped `InferenceResult` surfaced to the
    /// caller for a blocked request (§4.6, §7: guardian blocks are NOT an
    /// error variant). Output keys match §8 scenario S4:
    /// `outputs.safety_status="BLOCKED"`, `outputs.risk_categories=[...]`.
    pub fn blocked_result(analysis: &GuardianAnalysis) -> InferenceResult {
        let mut outputs = Map::new();
        outputs.insert(
            "safety_status".to_string(),
            serde_json::to_value(analysis.status).unwrap_or(Value::Null),
        );
        outputs.insert(
            "message".to_string(),
            Value::String(analysis.primary_category().message_template().to_string()),
        );
        outputs.insert(
            "risk_categories".to_string(),
            serde_json::to_value(&analysis.categories).unwrap_or(Value::Null),
        );
        outputs.insert(
            "risk_score".to_string(),
            serde_json::Number::from_f64(analysis.risk_score as f64)
                .map(Value::Number)
                .unwrap_or(Value::Null),
        );
        InferenceResult::terminal(outputs)
    }

    pub fn capability() -> Capability {
        Capability::Guardian
    }
}

fn parse_analysis(result: &InferenceResult) -> Option<GuardianAnalysis> {
    let value = Value::Object(result.outputs.clone());
    serde_json::from_value(value).ok()
}
