//! Capability types for the inference dispatcher.

use serde::{Deserialize, Serialize};

/// Abstract capability a runner can provide.
///
/// These are logical capability types, not specific models. Each runner
/// advertises the subset it supports via [`crate::runner::RunnerInfo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Text-in, text-out large language model inference
    Llm,
    /// Vision-language model inference (image + text in, text out)
    Vlm,
    /// Automatic speech recognition
    Asr,
    /// Text-to-speech synthesis
    Tts,
    /// Content-safety classification, used internally by the Guardian gate
    Guardian,
}

impl Capability {
    pub const ALL: [Capability; 5] = [
        Capability::Llm,
        Capability::Vlm,
        Capability::Asr,
        Capability::Tts,
        Capability::Guardian,
    ];
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::Llm => write!(f, "llm"),
            Capability::Vlm => write!(f, "vlm"),
            Capability::Asr => write!(f, "asr"),
            Capability::Tts => write!(f, "tts"),
            Capability::Guardian => write!(f, "guardian"),
        }
    }
}
