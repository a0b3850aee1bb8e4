//! Content-safety gate types, shared between the Guardian pipeline and the
//! GuardianRunner contract.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Configured guardian mode. `Full` is kept only so existing configuration
/// surfaces continue to parse; the pipeline treats it identically to
/// `InputOnly` (see [`crate::guardian`] pipeline docs in `engine-core`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardianMode {
    Disabled,
    InputOnly,
    /// Deprecated alias for `InputOnly`. Output filtering was never
    /// implemented and will not be; kept for config-file compatibility.
    Full,
}

impl GuardianMode {
    /// Collapses the deprecated `Full` alias down to `InputOnly`.
    pub fn normalized(self) -> GuardianMode {
        match self {
            GuardianMode::Full => GuardianMode::InputOnly,
            other => other,
        }
    }

    pub fn checks_input(self) -> bool {
        !matches!(self.normalized(), GuardianMode::Disabled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuardianStatus {
    Safe,
    Warning,
    Blocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuardianAction {
    None,
    Review,
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuardianCategory {
    HateSpeech,
    Sexual,
    Violence,
    SelfHarm,
    Spam,
    Pii,
    Toxicity,
    Unsafe,
    Unknown,
}

impl GuardianCategory {
    /// Human-readable template the core supplies; the host is responsible
    /// for localizing it (§4.6: "platform supplies localized text; core
    /// supplies the mapping category -> template").
    pub fn message_template(self) -> &'static str {
        match self {
            GuardianCategory::HateSpeech => "This request was blocked for containing hateful content.",
            GuardianCategory::Sexual => "This request was blocked for containing sexual content.",
            GuardianCategory::Violence => "This request was blocked for containing violent content.",
            GuardianCategory::SelfHarm => "This request was blocked for content related to self-harm.",
            GuardianCategory::Spam => "This request was blocked as spam.",
            GuardianCategory::Pii => "This request was blocked for containing personal information.",
            GuardianCategory::Toxicity => "This request was blocked for containing toxic content.",
            GuardianCategory::Unsafe => "This request was blocked as unsafe.",
            GuardianCategory::Unknown => "This request was blocked by the safety filter.",
        }
    }
}

/// Output of a GuardianRunner invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardianAnalysis {
    pub status: GuardianStatus,
    pub risk_score: f32,
    pub categories: BTreeSet<GuardianCategory>,
    pub action: GuardianAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filtered_text: Option<String>,
}

impl GuardianAnalysis {
    /// §4.6: map `status=BLOCKED` (or `action=BLOCK`) to a failed check.
    pub fn is_blocked(&self) -> bool {
        self.status == GuardianStatus::Blocked || self.action == GuardianAction::Block
    }

    pub fn primary_category(&self) -> GuardianCategory {
        self.categories
            .iter()
            .next()
            .copied()
            .unwrap_or(GuardianCategory::Unknown)
    }
}
