//! Pipeline run states

use std::fmt;

/// Why a pipeline run failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    Capture(String),
    Recognition(String),
    Translation(String),
}

impl FailureReason {
    /// Generic text shown to the user; details stay in the logs
    pub fn user_message(&self) -> &'static str {
        match self {
            FailureReason::Capture(_) => "Could not capture the current view",
            FailureReason::Recognition(_) => "Could not read text from the image",
            FailureReason::Translation(_) => "Translation failed",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Capture(detail) => write!(f, "capture failed: {}", detail),
            FailureReason::Recognition(detail) => write!(f, "recognition failed: {}", detail),
            FailureReason::Translation(detail) => write!(f, "translation failed: {}", detail),
        }
    }
}

/// Where the pipeline currently is
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PipelineState {
    #[default]
    Idle,
    Capturing,
    Recognizing,
    Translating,
    Displaying,
    Failed(FailureReason),
}

impl PipelineState {
    pub fn is_idle(&self) -> bool {
        matches!(self, PipelineState::Idle)
    }

    pub fn label(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Capturing => "capturing",
            PipelineState::Recognizing => "recognizing",
            PipelineState::Translating => "translating",
            PipelineState::Displaying => "displaying",
            PipelineState::Failed(_) => "failed",
        }
    }
}
