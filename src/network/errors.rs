use thiserror::Error;

// * Unified Error type for the inference provider round-trip.
// * Never surfaced to callers: every variant degrades to the fallback table.
#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Inference request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Inference provider returned HTTP {0}")]
    Status(u16),

    #[error("Inference timed out after {0}ms")]
    Timeout(u64),

    #[error("Unparseable inference response: {0}")]
    Parse(String),

    #[error("Inference returned an empty container selector")]
    EmptyContainer,

    #[error("Inference returned an invalid container selector: {0}")]
    InvalidSelector(String),
}

impl InferenceError {
    // * Only timeouts earn the single retry
    pub fn is_timeout(&self) -> bool {
        matches!(self, InferenceError::Timeout(_))
    }

    // * Metric label for the failure class
    pub fn label(&self) -> &'static str {
        match self {
            InferenceError::Transport(_) | InferenceError::Status(_) => "transport",
            InferenceError::Timeout(_) => "timeout",
            InferenceError::Parse(_) | InferenceError::InvalidSelector(_) => "parse_error",
            InferenceError::EmptyContainer => "empty",
        }
    }
}
