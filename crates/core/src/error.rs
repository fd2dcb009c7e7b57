use thiserror::Error;

/// The code-generation collaborator could not produce a candidate.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("code generation failed: {message}")]
pub struct GenerationError {
    pub message: String,
}

impl GenerationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Running a candidate program did not yield a reward.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    #[error("candidate program crashed: {0}")]
    Crashed(String),

    #[error("candidate program timed out after {secs}s")]
    TimedOut { secs: u64 },

    #[error("evaluator returned a non-finite reward: {0}")]
    InvalidReward(f64),
}

/// The reflection collaborator could not produce a critique.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("reflection failed: {0}")]
pub struct ReflectionError(pub String);

/// Convenience Result type for evaluation outcomes
pub type Result<T> = std::result::Result<T, ExecutionError>;
