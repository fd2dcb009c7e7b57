use crate::{
    Critique, Evaluation, ExecutionError, ExecutionRecord, GenerationError, ReflectionError,
    SolutionState,
};
use async_trait::async_trait;

/// Produces a candidate program from a parent state.
///
/// Implementations typically call an LLM. They should be deterministic
/// enough to be retried, but are not required to be idempotent.
#[async_trait]
pub trait CodeGenerator: Send + Sync {
    /// Returns the child state carrying the new candidate program.
    ///
    /// `critique` is present when reflection ran on the parent's execution.
    async fn generate(
        &self,
        state: &SolutionState,
        critique: Option<&Critique>,
    ) -> Result<SolutionState, GenerationError>;
}

/// Runs a candidate program and scores it.
///
/// May be called more than once for the same state; the search never
/// caches results.
#[async_trait]
pub trait RewardEvaluator: Send + Sync {
    async fn evaluate(&self, state: &SolutionState) -> Result<Evaluation, ExecutionError>;
}

/// Turns an unsatisfying execution into natural-language feedback.
#[async_trait]
pub trait Reflector: Send + Sync {
    async fn reflect(
        &self,
        state: &SolutionState,
        record: &ExecutionRecord,
    ) -> Result<Critique, ReflectionError>;
}

/// Reflector for searches that never enable reflection.
///
/// Always fails, so a search that enables reflection with it simply
/// proceeds without a critique.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoReflection;

#[async_trait]
impl Reflector for NoReflection {
    async fn reflect(
        &self,
        _state: &SolutionState,
        _record: &ExecutionRecord,
    ) -> Result<Critique, ReflectionError> {
        Err(ReflectionError("no reflector configured".to_string()))
    }
}
