//! Deterministic collaborators for exercising the search.
//!
//! These stand in for the LLM and the execution sandbox in tests and demos:
//! rewards come from a fixed script, and every call is counted.

use async_trait::async_trait;
use codetree_core::{
    CodeGenerator, Critique, Evaluation, ExecutionError, ExecutionRecord, GenerationError,
    Reflector, ReflectionError, RewardEvaluator, SolutionState,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Generates `candidate-<n>` programs, numbering calls from 1.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    calls: AtomicUsize,
    failures_left: AtomicUsize,
    critiques: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the first `n` calls before succeeding.
    pub fn failing_first(n: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(n),
            ..Self::default()
        }
    }

    /// Fail every call.
    pub fn always_failing() -> Self {
        Self::failing_first(usize::MAX)
    }

    /// Number of `generate` calls so far, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Critiques received, in call order.
    pub fn critiques(&self) -> Vec<String> {
        self.critiques.lock().clone()
    }
}

#[async_trait]
impl CodeGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        state: &SolutionState,
        critique: Option<&Critique>,
    ) -> Result<SolutionState, GenerationError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(c) = critique {
            self.critiques.lock().push(c.to_string());
        }

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(GenerationError::new(format!("scripted failure on call {n}")));
        }

        Ok(state.clone().with_program(format!("candidate-{n}")))
    }
}

/// Returns scripted outcomes in call order, then `fallback` forever.
#[derive(Debug)]
pub struct ScriptedEvaluator {
    outcomes: Mutex<VecDeque<Result<Evaluation, ExecutionError>>>,
    fallback: f64,
    calls: AtomicUsize,
}

impl ScriptedEvaluator {
    pub fn new(outcomes: impl IntoIterator<Item = Result<Evaluation, ExecutionError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            fallback: 0.0,
            calls: AtomicUsize::new(0),
        }
    }

    /// Successful runs with the given rewards.
    pub fn rewards(rewards: impl IntoIterator<Item = f64>) -> Self {
        Self::new(rewards.into_iter().map(|r| Ok(scored(r))))
    }

    /// Reward returned once the script runs out.
    #[must_use]
    pub fn with_fallback(mut self, reward: f64) -> Self {
        self.fallback = reward;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// A successful evaluation with `reward` and no held-out score.
///
/// # Panics
/// Panics if `reward` is not finite.
pub fn scored(reward: f64) -> Evaluation {
    Evaluation::new(reward, ExecutionRecord::success(format!("reward {reward}")))
        .expect("scripted rewards must be finite")
}

/// A successful evaluation carrying a held-out score as well.
///
/// # Panics
/// Panics if `reward` is not finite.
pub fn scored_with_dev(reward: f64, dev_score: f64) -> Evaluation {
    Evaluation::new(
        reward,
        ExecutionRecord::success(format!("reward {reward}")).with_dev_score(dev_score),
    )
    .expect("scripted rewards must be finite")
}

#[async_trait]
impl RewardEvaluator for ScriptedEvaluator {
    async fn evaluate(&self, _state: &SolutionState) -> Result<Evaluation, ExecutionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.outcomes.lock().pop_front();
        next.unwrap_or_else(|| Ok(scored(self.fallback)))
    }
}

/// Critiques every execution with a fixed prefix plus its output.
#[derive(Debug, Default)]
pub struct ScriptedReflector {
    calls: AtomicUsize,
}

impl ScriptedReflector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Reflector for ScriptedReflector {
    async fn reflect(
        &self,
        _state: &SolutionState,
        record: &ExecutionRecord,
    ) -> Result<Critique, ReflectionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Critique::new(format!("improve on: {}", record.output)))
    }
}
