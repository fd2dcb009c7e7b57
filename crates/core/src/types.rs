//! Values that flow between the search and its collaborators.
//!
//! These types keep the few invariants the search relies on:
//! - SolutionState: always carries the task requirement, never mutated in place
//! - Evaluation: reward is a finite number

use crate::{ExecutionError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Immutable state attached to a search node.
///
/// Holds the natural-language requirement plus whatever the search has
/// produced so far: the latest candidate program and accumulated insights.
/// Every "modification" returns a new value.
///
/// # Example
/// ```
/// use codetree_core::SolutionState;
///
/// let root = SolutionState::new("sort a list of integers");
/// let child = root.clone().with_program("def solve(xs): return sorted(xs)");
/// assert!(root.program().is_none());
/// assert_eq!(child.requirement(), root.requirement());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolutionState {
    requirement: String,

    #[serde(default)]
    program: Option<String>,

    #[serde(default)]
    insights: Vec<String>,

    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

impl SolutionState {
    /// Create a root state from a task requirement.
    pub fn new(requirement: impl Into<String>) -> Self {
        Self {
            requirement: requirement.into(),
            program: None,
            insights: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// Replace the candidate program.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = Some(program.into());
        self
    }

    /// Append insights after the existing ones.
    #[must_use]
    pub fn with_insights<I, S>(mut self, insights: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insights.extend(insights.into_iter().map(Into::into));
        self
    }

    /// Set a free-form metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn requirement(&self) -> &str {
        &self.requirement
    }

    /// The latest candidate program, if one has been generated.
    pub fn program(&self) -> Option<&str> {
        self.program.as_deref()
    }

    pub fn insights(&self) -> &[String] {
        &self.insights
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }
}

/// Natural-language feedback derived from a failed or low-reward run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Critique(String);

impl Critique {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Critique {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether the candidate program produced a usable reward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Failed,
}

/// What happened when a candidate program was executed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub status: ExecutionStatus,

    /// Captured output or error text, fed to reflection.
    #[serde(default)]
    pub output: String,

    /// Score on a held-out slice not used to guide the search.
    #[serde(default)]
    pub dev_score: Option<f64>,

    /// The evaluator saw no room for further refinement.
    #[serde(default)]
    pub terminal: bool,
}

impl ExecutionRecord {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Success,
            output: output.into(),
            dev_score: None,
            terminal: false,
        }
    }

    /// Record standing in for a run that raised `error`.
    pub fn failure(error: &ExecutionError) -> Self {
        Self {
            status: ExecutionStatus::Failed,
            output: error.to_string(),
            dev_score: None,
            terminal: false,
        }
    }

    #[must_use]
    pub fn with_dev_score(mut self, score: f64) -> Self {
        self.dev_score = Some(score);
        self
    }

    #[must_use]
    pub fn terminal(mut self) -> Self {
        self.terminal = true;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }
}

/// Reward plus execution record for one candidate.
///
/// Invariant: `raw_reward` is finite.
#[derive(Clone, Debug, PartialEq)]
pub struct Evaluation {
    raw_reward: f64,
    record: ExecutionRecord,
}

impl Evaluation {
    /// # Errors
    /// Returns `ExecutionError::InvalidReward` for NaN or infinite rewards.
    pub fn new(raw_reward: f64, record: ExecutionRecord) -> Result<Self> {
        if !raw_reward.is_finite() {
            return Err(ExecutionError::InvalidReward(raw_reward));
        }
        Ok(Self { raw_reward, record })
    }

    pub fn raw_reward(&self) -> f64 {
        self.raw_reward
    }

    pub fn record(&self) -> &ExecutionRecord {
        &self.record
    }

    pub fn into_parts(self) -> (f64, ExecutionRecord) {
        (self.raw_reward, self.record)
    }
}
