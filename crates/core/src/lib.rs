//! Codetree Core - solution state and collaborator contracts
//!
//! This crate defines what a program search carries from node to node and
//! the narrow interfaces through which the search talks to the outside
//! world: a code generator, a reward evaluator and a reflection step.
//!
//! # Types
//!
//! - [`SolutionState`] - Requirement plus carried-forward artifacts
//! - [`Evaluation`] - Finite reward plus its [`ExecutionRecord`]
//! - [`CodeGenerator`], [`RewardEvaluator`], [`Reflector`] - Collaborator traits

mod collaborator;
mod error;
mod types;

pub use collaborator::{CodeGenerator, NoReflection, Reflector, RewardEvaluator};
pub use error::{ExecutionError, GenerationError, ReflectionError, Result};
pub use types::{Critique, Evaluation, ExecutionRecord, ExecutionStatus, SolutionState};
