//! Resumable tree search over LLM-generated candidate programs.
//!
//! Given a task requirement, the search grows a tree of candidate solutions.
//! Every new node comes from a code-generation call on an existing node and
//! is scored by running the candidate. Rewards flow back up the tree and
//! steer where the next candidate is generated.
//!
//! # Features
//!
//! - **Pluggable selection**: UCB tree search, plus greedy and random baselines
//! - **Reflection**: low-reward runs can be critiqued before the next generation
//! - **Fault tolerance**: failed generations are retried, failed runs get a floor reward
//! - **Resumable**: the tree is checkpointed after every rollout and can be reloaded
//! - **Held-out selection**: reports the best node by search reward and by a dev score
//!
//! # Example
//!
//! ```
//! use codetree_core::{NoReflection, SolutionState};
//! use codetree_search::scripted::{ScriptedEvaluator, ScriptedGenerator};
//! use codetree_search::{render_tree, MemoryStore, SearchConfig, TreeSearch};
//! use std::sync::Arc;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let config = SearchConfig::default();
//! let mut search = TreeSearch::new(
//!     config,
//!     ScriptedGenerator::new(),
//!     ScriptedEvaluator::rewards([0.2, 0.9, 0.5]),
//!     NoReflection,
//!     Arc::new(MemoryStore::new()),
//! )
//! .unwrap();
//!
//! let outcome = search
//!     .search(SolutionState::new("predict house prices"), false, 3, false)
//!     .await
//!     .unwrap();
//! assert_eq!(outcome.global_best.raw_reward(), Some(0.9));
//!
//! let report = render_tree(search.tree().unwrap());
//! println!("{}", report.text);
//! # });
//! ```

pub mod config;
mod error;
mod node;
pub mod policy;
mod report;
pub mod scripted;
pub mod search;
pub mod select;
mod snapshot;
pub mod store;
mod tree;

pub use config::{SearchConfig, SearchMode};
pub use error::{PersistenceError, Result, SearchError};
pub use node::{Node, NodeId, NodeStats};
pub use policy::{GreedyPolicy, RandomPolicy, SelectionPolicy, UcbPolicy};
pub use report::{render_tree, TreeReport};
pub use search::{SearchOutcome, TreeSearch};
pub use select::{select_best, BestNodes, DevScore, NodeScore, RecordedDevScore, Scores};
pub use snapshot::{NodeSnapshot, TreeSnapshot, SNAPSHOT_VERSION};
pub use store::{JsonFileStore, MemoryStore, TreeStore};
pub use tree::Tree;
