//! The search engine: select, expand, evaluate, backpropagate.
//!
//! Each rollout picks a parent with the configured [`SelectionPolicy`], asks
//! the code generator for one child, scores it with the reward evaluator and
//! adds the reward to every node from the child up to the root. A child is
//! attached only once its reward is known, so the tree never holds an
//! unevaluated node. The tree is checkpointed after every rollout.

use crate::{
    config::SearchConfig,
    node::{Node, NodeId},
    policy::{policy_for, SelectionPolicy},
    select::{select_best, DevScore, RecordedDevScore, Scores},
    store::TreeStore,
    tree::Tree,
    PersistenceError, Result, SearchError,
};
use codetree_core::{
    CodeGenerator, Critique, ExecutionRecord, GenerationError, Reflector, RewardEvaluator,
    SolutionState,
};
use std::collections::HashSet;
use std::sync::Arc;

/// Result of a search.
#[derive(Clone, Debug)]
pub struct SearchOutcome {
    /// Node with the highest search reward.
    pub global_best: Node,

    /// Node with the highest held-out score.
    pub dev_best: Node,

    /// Ids and scores of both, for reporting.
    pub scores: Scores,
}

/// What a single rollout did to the tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Rollout {
    /// A new child was attached.
    Expanded(NodeId),
    /// Every candidate parent failed code generation.
    GenerationFailed,
    /// No node in the tree can be expanded.
    NoCandidates,
}

/// Tree search over generated programs.
///
/// Generic over:
/// - `G`: The code generator
/// - `E`: The reward evaluator
/// - `F`: The reflection step
pub struct TreeSearch<G: CodeGenerator, E: RewardEvaluator, F: Reflector> {
    config: SearchConfig,
    generator: G,
    evaluator: E,
    reflector: F,
    store: Arc<dyn TreeStore>,
    policy: Box<dyn SelectionPolicy>,
    dev_score: Box<dyn DevScore>,
    tree: Option<Tree>,
}

impl<G, E, F> TreeSearch<G, E, F>
where
    G: CodeGenerator,
    E: RewardEvaluator,
    F: Reflector,
{
    /// Create a new search engine.
    ///
    /// # Errors
    /// Returns `SearchError::Config` if `config` fails validation.
    pub fn new(
        config: SearchConfig,
        generator: G,
        evaluator: E,
        reflector: F,
        store: Arc<dyn TreeStore>,
    ) -> Result<Self> {
        config.validate()?;
        let policy = policy_for(&config);
        Ok(Self {
            config,
            generator,
            evaluator,
            reflector,
            store,
            policy,
            dev_score: Box::new(RecordedDevScore),
            tree: None,
        })
    }

    /// Replace the held-out criterion used for `dev_best`.
    #[must_use]
    pub fn with_dev_score(mut self, dev_score: impl DevScore + 'static) -> Self {
        self.dev_score = Box::new(dev_score);
        self
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// The tree of the last search, if one has run.
    pub fn tree(&self) -> Option<&Tree> {
        self.tree.as_ref()
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    pub fn reflector(&self) -> &F {
        &self.reflector
    }

    /// Run `rollouts` rollouts from `state` and report the best nodes.
    ///
    /// With `load_tree`, the tree persisted under the configured run id is
    /// resumed and only the rollouts it has not completed yet are run. A
    /// missing or unreadable tree falls back to a fresh root.
    ///
    /// # Errors
    /// - `InvariantViolation` if the persisted tree is malformed
    /// - `Persistence` if a checkpoint cannot be saved; the tree built so
    ///   far stays available through [`TreeSearch::tree`]
    /// - `SearchExhausted` if no node besides the root evaluated successfully
    pub async fn search(
        &mut self,
        state: SolutionState,
        reflection: bool,
        rollouts: usize,
        load_tree: bool,
    ) -> Result<SearchOutcome> {
        let mut tree = if load_tree {
            self.resume(state)?
        } else {
            Tree::new(state)
        };

        let remaining = rollouts.saturating_sub(tree.completed_rollouts());
        tracing::info!(
            run_id = %self.config.run_id,
            mode = ?self.config.mode,
            completed = tree.completed_rollouts(),
            remaining,
            "Starting search"
        );

        for _ in 0..remaining {
            match self.rollout(&mut tree, reflection).await {
                Rollout::Expanded(child) => {
                    let node = tree.get(child);
                    tracing::debug!(
                        "Rollout {}: node {} at depth {} scored {:?}",
                        tree.completed_rollouts() + 1,
                        child,
                        node.depth(),
                        node.raw_reward()
                    );
                }
                Rollout::GenerationFailed => {
                    tracing::warn!(
                        "Rollout {}: code generation failed for every candidate parent",
                        tree.completed_rollouts() + 1
                    );
                }
                Rollout::NoCandidates => {
                    tracing::info!(
                        "No expandable node left after {} rollouts, stopping early",
                        tree.completed_rollouts()
                    );
                    break;
                }
            }
            tree.record_rollout();
            if let Err(e) = self.store.save(&self.config.run_id, &tree) {
                self.tree = Some(tree);
                return Err(e.into());
            }
        }

        let best = select_best(&tree, self.dev_score.as_ref());
        let outcome = best.map(|best| SearchOutcome {
            global_best: tree.get(best.global_best).clone(),
            dev_best: tree.get(best.dev_best).clone(),
            scores: best.scores,
        });
        self.tree = Some(tree);

        let outcome = outcome?;
        tracing::info!(
            "Search finished: best node {} ({}), dev best node {} ({})",
            outcome.scores.global_best.id,
            outcome.scores.global_best.raw_reward,
            outcome.scores.dev_best.id,
            outcome.scores.dev_best.raw_reward
        );
        Ok(outcome)
    }

    /// Load the persisted tree, or start fresh if there is nothing usable.
    fn resume(&self, state: SolutionState) -> Result<Tree> {
        match self.store.load(&self.config.run_id) {
            Ok(mut tree) => {
                if tree.root().state().requirement() != state.requirement() {
                    tracing::warn!(
                        "Persisted tree for run {} was built for a different requirement",
                        self.config.run_id
                    );
                }
                tracing::info!(
                    "Resuming run {} with {} nodes after {} rollouts",
                    self.config.run_id,
                    tree.len(),
                    tree.completed_rollouts()
                );
                tree.apply_limits(self.config.max_depth, self.config.max_children);
                Ok(tree)
            }
            Err(PersistenceError::Invariant(message)) => {
                Err(SearchError::InvariantViolation(message))
            }
            Err(e) => {
                tracing::warn!(
                    "Cannot resume run {}: {}; starting from a fresh root",
                    self.config.run_id,
                    e
                );
                Ok(Tree::new(state))
            }
        }
    }

    /// One rollout. Parents whose generation fails are excluded and the
    /// policy is asked again.
    async fn rollout(&mut self, tree: &mut Tree, reflection: bool) -> Rollout {
        let mut excluded = HashSet::new();

        loop {
            // SELECT
            let Some(parent_id) = self.policy.select_node_to_expand(tree, &excluded) else {
                return if excluded.is_empty() {
                    Rollout::NoCandidates
                } else {
                    Rollout::GenerationFailed
                };
            };
            let parent = tree.get(parent_id);
            let parent_state = parent.state().clone();
            let parent_record = parent.record().cloned();
            let parent_reward = parent.raw_reward();

            // EXPAND
            let (prompt, critique) = self
                .prepare_prompt(parent_state, parent_record.as_ref(), parent_reward, reflection)
                .await;
            let candidate = match self.generate(&prompt, critique.as_ref()).await {
                Ok(candidate) => candidate,
                Err(e) => {
                    tracing::warn!("Giving up on parent {}: {}", parent_id, e);
                    excluded.insert(parent_id);
                    continue;
                }
            };

            // EVALUATE
            let (reward, record) = match self.evaluator.evaluate(&candidate).await {
                Ok(evaluation) => evaluation.into_parts(),
                Err(e) => {
                    tracing::warn!(
                        "Execution failed for child of node {}: {}; recording reward {}",
                        parent_id,
                        e,
                        self.config.failure_reward
                    );
                    (self.config.failure_reward, ExecutionRecord::failure(&e))
                }
            };

            // BACKPROPAGATE
            let child = tree.add_child(parent_id, candidate, reward, record, self.config.max_depth);
            tree.backpropagate(child, reward);
            tree.refresh_exhausted(child, self.config.max_children);
            return Rollout::Expanded(child);
        }
    }

    /// Build the state handed to the code generator, plus the critique if
    /// reflection ran.
    ///
    /// Fixed insights take precedence over reflection.
    async fn prepare_prompt(
        &self,
        state: SolutionState,
        record: Option<&ExecutionRecord>,
        reward: Option<f64>,
        reflection: bool,
    ) -> (SolutionState, Option<Critique>) {
        if self.config.use_fixed_insights {
            let state = merge_insights(state, &self.config.fixed_insights);
            return (state, None);
        }

        let below_threshold = reward.is_some_and(|r| r < self.config.success_threshold);
        let Some(record) = record.filter(|_| reflection && below_threshold) else {
            return (state, None);
        };

        match self.reflector.reflect(&state, record).await {
            Ok(critique) => {
                let state = merge_insights(state, &[critique.as_str().to_string()]);
                (state, Some(critique))
            }
            Err(e) => {
                tracing::warn!("{}; generating without a critique", e);
                (state, None)
            }
        }
    }

    /// Call the generator, retrying up to `generation_retries` times.
    async fn generate(
        &self,
        prompt: &SolutionState,
        critique: Option<&Critique>,
    ) -> std::result::Result<SolutionState, GenerationError> {
        let mut attempt = 0;
        loop {
            match self.generator.generate(prompt, critique).await {
                Ok(candidate) => return Ok(candidate),
                Err(e) if attempt < self.config.generation_retries => {
                    attempt += 1;
                    tracing::warn!(
                        "{} (attempt {} of {})",
                        e,
                        attempt,
                        self.config.generation_retries + 1
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Append the insights `state` does not already carry.
fn merge_insights(state: SolutionState, insights: &[String]) -> SolutionState {
    let fresh: Vec<String> = insights
        .iter()
        .filter(|i| !state.insights().contains(i))
        .cloned()
        .collect();
    state.with_insights(fresh)
}
