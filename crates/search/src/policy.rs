//! Selection policies: which existing node the next child grows from.
//!
//! All three policies share the tree, the expansion step and
//! backpropagation. They differ only in how they pick the parent.

use crate::{
    config::{SearchConfig, SearchMode},
    node::{Node, NodeId},
    tree::Tree,
};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::cmp::Ordering;
use std::collections::HashSet;

/// Chooses the node to expand from.
pub trait SelectionPolicy: Send {
    /// Returns `None` when no node outside `excluded` can be expanded.
    ///
    /// Never returns a terminal or exhausted node. May update exhaustion
    /// flags on the way.
    fn select_node_to_expand(
        &mut self,
        tree: &mut Tree,
        excluded: &HashSet<NodeId>,
    ) -> Option<NodeId>;
}

/// Build the policy named by `config.mode`.
pub fn policy_for(config: &SearchConfig) -> Box<dyn SelectionPolicy> {
    match config.mode {
        SearchMode::Full => Box::new(UcbPolicy::new(
            config.exploration_constant,
            config.max_children,
        )),
        SearchMode::Greedy => Box::new(GreedyPolicy::new(config.max_children)),
        SearchMode::Random => Box::new(RandomPolicy::new(
            ChaCha8Rng::seed_from_u64(config.seed),
            config.max_children,
        )),
    }
}

/// Upper-confidence bound for a child.
///
/// UCB = mean + c * sqrt(ln(N_parent) / N_child)
///
/// Unvisited children score +inf so they are always tried first.
pub fn ucb_score(mean_value: f64, parent_visits: u32, child_visits: u32, exploration: f64) -> f64 {
    if child_visits == 0 {
        return f64::INFINITY;
    }
    let parent = f64::from(parent_visits.max(1));
    mean_value + exploration * (parent.ln() / f64::from(child_visits)).sqrt()
}

/// Full tree search: descend by UCB until a node that can still grow.
#[derive(Clone, Debug)]
pub struct UcbPolicy {
    exploration: f64,
    max_children: usize,
}

impl UcbPolicy {
    pub fn new(exploration: f64, max_children: usize) -> Self {
        Self {
            exploration,
            max_children,
        }
    }

    /// Best non-exhausted child by UCB. Ties go to the lowest id.
    fn best_child(&self, tree: &Tree, node: &Node, blocked: &HashSet<NodeId>) -> Option<NodeId> {
        let parent_visits = node.visit_count();
        let mut best = None;
        let mut best_score = f64::NEG_INFINITY;

        for &child_id in node.children() {
            let child = tree.get(child_id);
            if child.is_exhausted() || blocked.contains(&child_id) {
                continue;
            }
            let score = ucb_score(
                child.mean_value(),
                parent_visits,
                child.visit_count(),
                self.exploration,
            );
            if best.is_none() || score > best_score {
                best_score = score;
                best = Some(child_id);
            }
        }

        best
    }
}

impl SelectionPolicy for UcbPolicy {
    fn select_node_to_expand(
        &mut self,
        tree: &mut Tree,
        excluded: &HashSet<NodeId>,
    ) -> Option<NodeId> {
        // Dead ends found during this call; each restart rules out one more node.
        let mut blocked = HashSet::new();

        'restart: loop {
            let mut current = NodeId::ROOT;
            loop {
                let node = tree.get(current);
                if node.is_exhausted() || blocked.contains(&current) {
                    return None;
                }
                if node.is_expandable(self.max_children) && !excluded.contains(&current) {
                    return Some(current);
                }

                match self.best_child(tree, node, &blocked) {
                    Some(child) => current = child,
                    None => {
                        if node.children().len() >= self.max_children
                            && node.children().iter().all(|c| tree.get(*c).is_exhausted())
                        {
                            tree.refresh_exhausted(current, self.max_children);
                        } else {
                            blocked.insert(current);
                        }
                        continue 'restart;
                    }
                }
            }
        }
    }
}

/// Greedy baseline: the expandable node with the best reward so far.
///
/// Ties go to the deeper node, then to the lowest id. The unevaluated root
/// ranks below every evaluated node.
#[derive(Clone, Debug)]
pub struct GreedyPolicy {
    max_children: usize,
}

impl GreedyPolicy {
    pub fn new(max_children: usize) -> Self {
        Self { max_children }
    }
}

fn greedy_order(a: &Node, b: &Node) -> Ordering {
    let ra = a.raw_reward().unwrap_or(f64::NEG_INFINITY);
    let rb = b.raw_reward().unwrap_or(f64::NEG_INFINITY);
    ra.total_cmp(&rb)
        .then(a.depth().cmp(&b.depth()))
        .then(b.id().cmp(&a.id()))
}

impl SelectionPolicy for GreedyPolicy {
    fn select_node_to_expand(
        &mut self,
        tree: &mut Tree,
        excluded: &HashSet<NodeId>,
    ) -> Option<NodeId> {
        tree.iter()
            .filter(|n| n.is_expandable(self.max_children) && !excluded.contains(&n.id()))
            .max_by(|a, b| greedy_order(a, b))
            .map(Node::id)
    }
}

/// Random baseline: a uniformly chosen expandable node.
#[derive(Clone, Debug)]
pub struct RandomPolicy<R: Rng> {
    rng: R,
    max_children: usize,
}

impl<R: Rng> RandomPolicy<R> {
    pub fn new(rng: R, max_children: usize) -> Self {
        Self { rng, max_children }
    }
}

impl<R: Rng + Send> SelectionPolicy for RandomPolicy<R> {
    fn select_node_to_expand(
        &mut self,
        tree: &mut Tree,
        excluded: &HashSet<NodeId>,
    ) -> Option<NodeId> {
        let candidates: Vec<NodeId> = tree
            .iter()
            .filter(|n| n.is_expandable(self.max_children) && !excluded.contains(&n.id()))
            .map(Node::id)
            .collect();

        if candidates.is_empty() {
            return None;
        }
        let idx = self.rng.gen_range(0..candidates.len());
        Some(candidates[idx])
    }
}
