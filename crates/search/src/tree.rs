//! Arena-allocated search tree.
//!
//! Using a Vec<Node> with indices keeps parent links as plain ids, so the
//! tree has no ownership cycles and serializes as a flat list.

use crate::node::{Node, NodeId};
use codetree_core::{ExecutionRecord, SolutionState};

/// Arena-allocated search tree.
///
/// Nodes are only ever appended. A node's id equals its arena index.
#[derive(Clone, Debug, PartialEq)]
pub struct Tree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) completed_rollouts: usize,
}

impl Tree {
    /// Create a tree holding only a root for `state`.
    pub fn new(state: SolutionState) -> Self {
        Self {
            nodes: vec![Node::root(state)],
            completed_rollouts: 0,
        }
    }

    /// Get a reference to a node by ID.
    ///
    /// # Panics
    /// Panics if the NodeId does not belong to this tree.
    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Get a node by ID, or `None` if it does not belong to this tree.
    pub fn try_get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn root(&self) -> &Node {
        self.get(NodeId::ROOT)
    }

    /// Get the number of nodes in the tree, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: the root exists for the tree's whole lifetime.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Rollouts fully completed on this tree, across resumes.
    pub fn completed_rollouts(&self) -> usize {
        self.completed_rollouts
    }

    pub(crate) fn record_rollout(&mut self) {
        self.completed_rollouts += 1;
    }

    /// Attach an already-evaluated child under `parent`, returning its ID.
    pub(crate) fn add_child(
        &mut self,
        parent: NodeId,
        state: SolutionState,
        raw_reward: f64,
        record: ExecutionRecord,
        max_depth: usize,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        let child = Node::child(id, self.get(parent), state, raw_reward, record, max_depth);
        self.nodes.push(child);
        self.get_mut(parent).children.push(id);
        id
    }

    /// Ids from `id` up to and including the root.
    pub fn path_to_root(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = vec![id];
        let mut current = self.get(id).parent;
        while let Some(parent) = current {
            path.push(parent);
            current = self.get(parent).parent;
        }
        path
    }

    /// Add `reward` to every node from `leaf` up to the root.
    pub(crate) fn backpropagate(&mut self, leaf: NodeId, reward: f64) {
        for id in self.path_to_root(leaf) {
            self.get_mut(id).stats.record(reward);
        }
    }

    /// Re-derive the exhausted flag of `id` and its ancestors.
    ///
    /// A node is exhausted once it is terminal, or it has all its children
    /// and every one of them is exhausted.
    pub(crate) fn refresh_exhausted(&mut self, id: NodeId, max_children: usize) {
        for id in self.path_to_root(id) {
            let node = self.get(id);
            let exhausted = node.is_terminal
                || (node.children.len() >= max_children
                    && node.children.iter().all(|c| self.get(*c).exhausted));
            if !exhausted {
                break;
            }
            self.get_mut(id).exhausted = true;
        }
    }

    /// Re-derive every terminal and exhausted flag for new limits.
    ///
    /// Used on a resumed tree, whose flags were set under the limits of an
    /// earlier run. Nodes already deeper than `max_depth` stay in the tree
    /// but are terminal.
    pub(crate) fn apply_limits(&mut self, max_depth: usize, max_children: usize) {
        // Children always have higher ids than their parent.
        for index in (0..self.nodes.len()).rev() {
            let node = &self.nodes[index];
            let is_terminal = !node.is_root()
                && (node.depth >= max_depth || node.record.as_ref().is_some_and(|r| r.terminal));
            let exhausted = is_terminal
                || (node.children.len() >= max_children
                    && node.children.iter().all(|c| self.get(*c).exhausted));

            let node = &mut self.nodes[index];
            node.is_terminal = is_terminal;
            node.exhausted = exhausted;
        }
    }

    /// Number of non-root nodes in the subtree below `id`.
    pub fn descendant_count(&self, id: NodeId) -> usize {
        self.get(id)
            .children
            .iter()
            .map(|c| 1 + self.descendant_count(*c))
            .sum()
    }
}
