//! Search node types for tree storage.
//!
//! Nodes live in an arena and refer to each other by [`NodeId`]. A node's
//! parent is stored as an id, its children as an ordered list of ids.

use codetree_core::{ExecutionRecord, SolutionState};
use serde::{Deserialize, Serialize};

/// Index into the node arena.
///
/// Ids are handed out in creation order and never reused, so a node's id
/// is also its position in the arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// The root node is always at index 0.
    pub const ROOT: NodeId = NodeId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Statistics accumulated by backpropagation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeStats {
    /// Rollouts that passed through this node.
    pub visit_count: u32,

    /// Sum of rewards backpropagated through this node.
    pub value_sum: f64,
}

impl NodeStats {
    /// Mean backpropagated reward.
    ///
    /// Returns 0.0 if the node has never been visited.
    pub fn mean_value(&self) -> f64 {
        if self.visit_count == 0 {
            0.0
        } else {
            self.value_sum / f64::from(self.visit_count)
        }
    }

    pub(crate) fn record(&mut self, reward: f64) {
        self.visit_count += 1;
        self.value_sum += reward;
    }
}

/// A node in the search tree.
///
/// Identity (`id`, `parent`, `depth`, `state`) is fixed at creation.
/// Statistics and the child list grow as the search proceeds.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) state: SolutionState,
    pub(crate) raw_reward: Option<f64>,
    pub(crate) record: Option<ExecutionRecord>,
    pub(crate) stats: NodeStats,
    pub(crate) depth: usize,
    pub(crate) is_terminal: bool,
    /// Every path below this node has reached a terminal node.
    pub(crate) exhausted: bool,
}

impl Node {
    /// Create the root node. It is never evaluated.
    pub(crate) fn root(state: SolutionState) -> Self {
        Self {
            id: NodeId::ROOT,
            parent: None,
            children: Vec::new(),
            state,
            raw_reward: None,
            record: None,
            stats: NodeStats::default(),
            depth: 0,
            is_terminal: false,
            exhausted: false,
        }
    }

    /// Create an evaluated child of `parent`.
    pub(crate) fn child(
        id: NodeId,
        parent: &Node,
        state: SolutionState,
        raw_reward: f64,
        record: ExecutionRecord,
        max_depth: usize,
    ) -> Self {
        let depth = parent.depth + 1;
        let is_terminal = depth >= max_depth || record.terminal;
        Self {
            id,
            parent: Some(parent.id),
            children: Vec::new(),
            state,
            raw_reward: Some(raw_reward),
            record: Some(record),
            stats: NodeStats::default(),
            depth,
            is_terminal,
            exhausted: is_terminal,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in creation order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn state(&self) -> &SolutionState {
        &self.state
    }

    /// Reward of this node's own candidate. `None` for the root.
    pub fn raw_reward(&self) -> Option<f64> {
        self.raw_reward
    }

    pub fn record(&self) -> Option<&ExecutionRecord> {
        self.record.as_ref()
    }

    pub fn stats(&self) -> &NodeStats {
        &self.stats
    }

    pub fn visit_count(&self) -> u32 {
        self.stats.visit_count
    }

    pub fn value_sum(&self) -> f64 {
        self.stats.value_sum
    }

    pub fn mean_value(&self) -> f64 {
        self.stats.mean_value()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_terminal(&self) -> bool {
        self.is_terminal
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Whether the evaluation of this node's candidate succeeded.
    pub fn is_evaluated_ok(&self) -> bool {
        self.record.as_ref().is_some_and(ExecutionRecord::is_success)
    }

    /// Whether a new child may be generated from this node.
    pub fn is_expandable(&self, max_children: usize) -> bool {
        !self.is_terminal && !self.exhausted && self.children.len() < max_children
    }
}
