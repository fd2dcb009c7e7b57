//! Flat, serializable form of a [`Tree`].
//!
//! A snapshot lists every node with its parent id. Rebuilding a tree from a
//! snapshot checks that the list really describes one tree: a single root,
//! contiguous unique ids, parents created before their children and depths
//! that grow by one per level.

use crate::{
    node::{Node, NodeId, NodeStats},
    tree::Tree,
    PersistenceError,
};
use codetree_core::{ExecutionRecord, SolutionState};
use serde::{Deserialize, Serialize};

/// Snapshot format version written by this crate.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TreeSnapshot {
    pub version: u32,
    pub completed_rollouts: usize,
    pub nodes: Vec<NodeSnapshot>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub state: SolutionState,
    pub raw_reward: Option<f64>,
    pub record: Option<ExecutionRecord>,
    pub visit_count: u32,
    pub value_sum: f64,
    pub depth: usize,
    pub is_terminal: bool,
    #[serde(default)]
    pub exhausted: bool,
}

impl From<&Tree> for TreeSnapshot {
    fn from(tree: &Tree) -> Self {
        let nodes = tree
            .iter()
            .map(|node| NodeSnapshot {
                id: node.id,
                parent: node.parent,
                state: node.state.clone(),
                raw_reward: node.raw_reward,
                record: node.record.clone(),
                visit_count: node.stats.visit_count,
                value_sum: node.stats.value_sum,
                depth: node.depth,
                is_terminal: node.is_terminal,
                exhausted: node.exhausted,
            })
            .collect();

        Self {
            version: SNAPSHOT_VERSION,
            completed_rollouts: tree.completed_rollouts,
            nodes,
        }
    }
}

fn malformed(message: String) -> PersistenceError {
    PersistenceError::Invariant(message)
}

impl TryFrom<TreeSnapshot> for Tree {
    type Error = PersistenceError;

    fn try_from(snapshot: TreeSnapshot) -> Result<Self, Self::Error> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(PersistenceError::UnsupportedVersion {
                found: snapshot.version,
                expected: SNAPSHOT_VERSION,
            });
        }

        let mut entries = snapshot.nodes;
        if entries.is_empty() {
            return Err(malformed("snapshot contains no nodes".to_string()));
        }
        entries.sort_by_key(|n| n.id);

        let mut nodes: Vec<Node> = Vec::with_capacity(entries.len());
        for (index, entry) in entries.into_iter().enumerate() {
            if entry.id.0 < index {
                return Err(malformed(format!("duplicate node id {}", entry.id)));
            }
            if entry.id.0 > index {
                return Err(malformed(format!("missing node id {index}")));
            }
            if !entry.value_sum.is_finite() || entry.raw_reward.is_some_and(|r| !r.is_finite()) {
                return Err(malformed(format!("node {} has a non-finite reward", entry.id)));
            }

            match entry.parent {
                None if index != 0 => {
                    return Err(malformed(format!("node {} is a second root", entry.id)));
                }
                None if entry.depth != 0 => {
                    return Err(malformed(format!("root has depth {}", entry.depth)));
                }
                None => {}
                Some(parent) if parent.0 >= nodes.len() => {
                    return Err(malformed(format!(
                        "node {} has dangling parent {parent}",
                        entry.id
                    )));
                }
                Some(parent) => {
                    let expected = nodes[parent.0].depth + 1;
                    if entry.depth != expected {
                        return Err(malformed(format!(
                            "node {} has depth {} but its parent {parent} has depth {}",
                            entry.id,
                            entry.depth,
                            expected - 1
                        )));
                    }
                    if entry.raw_reward.is_none() {
                        return Err(malformed(format!("node {} was never evaluated", entry.id)));
                    }
                    nodes[parent.0].children.push(entry.id);
                }
            }

            nodes.push(Node {
                id: entry.id,
                parent: entry.parent,
                children: Vec::new(),
                state: entry.state,
                raw_reward: entry.raw_reward,
                record: entry.record,
                stats: NodeStats {
                    visit_count: entry.visit_count,
                    value_sum: entry.value_sum,
                },
                depth: entry.depth,
                is_terminal: entry.is_terminal,
                exhausted: entry.exhausted,
            });
        }

        Ok(Tree {
            nodes,
            completed_rollouts: snapshot.completed_rollouts,
        })
    }
}
