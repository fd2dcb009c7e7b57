//! Picking the final answers out of a finished tree.
//!
//! Two winners are reported. `global_best` maximizes the reward that guided
//! the search. `dev_best` maximizes a held-out score the search never saw,
//! which guards against a candidate that overfit the search signal.

use crate::{
    node::{Node, NodeId},
    tree::Tree,
    Result, SearchError,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Held-out score of a node, if it has one.
pub trait DevScore: Send + Sync {
    fn dev_score(&self, node: &Node) -> Option<f64>;
}

/// Reads `ExecutionRecord::dev_score`.
#[derive(Clone, Copy, Debug, Default)]
pub struct RecordedDevScore;

impl DevScore for RecordedDevScore {
    fn dev_score(&self, node: &Node) -> Option<f64> {
        node.record().and_then(|r| r.dev_score)
    }
}

impl<F> DevScore for F
where
    F: Fn(&Node) -> Option<f64> + Send + Sync,
{
    fn dev_score(&self, node: &Node) -> Option<f64> {
        self(node)
    }
}

/// Id and scores of one selected node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeScore {
    pub id: NodeId,
    pub raw_reward: f64,
    pub dev_score: Option<f64>,
}

/// Summary of both selections, for reporting.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    pub global_best: NodeScore,
    pub dev_best: NodeScore,
}

/// Ids of the two selected nodes plus their summary.
#[derive(Clone, Debug, PartialEq)]
pub struct BestNodes {
    pub global_best: NodeId,
    pub dev_best: NodeId,
    pub scores: Scores,
}

/// Higher score wins, then the shallower node, then the lower id.
fn rank(score_a: f64, a: &Node, score_b: f64, b: &Node) -> Ordering {
    score_a
        .total_cmp(&score_b)
        .then(b.depth().cmp(&a.depth()))
        .then(b.id().cmp(&a.id()))
}

/// Scan every node of `tree` for the two winners.
///
/// Only nodes whose execution succeeded are eligible. If no node carries a
/// held-out score, `dev_best` is `global_best`.
///
/// # Errors
/// `SearchExhausted` when no node besides the root was evaluated successfully.
pub fn select_best(tree: &Tree, dev: &dyn DevScore) -> Result<BestNodes> {
    let mut global: Option<(f64, &Node)> = None;
    let mut held_out: Option<(f64, &Node)> = None;

    for node in tree.iter().filter(|n| !n.is_root() && n.is_evaluated_ok()) {
        let Some(reward) = node.raw_reward() else {
            continue;
        };
        if global.map_or(true, |(best, b)| rank(reward, node, best, b).is_gt()) {
            global = Some((reward, node));
        }
        if let Some(score) = dev.dev_score(node).filter(|s| s.is_finite()) {
            if held_out.map_or(true, |(best, b)| rank(score, node, best, b).is_gt()) {
                held_out = Some((score, node));
            }
        }
    }

    let (global_reward, global_node) = global.ok_or(SearchError::SearchExhausted)?;
    let dev_node = held_out.map_or(global_node, |(_, n)| n);

    let score_of = |node: &Node, reward: f64| NodeScore {
        id: node.id(),
        raw_reward: reward,
        dev_score: dev.dev_score(node),
    };

    Ok(BestNodes {
        global_best: global_node.id(),
        dev_best: dev_node.id(),
        scores: Scores {
            global_best: score_of(global_node, global_reward),
            dev_best: score_of(dev_node, dev_node.raw_reward().unwrap_or(global_reward)),
        },
    })
}
