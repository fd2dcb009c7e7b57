//! Plain-text rendering of a search tree.

use crate::{node::NodeId, tree::Tree};
use std::collections::HashSet;

/// Indented tree listing plus the number of distinct programs generated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeReport {
    pub text: String,
    pub unique_programs: usize,
}

/// Render one line per node, children indented under their parent.
///
/// ```text
/// Node-0 depth=0 reward=n/a visits=3 mean=0.533
///   Node-1 depth=1 reward=0.200 visits=1 mean=0.200
/// ```
pub fn render_tree(tree: &Tree) -> TreeReport {
    let mut text = String::new();
    let mut stack = vec![(NodeId::ROOT, 0usize)];

    while let Some((id, indent)) = stack.pop() {
        let node = tree.get(id);
        let reward = node
            .raw_reward()
            .map_or_else(|| "n/a".to_string(), |r| format!("{r:.3}"));
        text.push_str(&format!(
            "{:indent$}Node-{} depth={} reward={} visits={} mean={:.3}",
            "",
            node.id(),
            node.depth(),
            reward,
            node.visit_count(),
            node.mean_value(),
            indent = indent * 2,
        ));
        if node.record().is_some_and(|r| !r.is_success()) {
            text.push_str(" [failed]");
        }
        if node.is_terminal() {
            text.push_str(" [terminal]");
        }
        text.push('\n');

        // Reverse so children print in creation order.
        for child in node.children().iter().rev() {
            stack.push((*child, indent + 1));
        }
    }

    let unique_programs = tree
        .iter()
        .filter(|n| !n.is_root())
        .filter_map(|n| n.state().program())
        .collect::<HashSet<_>>()
        .len();

    TreeReport {
        text,
        unique_programs,
    }
}
