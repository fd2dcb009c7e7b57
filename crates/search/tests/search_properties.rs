//! Property-based tests for the search tree.
//!
//! These check the structural invariants every completed search must hold:
//! - depth grows by exactly one from parent to child
//! - a node has at least as many visits as evaluated nodes in its subtree
//! - persistence round-trips the tree exactly
//! - baselines never expand from a terminal node

use codetree_core::{ExecutionError, NoReflection, SolutionState};
use codetree_search::scripted::{scored, ScriptedEvaluator, ScriptedGenerator};
use codetree_search::{
    policy::ucb_score, GreedyPolicy, MemoryStore, RandomPolicy, SearchConfig, SearchMode,
    SelectionPolicy, Tree, TreeSearch, TreeStore,
};
use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;
use std::sync::Arc;

// =============================================================================
// Strategies for generating test inputs
// =============================================================================

fn arb_mode() -> impl Strategy<Value = SearchMode> {
    prop_oneof![
        Just(SearchMode::Full),
        Just(SearchMode::Greedy),
        Just(SearchMode::Random),
    ]
}

/// Scripted evaluator outcomes: mostly rewards in [0, 1], some crashes.
fn arb_outcomes() -> impl Strategy<Value = Vec<Option<f64>>> {
    prop::collection::vec(prop::option::weighted(0.85, 0.0f64..1.0), 1..25)
}

fn arb_config() -> impl Strategy<Value = SearchConfig> {
    (arb_mode(), 1usize..5, 1usize..4, any::<u64>()).prop_map(
        |(mode, max_depth, max_children, seed)| SearchConfig {
            mode,
            max_depth,
            max_children,
            seed,
            ..Default::default()
        },
    )
}

/// Run a full search and hand back the finished tree.
fn run_search(config: SearchConfig, outcomes: &[Option<f64>], store: Arc<dyn TreeStore>) -> Tree {
    let evaluator = ScriptedEvaluator::new(outcomes.iter().map(|o| match o {
        Some(reward) => Ok(scored(*reward)),
        None => Err(ExecutionError::Crashed("scripted crash".into())),
    }));
    let mut search = TreeSearch::new(
        config,
        ScriptedGenerator::new(),
        evaluator,
        NoReflection,
        store,
    )
    .unwrap();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let rollouts = outcomes.len();
    // SearchExhausted is fine here; only the tree shape matters
    let _ = runtime.block_on(search.search(SolutionState::new("task"), false, rollouts, false));
    search.tree().cloned().unwrap()
}

// =============================================================================
// Tree shape
// =============================================================================

proptest! {
    #[test]
    fn prop_depth_is_parent_plus_one(config in arb_config(), outcomes in arb_outcomes()) {
        let max_depth = config.max_depth;
        let tree = run_search(config, &outcomes, Arc::new(MemoryStore::new()));

        prop_assert_eq!(tree.root().depth(), 0);
        prop_assert!(tree.root().parent().is_none());
        for node in tree.iter().filter(|n| !n.is_root()) {
            let parent = tree.get(node.parent().unwrap());
            prop_assert_eq!(node.depth(), parent.depth() + 1);
            prop_assert!(node.depth() <= max_depth);
            prop_assert!(parent.children().contains(&node.id()));
        }
    }

    #[test]
    fn prop_visits_cover_subtree(config in arb_config(), outcomes in arb_outcomes()) {
        let tree = run_search(config, &outcomes, Arc::new(MemoryStore::new()));

        for node in tree.iter() {
            let own = usize::from(!node.is_root());
            prop_assert!(
                node.visit_count() as usize >= tree.descendant_count(node.id()) + own,
                "node {} has {} visits but {} evaluated nodes below",
                node.id(),
                node.visit_count(),
                tree.descendant_count(node.id())
            );
        }
        // Every expansion visits the root exactly once
        prop_assert_eq!(tree.root().visit_count() as usize, tree.len() - 1);
    }

    #[test]
    fn prop_every_child_is_evaluated(config in arb_config(), outcomes in arb_outcomes()) {
        let tree = run_search(config, &outcomes, Arc::new(MemoryStore::new()));

        for node in tree.iter().filter(|n| !n.is_root()) {
            prop_assert!(node.raw_reward().is_some());
            prop_assert!(node.record().is_some());
            prop_assert!(node.visit_count() >= 1);
        }
    }

    #[test]
    fn prop_children_in_creation_order(config in arb_config(), outcomes in arb_outcomes()) {
        let tree = run_search(config, &outcomes, Arc::new(MemoryStore::new()));

        for node in tree.iter() {
            let children = node.children();
            prop_assert!(children.windows(2).all(|w| w[0] < w[1]));
            prop_assert!(children.iter().all(|c| *c > node.id()));
        }
    }
}

// =============================================================================
// Persistence
// =============================================================================

proptest! {
    #[test]
    fn prop_store_round_trip(config in arb_config(), outcomes in arb_outcomes()) {
        let store = Arc::new(MemoryStore::new());
        let run_id = config.run_id.clone();
        let tree = run_search(config, &outcomes, store.clone());

        store.save("copy", &tree).unwrap();
        prop_assert_eq!(&store.load("copy").unwrap(), &tree);
        // The engine's own checkpoint matches the final tree
        prop_assert_eq!(&store.load(&run_id).unwrap(), &tree);
    }
}

// =============================================================================
// Selection policies
// =============================================================================

proptest! {
    #[test]
    fn prop_baselines_never_pick_terminal(
        config in arb_config(),
        outcomes in arb_outcomes(),
        seed in any::<u64>()
    ) {
        let max_children = config.max_children;
        let mut tree = run_search(config, &outcomes, Arc::new(MemoryStore::new()));

        let mut policies: Vec<Box<dyn SelectionPolicy>> = vec![
            Box::new(GreedyPolicy::new(max_children)),
            Box::new(RandomPolicy::new(ChaCha8Rng::seed_from_u64(seed), max_children)),
        ];
        for policy in &mut policies {
            for _ in 0..5 {
                if let Some(id) = policy.select_node_to_expand(&mut tree, &HashSet::new()) {
                    let node = tree.get(id);
                    prop_assert!(!node.is_terminal());
                    prop_assert!(!node.is_exhausted());
                    prop_assert!(node.children().len() < max_children);
                }
            }
        }
    }

    #[test]
    fn prop_ucb_favors_fewer_visits(
        mean in -1.0f64..1.0,
        parent_visits in 2u32..1000,
        fewer in 1u32..500,
        extra in 1u32..500,
        exploration in 0.01f64..3.0
    ) {
        let less_visited = ucb_score(mean, parent_visits, fewer, exploration);
        let more_visited = ucb_score(mean, parent_visits, fewer + extra, exploration);
        prop_assert!(less_visited > more_visited);
    }
}
