//! Checkpointing and resuming a search.

use codetree_core::{NoReflection, SolutionState};
use codetree_search::scripted::{ScriptedEvaluator, ScriptedGenerator};
use codetree_search::{
    JsonFileStore, MemoryStore, NodeId, SearchConfig, SearchError, SearchMode, TreeSearch,
    TreeSnapshot, TreeStore, SNAPSHOT_VERSION,
};
use std::sync::Arc;

type ScriptedSearch = TreeSearch<ScriptedGenerator, ScriptedEvaluator, NoReflection>;

fn search_on(store: Arc<dyn TreeStore>, rewards: &[f64]) -> ScriptedSearch {
    search_with(SearchConfig::default(), store, rewards)
}

fn search_with(config: SearchConfig, store: Arc<dyn TreeStore>, rewards: &[f64]) -> ScriptedSearch {
    let config = SearchConfig {
        run_id: "resume-test".to_string(),
        ..config
    };
    TreeSearch::new(
        config,
        ScriptedGenerator::new(),
        ScriptedEvaluator::rewards(rewards.iter().copied()),
        NoReflection,
        store,
    )
    .unwrap()
}

#[tokio::test]
async fn test_resume_with_completed_budget_does_nothing() {
    let store: Arc<dyn TreeStore> = Arc::new(MemoryStore::new());

    let mut first = search_on(store.clone(), &[0.2, 0.9, 0.5]);
    let before = first
        .search(SolutionState::new("task"), false, 3, false)
        .await
        .unwrap();

    let mut second = search_on(store.clone(), &[1.0, 1.0, 1.0]);
    let after = second
        .search(SolutionState::new("task"), false, 3, true)
        .await
        .unwrap();

    assert_eq!(second.generator().calls(), 0);
    assert_eq!(second.evaluator().calls(), 0);
    assert_eq!(after.global_best.id(), before.global_best.id());
    assert_eq!(after.dev_best.id(), before.dev_best.id());
    assert_eq!(after.scores, before.scores);
    assert_eq!(second.tree(), first.tree());
}

#[tokio::test]
async fn test_resume_runs_only_missing_rollouts() {
    let store: Arc<dyn TreeStore> = Arc::new(MemoryStore::new());

    let mut first = search_on(store.clone(), &[0.2, 0.4]);
    first
        .search(SolutionState::new("task"), false, 2, false)
        .await
        .unwrap();

    let mut second = search_on(store.clone(), &[0.8, 0.1, 0.3]);
    let outcome = second
        .search(SolutionState::new("task"), false, 5, true)
        .await
        .unwrap();

    assert_eq!(second.evaluator().calls(), 3);
    let tree = second.tree().unwrap();
    assert_eq!(tree.completed_rollouts(), 5);
    assert_eq!(tree.len(), 6);
    assert_eq!(tree.root().visit_count(), 5);
    assert!((tree.root().value_sum() - (0.2 + 0.4 + 0.8 + 0.1 + 0.3)).abs() < 1e-9);
    assert_eq!(outcome.global_best.raw_reward(), Some(0.8));
}

#[tokio::test]
async fn test_resumed_ids_continue_without_reuse() {
    let store: Arc<dyn TreeStore> = Arc::new(MemoryStore::new());

    let mut first = search_on(store.clone(), &[0.2, 0.4]);
    first
        .search(SolutionState::new("task"), false, 2, false)
        .await
        .unwrap();
    let old_ids: Vec<_> = first.tree().unwrap().iter().map(|n| n.id()).collect();

    let mut second = search_on(store.clone(), &[0.5]);
    second
        .search(SolutionState::new("task"), false, 3, true)
        .await
        .unwrap();

    let tree = second.tree().unwrap();
    let new_node = tree.iter().last().unwrap();
    assert!(!old_ids.contains(&new_node.id()));
    assert!(old_ids.iter().all(|id| *id < new_node.id()));
}

#[tokio::test]
async fn test_missing_tree_falls_back_to_fresh_root() {
    let store: Arc<dyn TreeStore> = Arc::new(MemoryStore::new());
    let mut search = search_on(store, &[0.6]);

    let outcome = search
        .search(SolutionState::new("task"), false, 1, true)
        .await
        .unwrap();
    assert_eq!(outcome.global_best.raw_reward(), Some(0.6));
    assert_eq!(search.tree().unwrap().completed_rollouts(), 1);
}

#[tokio::test]
async fn test_corrupt_tree_falls_back_to_fresh_root() {
    let memory = Arc::new(MemoryStore::new());
    memory.put_raw("resume-test", "{\"version\": 1, \"nodes\": [");
    let mut search = search_on(memory, &[0.6, 0.7]);

    let outcome = search
        .search(SolutionState::new("task"), false, 2, true)
        .await
        .unwrap();
    assert_eq!(outcome.global_best.raw_reward(), Some(0.7));
}

#[tokio::test]
async fn test_unknown_snapshot_version_falls_back_to_fresh_root() {
    let memory = Arc::new(MemoryStore::new());
    let mut seed = search_on(memory.clone(), &[0.2, 0.4]);
    seed.search(SolutionState::new("task"), false, 2, false)
        .await
        .unwrap();

    let mut snapshot: TreeSnapshot =
        serde_json::from_str(&memory.raw("resume-test").unwrap()).unwrap();
    snapshot.version = SNAPSHOT_VERSION + 1;
    memory.put_raw("resume-test", serde_json::to_string(&snapshot).unwrap());

    let mut search = search_on(memory, &[0.6]);
    let outcome = search
        .search(SolutionState::new("task"), false, 1, true)
        .await
        .unwrap();

    assert_eq!(search.evaluator().calls(), 1);
    assert_eq!(search.tree().unwrap().len(), 2);
    assert_eq!(outcome.global_best.raw_reward(), Some(0.6));
}

#[tokio::test]
async fn test_resume_with_smaller_max_depth() {
    let memory: Arc<dyn TreeStore> = Arc::new(MemoryStore::new());
    let deep = SearchConfig {
        mode: SearchMode::Greedy,
        max_depth: 5,
        ..Default::default()
    };
    // Rising rewards make greedy build one chain: depths 1, 2, 3
    let mut first = search_with(deep.clone(), memory.clone(), &[0.1, 0.2, 0.3]);
    first
        .search(SolutionState::new("task"), false, 3, false)
        .await
        .unwrap();
    assert_eq!(first.tree().unwrap().iter().map(|n| n.depth()).max(), Some(3));

    let shallow = SearchConfig {
        max_depth: 2,
        ..deep
    };
    let mut second = search_with(shallow, memory, &[0.4, 0.5]);
    second
        .search(SolutionState::new("task"), false, 5, true)
        .await
        .unwrap();

    let tree = second.tree().unwrap();
    assert_eq!(second.evaluator().calls(), 2);
    assert_eq!(tree.get(NodeId::ROOT).children().len(), 1);
    for node in tree.iter().skip(4) {
        assert!(node.depth() <= 2, "node {} at depth {}", node.id(), node.depth());
        assert!(node.is_terminal());
    }
    assert!(tree.iter().filter(|n| n.depth() >= 2).all(|n| n.is_terminal()));
}

#[tokio::test]
async fn test_malformed_tree_aborts_before_any_rollout() {
    let memory = Arc::new(MemoryStore::new());
    let mut seed = search_on(memory.clone(), &[0.2, 0.4]);
    seed.search(SolutionState::new("task"), false, 2, false)
        .await
        .unwrap();

    // Point node 2 at a parent that does not exist
    let mut snapshot: TreeSnapshot =
        serde_json::from_str(&memory.raw("resume-test").unwrap()).unwrap();
    let dangling = serde_json::from_value(serde_json::json!(42)).unwrap();
    snapshot.nodes[2].parent = Some(dangling);
    memory.put_raw("resume-test", serde_json::to_string(&snapshot).unwrap());

    let mut search = search_on(memory, &[0.9]);
    let result = search
        .search(SolutionState::new("task"), false, 5, true)
        .await;

    assert!(matches!(result, Err(SearchError::InvariantViolation(_))));
    assert_eq!(search.generator().calls(), 0);
    assert_eq!(search.evaluator().calls(), 0);
}

#[tokio::test]
async fn test_duplicate_ids_abort() {
    let memory = Arc::new(MemoryStore::new());
    let mut seed = search_on(memory.clone(), &[0.2, 0.4]);
    seed.search(SolutionState::new("task"), false, 2, false)
        .await
        .unwrap();

    let mut snapshot: TreeSnapshot =
        serde_json::from_str(&memory.raw("resume-test").unwrap()).unwrap();
    snapshot.nodes[2].id = snapshot.nodes[1].id;
    memory.put_raw("resume-test", serde_json::to_string(&snapshot).unwrap());

    let mut search = search_on(memory, &[0.9]);
    let result = search
        .search(SolutionState::new("task"), false, 5, true)
        .await;
    assert!(matches!(result, Err(SearchError::InvariantViolation(_))));
}

#[tokio::test]
async fn test_checkpoint_after_every_rollout() {
    let memory = Arc::new(MemoryStore::new());
    let mut search = search_on(memory.clone(), &[0.1, 0.2, 0.3]);
    search
        .search(SolutionState::new("task"), false, 3, false)
        .await
        .unwrap();

    let saved = memory.load("resume-test").unwrap();
    assert_eq!(saved.completed_rollouts(), 3);
    assert_eq!(&saved, search.tree().unwrap());
}

#[tokio::test]
async fn test_file_store_resume() {
    let dir = tempfile::tempdir().unwrap();

    let mut first = search_on(Arc::new(JsonFileStore::new(dir.path())), &[0.3, 0.7]);
    let before = first
        .search(SolutionState::new("task"), false, 2, false)
        .await
        .unwrap();

    let mut second = search_on(Arc::new(JsonFileStore::new(dir.path())), &[]);
    let after = second
        .search(SolutionState::new("task"), false, 2, true)
        .await
        .unwrap();

    assert!(dir.path().join("resume-test.json").exists());
    assert_eq!(second.evaluator().calls(), 0);
    assert_eq!(after.scores, before.scores);
    assert_eq!(second.tree(), first.tree());
}
