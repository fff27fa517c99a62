//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Once;

use arbor::{NodeKey, TreeConfig, TreeStore};
use serde_json::{Value, json};
use simplelog::{Config, LevelFilter, TestLogger};

static LOGGER: Once = Once::new();

/// Route `log` output through the test harness.
pub fn init_logger() {
    LOGGER.call_once(|| {
        let _ = TestLogger::init(LevelFilter::Trace, Config::default());
    });
}

/// `[{id:1, children:[{id:2},{id:3}]}]`
pub fn family() -> Vec<Value> {
    vec![json!({"id": 1, "label": "parent", "children": [
        {"id": 2, "label": "first"},
        {"id": 3, "label": "second"}
    ]})]
}

/// A three-level tree with two top-level branches.
pub fn forest() -> Vec<Value> {
    vec![
        json!({"id": 1, "label": "src", "children": [
            {"id": 2, "label": "app", "children": [
                {"id": 4, "label": "main.rs"},
                {"id": 5, "label": "cli.rs"}
            ]},
            {"id": 3, "label": "lib.rs"}
        ]}),
        json!({"id": 6, "label": "docs", "children": [
            {"id": 7, "label": "guide.md"}
        ]}),
    ]
}

pub fn keyed() -> TreeConfig {
    init_logger();
    TreeConfig::new().with_key("id")
}

pub fn store(config: TreeConfig, data: Vec<Value>) -> TreeStore {
    init_logger();
    TreeStore::new(config, data)
}

/// `(checked, indeterminate)` of the node with `key`.
pub fn check_state(store: &TreeStore, key: i64) -> (bool, bool) {
    let snapshot = store.snapshot(key).expect("node exists");
    (snapshot.checked, snapshot.indeterminate)
}

pub fn keys(keys: &[i64]) -> Vec<NodeKey> {
    keys.iter().map(|k| NodeKey::from(*k)).collect()
}

pub fn child_keys(store: &TreeStore, key: i64) -> Vec<NodeKey> {
    store
        .children(key)
        .into_iter()
        .filter_map(|id| store.snapshot(id).and_then(|s| s.key))
        .collect()
}

/// Every node's level is its parent's level plus one.
pub fn assert_levels(store: &TreeStore) {
    let mut stack = vec![store.root()];
    while let Some(id) = stack.pop() {
        let snapshot = store.snapshot(id).expect("node exists");
        let expected = snapshot
            .parent
            .and_then(|p| store.snapshot(p))
            .map_or(0, |p| p.level + 1);
        assert_eq!(snapshot.level, expected, "level of {}", id);
        stack.extend(snapshot.children);
    }
}

/// Every non-root node with children mirrors its children's summary.
pub fn assert_check_closure(store: &TreeStore) {
    let mut stack = store.children(store.root());
    while let Some(id) = stack.pop() {
        let snapshot = store.snapshot(id).expect("node exists");
        if !snapshot.children.is_empty() {
            let state = store.child_state(id).expect("node exists");
            assert_eq!(
                (snapshot.checked, snapshot.indeterminate),
                (state.all, state.half),
                "closure at {}",
                id
            );
        }
        stack.extend(snapshot.children);
    }
}
