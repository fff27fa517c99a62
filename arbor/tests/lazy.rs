mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arbor::{LoadRequest, LoadResolver, NodeKey, Props, TreeConfig, TreeStore};
use common::*;
use serde_json::{Value, json};
use tokio::sync::oneshot;

/// Children served by the async loader: two per node, keyed below the
/// parent, three levels deep.
fn children_of(request: &LoadRequest) -> Vec<Value> {
    match request.level {
        0 => vec![json!({"id": 1, "label": "root-1"})],
        3.. => Vec::new(),
        _ => {
            let base = request.data["id"].as_i64().unwrap_or(0) * 10;
            vec![json!({"id": base + 1}), json!({"id": base + 2})]
        }
    }
}

/// A lazy store whose loader resolves on a tokio task after `delay`.
fn delayed_store(config: TreeConfig, delay: Duration, calls: Arc<AtomicUsize>) -> TreeStore {
    let config = config.with_lazy_load(move |request, resolver: LoadResolver| {
        calls.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let children = children_of(&request);
            resolver.resolve(children);
        });
    });
    store(config, Vec::new())
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(30)).await;
}

// ============================================================================
// Expand through the loader
// ============================================================================

#[tokio::test]
async fn test_expand_waits_for_load() {
    let calls = Arc::new(AtomicUsize::new(0));
    let store = delayed_store(keyed(), Duration::from_millis(10), Arc::clone(&calls));
    settle().await;
    let one = store.get_node(1).expect("root children loaded");

    let (tx, rx) = oneshot::channel();
    store.expand(
        one,
        false,
        Some(Box::new(move |children: Option<Vec<Value>>| {
            let _ = tx.send(children);
        })),
    );

    let snapshot = store.snapshot(one).unwrap();
    assert!(snapshot.loading);
    assert!(!snapshot.expanded);

    let children = rx.await.unwrap().expect("callback receives loaded records");
    assert_eq!(children, [json!({"id": 11}), json!({"id": 12})]);

    let snapshot = store.snapshot(one).unwrap();
    assert!(snapshot.expanded);
    assert!(snapshot.loaded);
    assert!(!snapshot.loading);
    assert_eq!(snapshot.children.len(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_concurrent_expands_load_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let store = delayed_store(keyed(), Duration::from_millis(10), Arc::clone(&calls));
    settle().await;

    store.expand(1, false, None);
    store.expand(1, false, None);
    store.load_data(1, None);
    settle().await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(child_keys(&store, 1), keys(&[11, 12]));
}

#[tokio::test]
async fn test_expand_parent_after_load() {
    let calls = Arc::new(AtomicUsize::new(0));
    let store = delayed_store(keyed(), Duration::from_millis(5), calls);
    settle().await;
    store.expand(1, false, None);
    settle().await;
    store.collapse(1);

    store.expand(11, true, None);
    settle().await;
    assert!(store.snapshot(11).is_some_and(|s| s.expanded));
    assert!(store.snapshot(1).is_some_and(|s| s.expanded));
}

#[tokio::test]
async fn test_removed_while_loading() {
    let calls = Arc::new(AtomicUsize::new(0));
    let store = delayed_store(keyed(), Duration::from_millis(10), calls);
    settle().await;

    let called = Arc::new(Mutex::new(false));
    let flag = Arc::clone(&called);
    store.expand(
        1,
        false,
        Some(Box::new(move |_| {
            *flag.lock().unwrap() = true;
        })),
    );
    assert!(store.remove(1));
    settle().await;

    assert!(store.get_node(11).is_none());
    assert!(!*called.lock().unwrap());
    assert!(store.children(store.root()).is_empty());
}

#[tokio::test]
async fn test_default_expand_all_loads_every_level() {
    let calls = Arc::new(AtomicUsize::new(0));
    let config = keyed().with_default_expand_all(true);
    let store = delayed_store(config, Duration::from_millis(1), Arc::clone(&calls));
    settle().await;

    // Each loaded level expands and loads the next one; stop once there is
    // something three levels down.
    for _ in 0..20 {
        if store.get_node(111).is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(store.snapshot(1).is_some_and(|s| s.expanded));
    assert!(store.snapshot(11).is_some_and(|s| s.expanded));
    assert!(store.get_node(111).is_some());
}

// ============================================================================
// Checkboxes and lazy children
// ============================================================================

#[tokio::test]
async fn test_check_descendants_checks_loaded_children() {
    let calls = Arc::new(AtomicUsize::new(0));
    let store = delayed_store(
        keyed().with_check_descendants(true),
        Duration::from_millis(5),
        calls,
    );
    settle().await;

    store.set_checked(1, true, true);
    settle().await;
    let checked = store.get_checked_keys(false, false);
    assert!(checked.contains(&NodeKey::from(11)));
    assert!(checked.contains(&NodeKey::from(12)));
    assert!(checked.contains(&NodeKey::from(1)));
}

#[tokio::test]
async fn test_without_check_descendants_nothing_loads() {
    let calls = Arc::new(AtomicUsize::new(0));
    let store = delayed_store(keyed(), Duration::from_millis(5), Arc::clone(&calls));
    settle().await;

    store.set_checked(1, true, true);
    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(store.snapshot(1).is_some_and(|s| !s.loading && !s.loaded));
    assert_eq!(store.get_checked_keys(false, false), keys(&[1]));
}

// ============================================================================
// Leaf hints
// ============================================================================

#[test]
fn test_leaf_hint_controls_affordance() {
    let config = keyed()
        .with_props(Props::new().with_is_leaf("leaf"))
        .with_lazy_load(|request, resolver| {
            if request.level == 0 {
                resolver.resolve(vec![json!({"id": 1, "leaf": true}), json!({"id": 2})]);
            }
        });
    let store = store(config, Vec::new());
    let rows = store.visible_nodes();
    assert_eq!(rows.len(), 2);
    assert!(!rows[0].has_children);
    assert!(rows[1].has_children);
}

#[test]
fn test_never_resolved_load_stays_loading() {
    let config = keyed().with_lazy_load(|request, resolver| {
        if request.level == 0 {
            resolver.resolve(vec![json!({"id": 1})]);
        }
    });
    let store = store(config, Vec::new());
    store.expand(1, false, None);
    assert!(store.snapshot(1).is_some_and(|s| s.loading && !s.loaded));
    assert!(!store.expand(99, false, None));
}
