mod common;

use arbor::{DropGeometry, DropPosition, DropType, TreeEvent, TreeStore};
use common::*;
use serde_json::json;

const ROW: f64 = 24.0;

fn at(fraction: f64) -> DropGeometry {
    DropGeometry {
        offset: fraction * ROW,
        height: ROW,
    }
}

fn draggable() -> TreeStore {
    store(keyed().with_draggable(true), forest())
}

// ============================================================================
// Sessions
// ============================================================================

#[test]
fn test_drag_into_other_branch() {
    let store = draggable();
    let dragging = store.get_node(3).unwrap();
    assert!(store.drag_start(dragging));

    let over = store.drag_over(6, at(0.5)).unwrap();
    assert_eq!(over.drop_type, DropType::Inner);
    assert!(over.allow_drop);
    assert!(!over.show_indicator);

    let outcome = store.drag_end().unwrap();
    assert_eq!(outcome.dragging, dragging);
    assert_eq!(outcome.drop_type, DropType::Inner);
    assert_eq!(outcome.moved, store.get_node(3));
    assert!(store.snapshot(dragging).is_none());

    assert_eq!(child_keys(&store, 1), keys(&[2]));
    assert_eq!(child_keys(&store, 6), keys(&[7, 3]));
    assert_levels(&store);
}

#[test]
fn test_drag_subtree_before_sibling() {
    let store = draggable();
    store.drag_start(6);
    let over = store.drag_over(1, at(0.1)).unwrap();
    assert_eq!(over.drop_type, DropType::Before);
    assert!(over.show_indicator);
    store.drag_end();

    let top: Vec<_> = store
        .export_data()
        .iter()
        .map(|record| record["id"].clone())
        .collect();
    assert_eq!(top, [json!(6), json!(1)]);
    assert_eq!(child_keys(&store, 6), keys(&[7]));
}

#[test]
fn test_drop_keeps_checked_state_consistent() {
    let store = store(
        keyed().with_draggable(true).with_default_checked_keys([4]),
        forest(),
    );
    store.drag_start(4);
    store.drag_over(7, at(0.9));
    store.drag_end();

    assert_check_closure(&store);
    assert_eq!(check_state(&store, 2), (false, false));
    assert_eq!(check_state(&store, 6), (false, false));
}

#[test]
fn test_cannot_drop_into_own_subtree() {
    let store = draggable();
    store.drag_start(1);
    let over = store.drag_over(4, at(0.5)).unwrap();
    assert_eq!(over.drop_type, DropType::None);

    let outcome = store.drag_end().unwrap();
    assert_eq!(outcome.moved, None);
    assert_eq!(store.export_data(), forest());
}

#[test]
fn test_drag_disabled_by_default() {
    let store = store(keyed(), forest());
    assert!(!store.drag_start(2));
    assert!(store.drag_over(3, at(0.5)).is_none());
    assert!(store.drag_end().is_none());
}

#[test]
fn test_allow_drop_veto() {
    let config = keyed()
        .with_draggable(true)
        .with_allow_drop(|_, drop, position| {
            position != DropPosition::Inner || drop.data()["id"] != 6
        });
    let store = store(config, forest());
    store.drag_start(3);
    let over = store.drag_over(6, at(0.5)).unwrap();
    assert_eq!(over.drop_type, DropType::None);
    assert!(!over.allow_drop);

    let over = store.drag_over(6, at(0.6)).unwrap();
    assert_eq!(over.drop_type, DropType::After);
}

#[test]
fn test_target_removed_mid_drag() {
    let store = draggable();
    store.drag_start(3);
    store.drag_over(7, at(0.5));
    store.remove(7);

    let outcome = store.drag_end().unwrap();
    assert_eq!(outcome.drop, None);
    assert_eq!(outcome.moved, None);
    assert_eq!(child_keys(&store, 1), keys(&[2, 3]));
}

// ============================================================================
// Events
// ============================================================================

#[test]
fn test_drop_event_sequence() {
    let store = draggable();
    let dragging = store.get_node(5).unwrap();
    let target = store.get_node(3).unwrap();
    store.drag_start(dragging);
    store.drag_over(target, at(0.2));
    store.drag_end();

    let events = store.take_events();
    assert!(matches!(events[0], TreeEvent::NodeDragStart { dragging: d } if d == dragging));
    assert!(matches!(
        events[1],
        TreeEvent::NodeDragEnter { drop, .. } if drop == target
    ));
    let Some(TreeEvent::NodeDrop { drop_type, .. }) = events.last() else {
        panic!("expected a drop event last");
    };
    assert_eq!(*drop_type, DropType::Before);
    assert_eq!(child_keys(&store, 1), keys(&[2, 5, 3]));
}
