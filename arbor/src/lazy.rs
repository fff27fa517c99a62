//! Lazy child loading and expansion.
//!
//! A lazy node starts `not-loaded`. The first expand (or a checked cascade
//! with `check_descendants`) moves it to `loading` and hands a
//! [`LoadRequest`] plus a [`LoadResolver`] to the configured loader. The
//! loader resolves whenever it likes; resolution materializes the children
//! and moves the node to `loaded`. A node that is `loading` or `loaded`
//! never invokes the loader again.

use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, RwLock, Weak};

use log::{debug, trace, warn};
use serde_json::Value;

use crate::check::CheckValue;
use crate::key::{NodeId, NodeKey};
use crate::node::NodeSeed;
use crate::store::{StoreId, TreeStore};
use crate::tree::Tree;

/// Loader for the children of a lazy node.
pub type LoadFn = Arc<dyn Fn(LoadRequest, LoadResolver) + Send + Sync>;

/// Called once a load or expand completes.
///
/// Receives the loaded records, or `None` when no load took place.
pub type LoadCallback = Box<dyn FnOnce(Option<Vec<Value>>) + Send + Sync>;

/// The node whose children are requested.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    pub node: NodeId,
    pub key: Option<NodeKey>,
    /// Depth of the node; 0 for the root.
    pub level: usize,
    /// The node's record. The root's record is an empty array.
    pub data: Value,
}

/// What to do with a node once its children arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoadFollowUp {
    Nothing,
    Expand { expand_parent: bool },
    Check { propagated: bool, deep: bool },
}

/// A load waiting to be handed to the loader.
pub(crate) struct PendingLoad {
    pub load: LoadFn,
    pub request: LoadRequest,
    pub seed: NodeSeed,
    pub follow_up: LoadFollowUp,
    pub callback: Option<LoadCallback>,
}

/// Work that must run after the store lock is released.
pub(crate) enum Deferred {
    Load(PendingLoad),
    Callback(LoadCallback, Option<Vec<Value>>),
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load(pending) => f
                .debug_struct("Load")
                .field("request", &pending.request)
                .field("follow_up", &pending.follow_up)
                .finish_non_exhaustive(),
            Self::Callback(_, children) => f
                .debug_tuple("Callback")
                .field(&children.as_ref().map(Vec::len))
                .finish(),
        }
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Completes one load.
///
/// The resolver holds only a weak handle to its store, so it may outlive
/// the store without keeping it alive. Dropping it without calling
/// [`resolve`](Self::resolve) leaves the node loading for good.
pub struct LoadResolver {
    store: StoreId,
    tree: Weak<RwLock<Tree>>,
    dirty: Arc<AtomicBool>,
    node: NodeId,
    seed: NodeSeed,
    follow_up: LoadFollowUp,
    callback: Option<LoadCallback>,
    resolved: bool,
}

impl LoadResolver {
    pub(crate) fn new(store: &TreeStore, pending: &mut PendingLoad) -> Self {
        Self {
            store: store.id(),
            tree: Arc::downgrade(&store.inner),
            dirty: Arc::clone(&store.dirty),
            node: pending.request.node,
            seed: pending.seed,
            follow_up: pending.follow_up,
            callback: pending.callback.take(),
            resolved: false,
        }
    }

    /// The node being loaded.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Materialize `children` under the node.
    ///
    /// If the node was removed (or the tree rebuilt) while the load was in
    /// flight, the children are discarded and the callback is not called.
    pub fn resolve(mut self, children: Vec<Value>) {
        self.resolved = true;
        let Some(inner) = self.tree.upgrade() else {
            debug!("Store {} dropped before load of {} resolved", self.store, self.node);
            return;
        };
        let store = TreeStore::from_shared(self.store, inner, Arc::clone(&self.dirty));
        store.finish_load(
            self.node,
            children,
            self.seed,
            self.follow_up,
            self.callback.take(),
        );
    }
}

impl Drop for LoadResolver {
    fn drop(&mut self) {
        if !self.resolved {
            warn!("Load of {} was never resolved; node stays loading", self.node);
        }
    }
}

impl fmt::Debug for LoadResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadResolver")
            .field("store", &self.store)
            .field("node", &self.node)
            .field("follow_up", &self.follow_up)
            .field("resolved", &self.resolved)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Load state machine
// =============================================================================

impl Tree {
    /// Whether expanding `id` must go through the loader first.
    pub(crate) fn should_load_data(&self, id: NodeId) -> bool {
        self.config.lazy
            && self.config.load.is_some()
            && self.nodes.get(&id).is_some_and(|n| !n.loaded)
    }

    /// Start loading the children of `id`.
    ///
    /// Completes at once, without calling the loader, when the node is
    /// already loading, already loaded or not lazy.
    pub(crate) fn load_data(
        &mut self,
        id: NodeId,
        seed: NodeSeed,
        follow_up: LoadFollowUp,
        callback: Option<LoadCallback>,
    ) {
        let load = match &self.config.load {
            Some(load) if self.config.lazy => Arc::clone(load),
            _ => {
                self.defer_callback(callback, None);
                return;
            }
        };
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        if node.loaded || node.loading {
            trace!("load_data: {} already loading or loaded", id);
            self.defer_callback(callback, None);
            return;
        }

        node.loading = true;
        let request = LoadRequest {
            node: id,
            key: node.key.clone(),
            level: node.level,
            data: node.data.clone(),
        };
        debug!("Loading children of {}", id);
        self.deferred.push(Deferred::Load(PendingLoad {
            load,
            request,
            seed,
            follow_up,
            callback,
        }));
    }

    fn defer_callback(&mut self, callback: Option<LoadCallback>, children: Option<Vec<Value>>) {
        if let Some(callback) = callback {
            self.deferred.push(Deferred::Callback(callback, children));
        }
    }

    /// Materialize loaded children and run the follow-up.
    ///
    /// Returns `false` when the node no longer exists.
    pub(crate) fn finish_load(
        &mut self,
        id: NodeId,
        records: Vec<Value>,
        seed: NodeSeed,
        follow_up: LoadFollowUp,
        callback: Option<LoadCallback>,
    ) -> bool {
        if !self.nodes.contains_key(&id) {
            debug!(
                "Dropping {} loaded records for removed node {}",
                records.len(),
                id
            );
            return false;
        }

        for child in self.child_ids(id) {
            self.destroy_subtree(child);
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.children.clear();
        }
        let returned = callback.is_some().then(|| records.clone());
        self.create_children(id, records, seed);
        if let Some(node) = self.nodes.get_mut(&id) {
            node.loaded = true;
            node.loading = false;
        }
        self.update_leaf_state(id);
        debug!("Loaded {} children of {}", self.child_ids(id).len(), id);

        let strict = self.config.check_strictly;
        match follow_up {
            LoadFollowUp::Nothing => {
                if !strict {
                    self.reinit_checked(id);
                }
            }
            LoadFollowUp::Expand { expand_parent } => {
                if self.nodes.get(&id).is_some_and(|n| n.checked) {
                    self.set_checked(id, CheckValue::Checked, true);
                } else if !strict {
                    self.reinit_checked(id);
                }
                self.finish_expand(id, expand_parent);
            }
            LoadFollowUp::Check { propagated, deep } => {
                if deep {
                    self.descend_checked(id, propagated, deep);
                }
                self.refresh_check_state(id);
            }
        }

        self.defer_callback(callback, returned);
        true
    }

    // -------------------------------------------------------------------------
    // Expand / collapse
    // -------------------------------------------------------------------------

    /// Expand a node, loading it first if needed.
    ///
    /// A node that needs loading becomes expanded only when its load
    /// resolves. Leaves never become expanded.
    pub(crate) fn expand(&mut self, id: NodeId, expand_parent: bool, callback: Option<LoadCallback>) {
        if self.should_load_data(id) {
            self.load_data(
                id,
                NodeSeed::default(),
                LoadFollowUp::Expand { expand_parent },
                callback,
            );
            return;
        }
        self.finish_expand(id, expand_parent);
        self.defer_callback(callback, None);
    }

    fn finish_expand(&mut self, id: NodeId, expand_parent: bool) {
        if expand_parent {
            let mut cursor = self.parent_of(id);
            while let Some(parent) = cursor {
                let Some(node) = self.nodes.get_mut(&parent) else {
                    break;
                };
                if node.level == 0 {
                    break;
                }
                node.expanded = true;
                cursor = node.parent;
            }
        }
        if let Some(node) = self.nodes.get_mut(&id)
            && !node.is_leaf
        {
            node.expanded = true;
        }
    }

    pub(crate) fn collapse(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.expanded = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;
    use crate::config::TreeConfig;
    use crate::key::NodeRef;

    type Requests = Arc<Mutex<Vec<(LoadRequest, LoadResolver)>>>;

    /// A store whose loader parks every request for the test to resolve.
    fn parked(config: TreeConfig) -> (TreeStore, Requests) {
        let requests: Requests = Arc::default();
        let sink = Arc::clone(&requests);
        let config = config.with_key("id").with_lazy_load(move |request, resolver| {
            if let Ok(mut pending) = sink.lock() {
                pending.push((request, resolver));
            }
        });
        (TreeStore::new(config, Vec::new()), requests)
    }

    fn take(requests: &Requests) -> Vec<(LoadRequest, LoadResolver)> {
        std::mem::take(&mut *requests.lock().unwrap())
    }

    #[test]
    fn test_root_loads_at_construction() {
        let (store, requests) = parked(TreeConfig::new());
        let mut pending = take(&requests);
        assert_eq!(pending.len(), 1);
        let (request, resolver) = pending.remove(0);
        assert_eq!(request.level, 0);
        assert!(store.snapshot(request.node).is_some_and(|s| s.loading));

        resolver.resolve(vec![json!({"id": 1}), json!({"id": 2})]);
        let root = store.root();
        assert_eq!(store.children(root).len(), 2);
        assert!(store.snapshot(root).is_some_and(|s| s.loaded && !s.loading));
    }

    #[test]
    fn test_second_load_while_loading_is_ignored() {
        let (store, requests) = parked(TreeConfig::new());
        take(&requests).remove(0).1.resolve(vec![json!({"id": 1})]);

        let one = store.get_node(1).unwrap();
        store.expand(one, false, None);
        store.expand(one, false, None);
        store.load_data(one, None);
        assert_eq!(take(&requests).len(), 1);
    }

    #[test]
    fn test_unresolved_load_stays_loading() {
        let (store, requests) = parked(TreeConfig::new());
        take(&requests).remove(0).1.resolve(vec![json!({"id": 1})]);

        let one = store.get_node(1).unwrap();
        store.expand(one, false, None);
        drop(take(&requests));
        let snapshot = store.snapshot(one).unwrap();
        assert!(snapshot.loading);
        assert!(!snapshot.expanded);
    }

    #[test]
    fn test_resolve_after_removal_is_dropped() {
        let (store, requests) = parked(TreeConfig::new());
        take(&requests).remove(0).1.resolve(vec![json!({"id": 1})]);

        let one = store.get_node(1).unwrap();
        let called = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&called);
        store.expand(
            one,
            false,
            Some(Box::new(move |_| {
                *flag.lock().unwrap() = true;
            })),
        );
        let (_, resolver) = take(&requests).remove(0);
        store.remove(1);
        resolver.resolve(vec![json!({"id": 2})]);

        assert!(store.get_node(2).is_none());
        assert!(!*called.lock().unwrap());
    }

    #[test]
    fn test_leaf_hint_before_load() {
        let (store, requests) = parked(
            TreeConfig::new().with_props(crate::props::Props::new().with_is_leaf("leaf")),
        );
        take(&requests)
            .remove(0)
            .1
            .resolve(vec![json!({"id": 1, "leaf": true}), json!({"id": 2})]);
        assert!(store.snapshot(1).is_some_and(|s| s.is_leaf));
        assert!(store.snapshot(2).is_some_and(|s| !s.is_leaf));

        let two = store.get_node(2).unwrap();
        store.expand(two, false, None);
        take(&requests).remove(0).1.resolve(Vec::new());
        let snapshot = store.snapshot(two).unwrap();
        assert!(snapshot.is_leaf);
        assert!(!snapshot.expanded);
    }

    #[test]
    fn test_checked_node_checks_loaded_children() {
        let (store, requests) = parked(TreeConfig::new());
        take(&requests).remove(0).1.resolve(vec![json!({"id": 1})]);

        let one = store.get_node(1).unwrap();
        store.set_checked(1, true, false);
        store.expand(one, false, None);
        take(&requests)
            .remove(0)
            .1
            .resolve(vec![json!({"id": 2}), json!({"id": 3})]);
        assert_eq!(
            store.get_checked_keys(false, false),
            [NodeKey::from(1), NodeKey::from(2), NodeKey::from(3)]
        );
    }

    #[test]
    fn test_check_descendants_loads_and_checks() {
        let (store, requests) = parked(TreeConfig::new().with_check_descendants(true));
        take(&requests).remove(0).1.resolve(vec![json!({"id": 1})]);

        store.set_checked(1, true, true);
        let (request, resolver) = take(&requests).remove(0);
        assert_eq!(request.key, Some(NodeKey::from(1)));
        resolver.resolve(vec![json!({"id": 2, "children": []})]);

        assert!(store.snapshot(2).is_some_and(|s| s.checked));
        assert!(store.snapshot(1).is_some_and(|s| s.checked));
        assert!(!store.snapshot(1).is_some_and(|s| s.expanded));
    }

    #[test]
    fn test_check_descendants_keeps_ancestors_current() {
        let (store, requests) = parked(TreeConfig::new().with_check_descendants(true));
        take(&requests).remove(0).1.resolve(vec![json!({"id": 1})]);
        store.expand(1, false, None);
        take(&requests)
            .remove(0)
            .1
            .resolve(vec![json!({"id": 11}), json!({"id": 12})]);

        store.set_checked(11, true, true);
        let state = |key: i64| {
            let s = store.snapshot(key).unwrap();
            (s.checked, s.indeterminate)
        };
        assert!(store.snapshot(11).is_some_and(|s| s.loading));
        assert_eq!(state(11), (true, false));
        assert_eq!(state(1), (false, true));

        // The load comes back empty: the node stays checked, the parent half.
        take(&requests).remove(0).1.resolve(Vec::new());
        assert_eq!(state(11), (true, false));
        assert_eq!(state(1), (false, true));
        let summary = store.child_state(1).unwrap();
        assert_eq!((summary.all, summary.half), (false, true));
    }

    #[test]
    fn test_default_checked_applies_as_nodes_load() {
        let (store, requests) = parked(TreeConfig::new().with_default_checked_keys([2]));
        take(&requests)
            .remove(0)
            .1
            .resolve(vec![json!({"id": 1}), json!({"id": 2})]);
        assert_eq!(store.get_checked_keys(false, false), [NodeKey::from(2)]);
    }

    #[test]
    fn test_synchronous_loader() {
        let config = TreeConfig::new()
            .with_key("id")
            .with_lazy_load(|request, resolver| {
                let children = if request.level == 0 {
                    vec![json!({"id": 1})]
                } else {
                    vec![json!({"id": request.level * 10})]
                };
                resolver.resolve(children);
            });
        let store = TreeStore::new(config, Vec::new());
        let one = store.get_node(1).unwrap();
        store.expand(one, false, None);
        assert!(store.snapshot(one).is_some_and(|s| s.expanded && s.loaded));
        assert!(store.get_node(NodeRef::from(10)).is_some());
    }
}
