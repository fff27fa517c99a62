//! The public tree store handle.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use log::{debug, trace};
use serde_json::Value;

use crate::check::{CheckValue, ChildState};
use crate::config::TreeConfig;
use crate::drag::{DragOver, DropGeometry, DropOutcome};
use crate::error::TreeError;
use crate::event::{CheckedSummary, TreeEvent};
use crate::key::{NodeId, NodeKey, NodeRef};
use crate::lazy::{Deferred, LoadCallback, LoadFollowUp, LoadResolver};
use crate::node::{Node, NodeSeed};
use crate::snapshot::{FlatNode, NodeSnapshot};
use crate::tree::Tree;

/// Unique identifier for a TreeStore instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoreId(usize);

impl StoreId {
    fn new() -> Self {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        Self(COUNTER.fetch_add(1, Ordering::SeqCst))
    }
}

impl std::fmt::Display for StoreId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "__tree_{}", self.0)
    }
}

/// Tree state for one tree view.
///
/// `TreeStore` is a cheap-clone handle: clones share the same tree. Every
/// operation runs to completion under one lock, so operations from
/// different threads never interleave. The loader and completion callbacks
/// run after the lock is released, so they may call back into the store.
///
/// Nodes are addressed by anything that converts into a [`NodeRef`]: a
/// [`NodeId`] handle, a key (`"a"`, `42`, [`NodeKey`]) or a record.
/// Operations on nodes that cannot be resolved do nothing.
///
/// # Example
///
/// ```
/// use arbor::{TreeConfig, TreeStore};
/// use serde_json::json;
///
/// let store = TreeStore::new(
///     TreeConfig::new().with_key("id").with_default_checked_keys([2]),
///     vec![json!({"id": 1, "label": "src", "children": [{"id": 2}, {"id": 3}]})],
/// );
///
/// let src = store.snapshot(1).unwrap();
/// assert!(!src.checked && src.indeterminate);
///
/// store.set_checked(1, true, true);
/// assert_eq!(store.get_checked_keys(false, false).len(), 3);
/// ```
#[derive(Debug)]
pub struct TreeStore {
    id: StoreId,
    pub(crate) inner: Arc<RwLock<Tree>>,
    /// Dirty flag for re-render.
    pub(crate) dirty: Arc<AtomicBool>,
}

impl TreeStore {
    /// Build a tree from top-level records.
    pub fn new(config: TreeConfig, data: impl Into<Arc<Vec<Value>>>) -> Self {
        let mut tree = Tree::new(config, data.into());
        let deferred = std::mem::take(&mut tree.deferred);
        let store = Self {
            id: StoreId::new(),
            inner: Arc::new(RwLock::new(tree)),
            dirty: Arc::new(AtomicBool::new(false)),
        };
        debug!("Created store {}", store.id);
        store.dispatch(deferred);
        store
    }

    pub(crate) fn from_shared(id: StoreId, inner: Arc<RwLock<Tree>>, dirty: Arc<AtomicBool>) -> Self {
        Self {
            id,
            inner,
            dirty,
        }
    }

    /// Get the unique ID.
    pub fn id(&self) -> StoreId {
        self.id
    }

    fn read<R>(&self, f: impl FnOnce(&Tree) -> R) -> Option<R> {
        self.inner.read().ok().map(|guard| f(&guard))
    }

    /// Run `f` under the write lock, then run whatever it deferred.
    fn mutate<R>(&self, f: impl FnOnce(&mut Tree) -> R) -> Option<R> {
        let (result, deferred) = {
            let mut guard = self.inner.write().ok()?;
            let result = f(&mut guard);
            (result, std::mem::take(&mut guard.deferred))
        };
        self.dirty.store(true, Ordering::SeqCst);
        self.dispatch(deferred);
        Some(result)
    }

    fn dispatch(&self, deferred: Vec<Deferred>) {
        for item in deferred {
            match item {
                Deferred::Callback(callback, children) => callback(children),
                Deferred::Load(mut pending) => {
                    let resolver = LoadResolver::new(self, &mut pending);
                    (pending.load)(pending.request, resolver);
                }
            }
        }
    }

    /// Resolve a reference and run `f` with the handle under the write lock.
    fn mutate_node<R>(
        &self,
        target: impl Into<NodeRef>,
        f: impl FnOnce(&mut Tree, NodeId) -> R,
    ) -> Option<R> {
        let target = target.into();
        self.mutate(|tree| tree.resolve(&target).map(|id| f(tree, id)))
            .flatten()
    }

    fn read_node<R>(&self, target: impl Into<NodeRef>, f: impl FnOnce(&Tree, NodeId) -> R) -> Option<R> {
        let target = target.into();
        self.read(|tree| tree.resolve(&target).map(|id| f(tree, id)))
            .flatten()
    }

    fn require_key(&self, operation: &'static str) -> Result<(), TreeError> {
        match self.read(|tree| tree.config.key.is_some()) {
            Some(false) => Err(TreeError::key_required(operation)),
            _ => Ok(()),
        }
    }

    // -------------------------------------------------------------------------
    // Data and configuration
    // -------------------------------------------------------------------------

    /// Replace the top-level records and rebuild the tree.
    ///
    /// Passing the same `Arc` the tree was built from does nothing and
    /// returns `false`.
    pub fn set_data(&self, data: impl Into<Arc<Vec<Value>>>) -> bool {
        let data = data.into();
        self.mutate(|tree| tree.replace_data(data)).unwrap_or(false)
    }

    /// Replace the configuration and rebuild from the current data.
    pub fn set_config(&self, config: TreeConfig) {
        self.mutate(|tree| tree.replace_config(config));
    }

    /// Get a copy of the configuration.
    pub fn config(&self) -> Option<TreeConfig> {
        self.read(|tree| tree.config.clone())
    }

    // -------------------------------------------------------------------------
    // Lookup
    // -------------------------------------------------------------------------

    /// Get the handle of the root node.
    pub fn root(&self) -> NodeId {
        self.read(|tree| tree.root).unwrap_or(NodeId(0))
    }

    /// Resolve a handle, key or record to a node handle.
    pub fn get_node(&self, target: impl Into<NodeRef>) -> Option<NodeId> {
        let target = target.into();
        self.read(|tree| tree.resolve(&target)).flatten()
    }

    pub fn snapshot(&self, target: impl Into<NodeRef>) -> Option<NodeSnapshot> {
        self.read_node(target, |tree, id| tree.snapshot(id)).flatten()
    }

    /// Run `f` with a borrowed node.
    ///
    /// `f` runs under the store lock and must not call back into the store.
    pub fn with_node<R>(&self, target: impl Into<NodeRef>, f: impl FnOnce(&Node) -> R) -> Option<R> {
        self.read_node(target, |tree, id| tree.node(id).map(f)).flatten()
    }

    pub fn children(&self, target: impl Into<NodeRef>) -> Vec<NodeId> {
        self.read_node(target, |tree, id| tree.child_ids(id))
            .unwrap_or_default()
    }

    pub fn parent(&self, target: impl Into<NodeRef>) -> Option<NodeId> {
        self.read_node(target, |tree, id| tree.parent_of(id)).flatten()
    }

    pub fn label(&self, target: impl Into<NodeRef>) -> Option<String> {
        self.read_node(target, |tree, id| tree.label(id)).flatten()
    }

    /// Get a node's full record, children included.
    pub fn node_record(&self, target: impl Into<NodeRef>) -> Option<Value> {
        self.read_node(target, |tree, id| tree.node_record(id)).flatten()
    }

    /// Get the top-level records as they stand in the live tree.
    pub fn export_data(&self) -> Vec<Value> {
        self.read(Tree::export_data).unwrap_or_default()
    }

    /// Get the rows to render, in display order.
    pub fn visible_nodes(&self) -> Vec<FlatNode> {
        self.read(Tree::visible_nodes).unwrap_or_default()
    }

    pub fn contains(
        &self,
        ancestor: impl Into<NodeRef>,
        target: impl Into<NodeRef>,
        deep: bool,
    ) -> bool {
        let ancestor = ancestor.into();
        let target = target.into();
        self.read(|tree| match (tree.resolve(&ancestor), tree.resolve(&target)) {
            (Some(ancestor), Some(target)) => tree.contains(ancestor, target, deep),
            _ => false,
        })
        .unwrap_or(false)
    }

    pub fn next_sibling(&self, target: impl Into<NodeRef>) -> Option<NodeId> {
        self.read_node(target, |tree, id| tree.next_sibling(id)).flatten()
    }

    pub fn previous_sibling(&self, target: impl Into<NodeRef>) -> Option<NodeId> {
        self.read_node(target, |tree, id| tree.previous_sibling(id)).flatten()
    }

    /// Records from the top-level ancestor down to the target, inclusive.
    ///
    /// Empty when the target does not resolve.
    pub fn get_node_path(&self, target: impl Into<NodeRef>) -> Result<Vec<Value>, TreeError> {
        self.require_key("get_node_path")?;
        Ok(self
            .read_node(target, |tree, id| tree.node_path(id))
            .unwrap_or_default())
    }

    // -------------------------------------------------------------------------
    // Structure
    // -------------------------------------------------------------------------

    /// Append a record under `parent`, or at the top level when `parent` is `None`.
    ///
    /// Returns `Ok(None)` when `parent` does not resolve.
    pub fn append(&self, data: Value, parent: Option<NodeRef>) -> Result<Option<NodeId>, TreeError> {
        self.mutate(|tree| {
            let parent = match &parent {
                Some(target) => tree.resolve(target),
                None => Some(tree.root),
            };
            match parent {
                Some(parent) => tree.insert_child(parent, data, None),
                None if data.is_null() => Err(TreeError::MissingChild),
                None => Ok(None),
            }
        })
        .unwrap_or(Ok(None))
    }

    /// Insert a record as the sibling right before `reference`.
    pub fn insert_before(
        &self,
        data: Value,
        reference: impl Into<NodeRef>,
    ) -> Result<Option<NodeId>, TreeError> {
        self.insert_beside(data, reference, Tree::insert_before)
    }

    /// Insert a record as the sibling right after `reference`.
    pub fn insert_after(
        &self,
        data: Value,
        reference: impl Into<NodeRef>,
    ) -> Result<Option<NodeId>, TreeError> {
        self.insert_beside(data, reference, Tree::insert_after)
    }

    fn insert_beside(
        &self,
        data: Value,
        reference: impl Into<NodeRef>,
        insert: fn(&mut Tree, NodeId, Value, Option<NodeId>) -> Result<Option<NodeId>, TreeError>,
    ) -> Result<Option<NodeId>, TreeError> {
        if data.is_null() {
            return Err(TreeError::MissingChild);
        }
        self.mutate_node(reference, |tree, reference| match tree.parent_of(reference) {
            Some(parent) => insert(tree, parent, data, Some(reference)),
            None => Ok(None),
        })
        .unwrap_or(Ok(None))
    }

    /// Remove a node and its subtree.
    ///
    /// Clears the current node if it was in the subtree. The root cannot be
    /// removed.
    pub fn remove(&self, target: impl Into<NodeRef>) -> bool {
        self.mutate_node(target, |tree, id| tree.remove(id))
            .unwrap_or(false)
    }

    /// Move a node under `parent` at `index` (end when `None` or out of range).
    ///
    /// Unlike a drag-drop, the node keeps its handle and state.
    pub fn move_node(&self, node: NodeId, parent: NodeId, index: Option<usize>) -> Result<bool, TreeError> {
        self.mutate(|tree| tree.move_node(node, parent, index))
            .unwrap_or(Ok(false))
    }

    /// Replace a node's record and rebuild its children from it.
    pub fn set_node_data(&self, target: impl Into<NodeRef>, data: Value) -> bool {
        self.mutate_node(target, |tree, id| tree.set_node_data(id, data))
            .unwrap_or(false)
    }

    /// Replace the children of the node with `key`.
    ///
    /// Returns `Ok(false)` when no node has that key.
    pub fn update_key_children(
        &self,
        key: impl Into<NodeKey>,
        records: Vec<Value>,
    ) -> Result<bool, TreeError> {
        self.require_key("update_key_children")?;
        let key = NodeRef::Key(key.into());
        let updated = self.mutate_node(key, |tree, id| {
            for child in tree.child_ids(id).into_iter().rev() {
                tree.remove(child);
            }
            for record in records {
                if let Err(e) = tree.insert_child(id, record, None) {
                    trace!("update_key_children: skipping record: {}", e);
                }
            }
        });
        Ok(updated.is_some())
    }

    // -------------------------------------------------------------------------
    // Expansion
    // -------------------------------------------------------------------------

    /// Expand a node, loading its children first in lazy mode.
    ///
    /// `callback` runs once the node is expanded: with the loaded records
    /// after a load, or with `None` right away.
    pub fn expand(
        &self,
        target: impl Into<NodeRef>,
        expand_parent: bool,
        callback: Option<LoadCallback>,
    ) -> bool {
        self.mutate_node(target, |tree, id| tree.expand(id, expand_parent, callback))
            .is_some()
    }

    pub fn collapse(&self, target: impl Into<NodeRef>) -> bool {
        self.mutate_node(target, |tree, id| tree.collapse(id))
            .is_some()
    }

    /// Load a lazy node's children without expanding it.
    pub fn load_data(&self, target: impl Into<NodeRef>, callback: Option<LoadCallback>) -> bool {
        self.mutate_node(target, |tree, id| {
            tree.load_data(id, NodeSeed::default(), LoadFollowUp::Nothing, callback)
        })
        .is_some()
    }

    /// Whether expanding the node must go through the loader.
    pub fn should_load_data(&self, target: impl Into<NodeRef>) -> bool {
        self.read_node(target, |tree, id| tree.should_load_data(id))
            .unwrap_or(false)
    }

    pub(crate) fn finish_load(
        &self,
        node: NodeId,
        children: Vec<Value>,
        seed: NodeSeed,
        follow_up: LoadFollowUp,
        callback: Option<LoadCallback>,
    ) {
        self.mutate(|tree| tree.finish_load(node, children, seed, follow_up, callback));
    }

    /// Expand the nodes with the given keys, and their ancestors if
    /// `auto_expand_parent` is set.
    pub fn set_default_expanded_keys<K: Into<NodeKey>>(&self, keys: impl IntoIterator<Item = K>) {
        let keys: Vec<NodeKey> = keys.into_iter().map(Into::into).collect();
        self.mutate(|tree| {
            let expand_parent = tree.config.auto_expand_parent;
            for key in &keys {
                if let Some(id) = tree.nodes_map.get(key).copied() {
                    tree.expand(id, expand_parent, None);
                }
            }
            tree.config.default_expanded_keys = keys;
        });
    }

    /// Check the nodes with the given keys, with cascade.
    pub fn set_default_checked_keys<K: Into<NodeKey>>(&self, keys: impl IntoIterator<Item = K>) {
        let keys: Vec<NodeKey> = keys.into_iter().map(Into::into).collect();
        self.mutate(|tree| {
            tree.config.default_checked_keys = keys;
            tree.init_default_checked();
        });
    }

    // -------------------------------------------------------------------------
    // Checkboxes
    // -------------------------------------------------------------------------

    /// Check, uncheck or half-check a node.
    ///
    /// With `deep` the value cascades to descendants. Ancestors are always
    /// recomputed unless `check_strictly` is set.
    pub fn set_checked(&self, target: impl Into<NodeRef>, value: impl Into<CheckValue>, deep: bool) -> bool {
        let value = value.into();
        self.mutate_node(target, |tree, id| tree.set_checked(id, value, deep))
            .is_some()
    }

    /// Make exactly the nodes with the given keys checked.
    pub fn set_checked_keys<K: Into<NodeKey>>(
        &self,
        keys: impl IntoIterator<Item = K>,
        leaf_only: bool,
    ) -> Result<(), TreeError> {
        self.require_key("set_checked_keys")?;
        let keys: Vec<NodeKey> = keys.into_iter().map(Into::into).collect();
        self.mutate(|tree| tree.set_checked_keys(&keys, leaf_only));
        Ok(())
    }

    /// Make exactly the given records checked.
    pub fn set_checked_nodes(&self, records: &[Value], leaf_only: bool) -> Result<(), TreeError> {
        self.require_key("set_checked_nodes")?;
        self.mutate(|tree| {
            let keys: Vec<NodeKey> = match &tree.config.key {
                Some(field) => records
                    .iter()
                    .filter_map(|r| r.get(field).and_then(NodeKey::from_value))
                    .collect(),
                None => Vec::new(),
            };
            tree.set_checked_keys(&keys, leaf_only);
        });
        Ok(())
    }

    /// Records of checked nodes in display order.
    pub fn get_checked_nodes(&self, leaf_only: bool, include_half: bool) -> Vec<Value> {
        self.read(|tree| tree.records_of(&tree.checked_ids(leaf_only, include_half)))
            .unwrap_or_default()
    }

    /// Keys of checked nodes in display order.
    pub fn get_checked_keys(&self, leaf_only: bool, include_half: bool) -> Vec<NodeKey> {
        self.read(|tree| tree.keys_of(&tree.checked_ids(leaf_only, include_half)))
            .unwrap_or_default()
    }

    pub fn get_half_checked_nodes(&self) -> Vec<Value> {
        self.read(|tree| tree.records_of(&tree.half_checked_ids()))
            .unwrap_or_default()
    }

    pub fn get_half_checked_keys(&self) -> Vec<NodeKey> {
        self.read(|tree| tree.keys_of(&tree.half_checked_ids()))
            .unwrap_or_default()
    }

    pub fn checked_summary(&self) -> CheckedSummary {
        self.read(Tree::checked_summary).unwrap_or_default()
    }

    /// Summary of a node's children.
    pub fn child_state(&self, target: impl Into<NodeRef>) -> Option<ChildState> {
        self.read_node(target, |tree, id| tree.child_state(&tree.child_ids(id)))
    }

    // -------------------------------------------------------------------------
    // Current node
    // -------------------------------------------------------------------------

    pub fn set_current_node(&self, target: impl Into<NodeRef>) -> bool {
        self.mutate_node(target, |tree, id| tree.set_current(Some(id)))
            .is_some()
    }

    /// Make the node with `key` current, or clear the current node with `None`.
    pub fn set_current_key(&self, key: Option<NodeKey>) -> Result<(), TreeError> {
        self.require_key("set_current_key")?;
        self.mutate(|tree| {
            match &key {
                Some(key) => {
                    if let Some(id) = tree.nodes_map.get(key).copied() {
                        tree.set_current(Some(id));
                    }
                }
                None => tree.set_current(None),
            }
            tree.current_node_key = key;
        });
        Ok(())
    }

    /// Get the current node's record.
    pub fn get_current_node(&self) -> Option<Value> {
        self.read(|tree| {
            tree.current
                .and_then(|id| tree.node(id))
                .map(|n| n.data.clone())
        })
        .flatten()
    }

    pub fn current_node_id(&self) -> Option<NodeId> {
        self.read(|tree| tree.current).flatten()
    }

    pub fn get_current_key(&self) -> Result<Option<NodeKey>, TreeError> {
        self.require_key("get_current_key")?;
        Ok(self
            .read(|tree| {
                tree.current
                    .and_then(|id| tree.node(id))
                    .and_then(|n| n.key.clone())
            })
            .flatten())
    }

    // -------------------------------------------------------------------------
    // Filtering
    // -------------------------------------------------------------------------

    /// Show only nodes matching `query` and their ancestors.
    pub fn filter(&self, query: &str) -> Result<(), TreeError> {
        self.mutate(|tree| tree.filter(query)).unwrap_or(Ok(()))
    }

    // -------------------------------------------------------------------------
    // User actions
    // -------------------------------------------------------------------------

    /// Handle a click on a row.
    pub fn click_node(&self, target: impl Into<NodeRef>) -> bool {
        self.mutate_node(target, |tree, id| tree.click_node(id))
            .unwrap_or(false)
    }

    /// Handle a click on a row's expand icon.
    pub fn toggle_expand(&self, target: impl Into<NodeRef>) -> bool {
        self.mutate_node(target, |tree, id| tree.toggle_expand(id))
            .unwrap_or(false)
    }

    /// Handle a click on a row's checkbox.
    pub fn check_node(&self, target: impl Into<NodeRef>, checked: bool) -> bool {
        self.mutate_node(target, |tree, id| tree.check_node(id, checked))
            .unwrap_or(false)
    }

    // -------------------------------------------------------------------------
    // Drag and drop
    // -------------------------------------------------------------------------

    /// Start dragging a node. Returns `false` if dragging is not allowed.
    pub fn drag_start(&self, target: impl Into<NodeRef>) -> bool {
        self.mutate_node(target, |tree, id| tree.drag_start(id))
            .unwrap_or(false)
    }

    /// Report the pointer over a drop target.
    pub fn drag_over(&self, target: impl Into<NodeRef>, geometry: DropGeometry) -> Option<DragOver> {
        self.mutate_node(target, |tree, id| tree.drag_over(id, geometry))
            .flatten()
    }

    /// End the drag session, committing the drop if it is legal.
    pub fn drag_end(&self) -> Option<DropOutcome> {
        self.mutate(Tree::drag_end).flatten()
    }

    // -------------------------------------------------------------------------
    // Events and dirty tracking
    // -------------------------------------------------------------------------

    /// Drain the events emitted since the last call.
    pub fn take_events(&self) -> Vec<TreeEvent> {
        self.inner
            .write()
            .map(|mut guard| std::mem::take(&mut guard.events))
            .unwrap_or_default()
    }

    /// Check if the tree has changed since the last `clear_dirty`.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Clear the dirty flag
    pub fn clear_dirty(&self) {
        self.dirty.store(false, Ordering::SeqCst);
    }
}

impl Clone for TreeStore {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            inner: Arc::clone(&self.inner),
            dirty: Arc::clone(&self.dirty),
        }
    }
}
