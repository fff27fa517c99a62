//! Arena-backed node hierarchy.
//!
//! [`Tree`] owns every node of one tree instance, the key index and the
//! current-node pointer. Nodes refer to each other by [`NodeId`], so there
//! are no reference cycles to manage. All methods run under the store's
//! write lock; callbacks that may re-enter the store are queued in
//! `deferred` and dispatched by the store after the lock is released.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::{debug, trace};
use serde_json::Value;

use crate::config::TreeConfig;
use crate::drag::DragState;
use crate::error::TreeError;
use crate::event::TreeEvent;
use crate::key::{NodeId, NodeKey, NodeRef};
use crate::lazy::{Deferred, LoadFollowUp};
use crate::node::{Node, NodeSeed};
use crate::props::FieldAccessor;

pub struct Tree {
    pub(crate) config: TreeConfig,
    pub(crate) nodes: HashMap<NodeId, Node>,
    pub(crate) nodes_map: HashMap<NodeKey, NodeId>,
    pub(crate) root: NodeId,
    pub(crate) current: Option<NodeId>,
    pub(crate) current_node_key: Option<NodeKey>,
    /// Top-level records the tree was last built from.
    pub(crate) source: Arc<Vec<Value>>,
    pub(crate) events: Vec<TreeEvent>,
    pub(crate) deferred: Vec<Deferred>,
    pub(crate) drag: Option<DragState>,
    next_id: u64,
}

impl Tree {
    pub(crate) fn new(config: TreeConfig, data: Arc<Vec<Value>>) -> Self {
        let current_node_key = config.current_node_key.clone();
        let mut tree = Self {
            config,
            nodes: HashMap::new(),
            nodes_map: HashMap::new(),
            root: NodeId(0),
            current: None,
            current_node_key,
            source: Arc::clone(&data),
            events: Vec::new(),
            deferred: Vec::new(),
            drag: None,
            next_id: 0,
        };
        tree.build(data);
        tree
    }

    /// Rebuild the whole hierarchy from top-level records.
    ///
    /// Handles from the previous build never resolve again.
    pub(crate) fn build(&mut self, data: Arc<Vec<Value>>) {
        self.nodes.clear();
        self.nodes_map.clear();
        self.current = None;
        self.drag = None;
        self.source = Arc::clone(&data);

        let records = Value::Array(data.as_ref().clone());
        self.root = self.create_node(records, None, NodeSeed::default());

        if self.config.lazy && self.config.load.is_some() {
            self.load_data(self.root, NodeSeed::default(), LoadFollowUp::Nothing, None);
        } else {
            self.init_default_checked();
        }

        // Building is not a user action.
        self.events.clear();
        debug!("Built tree {} with {} nodes", self.root, self.nodes.len());
    }

    /// Rebuild from new data unless it is the same allocation as the current data.
    pub(crate) fn replace_data(&mut self, data: Arc<Vec<Value>>) -> bool {
        if Arc::ptr_eq(&self.source, &data) {
            trace!("replace_data: same data, skipping rebuild");
            return false;
        }
        self.build(data);
        true
    }

    pub(crate) fn replace_config(&mut self, config: TreeConfig) {
        self.current_node_key = config.current_node_key.clone();
        self.config = config;
        self.build(Arc::clone(&self.source));
    }

    // -------------------------------------------------------------------------
    // Node access
    // -------------------------------------------------------------------------

    pub(crate) fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub(crate) fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(&id).and_then(|n| n.parent)
    }

    pub(crate) fn child_ids(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(&id)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    pub(crate) fn label(&self, id: NodeId) -> Option<String> {
        let node = self.nodes.get(&id)?;
        Some(self.config.props.label(&node.data, node))
    }

    pub(crate) fn is_disabled(&self, id: NodeId) -> bool {
        self.nodes
            .get(&id)
            .is_some_and(|n| n.level > 0 && self.config.props.disabled(&n.data, n))
    }

    /// Pre-order walk over the descendants of `id`, excluding `id` itself.
    pub(crate) fn descendants(&self, id: NodeId) -> Preorder<'_> {
        let mut stack = self.child_ids(id);
        stack.reverse();
        Preorder { tree: self, stack }
    }

    /// Every node below the root in display order.
    pub(crate) fn all_nodes(&self) -> Vec<NodeId> {
        self.descendants(self.root).collect()
    }

    // -------------------------------------------------------------------------
    // Materialization
    // -------------------------------------------------------------------------

    fn next_node_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    fn derive_key(&self, id: NodeId, data: &Value) -> Option<NodeKey> {
        if data.is_array() {
            return None;
        }
        match &self.config.key {
            Some(field) => data.get(field).and_then(NodeKey::from_value),
            None => Some(NodeKey::from(id)),
        }
    }

    /// Create a node for `data` and, outside lazy mode, its whole subtree.
    ///
    /// The node is registered in the key index but not attached to the
    /// parent's child list; callers attach it.
    pub(crate) fn create_node(&mut self, data: Value, parent: Option<NodeId>, seed: NodeSeed) -> NodeId {
        let id = self.next_node_id();
        let level = parent
            .and_then(|p| self.nodes.get(&p))
            .map_or(0, |p| p.level + 1);
        let key = self.derive_key(id, &data);

        let mut node = Node::new(id, data, key.clone(), parent, level);
        seed.apply(&mut node);
        self.nodes.insert(id, node);
        self.register(id);

        let hint = self
            .nodes
            .get(&id)
            .and_then(|n| self.config.props.is_leaf(&n.data, n));
        if let Some(node) = self.nodes.get_mut(&id) {
            node.leaf_by_user = hint;
        }

        if !self.config.lazy {
            let records = self.take_child_records(id);
            self.create_children(id, records, NodeSeed::default());
        } else if level > 0 && self.config.default_expand_all {
            self.expand(id, false, None);
        }
        self.update_leaf_state(id);
        if !self.config.lazy
            && self.config.default_expand_all
            && let Some(node) = self.nodes.get_mut(&id)
            && !node.is_leaf
        {
            node.expanded = true;
        }

        if level > 0
            && self.config.key.is_some()
            && let Some(key) = key
        {
            if self.config.default_expanded_keys.contains(&key) {
                self.expand(id, self.config.auto_expand_parent, None);
            }
            if self.current_node_key.as_ref() == Some(&key) {
                self.set_current(Some(id));
            }
        }

        if self.config.lazy && level > 0 {
            self.init_default_checked_node(id);
        }
        id
    }

    /// Create nodes for `records` and append them to `parent`.
    pub(crate) fn create_children(&mut self, parent: NodeId, records: Vec<Value>, seed: NodeSeed) {
        for record in records {
            let child = self.create_node(record, Some(parent), seed);
            if let Some(node) = self.nodes.get_mut(&parent) {
                node.children.push(child);
            }
        }
        self.update_leaf_state(parent);
    }

    /// Move the child records out of a node's record.
    ///
    /// The root's record is the top-level array itself. A named children
    /// field is removed from the record since the child nodes own those
    /// records from now on.
    fn take_child_records(&mut self, id: NodeId) -> Vec<Value> {
        let accessor = &self.config.props.children;
        let Some(node) = self.nodes.get_mut(&id) else {
            return Vec::new();
        };
        if node.level == 0
            && let Value::Array(items) = &mut node.data
        {
            return std::mem::take(items);
        }
        match accessor {
            FieldAccessor::Name(field) => {
                let Some(object) = node.data.as_object_mut() else {
                    return Vec::new();
                };
                match object.remove(field) {
                    Some(Value::Array(items)) => items,
                    Some(other) => {
                        object.insert(field.clone(), other);
                        Vec::new()
                    }
                    None => Vec::new(),
                }
            }
            FieldAccessor::Fn(f) => f(&node.data, node),
        }
    }

    pub(crate) fn update_leaf_state(&mut self, id: NodeId) {
        let lazy = self.config.lazy;
        if let Some(node) = self.nodes.get_mut(&id) {
            node.update_leaf_state(lazy);
        }
    }

    // -------------------------------------------------------------------------
    // Key index
    // -------------------------------------------------------------------------

    /// Index a node under its key. A duplicate key takes over the entry.
    fn register(&mut self, id: NodeId) {
        let Some(key) = self.nodes.get(&id).and_then(|n| n.key.clone()) else {
            return;
        };
        if let Some(previous) = self.nodes_map.insert(key.clone(), id)
            && previous != id
        {
            trace!("Key {} moved from {} to {}", key, previous, id);
        }
    }

    fn deregister(&mut self, id: NodeId) {
        let Some(node) = self.nodes.remove(&id) else {
            return;
        };
        if let Some(key) = &node.key
            && self.nodes_map.get(key) == Some(&id)
        {
            self.nodes_map.remove(key);
        }
        if self.current == Some(id) {
            self.current = None;
        }
    }

    /// Destroy a subtree, children before parents.
    pub(crate) fn destroy_subtree(&mut self, top: NodeId) {
        let mut stack = vec![(top, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                self.deregister(id);
                continue;
            }
            stack.push((id, true));
            if let Some(node) = self.nodes.get(&id) {
                stack.extend(node.children.iter().rev().map(|c| (*c, false)));
            }
        }
    }

    // -------------------------------------------------------------------------
    // Structural mutation
    // -------------------------------------------------------------------------

    /// Attach an existing node under `parent` at `index` (end if out of range).
    fn attach(&mut self, parent: NodeId, child: NodeId, index: Option<usize>) {
        let Some(parent_level) = self.nodes.get(&parent).map(|p| p.level) else {
            return;
        };
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = Some(parent);
        }
        self.relevel(child, parent_level + 1);
        if let Some(node) = self.nodes.get_mut(&parent) {
            match index {
                Some(i) if i < node.children.len() => node.children.insert(i, child),
                _ => node.children.push(child),
            }
        }
        self.update_leaf_state(parent);
    }

    /// Detach a node from its parent without destroying it.
    fn detach(&mut self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent_of(id)?;
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.retain(|c| *c != id);
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = None;
        }
        self.update_leaf_state(parent);
        Some(parent)
    }

    fn relevel(&mut self, top: NodeId, level: usize) {
        let mut stack = vec![(top, level)];
        while let Some((id, level)) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.level = level;
                stack.extend(node.children.iter().map(|c| (*c, level + 1)));
            }
        }
    }

    /// Materialize `data` as a child of `parent`.
    ///
    /// Returns `Ok(None)` when `parent` no longer exists.
    pub(crate) fn insert_child(
        &mut self,
        parent: NodeId,
        data: Value,
        index: Option<usize>,
    ) -> Result<Option<NodeId>, TreeError> {
        if data.is_null() {
            return Err(TreeError::MissingChild);
        }
        if !self.nodes.contains_key(&parent) {
            return Ok(None);
        }
        let child = self.create_node(data, Some(parent), NodeSeed::default());
        self.attach(parent, child, index);
        self.refresh_check_state(parent);
        debug!("Inserted {} under {}", child, parent);
        Ok(Some(child))
    }

    pub(crate) fn index_in_parent(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        self.nodes
            .get(&parent)
            .and_then(|p| p.children.iter().position(|c| *c == child))
    }

    /// Insert before `reference`, or at the end if it is not a child of `parent`.
    pub(crate) fn insert_before(
        &mut self,
        parent: NodeId,
        data: Value,
        reference: Option<NodeId>,
    ) -> Result<Option<NodeId>, TreeError> {
        let index = reference.and_then(|r| self.index_in_parent(parent, r));
        self.insert_child(parent, data, index)
    }

    /// Insert after `reference`, or at the end if it is not a child of `parent`.
    pub(crate) fn insert_after(
        &mut self,
        parent: NodeId,
        data: Value,
        reference: Option<NodeId>,
    ) -> Result<Option<NodeId>, TreeError> {
        let index = reference
            .and_then(|r| self.index_in_parent(parent, r))
            .map(|i| i + 1);
        self.insert_child(parent, data, index)
    }

    /// Remove and destroy `child` and its subtree if it is a child of `parent`.
    ///
    /// Destroyed nodes leave the key index, and the current-node pointer is
    /// cleared if it pointed into the subtree.
    pub(crate) fn remove_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        let Some(index) = self.index_in_parent(parent, child) else {
            return false;
        };
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.remove(index);
        }
        self.destroy_subtree(child);
        self.update_leaf_state(parent);
        self.refresh_check_state(parent);
        debug!("Removed {} from {}", child, parent);
        true
    }

    /// Remove a node from its parent. The root and detached nodes are left alone.
    pub(crate) fn remove(&mut self, id: NodeId) -> bool {
        match self.parent_of(id) {
            Some(parent) => self.remove_child(parent, id),
            None => false,
        }
    }

    /// Move a node under a new parent, keeping its handle and state.
    pub(crate) fn move_node(
        &mut self,
        id: NodeId,
        parent: NodeId,
        index: Option<usize>,
    ) -> Result<bool, TreeError> {
        if !self.nodes.contains_key(&id) {
            return Err(TreeError::NodeNotFound(id));
        }
        if !self.nodes.contains_key(&parent) {
            return Err(TreeError::NodeNotFound(parent));
        }
        if id == parent || self.contains(id, parent, true) {
            return Err(TreeError::CyclicMove);
        }
        let Some(old_parent) = self.detach(id) else {
            return Ok(false);
        };
        self.refresh_check_state(old_parent);
        self.attach(parent, id, index);
        self.refresh_check_state(parent);
        debug!("Moved {} from {} to {}", id, old_parent, parent);
        Ok(true)
    }

    /// Replace a node's record and re-derive its children.
    pub(crate) fn set_node_data(&mut self, id: NodeId, data: Value) -> bool {
        if !self.nodes.contains_key(&id) {
            return false;
        }
        for child in self.child_ids(id) {
            self.destroy_subtree(child);
        }
        let key = self.derive_key(id, &data);
        let Some(node) = self.nodes.get_mut(&id) else {
            return false;
        };
        node.children.clear();
        let old_key = std::mem::replace(&mut node.key, key);
        node.data = data;
        node.leaf_by_user = self.config.props.is_leaf(&node.data, node);
        if let Some(old_key) = old_key
            && self.nodes_map.get(&old_key) == Some(&id)
        {
            self.nodes_map.remove(&old_key);
        }
        self.register(id);

        let records = self.take_child_records(id);
        self.create_children(id, records, NodeSeed::default());
        self.update_leaf_state(id);
        self.refresh_check_state(id);
        true
    }

    /// Whether `target` is in the subtree of `ancestor`, excluding `ancestor` itself.
    ///
    /// With `deep = false` only direct children count.
    pub(crate) fn contains(&self, ancestor: NodeId, target: NodeId, deep: bool) -> bool {
        if !deep {
            return self.index_in_parent(ancestor, target).is_some();
        }
        self.descendants(ancestor).any(|id| id == target)
    }

    pub(crate) fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent_of(id)?;
        let index = self.index_in_parent(parent, id)?;
        self.nodes.get(&parent)?.children.get(index + 1).copied()
    }

    pub(crate) fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent_of(id)?;
        let index = self.index_in_parent(parent, id)?;
        let previous = index.checked_sub(1)?;
        self.nodes.get(&parent)?.children.get(previous).copied()
    }

    pub(crate) fn set_current(&mut self, id: Option<NodeId>) {
        if let Some(previous) = self.current.take()
            && let Some(node) = self.nodes.get_mut(&previous)
        {
            node.is_current = false;
        }
        if let Some(id) = id
            && let Some(node) = self.nodes.get_mut(&id)
        {
            node.is_current = true;
            self.current = Some(id);
        }
    }

    // -------------------------------------------------------------------------
    // Lookup
    // -------------------------------------------------------------------------

    pub(crate) fn resolve(&self, target: &NodeRef) -> Option<NodeId> {
        match target {
            NodeRef::Id(id) => self.nodes.contains_key(id).then_some(*id),
            NodeRef::Key(key) => self.nodes_map.get(key).copied(),
            NodeRef::Record(record) => self.resolve_record(record),
        }
    }

    fn resolve_record(&self, record: &Value) -> Option<NodeId> {
        if let Some(field) = &self.config.key {
            let key = NodeKey::from_value(record.get(field)?)?;
            return self.nodes_map.get(&key).copied();
        }
        // Lazy nodes keep the children field on their record.
        let probe = self.without_children(record);
        self.descendants(self.root).find(|id| {
            self.nodes
                .get(id)
                .is_some_and(|n| self.without_children(&n.data) == probe)
        })
    }

    /// A record as stored on a materialized node.
    fn without_children(&self, record: &Value) -> Value {
        let mut record = record.clone();
        if let Some(field) = self.config.props.children.field()
            && let Some(object) = record.as_object_mut()
        {
            object.remove(field);
        }
        record
    }

    /// Rebuild a node's full record, with the children field reflecting the
    /// live subtree.
    pub(crate) fn node_record(&self, id: NodeId) -> Option<Value> {
        let node = self.nodes.get(&id)?;
        if node.level == 0 {
            return Some(Value::Array(self.export_data()));
        }
        let mut record = node.data.clone();
        if !node.children.is_empty()
            && let Some(field) = self.config.props.children.field()
            && let Some(object) = record.as_object_mut()
        {
            let children = node
                .children
                .iter()
                .filter_map(|c| self.node_record(*c))
                .collect();
            object.insert(field.to_string(), Value::Array(children));
        }
        Some(record)
    }

    /// Top-level records rebuilt from the live tree.
    pub(crate) fn export_data(&self) -> Vec<Value> {
        self.child_ids(self.root)
            .into_iter()
            .filter_map(|c| self.node_record(c))
            .collect()
    }

    /// Records from the top-level ancestor down to `id`, inclusive.
    pub(crate) fn node_path(&self, id: NodeId) -> Vec<Value> {
        let mut path = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let Some(node) = self.nodes.get(&current) else {
                break;
            };
            if node.level == 0 {
                break;
            }
            path.push(node.data.clone());
            cursor = node.parent;
        }
        path.reverse();
        path
    }
}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree")
            .field("root", &self.root)
            .field("nodes", &self.nodes.len())
            .field("current", &self.current)
            .field("events", &self.events.len())
            .finish_non_exhaustive()
    }
}

/// Pre-order iterator over node handles.
pub(crate) struct Preorder<'a> {
    tree: &'a Tree,
    stack: Vec<NodeId>,
}

impl Iterator for Preorder<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        if let Some(node) = self.tree.nodes.get(&id) {
            self.stack.extend(node.children.iter().rev());
        }
        Some(id)
    }
}
