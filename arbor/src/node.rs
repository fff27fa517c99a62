//! The node entity and its leaf state.

use serde_json::Value;

use crate::key::{NodeId, NodeKey};

/// One entity in the tree, bound to one record.
///
/// Nodes live in the store's arena and refer to their parent and children by
/// [`NodeId`]. All state is read through accessors; mutation goes through the
/// store so the key index and checkbox state stay consistent.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) data: Value,
    pub(crate) key: Option<NodeKey>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) level: usize,
    pub(crate) expanded: bool,
    pub(crate) visible: bool,
    pub(crate) checked: bool,
    pub(crate) indeterminate: bool,
    pub(crate) is_current: bool,
    pub(crate) is_leaf: bool,
    pub(crate) leaf_by_user: Option<bool>,
    pub(crate) loaded: bool,
    pub(crate) loading: bool,
}

impl Node {
    pub(crate) fn new(
        id: NodeId,
        data: Value,
        key: Option<NodeKey>,
        parent: Option<NodeId>,
        level: usize,
    ) -> Self {
        Self {
            id,
            data,
            key,
            parent,
            children: Vec::new(),
            level,
            expanded: false,
            visible: true,
            checked: false,
            indeterminate: false,
            is_current: false,
            is_leaf: false,
            leaf_by_user: None,
            loaded: false,
            loading: false,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The record this node mirrors.
    ///
    /// Child records are owned by the child nodes, so a materialized record
    /// no longer carries its children field. Use
    /// [`TreeStore::node_record`](crate::TreeStore::node_record) for the full
    /// nested record.
    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn key(&self) -> Option<&NodeKey> {
        self.key.as_ref()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Depth in the tree (root = 0).
    pub fn level(&self) -> usize {
        self.level
    }

    pub fn is_root(&self) -> bool {
        self.level == 0 && self.parent.is_none()
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_checked(&self) -> bool {
        self.checked
    }

    pub fn is_indeterminate(&self) -> bool {
        self.indeterminate
    }

    pub fn is_current(&self) -> bool {
        self.is_current
    }

    pub fn is_leaf(&self) -> bool {
        self.is_leaf
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Re-derive `is_leaf` from the children and the load state.
    ///
    /// An unloaded lazy node trusts the user hint if there is one and is
    /// otherwise assumed expandable.
    pub(crate) fn update_leaf_state(&mut self, lazy: bool) {
        if lazy
            && !self.loaded
            && let Some(hint) = self.leaf_by_user
        {
            self.is_leaf = hint;
            return;
        }
        if !lazy || self.loaded {
            self.is_leaf = self.children.is_empty();
            return;
        }
        self.is_leaf = false;
    }
}

/// State pre-seeded onto freshly materialized nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct NodeSeed {
    pub checked: Option<bool>,
}

impl NodeSeed {
    pub fn checked(checked: bool) -> Self {
        Self {
            checked: Some(checked),
        }
    }

    pub fn apply(self, node: &mut Node) {
        if let Some(checked) = self.checked {
            node.checked = checked;
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn node() -> Node {
        Node::new(NodeId(3), json!({"id": 3}), None, Some(NodeId(0)), 1)
    }

    #[test]
    fn test_leaf_state_eager() {
        let mut node = node();
        node.update_leaf_state(false);
        assert!(node.is_leaf());

        node.children.push(NodeId(4));
        node.update_leaf_state(false);
        assert!(!node.is_leaf());
    }

    #[test]
    fn test_leaf_state_lazy_unloaded_is_optimistic() {
        let mut node = node();
        node.update_leaf_state(true);
        assert!(!node.is_leaf());
    }

    #[test]
    fn test_leaf_state_lazy_trusts_hint_until_loaded() {
        let mut node = node();
        node.leaf_by_user = Some(true);
        node.update_leaf_state(true);
        assert!(node.is_leaf());

        node.loaded = true;
        node.children.push(NodeId(4));
        node.update_leaf_state(true);
        assert!(!node.is_leaf());
    }

    #[test]
    fn test_leaf_state_lazy_loaded_without_children() {
        let mut node = node();
        node.loaded = true;
        node.update_leaf_state(true);
        assert!(node.is_leaf());
    }

    #[test]
    fn test_seed() {
        let mut node = node();
        NodeSeed::checked(true).apply(&mut node);
        assert!(node.is_checked());
        NodeSeed::default().apply(&mut node);
        assert!(node.is_checked());
    }
}
