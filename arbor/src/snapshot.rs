//! Read-only views of node state for rendering.

use serde::Serialize;
use serde_json::Value;

use crate::key::{NodeId, NodeKey};
use crate::tree::Tree;

/// State of one node at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub key: Option<NodeKey>,
    pub label: String,
    /// The node's record, without its children field.
    pub data: Value,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Depth in tree (root = 0).
    pub level: usize,
    pub expanded: bool,
    pub visible: bool,
    pub checked: bool,
    pub indeterminate: bool,
    pub is_current: bool,
    pub is_leaf: bool,
    pub disabled: bool,
    pub loaded: bool,
    pub loading: bool,
}

/// A visible row in the flattened tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlatNode {
    pub id: NodeId,
    pub key: Option<NodeKey>,
    pub label: String,
    /// Depth in tree (top-level rows = 0).
    pub depth: usize,
    /// Whether the row shows an expand affordance.
    pub has_children: bool,
    pub is_expanded: bool,
    pub checked: bool,
    pub indeterminate: bool,
    pub is_current: bool,
    pub disabled: bool,
    pub loading: bool,
}

impl Tree {
    pub(crate) fn snapshot(&self, id: NodeId) -> Option<NodeSnapshot> {
        let node = self.nodes.get(&id)?;
        Some(NodeSnapshot {
            id,
            key: node.key.clone(),
            label: self.config.props.label(&node.data, node),
            data: node.data.clone(),
            parent: node.parent,
            children: node.children.clone(),
            level: node.level,
            expanded: node.expanded,
            visible: node.visible,
            checked: node.checked,
            indeterminate: node.indeterminate,
            is_current: node.is_current,
            is_leaf: node.is_leaf,
            disabled: self.is_disabled(id),
            loaded: node.loaded,
            loading: node.loading,
        })
    }

    /// Rows a renderer draws: visible nodes whose ancestors are all expanded.
    pub(crate) fn visible_nodes(&self) -> Vec<FlatNode> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.child_ids(self.root).into_iter().rev().collect();
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            if !node.visible {
                continue;
            }
            out.push(FlatNode {
                id,
                key: node.key.clone(),
                label: self.config.props.label(&node.data, node),
                depth: node.level.saturating_sub(1),
                has_children: !node.is_leaf,
                is_expanded: node.expanded,
                checked: node.checked,
                indeterminate: node.indeterminate,
                is_current: node.is_current,
                disabled: self.is_disabled(id),
                loading: node.loading,
            });
            if node.expanded {
                stack.extend(node.children.iter().rev());
            }
        }
        out
    }
}
