//! Events emitted toward the host.
//!
//! Operations push events onto the store's queue while they run. The host
//! drains the queue with [`TreeStore::take_events`](crate::TreeStore::take_events)
//! after each user interaction and dispatches them to its own handlers.

use serde::Serialize;
use serde_json::Value;

use crate::drag::DropType;
use crate::key::{NodeId, NodeKey};

// =============================================================================
// Event Payloads
// =============================================================================

/// Checked state of the whole tree, carried by [`TreeEvent::Check`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckedSummary {
    pub checked_nodes: Vec<Value>,
    pub checked_keys: Vec<NodeKey>,
    pub half_checked_nodes: Vec<Value>,
    pub half_checked_keys: Vec<NodeKey>,
}

// =============================================================================
// Tree Events
// =============================================================================

/// An event to be dispatched to the host.
///
/// Records are the node records as stored in the tree, without their
/// children field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum TreeEvent {
    /// A checkbox was toggled by the user.
    Check {
        data: Value,
        node: NodeId,
        summary: CheckedSummary,
    },
    /// A node's checked or indeterminate flag changed.
    CheckChange {
        data: Value,
        node: NodeId,
        checked: bool,
        indeterminate: bool,
    },
    /// The current node changed.
    CurrentChange {
        data: Option<Value>,
        node: Option<NodeId>,
    },
    /// A node was expanded by the user.
    NodeExpand { data: Value, node: NodeId },
    /// A node was collapsed by the user.
    NodeCollapse { data: Value, node: NodeId },
    /// A node was clicked.
    NodeClick { data: Value, node: NodeId },
    /// A drag session started.
    NodeDragStart { dragging: NodeId },
    /// The pointer entered a new drop target.
    NodeDragEnter { dragging: NodeId, drop: NodeId },
    /// The pointer left the previous drop target.
    NodeDragLeave { dragging: NodeId, drop: NodeId },
    /// The pointer moved over a drop target.
    NodeDragOver { dragging: NodeId, drop: NodeId },
    /// The drag session ended, dropped or not.
    NodeDragEnd {
        dragging: NodeId,
        drop: Option<NodeId>,
        drop_type: DropType,
    },
    /// The dragged node was moved.
    NodeDrop {
        dragging: NodeId,
        drop: NodeId,
        drop_type: DropType,
    },
}

impl TreeEvent {
    /// Get the host-facing event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Check { .. } => "check",
            Self::CheckChange { .. } => "check-change",
            Self::CurrentChange { .. } => "current-change",
            Self::NodeExpand { .. } => "node-expand",
            Self::NodeCollapse { .. } => "node-collapse",
            Self::NodeClick { .. } => "node-click",
            Self::NodeDragStart { .. } => "node-drag-start",
            Self::NodeDragEnter { .. } => "node-drag-enter",
            Self::NodeDragLeave { .. } => "node-drag-leave",
            Self::NodeDragOver { .. } => "node-drag-over",
            Self::NodeDragEnd { .. } => "node-drag-end",
            Self::NodeDrop { .. } => "node-drop",
        }
    }
}
