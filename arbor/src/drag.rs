//! Drag-reorder coordinator.
//!
//! A drag session tracks the dragged node and the node under the pointer.
//! Each pointer move classifies the drop into before / after / inner / none
//! from the pointer's offset inside the target row and from which positions
//! are legal. Ending the session commits the move by removing the dragged
//! node and re-inserting a copy of its record at the drop location.

use std::sync::Arc;

use log::debug;
use serde::Serialize;

use crate::event::TreeEvent;
use crate::key::NodeId;
use crate::node::Node;
use crate::tree::Tree;

/// Veto for starting a drag: `(dragging)`.
pub type AllowDragFn = Arc<dyn Fn(&Node) -> bool + Send + Sync>;

/// Veto for one drop position: `(dragging, drop, position)`.
pub type AllowDropFn = Arc<dyn Fn(&Node, &Node, DropPosition) -> bool + Send + Sync>;

/// Where the dragged node lands relative to the drop target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DropType {
    Before,
    After,
    Inner,
    None,
}

/// A drop position as offered to [`AllowDropFn`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DropPosition {
    Prev,
    Inner,
    Next,
}

/// Which drop positions are legal for a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropRules {
    pub prev: bool,
    pub inner: bool,
    pub next: bool,
}

impl DropRules {
    pub const ALL: Self = Self {
        prev: true,
        inner: true,
        next: true,
    };

    pub const NONE: Self = Self {
        prev: false,
        inner: false,
        next: false,
    };

    pub fn any(&self) -> bool {
        self.prev || self.inner || self.next
    }

    /// Fraction of the row height above which a drop is no longer `Before`.
    fn prev_threshold(&self) -> f64 {
        match (self.prev, self.inner, self.next) {
            (false, _, _) => -1.0,
            (true, true, _) => 0.25,
            (true, false, true) => 0.45,
            (true, false, false) => 1.0,
        }
    }

    /// Fraction of the row height below which a drop is not yet `After`.
    fn next_threshold(&self) -> f64 {
        match (self.prev, self.inner, self.next) {
            (_, _, false) => 1.0,
            (_, true, true) => 0.75,
            (true, false, true) => 0.55,
            (false, false, true) => 0.0,
        }
    }
}

/// Pointer position inside the target row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DropGeometry {
    /// Distance from the top of the row.
    pub offset: f64,
    /// Height of the row.
    pub height: f64,
}

/// Classify a drop from the legal positions and the pointer position.
///
/// Bands for illegal positions collapse, so their space goes to the
/// neighbouring legal positions.
pub fn classify_drop(rules: DropRules, geometry: DropGeometry) -> DropType {
    let DropGeometry { offset, height } = geometry;
    if offset < height * rules.prev_threshold() {
        DropType::Before
    } else if offset > height * rules.next_threshold() {
        DropType::After
    } else if rules.inner {
        DropType::Inner
    } else {
        DropType::None
    }
}

/// Result of one pointer move during a drag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragOver {
    pub drop: NodeId,
    pub drop_type: DropType,
    /// Draw a line indicator (before or after).
    pub show_indicator: bool,
    /// The pointer shows a drop is possible.
    pub allow_drop: bool,
}

/// Result of ending a drag session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DropOutcome {
    pub dragging: NodeId,
    pub drop: Option<NodeId>,
    pub drop_type: DropType,
    /// Handle of the re-inserted node. The dragged handle no longer resolves.
    pub moved: Option<NodeId>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct DragState {
    dragging: NodeId,
    drop: Option<NodeId>,
    drop_type: DropType,
}

impl Tree {
    /// Legal drop positions of `dragging` on `drop`, structure and user veto combined.
    pub(crate) fn drop_rules(&self, dragging: NodeId, drop: NodeId) -> DropRules {
        let mut rules = self.user_drop_rules(dragging, drop);
        if self.next_sibling(drop) == Some(dragging) {
            rules.next = false;
        }
        if self.previous_sibling(drop) == Some(dragging) {
            rules.prev = false;
        }
        if self.contains(drop, dragging, false) {
            rules.inner = false;
        }
        if dragging == drop || self.contains(dragging, drop, true) {
            rules = DropRules::NONE;
        }
        rules
    }

    fn user_drop_rules(&self, dragging: NodeId, drop: NodeId) -> DropRules {
        let (Some(dragging), Some(drop)) = (self.nodes.get(&dragging), self.nodes.get(&drop)) else {
            return DropRules::NONE;
        };
        match &self.config.allow_drop {
            Some(allow) => DropRules {
                prev: allow(dragging, drop, DropPosition::Prev),
                inner: allow(dragging, drop, DropPosition::Inner),
                next: allow(dragging, drop, DropPosition::Next),
            },
            None => DropRules::ALL,
        }
    }

    // -------------------------------------------------------------------------
    // Session
    // -------------------------------------------------------------------------

    pub(crate) fn drag_start(&mut self, id: NodeId) -> bool {
        if !self.config.draggable {
            return false;
        }
        let Some(node) = self.nodes.get(&id) else {
            return false;
        };
        if node.level == 0 {
            return false;
        }
        if let Some(allow) = &self.config.allow_drag
            && !allow(node)
        {
            return false;
        }
        self.drag = Some(DragState {
            dragging: id,
            drop: None,
            drop_type: DropType::None,
        });
        self.events.push(TreeEvent::NodeDragStart { dragging: id });
        true
    }

    pub(crate) fn drag_over(&mut self, drop: NodeId, geometry: DropGeometry) -> Option<DragOver> {
        let mut state = self.drag?;
        let dragging = state.dragging;
        if !self.nodes.contains_key(&dragging) || !self.nodes.contains_key(&drop) {
            return None;
        }

        let user = self.user_drop_rules(dragging, drop);
        let previous = state.drop.filter(|id| self.nodes.contains_key(id));
        if user.any() && previous != Some(drop) {
            if let Some(previous) = previous {
                self.events.push(TreeEvent::NodeDragLeave {
                    dragging,
                    drop: previous,
                });
            }
            self.events.push(TreeEvent::NodeDragEnter { dragging, drop });
        }
        if user.any() {
            state.drop = Some(drop);
        }

        let drop_type = classify_drop(self.drop_rules(dragging, drop), geometry);
        let show_indicator = matches!(drop_type, DropType::Before | DropType::After);
        state.drop_type = drop_type;
        self.drag = Some(state);
        self.events.push(TreeEvent::NodeDragOver { dragging, drop });

        Some(DragOver {
            drop,
            drop_type,
            show_indicator,
            allow_drop: show_indicator || user.inner,
        })
    }

    /// End the drag session, moving the dragged node if the drop is legal.
    pub(crate) fn drag_end(&mut self) -> Option<DropOutcome> {
        let state = self.drag.take()?;
        let dragging = state.dragging;
        if !self.nodes.contains_key(&dragging) {
            return None;
        }

        let drop = state.drop.filter(|id| self.nodes.contains_key(id));
        let Some(drop) = drop else {
            self.events.push(TreeEvent::NodeDragEnd {
                dragging,
                drop: None,
                drop_type: state.drop_type,
            });
            return Some(DropOutcome {
                dragging,
                drop: None,
                drop_type: state.drop_type,
                moved: None,
            });
        };

        // The tree may have changed since the last pointer move.
        let rules = self.drop_rules(dragging, drop);
        let drop_type = match state.drop_type {
            DropType::Before if rules.prev => DropType::Before,
            DropType::After if rules.next => DropType::After,
            DropType::Inner if rules.inner => DropType::Inner,
            _ => DropType::None,
        };

        let mut moved = None;
        if drop_type != DropType::None
            && let Some(record) = self.node_record(dragging)
        {
            self.remove(dragging);
            let parent = self.parent_of(drop);
            moved = match (drop_type, parent) {
                (DropType::Before, Some(parent)) => self.insert_before(parent, record, Some(drop)),
                (DropType::After, Some(parent)) => self.insert_after(parent, record, Some(drop)),
                (DropType::Inner, _) => self.insert_child(drop, record, None),
                _ => Ok(None),
            }
            .ok()
            .flatten();
            debug!("Dropped {} {:?} {} as {:?}", dragging, drop_type, drop, moved);
        }

        self.events.push(TreeEvent::NodeDragEnd {
            dragging,
            drop: Some(drop),
            drop_type,
        });
        if drop_type != DropType::None {
            self.events.push(TreeEvent::NodeDrop {
                dragging,
                drop,
                drop_type,
            });
        }
        Some(DropOutcome {
            dragging,
            drop: Some(drop),
            drop_type,
            moved,
        })
    }
}
