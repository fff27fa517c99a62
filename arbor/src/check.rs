//! Checkbox tri-state cascade.
//!
//! Checking a node pushes the value down to its descendants and then
//! recomputes the checked/indeterminate summary of every ancestor from its
//! children. With `check_strictly` every node is independent.

use log::trace;
use serde_json::Value;

use crate::event::{CheckedSummary, TreeEvent};
use crate::key::{NodeId, NodeKey};
use crate::lazy::LoadFollowUp;
use crate::node::NodeSeed;
use crate::tree::Tree;

/// Value passed to a checkbox operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckValue {
    Checked,
    Unchecked,
    /// Indeterminate. Cascades to children like `Checked`.
    Half,
}

impl From<bool> for CheckValue {
    fn from(checked: bool) -> Self {
        if checked {
            Self::Checked
        } else {
            Self::Unchecked
        }
    }
}

/// Summary of a set of sibling nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildState {
    /// Every node is checked and none is indeterminate.
    pub all: bool,
    /// No node is checked or indeterminate.
    pub none: bool,
    /// Neither `all` nor `none`.
    pub half: bool,
    /// Like `all`, counting only nodes that are not disabled.
    pub all_without_disable: bool,
}

impl Tree {
    pub(crate) fn child_state(&self, children: &[NodeId]) -> ChildState {
        let mut all = true;
        let mut none = true;
        let mut all_without_disable = true;
        for id in children {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            if !node.checked || node.indeterminate {
                all = false;
                if !self.is_disabled(*id) {
                    all_without_disable = false;
                }
            }
            if node.checked || node.indeterminate {
                none = false;
            }
        }
        ChildState {
            all,
            none,
            half: !all && !none,
            all_without_disable,
        }
    }

    /// Write a node's flags, recording a `check-change` event if they changed.
    fn set_check_state(&mut self, id: NodeId, checked: bool, indeterminate: bool) {
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        if node.checked == checked && node.indeterminate == indeterminate {
            return;
        }
        node.checked = checked;
        node.indeterminate = indeterminate;
        if node.level > 0 {
            self.events.push(TreeEvent::CheckChange {
                data: node.data.clone(),
                node: id,
                checked,
                indeterminate,
            });
        }
    }

    /// Check or uncheck a node, cascading down when `deep` and always up.
    pub(crate) fn set_checked(&mut self, id: NodeId, value: CheckValue, deep: bool) {
        self.apply_checked(id, value, deep, false, None);
    }

    fn apply_checked(
        &mut self,
        id: NodeId,
        mut value: CheckValue,
        deep: bool,
        recursion: bool,
        inherited: Option<bool>,
    ) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        let is_leaf = node.is_leaf;
        let parent = node.parent;
        let loading = node.loading;
        let children = node.children.clone();

        self.set_check_state(
            id,
            value == CheckValue::Checked,
            value == CheckValue::Half,
        );
        if self.config.check_strictly {
            return;
        }

        let should_load = self.should_load_data(id);
        if !(should_load && !self.config.check_descendants) {
            let state = self.child_state(&children);
            if !is_leaf && !state.all && state.all_without_disable {
                // All enabled children are already checked: the click unchecks.
                value = CheckValue::Unchecked;
                let indeterminate = self.nodes.get(&id).is_some_and(|n| n.indeterminate);
                self.set_check_state(id, false, indeterminate);
            }

            let propagated = inherited.unwrap_or(value != CheckValue::Unchecked);
            if should_load {
                let seed = NodeSeed::checked(value != CheckValue::Unchecked);
                self.load_data(id, seed, LoadFollowUp::Check { propagated, deep }, None);
                if !recursion && let Some(parent) = parent {
                    self.reinit_checked(parent);
                }
                return;
            }
            if deep {
                self.descend_checked(id, propagated, deep);
            }
        }

        if recursion {
            return;
        }
        // A shallow check on a branch still has to agree with its children.
        let start = if !deep && !children.is_empty() && !loading {
            Some(id)
        } else {
            parent
        };
        if let Some(start) = start {
            self.reinit_checked(start);
        }
    }

    /// Push `propagated` into the children of `id`, then summarize them.
    ///
    /// Disabled children keep their own value but still pass `propagated`
    /// on to their descendants.
    pub(crate) fn descend_checked(&mut self, id: NodeId, propagated: bool, deep: bool) {
        let children = self.child_ids(id);
        if children.is_empty() {
            return;
        }
        for child in &children {
            let value: CheckValue = if self.is_disabled(*child) {
                self.nodes.get(child).is_some_and(|n| n.checked).into()
            } else {
                propagated.into()
            };
            self.apply_checked(*child, value, deep, true, Some(propagated));
        }
        let state = self.child_state(&children);
        self.set_check_state(id, state.all, state.half);
    }

    /// Recompute a node and its ancestors from their children.
    pub(crate) fn reinit_checked(&mut self, id: NodeId) {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let Some(node) = self.nodes.get(&current) else {
                break;
            };
            if node.children.is_empty() || node.loading {
                break;
            }
            let parent = node.parent;
            let state = self.child_state(&node.children);
            self.set_check_state(current, state.all, state.half);
            if self.config.check_strictly {
                break;
            }
            cursor = parent;
        }
    }

    /// Re-establish the tri-state summary of `id` after its children changed.
    pub(crate) fn refresh_check_state(&mut self, id: NodeId) {
        if self.config.check_strictly {
            return;
        }
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        if node.loading {
            return;
        }
        if node.children.is_empty() {
            let (checked, parent) = (node.checked, node.parent);
            self.set_check_state(id, checked, false);
            if let Some(parent) = parent {
                self.reinit_checked(parent);
            }
        } else {
            self.reinit_checked(id);
        }
    }

    // -------------------------------------------------------------------------
    // Key-based checking
    // -------------------------------------------------------------------------

    pub(crate) fn init_default_checked(&mut self) {
        let deep = !self.config.check_strictly;
        let keys = self.config.default_checked_keys.clone();
        for key in keys {
            if let Some(id) = self.nodes_map.get(&key).copied() {
                self.set_checked(id, CheckValue::Checked, deep);
            }
        }
    }

    pub(crate) fn init_default_checked_node(&mut self, id: NodeId) {
        let listed = self
            .nodes
            .get(&id)
            .and_then(|n| n.key.as_ref())
            .is_some_and(|k| self.config.default_checked_keys.contains(k));
        if listed {
            self.set_checked(id, CheckValue::Checked, !self.config.check_strictly);
        }
    }

    /// Make exactly the nodes named by `keys` checked.
    ///
    /// With `leaf_only`, listed nodes that are not leaves are skipped and
    /// ancestors are recomputed from the leaves alone.
    pub(crate) fn set_checked_keys(&mut self, keys: &[NodeKey], leaf_only: bool) {
        let mut all = self.all_nodes();
        for id in &all {
            self.set_check_state(*id, false, false);
        }

        // Deepest first, so ancestors are summarized from settled children.
        all.sort_by_key(|id| std::cmp::Reverse(self.nodes.get(id).map_or(0, |n| n.level)));
        let deep = !self.config.check_strictly && !leaf_only;
        for id in all {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            let listed = node.key.as_ref().is_some_and(|k| keys.contains(k));
            if !listed || (leaf_only && !node.is_leaf) {
                continue;
            }
            self.set_checked(id, CheckValue::Checked, deep);
        }
        trace!("set_checked_keys: {} keys", keys.len());
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Checked nodes in display order.
    pub(crate) fn checked_ids(&self, leaf_only: bool, include_half: bool) -> Vec<NodeId> {
        self.descendants(self.root)
            .filter(|id| {
                self.nodes.get(id).is_some_and(|n| {
                    (n.checked || (include_half && n.indeterminate)) && (!leaf_only || n.is_leaf)
                })
            })
            .collect()
    }

    pub(crate) fn half_checked_ids(&self) -> Vec<NodeId> {
        self.descendants(self.root)
            .filter(|id| self.nodes.get(id).is_some_and(|n| n.indeterminate))
            .collect()
    }

    pub(crate) fn records_of(&self, ids: &[NodeId]) -> Vec<Value> {
        ids.iter()
            .filter_map(|id| self.nodes.get(id).map(|n| n.data.clone()))
            .collect()
    }

    pub(crate) fn keys_of(&self, ids: &[NodeId]) -> Vec<NodeKey> {
        ids.iter()
            .filter_map(|id| self.nodes.get(id).and_then(|n| n.key.clone()))
            .collect()
    }

    pub(crate) fn checked_summary(&self) -> CheckedSummary {
        let checked = self.checked_ids(false, false);
        let half = self.half_checked_ids();
        CheckedSummary {
            checked_nodes: self.records_of(&checked),
            checked_keys: self.keys_of(&checked),
            half_checked_nodes: self.records_of(&half),
            half_checked_keys: self.keys_of(&half),
        }
    }
}
