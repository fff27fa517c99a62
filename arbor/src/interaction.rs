//! User actions on rows and the events they emit.

use crate::check::CheckValue;
use crate::event::TreeEvent;
use crate::key::NodeId;
use crate::tree::Tree;

impl Tree {
    /// Current-node change plus the configured click behavior.
    pub(crate) fn click_node(&mut self, id: NodeId) -> bool {
        let Some(node) = self.nodes.get(&id) else {
            return false;
        };
        if node.level == 0 {
            return false;
        }

        self.set_current(Some(id));
        self.events.push(TreeEvent::CurrentChange {
            data: self.nodes.get(&id).map(|n| n.data.clone()),
            node: Some(id),
        });

        if self.config.expand_on_click_node {
            self.toggle_expand(id);
        }
        if self.config.check_on_click_node && !self.is_disabled(id) {
            let checked = self.nodes.get(&id).is_some_and(|n| n.checked);
            self.check_node(id, !checked);
        }

        if let Some(node) = self.nodes.get(&id) {
            self.events.push(TreeEvent::NodeClick {
                data: node.data.clone(),
                node: id,
            });
        }
        true
    }

    /// Expand a collapsed node or collapse an expanded one. Leaves are ignored.
    pub(crate) fn toggle_expand(&mut self, id: NodeId) -> bool {
        let Some(node) = self.nodes.get(&id) else {
            return false;
        };
        if node.is_leaf || node.level == 0 {
            return false;
        }
        let data = node.data.clone();

        if node.expanded {
            self.events.push(TreeEvent::NodeCollapse { data, node: id });
            self.collapse(id);
            return true;
        }

        self.expand(id, false, None);
        self.events.push(TreeEvent::NodeExpand { data, node: id });
        if self.config.accordion
            && let Some(parent) = self.parent_of(id)
        {
            for sibling in self.child_ids(parent) {
                if sibling != id {
                    self.collapse(sibling);
                }
            }
        }
        true
    }

    /// Toggle a checkbox the way a click on it does, then emit `check`.
    pub(crate) fn check_node(&mut self, id: NodeId, checked: bool) -> bool {
        if !self.nodes.contains_key(&id) {
            return false;
        }
        self.set_checked(id, CheckValue::from(checked), !self.config.check_strictly);
        let summary = self.checked_summary();
        if let Some(node) = self.nodes.get(&id) {
            self.events.push(TreeEvent::Check {
                data: node.data.clone(),
                node: id,
                summary,
            });
        }
        true
    }
}
