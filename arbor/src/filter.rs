//! Node filtering.

use std::cell::RefCell;
use std::sync::Arc;

use log::debug;
use nucleo_matcher::pattern::{AtomKind, CaseMatching, Normalization, Pattern};
use nucleo_matcher::{Config, Matcher, Utf32Str};
use serde_json::Value;

use crate::error::TreeError;
use crate::node::Node;
use crate::tree::Tree;

/// Decides whether a node matches a query: `(query, record, node)`.
pub type FilterFn = Arc<dyn Fn(&str, &Value, &Node) -> bool + Send + Sync>;

thread_local! {
    static MATCHER: RefCell<Matcher> = RefCell::new(Matcher::new(Config::DEFAULT));
}

/// Fuzzy-match `query` against `label`, ignoring case.
///
/// Returns the match score (higher is better), or `None` if the label does
/// not match. An empty query matches everything with score 0.
pub fn fuzzy_score(query: &str, label: &str) -> Option<u32> {
    if query.is_empty() {
        return Some(0);
    }
    let pattern = Pattern::new(
        query,
        CaseMatching::Ignore,
        Normalization::Smart,
        AtomKind::Fuzzy,
    );
    let mut buf = Vec::new();
    let haystack = Utf32Str::new(label, &mut buf);
    MATCHER.with(|matcher| pattern.score(haystack, &mut matcher.borrow_mut()))
}

impl Tree {
    /// Set every node's `visible` flag from the filter method.
    ///
    /// A node stays visible while any descendant matches. With a non-empty
    /// query, visible branches are expanded so the matches show up.
    pub(crate) fn filter(&mut self, query: &str) -> Result<(), TreeError> {
        let Some(filter) = self.config.filter_node_method.clone() else {
            return Err(TreeError::FilterMethodRequired);
        };

        let order = self.all_nodes();
        for id in &order {
            let visible = self
                .nodes
                .get(id)
                .is_some_and(|n| filter(query, &n.data, n));
            if let Some(node) = self.nodes.get_mut(id) {
                node.visible = visible;
            }
        }
        // The root holds no record of its own; its children decide.
        let root = self.root;
        if let Some(node) = self.nodes.get_mut(&root) {
            node.visible = false;
        }

        // Reverse pre-order reaches every node after all of its descendants.
        let lazy = self.config.lazy;
        let mut matched = 0;
        for id in order.into_iter().rev().chain(std::iter::once(root)) {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            let mut visible = node.visible;
            if !visible && !node.children.is_empty() {
                visible = node
                    .children
                    .iter()
                    .any(|c| self.nodes.get(c).is_some_and(|n| n.visible));
            }
            let is_leaf = node.is_leaf;
            if let Some(node) = self.nodes.get_mut(&id) {
                node.visible = visible;
            }
            if visible && id != root {
                matched += 1;
            }
            if !query.is_empty() && visible && !is_leaf && !lazy {
                self.expand(id, false, None);
            }
        }
        debug!("Filter {:?} left {} nodes visible", query, matched);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::config::TreeConfig;
    use crate::key::{NodeId, NodeRef};

    fn tree(config: TreeConfig) -> Tree {
        Tree::new(
            config.with_key("id"),
            Arc::new(vec![
                json!({"id": 1, "label": "src", "children": [
                    {"id": 2, "label": "main.rs"},
                    {"id": 3, "label": "lib.rs"}
                ]}),
                json!({"id": 4, "label": "docs", "children": [{"id": 5, "label": "guide.md"}]}),
            ]),
        )
    }

    fn by_label() -> TreeConfig {
        TreeConfig::new().with_filter_node_method(|query, data, _| {
            query.is_empty() || data["label"].as_str().is_some_and(|l| l.contains(query))
        })
    }

    fn id(tree: &Tree, key: i64) -> NodeId {
        tree.resolve(&NodeRef::from(key)).expect("node exists")
    }

    fn visible(tree: &Tree, key: i64) -> bool {
        tree.nodes[&id(tree, key)].visible
    }

    #[test]
    fn test_filter_requires_method() {
        let mut tree = tree(TreeConfig::new());
        assert_eq!(tree.filter("x"), Err(TreeError::FilterMethodRequired));
    }

    #[test]
    fn test_filter_keeps_ancestors_of_matches() {
        let mut tree = tree(by_label());
        tree.filter("main").unwrap();
        assert!(visible(&tree, 2));
        assert!(visible(&tree, 1));
        assert!(!visible(&tree, 3));
        assert!(!visible(&tree, 4));
        assert!(!visible(&tree, 5));
        assert!(tree.nodes[&id(&tree, 1)].expanded);
    }

    #[test]
    fn test_filter_method_never_sees_root() {
        let config = TreeConfig::new().with_filter_node_method(|_, data, _| {
            assert!(data.is_object(), "filter got {data}");
            true
        });
        let mut tree = tree(config);
        tree.filter("x").unwrap();
        assert!(tree.nodes[&tree.root].visible);
        assert!(visible(&tree, 5));
    }

    #[test]
    fn test_fuzzy_score() {
        assert_eq!(fuzzy_score("", "anything"), Some(0));
        assert!(fuzzy_score("mrs", "main.rs").is_some());
        assert!(fuzzy_score("MAIN", "main.rs").is_some());
        assert!(fuzzy_score("xyz", "main.rs").is_none());
    }

    #[test]
    fn test_fuzzy_filter_uses_labels() {
        let mut tree = tree(TreeConfig::new().with_fuzzy_filter());
        tree.filter("gd").unwrap();
        assert!(visible(&tree, 5));
        assert!(visible(&tree, 4));
        assert!(!visible(&tree, 1));
    }

    #[test]
    fn test_empty_query_restores_everything() {
        let mut tree = tree(by_label());
        tree.filter("guide").unwrap();
        tree.filter("").unwrap();
        for key in 1..=5 {
            assert!(visible(&tree, key), "node {key}");
        }
        assert!(!tree.nodes[&id(&tree, 1)].expanded);
    }
}
