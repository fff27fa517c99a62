//! Tree configuration.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::drag::{AllowDragFn, AllowDropFn, DropPosition};
use crate::filter::{FilterFn, fuzzy_score};
use crate::key::NodeKey;
use crate::lazy::{LoadFn, LoadRequest, LoadResolver};
use crate::node::Node;
use crate::props::Props;

/// Configuration for a [`TreeStore`](crate::TreeStore).
///
/// The configuration is fixed for the lifetime of the tree it built.
/// [`TreeStore::set_config`](crate::TreeStore::set_config) swaps it wholesale
/// and rebuilds the tree from the current data.
///
/// # Example
///
/// ```
/// use arbor::{Props, TreeConfig};
///
/// let config = TreeConfig::new()
///     .with_key("id")
///     .with_props(Props::new().with_label("name"))
///     .with_default_checked_keys([2, 3])
///     .with_default_expand_all(true);
/// assert!(config.key.is_some());
/// ```
#[derive(Clone)]
pub struct TreeConfig {
    /// Record field holding each node's identity key.
    pub key: Option<String>,
    /// Accessors for label, children, leaf hint and disabled flag.
    pub props: Props,
    /// Materialize children through `load` on first expand.
    pub lazy: bool,
    /// Loader for lazy children.
    pub load: Option<LoadFn>,
    /// Treat every checkbox independently; no cascade in either direction.
    pub check_strictly: bool,
    /// Checking an unloaded lazy node loads it and checks the loaded children.
    pub check_descendants: bool,
    /// Start every node expanded.
    pub default_expand_all: bool,
    /// Keys checked (with cascade) when the tree is built.
    pub default_checked_keys: Vec<NodeKey>,
    /// Keys expanded when the tree is built.
    pub default_expanded_keys: Vec<NodeKey>,
    /// Expanding a default-expanded node also expands its ancestors.
    ///
    /// Default: true
    pub auto_expand_parent: bool,
    /// Key of the node that becomes current when it is materialized.
    pub current_node_key: Option<NodeKey>,
    /// Expanding a node collapses its siblings.
    pub accordion: bool,
    /// Clicking a node toggles its expansion.
    ///
    /// Default: true
    pub expand_on_click_node: bool,
    /// Clicking a node toggles its checkbox.
    pub check_on_click_node: bool,
    /// Enable the drag-reorder coordinator.
    pub draggable: bool,
    /// Veto for starting a drag.
    pub allow_drag: Option<AllowDragFn>,
    /// Veto for each drop position.
    pub allow_drop: Option<AllowDropFn>,
    /// Predicate deciding node visibility when filtering.
    pub filter_node_method: Option<FilterFn>,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            key: None,
            props: Props::default(),
            lazy: false,
            load: None,
            check_strictly: false,
            check_descendants: false,
            default_expand_all: false,
            default_checked_keys: Vec::new(),
            default_expanded_keys: Vec::new(),
            auto_expand_parent: true,
            current_node_key: None,
            accordion: false,
            expand_on_click_node: true,
            check_on_click_node: false,
            draggable: false,
            allow_drag: None,
            allow_drop: None,
            filter_node_method: None,
        }
    }
}

impl TreeConfig {
    /// Creates a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the identity field.
    pub fn with_key(mut self, field: impl Into<String>) -> Self {
        self.key = Some(field.into());
        self
    }

    /// Sets the field accessors.
    pub fn with_props(mut self, props: Props) -> Self {
        self.props = props;
        self
    }

    /// Turns on lazy mode with the given loader.
    pub fn with_lazy_load(
        mut self,
        load: impl Fn(LoadRequest, LoadResolver) + Send + Sync + 'static,
    ) -> Self {
        self.lazy = true;
        self.load = Some(Arc::new(load));
        self
    }

    /// Sets lazy mode without touching the loader.
    pub fn with_lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    /// Sets check-strictly mode.
    pub fn with_check_strictly(mut self, check_strictly: bool) -> Self {
        self.check_strictly = check_strictly;
        self
    }

    /// Sets whether checking an unloaded lazy node loads its children.
    pub fn with_check_descendants(mut self, check_descendants: bool) -> Self {
        self.check_descendants = check_descendants;
        self
    }

    /// Sets whether every node starts expanded.
    pub fn with_default_expand_all(mut self, expand_all: bool) -> Self {
        self.default_expand_all = expand_all;
        self
    }

    /// Sets the keys checked when the tree is built.
    pub fn with_default_checked_keys<K: Into<NodeKey>>(
        mut self,
        keys: impl IntoIterator<Item = K>,
    ) -> Self {
        self.default_checked_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the keys expanded when the tree is built.
    pub fn with_default_expanded_keys<K: Into<NodeKey>>(
        mut self,
        keys: impl IntoIterator<Item = K>,
    ) -> Self {
        self.default_expanded_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Sets whether default-expanded nodes expand their ancestors.
    pub fn with_auto_expand_parent(mut self, auto_expand_parent: bool) -> Self {
        self.auto_expand_parent = auto_expand_parent;
        self
    }

    /// Sets the key of the initial current node.
    pub fn with_current_node_key(mut self, key: impl Into<NodeKey>) -> Self {
        self.current_node_key = Some(key.into());
        self
    }

    /// Sets accordion mode.
    pub fn with_accordion(mut self, accordion: bool) -> Self {
        self.accordion = accordion;
        self
    }

    /// Sets whether clicking a node toggles its expansion.
    pub fn with_expand_on_click_node(mut self, expand: bool) -> Self {
        self.expand_on_click_node = expand;
        self
    }

    /// Sets whether clicking a node toggles its checkbox.
    pub fn with_check_on_click_node(mut self, check: bool) -> Self {
        self.check_on_click_node = check;
        self
    }

    /// Enables or disables drag-reorder.
    pub fn with_draggable(mut self, draggable: bool) -> Self {
        self.draggable = draggable;
        self
    }

    /// Sets the drag veto.
    pub fn with_allow_drag(mut self, allow: impl Fn(&Node) -> bool + Send + Sync + 'static) -> Self {
        self.allow_drag = Some(Arc::new(allow));
        self
    }

    /// Sets the drop veto.
    pub fn with_allow_drop(
        mut self,
        allow: impl Fn(&Node, &Node, DropPosition) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.allow_drop = Some(Arc::new(allow));
        self
    }

    /// Sets the filter predicate.
    pub fn with_filter_node_method(
        mut self,
        filter: impl Fn(&str, &Value, &Node) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.filter_node_method = Some(Arc::new(filter));
        self
    }

    /// Filters by fuzzy-matching the query against node labels.
    ///
    /// Labels are read with the props configured so far, so call this after
    /// [`with_props`](Self::with_props).
    pub fn with_fuzzy_filter(self) -> Self {
        let props = self.props.clone();
        self.with_filter_node_method(move |query, data, node| {
            fuzzy_score(query, &props.label(data, node)).is_some()
        })
    }
}

impl fmt::Debug for TreeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeConfig")
            .field("key", &self.key)
            .field("props", &self.props)
            .field("lazy", &self.lazy)
            .field("load", &self.load.is_some())
            .field("check_strictly", &self.check_strictly)
            .field("check_descendants", &self.check_descendants)
            .field("default_expand_all", &self.default_expand_all)
            .field("default_checked_keys", &self.default_checked_keys)
            .field("default_expanded_keys", &self.default_expanded_keys)
            .field("auto_expand_parent", &self.auto_expand_parent)
            .field("current_node_key", &self.current_node_key)
            .field("accordion", &self.accordion)
            .field("expand_on_click_node", &self.expand_on_click_node)
            .field("check_on_click_node", &self.check_on_click_node)
            .field("draggable", &self.draggable)
            .field("allow_drag", &self.allow_drag.is_some())
            .field("allow_drop", &self.allow_drop.is_some())
            .field("filter_node_method", &self.filter_node_method.is_some())
            .finish()
    }
}
