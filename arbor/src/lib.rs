//! Tree-state engine for tree-view widgets
//!
//! `arbor` keeps an in-memory node hierarchy that mirrors nested application
//! records and tracks the per-node UI state a tree view needs: expanded,
//! checked, indeterminate, current, leaf, visible and loading. Mutations keep
//! the hierarchy, the key index and the checkbox tri-state consistent.
//!
//! Rendering is out of scope: a view reads [`NodeSnapshot`]s or the
//! flattened [`FlatNode`] rows and calls back into [`TreeStore`] on user
//! input, draining [`TreeEvent`]s after each interaction.
//!
//! ```
//! use arbor::prelude::*;
//! use serde_json::json;
//!
//! let store = TreeStore::new(
//!     TreeConfig::new().with_key("id"),
//!     vec![json!({"id": 1, "label": "src", "children": [{"id": 2, "label": "main.rs"}]})],
//! );
//!
//! store.click_node(1);
//! let rows: Vec<String> = store.visible_nodes().into_iter().map(|r| r.label).collect();
//! assert_eq!(rows, ["src", "main.rs"]);
//! assert_eq!(store.take_events().len(), 3);
//! ```

pub mod check;
pub mod config;
pub mod drag;
pub mod error;
pub mod event;
pub mod filter;
pub mod key;
pub mod lazy;
pub mod node;
pub mod props;
pub mod snapshot;

mod interaction;
mod store;
mod tree;

pub use check::{CheckValue, ChildState};
pub use config::TreeConfig;
pub use drag::{
    AllowDragFn, AllowDropFn, DragOver, DropGeometry, DropOutcome, DropPosition, DropRules, DropType,
    classify_drop,
};
pub use error::TreeError;
pub use event::{CheckedSummary, TreeEvent};
pub use filter::{FilterFn, fuzzy_score};
pub use key::{NodeId, NodeKey, NodeRef};
pub use lazy::{LoadCallback, LoadFn, LoadRequest, LoadResolver};
pub use node::Node;
pub use props::{FieldAccessor, Props};
pub use snapshot::{FlatNode, NodeSnapshot};
pub use store::{StoreId, TreeStore};

pub mod prelude {
    pub use crate::check::CheckValue;
    pub use crate::config::TreeConfig;
    pub use crate::drag::{DropGeometry, DropType};
    pub use crate::error::TreeError;
    pub use crate::event::TreeEvent;
    pub use crate::key::{NodeId, NodeKey, NodeRef};
    pub use crate::lazy::{LoadRequest, LoadResolver};
    pub use crate::props::{FieldAccessor, Props};
    pub use crate::store::TreeStore;
}
