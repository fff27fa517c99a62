//! Error types for tree operations.
//!
//! Only configuration and usage errors are reported. Operations that target
//! a key or record the store cannot resolve are soft failures and return
//! `Ok(None)`, `false` or nothing at all.

use crate::key::NodeId;

/// Errors returned by [`TreeStore`](crate::TreeStore) operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    /// A key-dependent operation was called on a store without an identity field.
    #[error("node key is required in {operation}")]
    KeyRequired {
        /// Name of the operation that needs the identity field.
        operation: &'static str,
    },

    /// A `null` record was passed where a child record is required.
    #[error("insert child error: child is required")]
    MissingChild,

    /// A node handle no longer resolves to a live node.
    #[error("node {0} not found")]
    NodeNotFound(NodeId),

    /// A node cannot be moved under itself or one of its descendants.
    #[error("cannot move a node into its own subtree")]
    CyclicMove,

    /// `filter` was called without a configured filter method.
    #[error("filter node method is required when filtering")]
    FilterMethodRequired,
}

impl TreeError {
    /// Creates a `KeyRequired` error for the given operation.
    pub fn key_required(operation: &'static str) -> Self {
        Self::KeyRequired { operation }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            TreeError::key_required("get_current_key").to_string(),
            "node key is required in get_current_key"
        );
        assert_eq!(
            TreeError::NodeNotFound(NodeId(7)).to_string(),
            "node __node_7 not found"
        );
    }
}
