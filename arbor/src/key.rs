//! Node handles, identity keys and lookup references.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Handle for a node in a store's arena.
///
/// Handles are handed out sequentially and are never reused by the same
/// store, so a handle kept across a removal simply stops resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub(crate) u64);

impl NodeId {
    /// Get the raw sequence number.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "__node_{}", self.0)
    }
}

/// Identity key of a node, taken from the record's configured key field.
///
/// Keys are kept in their textual form: strings verbatim, numbers and
/// booleans as their JSON text. `1` and `"1"` therefore name the same node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeKey(String);

impl NodeKey {
    /// Create a key from its textual form.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Extract a key from a record field value.
    ///
    /// Returns `None` for `null`, arrays and objects.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self(s.clone())),
            Value::Number(n) => Some(Self(n.to_string())),
            Value::Bool(b) => Some(Self(b.to_string())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Get the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for NodeKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&NodeKey> for NodeKey {
    fn from(key: &NodeKey) -> Self {
        key.clone()
    }
}

/// Keys of nodes without an identity field are their handle's sequence number.
impl From<NodeId> for NodeKey {
    fn from(id: NodeId) -> Self {
        Self(id.0.to_string())
    }
}

macro_rules! key_from_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for NodeKey {
                fn from(key: $ty) -> Self {
                    Self(key.to_string())
                }
            }

            impl From<$ty> for NodeRef {
                fn from(key: $ty) -> Self {
                    Self::Key(NodeKey::from(key))
                }
            }
        )*
    };
}

key_from_integer!(i32, i64, u32, u64, usize);

/// A way of naming a node: by handle, by key, or by its record.
///
/// Records resolve through the configured key field. Without a key field a
/// record resolves to the first node, in display order, holding an equal
/// record.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeRef {
    /// A node handle.
    Id(NodeId),
    /// A node key.
    Key(NodeKey),
    /// A record as supplied by the host.
    Record(Value),
}

impl From<NodeId> for NodeRef {
    fn from(id: NodeId) -> Self {
        Self::Id(id)
    }
}

impl From<&NodeId> for NodeRef {
    fn from(id: &NodeId) -> Self {
        Self::Id(*id)
    }
}

impl From<NodeKey> for NodeRef {
    fn from(key: NodeKey) -> Self {
        Self::Key(key)
    }
}

impl From<&NodeKey> for NodeRef {
    fn from(key: &NodeKey) -> Self {
        Self::Key(key.clone())
    }
}

impl From<&str> for NodeRef {
    fn from(key: &str) -> Self {
        Self::Key(NodeKey::from(key))
    }
}

impl From<String> for NodeRef {
    fn from(key: String) -> Self {
        Self::Key(NodeKey::from(key))
    }
}

/// Primitive values are treated as keys, everything else as a record.
impl From<Value> for NodeRef {
    fn from(value: Value) -> Self {
        match NodeKey::from_value(&value) {
            Some(key) => Self::Key(key),
            None => Self::Record(value),
        }
    }
}

impl From<&Value> for NodeRef {
    fn from(value: &Value) -> Self {
        Self::from(value.clone())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_key_from_value() {
        assert_eq!(NodeKey::from_value(&json!("a")), Some(NodeKey::from("a")));
        assert_eq!(NodeKey::from_value(&json!(12)), Some(NodeKey::from(12)));
        assert_eq!(NodeKey::from_value(&json!(true)), Some(NodeKey::from("true")));
        assert_eq!(NodeKey::from_value(&json!(null)), None);
        assert_eq!(NodeKey::from_value(&json!({"id": 1})), None);
    }

    #[test]
    fn test_numeric_and_string_keys_match() {
        assert_eq!(NodeKey::from(1u64), NodeKey::from("1"));
    }

    #[test]
    fn test_node_ref_from_value() {
        assert_eq!(NodeRef::from(json!(3)), NodeRef::Key(NodeKey::from(3)));
        assert_eq!(
            NodeRef::from(json!({"id": 3})),
            NodeRef::Record(json!({"id": 3}))
        );
    }
}
