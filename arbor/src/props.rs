//! Field accessors that read labels, children and flags out of records.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::node::Node;

/// Function form of a field accessor.
pub type AccessorFn<T> = Arc<dyn Fn(&Value, &Node) -> T + Send + Sync>;

/// Reads one value out of a record, either from a named field or through a
/// derivation function.
pub enum FieldAccessor<T> {
    /// Read the named field of the record.
    Name(String),
    /// Derive the value from the record and its node.
    Fn(AccessorFn<T>),
}

impl<T> FieldAccessor<T> {
    /// Create an accessor for a named field.
    pub fn name(field: impl Into<String>) -> Self {
        Self::Name(field.into())
    }

    /// Create an accessor from a function.
    pub fn func(f: impl Fn(&Value, &Node) -> T + Send + Sync + 'static) -> Self {
        Self::Fn(Arc::new(f))
    }

    /// Get the field name, if this accessor reads a named field.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Name(field) => Some(field),
            Self::Fn(_) => None,
        }
    }
}

impl<T> Clone for FieldAccessor<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Name(field) => Self::Name(field.clone()),
            Self::Fn(f) => Self::Fn(Arc::clone(f)),
        }
    }
}

impl<T> fmt::Debug for FieldAccessor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(field) => f.debug_tuple("Name").field(field).finish(),
            Self::Fn(_) => f.write_str("Fn(..)"),
        }
    }
}

impl<T> From<&str> for FieldAccessor<T> {
    fn from(field: &str) -> Self {
        Self::Name(field.to_string())
    }
}

impl<T> From<String> for FieldAccessor<T> {
    fn from(field: String) -> Self {
        Self::Name(field)
    }
}

/// Accessors for the record fields the tree reads.
#[derive(Debug, Clone)]
pub struct Props {
    /// Display label. Default: the `label` field.
    pub label: FieldAccessor<String>,
    /// Child records. Default: the `children` field.
    pub children: FieldAccessor<Vec<Value>>,
    /// Leaf hint for lazy trees. Default: none.
    pub is_leaf: Option<FieldAccessor<bool>>,
    /// Disabled flag. Default: the `disabled` field.
    pub disabled: FieldAccessor<bool>,
}

impl Default for Props {
    fn default() -> Self {
        Self {
            label: FieldAccessor::name("label"),
            children: FieldAccessor::name("children"),
            is_leaf: None,
            disabled: FieldAccessor::name("disabled"),
        }
    }
}

impl Props {
    /// Creates props with the default field names.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the label accessor.
    pub fn with_label(mut self, label: impl Into<FieldAccessor<String>>) -> Self {
        self.label = label.into();
        self
    }

    /// Sets the children accessor.
    pub fn with_children(mut self, children: impl Into<FieldAccessor<Vec<Value>>>) -> Self {
        self.children = children.into();
        self
    }

    /// Sets the leaf hint accessor.
    pub fn with_is_leaf(mut self, is_leaf: impl Into<FieldAccessor<bool>>) -> Self {
        self.is_leaf = Some(is_leaf.into());
        self
    }

    /// Sets the disabled accessor.
    pub fn with_disabled(mut self, disabled: impl Into<FieldAccessor<bool>>) -> Self {
        self.disabled = disabled.into();
        self
    }

    pub(crate) fn label(&self, data: &Value, node: &Node) -> String {
        match &self.label {
            FieldAccessor::Name(field) => match data.get(field) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                Some(Value::Bool(b)) => b.to_string(),
                _ => String::new(),
            },
            FieldAccessor::Fn(f) => f(data, node),
        }
    }

    /// Only a boolean result counts as a hint.
    pub(crate) fn is_leaf(&self, data: &Value, node: &Node) -> Option<bool> {
        match self.is_leaf.as_ref()? {
            FieldAccessor::Name(field) => data.get(field).and_then(Value::as_bool),
            FieldAccessor::Fn(f) => Some(f(data, node)),
        }
    }

    pub(crate) fn disabled(&self, data: &Value, node: &Node) -> bool {
        match &self.disabled {
            FieldAccessor::Name(field) => data.get(field).and_then(Value::as_bool).unwrap_or(false),
            FieldAccessor::Fn(f) => f(data, node),
        }
    }
}
