//! Field values and query options.

use crate::object::ObjectId;
use std::fmt;

/// A field value as seen through a handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// An empty single reference.
    Null,
    /// Integer value.
    Int(i64),
    /// String value.
    Text(String),
    /// A single reference.
    Link(ObjectId),
    /// An ordered collection of references.
    List(Vec<ObjectId>),
}

impl Value {
    /// Kind name used in error messages.
    #[must_use]
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Int(_) => "integer",
            Self::Text(_) => "text",
            Self::Link(_) => "link",
            Self::List(_) => "list",
        }
    }

    /// Returns true for [`Value::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the integer, if this is one.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the string, if this is one.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the referenced object; `None` for null or non-link values.
    #[must_use]
    pub fn as_link(&self) -> Option<ObjectId> {
        match self {
            Self::Link(id) => Some(*id),
            _ => None,
        }
    }

    /// Returns the referenced objects, if this is a collection.
    #[must_use]
    pub fn as_list(&self) -> Option<&[ObjectId]> {
        match self {
            Self::List(ids) => Some(ids),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Link(id) => write!(f, "{id}"),
            Self::List(ids) => {
                f.write_str("[")?;
                for (i, id) in ids.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{id}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Self::Link(id)
    }
}

impl From<Option<ObjectId>> for Value {
    fn from(id: Option<ObjectId>) -> Self {
        id.map_or(Self::Null, Self::Link)
    }
}

impl From<Vec<ObjectId>> for Value {
    fn from(ids: Vec<ObjectId>) -> Self {
        Self::List(ids)
    }
}

/// Case handling for string predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Case {
    /// Exact comparison.
    #[default]
    Sensitive,
    /// Comparison after Unicode lowercasing both sides.
    Insensitive,
}

/// Sort direction for [`Query::find_all_sorted`](crate::Query::find_all_sorted).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sort {
    /// Smallest first; null links sort before any value.
    Ascending,
    /// Largest first; null links sort after any value.
    Descending,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions() {
        assert_eq!(Value::from(34), Value::Int(34));
        assert_eq!(Value::from("fido"), Value::Text("fido".into()));
        assert_eq!(Value::from(None::<ObjectId>), Value::Null);
        assert_eq!(Value::from(7_i64).as_int(), Some(7));
        assert_eq!(Value::Null.as_int(), None);
    }

    #[test]
    fn display() {
        assert_eq!(Value::Text("a b".into()).to_string(), "\"a b\"");
        assert_eq!(Value::Int(-3).to_string(), "-3");
        assert_eq!(Value::List(Vec::new()).to_string(), "[]");
    }
}
