//! Stored field cells.

use crate::schema::FieldType;
use serde::{Deserialize, Serialize};

/// One stored field value.
///
/// References hold only the target key; the target type comes from the
/// schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum Cell {
    Int(i64),
    Text(String),
    Link(Option<u64>),
    List(Vec<u64>),
}

impl Cell {
    /// Zero value for a freshly created object.
    pub(crate) fn default_for(field_type: FieldType) -> Self {
        match field_type {
            FieldType::Int => Self::Int(0),
            FieldType::Text => Self::Text(String::new()),
            FieldType::Link(_) => Self::Link(None),
            FieldType::List(_) => Self::List(Vec::new()),
        }
    }

    /// Returns true if this cell has the shape `field_type` expects.
    pub(crate) fn matches(&self, field_type: FieldType) -> bool {
        matches!(
            (self, field_type),
            (Self::Int(_), FieldType::Int)
                | (Self::Text(_), FieldType::Text)
                | (Self::Link(_), FieldType::Link(_))
                | (Self::List(_), FieldType::List(_))
        )
    }
}
