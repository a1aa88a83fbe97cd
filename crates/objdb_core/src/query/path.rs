//! Field path resolution.

use crate::error::{CoreError, CoreResult};
use crate::object::{Cell, ObjectKey, StoreState};
use crate::schema::{FieldRef, FieldType, Schema};
use crate::types::TypeId;

/// The reference field a path traverses before its leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Hop {
    /// Single reference at this field index.
    Link(usize),
    /// Collection at this field index.
    List(usize),
}

/// A dotted field path validated against the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FieldPath {
    pub(crate) hop: Option<Hop>,
    pub(crate) leaf: FieldRef,
    pub(crate) text: String,
}

impl FieldPath {
    /// Resolves `path` against entity `root`. At most one hop is allowed and
    /// it must go through a reference or collection field.
    pub(crate) fn resolve(schema: &Schema, root: TypeId, path: &str) -> CoreResult<Self> {
        let unknown = || CoreError::unknown_field(schema.entity(root).name(), path);
        let mut segments = path.split('.');
        let first = segments.next().ok_or_else(unknown)?;
        let second = segments.next();
        if segments.next().is_some() {
            return Err(unknown());
        }

        let head = schema
            .resolve_field(root, first)
            .map_err(|_| unknown())?;
        let Some(second) = second else {
            return Ok(Self {
                hop: None,
                leaf: head,
                text: path.to_string(),
            });
        };

        let (hop, target) = match head.field_type() {
            FieldType::Link(target) => (Hop::Link(head.index()), target),
            FieldType::List(target) => (Hop::List(head.index()), target),
            FieldType::Int | FieldType::Text => return Err(unknown()),
        };
        let leaf = schema
            .resolve_field(target, second)
            .map_err(|_| unknown())?;
        Ok(Self {
            hop: Some(hop),
            leaf,
            text: path.to_string(),
        })
    }

    /// Cells the leaf reaches from `row`: none for a null reference, one per
    /// element for a collection.
    pub(crate) fn cells<'s>(&self, state: &'s StoreState, row: &'s [Cell]) -> Reached<'s> {
        let target = self.leaf.type_id();
        match self.hop {
            None => Reached::One(Some(&row[self.leaf.index()])),
            Some(Hop::Link(i)) => Reached::One(match &row[i] {
                Cell::Link(Some(key)) => state
                    .row(ObjectKey::new(target, *key))
                    .map(|r| &r[self.leaf.index()]),
                _ => None,
            }),
            Some(Hop::List(i)) => match &row[i] {
                Cell::List(keys) => Reached::Many(
                    keys.iter()
                        .filter_map(|k| state.row(ObjectKey::new(target, *k)))
                        .map(|r| &r[self.leaf.index()])
                        .collect(),
                ),
                _ => Reached::One(None),
            },
        }
    }
}

/// Leaf cells reached by a path.
pub(crate) enum Reached<'s> {
    One(Option<&'s Cell>),
    Many(Vec<&'s Cell>),
}

impl<'s> Reached<'s> {
    /// True if any reached cell satisfies `test`.
    pub(crate) fn any(self, test: impl Fn(&Cell) -> bool) -> bool {
        match self {
            Self::One(cell) => cell.is_some_and(test),
            Self::Many(cells) => cells.into_iter().any(test),
        }
    }
}
