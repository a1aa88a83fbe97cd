//! Field and entity declarations.

use crate::types::TypeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared kind of a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    /// Signed 64-bit integer.
    Int,
    /// UTF-8 string.
    Text,
    /// Nullable reference to one object of the target type.
    Link {
        /// Target entity type name.
        target: String,
    },
    /// Ordered list of references to objects of the target type.
    List {
        /// Target entity type name.
        target: String,
    },
}

impl FieldKind {
    /// Returns the referenced entity name for link and list fields.
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::Link { target } | Self::List { target } => Some(target),
            Self::Int | Self::Text => None,
        }
    }
}

/// A field declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    name: String,
    kind: FieldKind,
    identifier: bool,
}

impl FieldDef {
    /// Declares an integer field.
    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Int)
    }

    /// Declares a string field.
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text)
    }

    /// Declares a single, nullable reference to `target`.
    pub fn link(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(
            name,
            FieldKind::Link {
                target: target.into(),
            },
        )
    }

    /// Declares an ordered collection of references to `target`.
    pub fn list(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(
            name,
            FieldKind::List {
                target: target.into(),
            },
        )
    }

    fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            identifier: false,
        }
    }

    /// Marks this field as the entity's stable identifier.
    ///
    /// The store does not enforce uniqueness of identifier values.
    #[must_use]
    pub fn identifier(mut self) -> Self {
        self.identifier = true;
        self
    }

    /// Returns the field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared kind.
    #[must_use]
    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// Returns true if this field is the entity's identifier.
    #[must_use]
    pub fn is_identifier(&self) -> bool {
        self.identifier
    }
}

/// Declaration of one entity type: a name and an ordered field list.
///
/// ```rust
/// use objdb_core::{EntitySchema, FieldDef};
///
/// let person = EntitySchema::new("Person")
///     .field(FieldDef::int("id").identifier())
///     .field(FieldDef::text("name"))
///     .field(FieldDef::link("dog", "Dog"))
///     .field(FieldDef::list("cats", "Cat"));
/// assert_eq!(person.fields().len(), 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySchema {
    name: String,
    fields: Vec<FieldDef>,
}

impl EntitySchema {
    /// Starts a declaration for the entity `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Appends a field.
    #[must_use]
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Returns the entity name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Returns the position of the field called `name`.
    #[must_use]
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Returns the identifier field, if one is marked.
    #[must_use]
    pub fn identifier(&self) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.identifier)
    }
}

/// A field type with reference targets resolved to type IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Integer.
    Int,
    /// String.
    Text,
    /// Single nullable reference.
    Link(TypeId),
    /// Ordered collection of references.
    List(TypeId),
}

impl FieldType {
    /// Human-readable kind name used in error messages.
    #[must_use]
    pub fn describe(self) -> &'static str {
        match self {
            Self::Int => "integer",
            Self::Text => "text",
            Self::Link(_) => "link",
            Self::List(_) => "list",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// A field descriptor validated against the schema.
///
/// Resolve once with [`Schema::resolve_field`](crate::Schema::resolve_field)
/// and reuse it for repeated reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRef {
    pub(crate) type_id: TypeId,
    pub(crate) index: usize,
    pub(crate) field_type: FieldType,
}

impl FieldRef {
    /// Entity type owning the field.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Position of the field in its entity.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Resolved field type.
    #[must_use]
    pub fn field_type(&self) -> FieldType {
        self.field_type
    }
}
