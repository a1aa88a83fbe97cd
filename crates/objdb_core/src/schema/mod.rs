//! Schema registry.
//!
//! Entity types are declared as [`EntitySchema`]s and registered, leaf-first,
//! into a [`Schema`]. Registration checks the declaration and resolves every
//! reference target to a [`TypeId`](crate::TypeId). A schema is frozen once it
//! is handed to [`Store::open`](crate::Store::open).

mod field;
mod registry;

pub use field::{EntitySchema, FieldDef, FieldKind, FieldRef, FieldType};
pub use registry::Schema;
