//! # ObjDB Core
//!
//! An embedded object store with typed schemas, single-writer transactions
//! and link-aware queries.
//!
//! This crate provides:
//! - A schema registry of entity types with integer, text, single-reference
//!   and collection fields
//! - Object tables with stable identities and reference cleanup on delete
//! - Single-writer/multi-reader transactions over copy-on-write snapshots
//! - A query engine with equality, range and string predicates, grouping,
//!   and one-hop traversal of references and collections
//! - A commit log for durability and crash recovery
//!
//! ## Quick Start
//!
//! ```rust
//! use objdb_core::{EntitySchema, FieldDef, Schema, Sort, Store};
//!
//! # fn main() -> objdb_core::CoreResult<()> {
//! let schema = Schema::from_entities([
//!     EntitySchema::new("Cat").field(FieldDef::text("name")),
//!     EntitySchema::new("Person")
//!         .field(FieldDef::text("name"))
//!         .field(FieldDef::int("age"))
//!         .field(FieldDef::list("cats", "Cat")),
//! ])?;
//! let store = Store::open_in_memory(schema)?;
//! let handle = store.handle();
//!
//! handle.write(|h| {
//!     for (name, age) in [("Ann", 41), ("Bob", 23)] {
//!         let person = h.create("Person")?;
//!         h.set(person, "name", name)?;
//!         h.set(person, "age", age)?;
//!         let cat = h.create("Cat")?;
//!         h.set(cat, "name", format!("{name}'s Tiger"))?;
//!         h.list_push(person, "cats", cat)?;
//!     }
//!     Ok(())
//! })?;
//!
//! let youngest = handle
//!     .query("Person")?
//!     .contains("cats.name", "Tiger")?
//!     .find_all_sorted("age", Sort::Ascending)?;
//! assert_eq!(handle.get_text(youngest.get(0).unwrap(), "name")?, "Bob");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod dir;
mod error;
mod handle;
mod log;
mod object;
mod query;
mod results;
mod schema;
mod store;
mod transaction;
mod types;
mod value;

pub use config::Config;
pub use error::{CoreError, CoreResult};
pub use handle::{Handle, WriteScope};
pub use object::ObjectId;
pub use query::Query;
pub use results::ResultSet;
pub use schema::{EntitySchema, FieldDef, FieldKind, FieldRef, FieldType, Schema};
pub use store::{Store, StoreStats};
pub use types::{HandleId, SequenceNumber, TypeId};
pub use value::{Case, Sort, Value};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
