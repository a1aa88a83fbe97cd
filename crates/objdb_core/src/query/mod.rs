//! Query engine.
//!
//! A query selects live objects of one entity type by a predicate tree.
//! Leaves compare one field, optionally reached through one reference hop:
//!
//! - `"age"`: a field of the queried type
//! - `"dog.name"`: a field of the object a single reference points to; a
//!   null reference makes the leaf false
//! - `"cats.name"`: a field of the objects in a collection; the leaf holds if
//!   any element satisfies it
//!
//! Chained conditions are ANDed. `or()` starts a new alternative inside the
//! current group and `begin_group`/`end_group` control precedence, so
//! `a.b.or().c` reads as `(a AND b) OR c`.

mod builder;
mod path;
mod predicate;

pub use builder::Query;
