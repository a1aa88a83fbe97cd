//! Object identities and the in-memory tables that hold live objects.

mod id;
mod row;
mod state;
mod table;

pub use id::ObjectId;
pub(crate) use id::ObjectKey;
pub(crate) use row::Cell;
pub(crate) use state::StoreState;
pub(crate) use table::Table;
