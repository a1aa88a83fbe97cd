//! Transaction management.
//!
//! ObjDB runs at most one write transaction at a time across all handles
//! and threads. Readers never block:
//! - **Atomicity**: a write transaction publishes all of its changes or none
//! - **Isolation**: readers see the last committed version, never a working copy
//! - **Durability**: a commit returns only after its record is in the commit log

mod manager;
mod slot;
mod state;

pub(crate) use manager::TransactionManager;
pub(crate) use state::WriteState;
