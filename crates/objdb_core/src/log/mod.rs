//! Commit log for durability and recovery.
//!
//! Every committed write transaction appends one record holding the row
//! images it produced. Rolled-back transactions write nothing, so replaying
//! the log front to back rebuilds the last committed state.
//!
//! ## Record Format
//!
//! ```text
//! | magic "OLOG" (4) | version (2) | length (4) | CBOR payload (N) | crc32 (4) |
//! ```
//!
//! The first record of a log is a header carrying the schema the store was
//! created with.
//!
//! ## Recovery Policy
//!
//! - A truncated trailing record is a crash mid-append: it is cut off and
//!   recovery continues with the records before it.
//! - A CRC mismatch, bad magic, unknown version or undecodable payload is
//!   corruption and the store refuses to open.

mod record;
mod writer;

pub(crate) use record::{CommitRecord, LogOp, LogRecord};
pub(crate) use writer::CommitLog;
