//! # ObjDB Storage
//!
//! Byte-level storage for the ObjDB commit log.
//!
//! Backends are **opaque append-only byte stores**: they know nothing about
//! commit records, schemas or objects. `objdb_core` owns every byte format.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - ephemeral stores and tests; clones share one buffer
//! - [`FileBackend`] - a single file on disk
//!
//! ## Example
//!
//! ```rust
//! use objdb_storage::{InMemoryBackend, StorageBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"commit").unwrap();
//! assert_eq!(backend.read_at(offset, 6).unwrap(), b"commit");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
