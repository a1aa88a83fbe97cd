//! Backend errors.

use std::io;
use thiserror::Error;

/// Result alias used by every backend.
pub type StorageResult<T> = Result<T, StorageError>;

/// Failures of a byte backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The underlying file failed.
    #[error("backend I/O failed: {0}")]
    Io(#[from] io::Error),

    /// A read range reaches past the bytes appended so far.
    #[error("read of {len} bytes at offset {offset} exceeds backend size {size}")]
    ReadPastEnd {
        /// Start of the range.
        offset: u64,
        /// Length of the range.
        len: usize,
        /// Bytes currently stored.
        size: u64,
    },

    /// `truncate` was asked to grow the backend.
    #[error("cannot truncate to {requested} bytes, backend holds {size}")]
    TruncateBeyondEnd {
        /// Requested size.
        requested: u64,
        /// Bytes currently stored.
        size: u64,
    },
}
