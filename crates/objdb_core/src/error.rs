//! Error types for ObjDB core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors reported by the object store.
///
/// Every error is raised synchronously by the call that broke the contract.
/// Writes that fail inside a scoped write ([`crate::Handle::write`]) are
/// rolled back before the error reaches the caller.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed or conflicting schema, or a schema that does not match the
    /// one a persisted store was created with.
    #[error("schema error: {message}")]
    Schema {
        /// What was wrong with the schema.
        message: String,
    },

    /// A write context was required but missing, a write was nested, or the
    /// writer slot could not be acquired in time.
    #[error("transaction error: {message}")]
    Transaction {
        /// Description of the violation.
        message: String,
    },

    /// A value or operand does not fit the field's type.
    #[error("type mismatch on `{field}`: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Field path the value was applied to.
        field: String,
        /// Expected kind.
        expected: String,
        /// Kind actually supplied.
        actual: String,
    },

    /// A field path does not resolve against the schema.
    #[error("unknown field `{field}` on entity `{entity}`")]
    UnknownField {
        /// Entity type the path was resolved against.
        entity: String,
        /// The offending path.
        field: String,
    },

    /// The object has been deleted.
    #[error("object {object} no longer exists")]
    StaleIdentity {
        /// Display form of the stale identity.
        object: String,
    },

    /// An identity was used through a handle that did not produce it.
    #[error("object {object} belongs to handle {owner}, not handle {caller}")]
    ForeignHandle {
        /// Display form of the identity.
        object: String,
        /// Handle that produced the identity.
        owner: u64,
        /// Handle the identity was used with.
        caller: u64,
    },

    /// A query builder was used out of order (unbalanced groups, dangling `or`).
    #[error("invalid query: {message}")]
    InvalidQuery {
        /// Description of the problem.
        message: String,
    },

    /// Positional access outside a result set or collection field.
    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds {
        /// Requested index.
        index: usize,
        /// Length at the time of access.
        len: usize,
    },

    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] objdb_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The commit log is corrupted or could not be encoded.
    #[error("commit log corruption: {message}")]
    LogCorruption {
        /// Description of the corruption.
        message: String,
    },

    /// Checksum mismatch on a commit log record.
    #[error("checksum mismatch at offset {offset}: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Offset of the damaged record.
        offset: u64,
        /// Checksum stored in the record.
        expected: u32,
        /// Checksum computed from the record bytes.
        actual: u32,
    },

    /// Another process holds the store directory.
    #[error("store locked: another process has exclusive access")]
    StoreLocked,

    /// The handle has been closed.
    #[error("store handle is closed")]
    StoreClosed,
}

impl CoreError {
    /// Creates a schema error.
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    /// Creates a transaction error.
    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction {
            message: message.into(),
        }
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            field: field.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates an unknown field error.
    pub fn unknown_field(entity: impl Into<String>, field: impl Into<String>) -> Self {
        Self::UnknownField {
            entity: entity.into(),
            field: field.into(),
        }
    }

    /// Creates a stale identity error.
    pub fn stale(object: impl std::fmt::Display) -> Self {
        Self::StaleIdentity {
            object: object.to_string(),
        }
    }

    /// Creates an invalid query error.
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery {
            message: message.into(),
        }
    }

    /// Creates a commit log corruption error.
    pub fn log_corruption(message: impl Into<String>) -> Self {
        Self::LogCorruption {
            message: message.into(),
        }
    }

    /// Returns true for errors that signal a missing, nested or timed-out
    /// write transaction.
    #[must_use]
    pub fn is_transaction(&self) -> bool {
        matches!(self, Self::Transaction { .. })
    }
}
