//! The store entry point.

use crate::config::Config;
use crate::dir::StoreDir;
use crate::error::CoreResult;
use crate::handle::Handle;
use crate::log::CommitLog;
use crate::schema::Schema;
use crate::transaction::TransactionManager;
use crate::types::{HandleId, SequenceNumber};
use objdb_storage::{FileBackend, InMemoryBackend, StorageBackend};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

/// An open object store.
///
/// `Store` is cheap to clone and can be shared across threads. Each thread
/// works through its own [`Handle`] obtained with [`Store::handle`].
///
/// The directory lock and the committed data live as long as any clone or
/// handle does.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    config: Config,
    transactions: TransactionManager,
    dir: Option<StoreDir>,
    next_handle: AtomicU64,
}

impl Store {
    /// Opens the store in directory `path` with default configuration.
    ///
    /// # Errors
    ///
    /// - `StoreLocked` if another process has the directory open
    /// - `Schema` if the store was created with a different schema
    /// - `LogCorruption`/`ChecksumMismatch` if the commit log is damaged
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let store = Store::open(Path::new("people_db"), schema)?;
    /// ```
    pub fn open(path: &Path, schema: Schema) -> CoreResult<Self> {
        Self::open_with_config(path, schema, Config::default())
    }

    /// Opens the store in directory `path` with custom configuration.
    pub fn open_with_config(path: &Path, schema: Schema, config: Config) -> CoreResult<Self> {
        let dir = StoreDir::open(path, config.create_if_missing)?;
        let backend = FileBackend::open(&dir.log_path())?;
        info!(path = %dir.path().display(), "opening store");
        Self::build(schema, config, Box::new(backend), Some(dir))
    }

    /// Opens a store that lives only in memory.
    pub fn open_in_memory(schema: Schema) -> CoreResult<Self> {
        Self::open_with_backend(schema, Config::default(), Box::new(InMemoryBackend::new()))
    }

    /// Opens a store over an arbitrary commit log backend.
    ///
    /// Reopening over a backend that already holds a log recovers its
    /// committed state.
    pub fn open_with_backend(
        schema: Schema,
        config: Config,
        backend: Box<dyn StorageBackend>,
    ) -> CoreResult<Self> {
        Self::build(schema, config, backend, None)
    }

    fn build(
        schema: Schema,
        config: Config,
        backend: Box<dyn StorageBackend>,
        dir: Option<StoreDir>,
    ) -> CoreResult<Self> {
        let log = CommitLog::new(backend, config.sync_on_commit);
        let transactions = TransactionManager::recover(Arc::new(schema), log)?;
        info!(
            types = transactions.schema().len(),
            sequence = transactions.committed_seq().as_u64(),
            "store open"
        );
        Ok(Self {
            inner: Arc::new(StoreInner {
                config,
                transactions,
                dir,
                next_handle: AtomicU64::new(1),
            }),
        })
    }

    /// Opens a new handle for the calling thread.
    #[must_use]
    pub fn handle(&self) -> Handle {
        let id = HandleId(self.inner.next_handle.fetch_add(1, Ordering::SeqCst));
        Handle::new(self.clone(), id)
    }

    /// Returns the schema the store was opened with.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        self.inner.transactions.schema()
    }

    /// Returns the store configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Returns the directory of a persistent store.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.inner.dir.as_ref().map(StoreDir::path)
    }

    /// Sequence number of the last committed write transaction.
    #[must_use]
    pub fn committed_seq(&self) -> SequenceNumber {
        self.inner.transactions.committed_seq()
    }

    /// Returns true while some handle has a write transaction open.
    #[must_use]
    pub fn is_write_active(&self) -> bool {
        self.inner.transactions.writer().is_some()
    }

    /// Summarizes the committed state.
    pub fn stats(&self) -> CoreResult<StoreStats> {
        let snapshot = self.inner.transactions.snapshot();
        let objects = self
            .schema()
            .entities()
            .map(|(type_id, entity)| (entity.name().to_string(), snapshot.table(type_id).len()))
            .collect();
        Ok(StoreStats {
            committed_seq: self.committed_seq(),
            log_bytes: self.inner.transactions.log_size()?,
            objects,
        })
    }

    pub(crate) fn transactions(&self) -> &TransactionManager {
        &self.inner.transactions
    }
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        info!(
            sequence = self.transactions.committed_seq().as_u64(),
            "store closed"
        );
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.path())
            .field("config", &self.inner.config)
            .field("transactions", &self.inner.transactions)
            .finish_non_exhaustive()
    }
}

/// A summary of the committed state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    /// Last committed sequence number.
    pub committed_seq: SequenceNumber,
    /// Size of the commit log in bytes.
    pub log_bytes: u64,
    /// Live object count per entity type, in registration order.
    pub objects: Vec<(String, usize)>,
}
