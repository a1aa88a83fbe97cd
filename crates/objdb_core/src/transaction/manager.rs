//! Transaction manager.

use crate::error::{CoreError, CoreResult};
use crate::log::{CommitLog, CommitRecord, LogOp, LogRecord};
use crate::object::StoreState;
use crate::schema::Schema;
use crate::transaction::slot::WriterSlot;
use crate::transaction::state::WriteState;
use crate::types::{HandleId, SequenceNumber};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Coordinates the writer slot, the committed version and the commit log.
///
/// ## Single-Writer Guarantee
///
/// Only one write transaction exists at a time. `begin_write` takes the
/// writer slot for a handle and hands back a private copy of the committed
/// tables; `commit` logs the changes and swaps the copy in, `rollback`
/// discards it. Either way the slot is released.
///
/// ## Snapshots
///
/// Readers clone the `Arc` of the committed version and keep reading it
/// no matter what commits happen afterwards.
///
/// ## Key Allocation
///
/// Per-type key counters are kept outside the committed version and only
/// ever move forward, so a key handed out by a rolled-back transaction is
/// never allocated again.
pub(crate) struct TransactionManager {
    schema: Arc<Schema>,
    log: CommitLog,
    committed: RwLock<Arc<StoreState>>,
    committed_seq: AtomicU64,
    allocated: Mutex<Vec<u64>>,
    slot: WriterSlot,
}

impl TransactionManager {
    /// Rebuilds the committed version from the log.
    ///
    /// An empty log is stamped with a header describing `schema`. A log
    /// written under a different schema is refused.
    pub(crate) fn recover(schema: Arc<Schema>, log: CommitLog) -> CoreResult<Self> {
        let records = log.recover()?;
        let mut state = StoreState::new(&schema);
        let mut sequence = 0u64;

        let mut records = records.into_iter();
        match records.next() {
            None => {
                log.append(&LogRecord::Header {
                    schema: schema.declarations(),
                })?;
                debug!("initialized empty commit log");
            }
            Some(LogRecord::Header { schema: persisted }) => {
                if persisted != schema.declarations() {
                    return Err(CoreError::schema(
                        "schema does not match the one the store was created with",
                    ));
                }
            }
            Some(LogRecord::Commit(_)) => {
                return Err(CoreError::log_corruption(
                    "commit log does not start with a header",
                ));
            }
        }

        let mut replayed = 0usize;
        for record in records {
            let LogRecord::Commit(commit) = record else {
                return Err(CoreError::log_corruption("unexpected header record"));
            };
            if commit.sequence != sequence + 1 {
                return Err(CoreError::log_corruption(format!(
                    "expected commit {} but found {}",
                    sequence + 1,
                    commit.sequence
                )));
            }
            state.apply(&schema, &commit)?;
            sequence = commit.sequence;
            replayed += 1;
        }

        if replayed > 0 {
            info!(commits = replayed, sequence, "recovered store from commit log");
        }

        let allocated = state.next_keys();
        Ok(Self {
            schema,
            log,
            committed: RwLock::new(Arc::new(state)),
            committed_seq: AtomicU64::new(sequence),
            allocated: Mutex::new(allocated),
            slot: WriterSlot::default(),
        })
    }

    /// Returns the latest committed version.
    pub(crate) fn snapshot(&self) -> Arc<StoreState> {
        Arc::clone(&self.committed.read())
    }

    pub(crate) fn committed_seq(&self) -> SequenceNumber {
        SequenceNumber::new(self.committed_seq.load(Ordering::SeqCst))
    }

    /// Handle currently holding the writer slot.
    pub(crate) fn writer(&self) -> Option<HandleId> {
        self.slot.holder()
    }

    pub(crate) fn log_size(&self) -> CoreResult<u64> {
        self.log.size()
    }

    /// Takes the writer slot for `handle` and returns a working copy.
    pub(crate) fn begin_write(
        &self,
        handle: HandleId,
        timeout: Option<Duration>,
    ) -> CoreResult<WriteState> {
        self.slot.acquire(handle, timeout)?;
        let mut working = StoreState::clone(&self.snapshot());
        working.reserve_keys(&self.allocated.lock());
        debug!(%handle, "write transaction started");
        Ok(WriteState::new(working))
    }

    /// Logs and publishes the working copy, then frees the slot.
    ///
    /// If the log append fails nothing is published and the transaction is
    /// rolled back.
    pub(crate) fn commit(&self, handle: HandleId, write: WriteState) -> CoreResult<SequenceNumber> {
        self.retire_keys(&write.working);
        let result = self.publish(write);
        self.slot.release(handle);
        match &result {
            Ok(sequence) => debug!(%handle, %sequence, "write transaction committed"),
            Err(error) => debug!(%handle, %error, "commit failed, transaction rolled back"),
        }
        result
    }

    fn publish(&self, write: WriteState) -> CoreResult<SequenceNumber> {
        if write.is_empty() {
            return Ok(self.committed_seq());
        }

        let sequence = self.committed_seq().next();
        let mut ops = Vec::new();
        for object in write.touched() {
            if let Some(cells) = write.working.row(object) {
                ops.push(LogOp::Put {
                    object,
                    cells: cells.clone(),
                });
            }
        }
        ops.extend(write.removed().map(|object| LogOp::Remove { object }));

        self.log.append(&LogRecord::Commit(CommitRecord {
            sequence: sequence.as_u64(),
            next_keys: write.working.next_keys(),
            ops,
        }))?;

        *self.committed.write() = Arc::new(write.working);
        self.committed_seq
            .store(sequence.as_u64(), Ordering::SeqCst);
        Ok(sequence)
    }

    /// Discards the working copy and frees the slot.
    pub(crate) fn rollback(&self, handle: HandleId, write: WriteState) {
        self.retire_keys(&write.working);
        drop(write);
        self.slot.release(handle);
        debug!(%handle, "write transaction rolled back");
    }

    /// Advances the allocation counters past every key `working` handed out.
    fn retire_keys(&self, working: &StoreState) {
        let mut allocated = self.allocated.lock();
        for (current, used) in allocated.iter_mut().zip(working.next_keys()) {
            *current = (*current).max(used);
        }
    }

    pub(crate) fn schema(&self) -> &Schema {
        &self.schema
    }
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("committed_seq", &self.committed_seq())
            .field("writer", &self.writer())
            .field("log", &self.log)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Cell;
    use crate::schema::{EntitySchema, FieldDef};
    use crate::types::TypeId;
    use objdb_storage::InMemoryBackend;

    fn schema() -> Arc<Schema> {
        Arc::new(
            Schema::from_entities([EntitySchema::new("Cat")
                .field(FieldDef::text("name"))
                .field(FieldDef::int("age"))])
            .unwrap(),
        )
    }

    fn manager(backend: &InMemoryBackend) -> TransactionManager {
        TransactionManager::recover(schema(), CommitLog::new(Box::new(backend.clone()), false))
            .unwrap()
    }

    #[test]
    fn commit_publishes_and_logs() {
        let backend = InMemoryBackend::new();
        let tm = manager(&backend);
        let before = tm.snapshot();

        let mut write = tm.begin_write(HandleId(1), None).unwrap();
        let cat = write.working.create(tm.schema(), TypeId::new(0));
        write.touch(cat);
        let seq = tm.commit(HandleId(1), write).unwrap();

        assert_eq!(seq, SequenceNumber::new(1));
        assert_eq!(tm.committed_seq(), seq);
        assert!(tm.snapshot().contains(cat));
        assert!(!before.contains(cat));
        assert_eq!(tm.writer(), None);

        let reopened = manager(&backend);
        assert_eq!(reopened.committed_seq(), seq);
        assert_eq!(
            reopened.snapshot().row(cat).unwrap(),
            &vec![Cell::Text(String::new()), Cell::Int(0)]
        );
    }

    #[test]
    fn rollback_discards_changes() {
        let backend = InMemoryBackend::new();
        let tm = manager(&backend);
        let log_before = tm.log_size().unwrap();

        let mut write = tm.begin_write(HandleId(1), None).unwrap();
        let cat = write.working.create(tm.schema(), TypeId::new(0));
        write.touch(cat);
        tm.rollback(HandleId(1), write);

        assert!(!tm.snapshot().contains(cat));
        assert_eq!(tm.committed_seq(), SequenceNumber::new(0));
        assert_eq!(tm.log_size().unwrap(), log_before);
        assert_eq!(tm.writer(), None);
    }

    #[test]
    fn keys_are_not_reused_after_reopen() {
        let backend = InMemoryBackend::new();
        let tm = manager(&backend);

        let mut write = tm.begin_write(HandleId(1), None).unwrap();
        let cat = write.working.create(tm.schema(), TypeId::new(0));
        write.touch(cat);
        tm.commit(HandleId(1), write).unwrap();

        let mut write = tm.begin_write(HandleId(1), None).unwrap();
        write.working.remove(tm.schema(), cat);
        write.remove(cat);
        tm.commit(HandleId(1), write).unwrap();

        let reopened = manager(&backend);
        let mut write = reopened.begin_write(HandleId(2), None).unwrap();
        let next = write.working.create(reopened.schema(), TypeId::new(0));
        assert_ne!(next, cat);
        reopened.rollback(HandleId(2), write);
    }

    #[test]
    fn rolled_back_keys_are_not_reallocated() {
        let backend = InMemoryBackend::new();
        let tm = manager(&backend);

        let mut write = tm.begin_write(HandleId(1), None).unwrap();
        let ghost = write.working.create(tm.schema(), TypeId::new(0));
        write.touch(ghost);
        tm.rollback(HandleId(1), write);

        let mut write = tm.begin_write(HandleId(1), None).unwrap();
        let real = write.working.create(tm.schema(), TypeId::new(0));
        write.touch(real);
        tm.commit(HandleId(1), write).unwrap();

        assert_ne!(real, ghost);
        assert!(!tm.snapshot().contains(ghost));
        assert!(tm.snapshot().contains(real));
    }

    #[test]
    fn empty_commit_still_retires_keys() {
        let backend = InMemoryBackend::new();
        let tm = manager(&backend);

        let mut write = tm.begin_write(HandleId(1), None).unwrap();
        let temp = write.working.create(tm.schema(), TypeId::new(0));
        write.working.remove(tm.schema(), temp);
        tm.commit(HandleId(1), write).unwrap();

        let mut write = tm.begin_write(HandleId(1), None).unwrap();
        let next = write.working.create(tm.schema(), TypeId::new(0));
        assert_ne!(next, temp);
        tm.rollback(HandleId(1), write);
    }

    #[test]
    fn schema_mismatch_on_reopen() {
        let backend = InMemoryBackend::new();
        drop(manager(&backend));

        let other = Arc::new(
            Schema::from_entities([EntitySchema::new("Dog").field(FieldDef::text("name"))])
                .unwrap(),
        );
        let err = TransactionManager::recover(other, CommitLog::new(Box::new(backend), false))
            .unwrap_err();
        assert!(matches!(err, CoreError::Schema { .. }));
    }
}
