//! Commit log writer and recovery reader.

use crate::error::{CoreError, CoreResult};
use crate::log::record::{
    compute_crc32, LogRecord, CRC_SIZE, HEADER_SIZE, LOG_MAGIC, LOG_VERSION,
};
use objdb_storage::StorageBackend;
use parking_lot::Mutex;
use tracing::warn;

/// Append-only commit log over a storage backend.
pub(crate) struct CommitLog {
    backend: Mutex<Box<dyn StorageBackend>>,
    sync_on_commit: bool,
}

impl CommitLog {
    pub(crate) fn new(backend: Box<dyn StorageBackend>, sync_on_commit: bool) -> Self {
        Self {
            backend: Mutex::new(backend),
            sync_on_commit,
        }
    }

    /// Appends a record and makes it durable according to the sync policy.
    ///
    /// Returns the offset of the record.
    pub(crate) fn append(&self, record: &LogRecord) -> CoreResult<u64> {
        let frame = record.encode_frame()?;
        let mut backend = self.backend.lock();
        let offset = backend.append(&frame)?;
        if self.sync_on_commit {
            backend.sync()?;
        } else {
            backend.flush()?;
        }
        Ok(offset)
    }

    /// Size of the log in bytes.
    pub(crate) fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.lock().size()?)
    }

    /// Reads every complete record, cutting off a torn tail.
    pub(crate) fn recover(&self) -> CoreResult<Vec<LogRecord>> {
        let mut backend = self.backend.lock();
        let size = backend.size()?;
        let mut offset = 0u64;
        let mut records = Vec::new();

        while offset < size {
            if size - offset < HEADER_SIZE as u64 {
                break;
            }
            let header = backend.read_at(offset, HEADER_SIZE)?;
            if header[..4] != LOG_MAGIC {
                return Err(CoreError::log_corruption(format!(
                    "bad magic at offset {offset}"
                )));
            }
            let version = u16::from_le_bytes([header[4], header[5]]);
            if version != LOG_VERSION {
                return Err(CoreError::log_corruption(format!(
                    "unsupported record version {version} at offset {offset}"
                )));
            }
            let len = u32::from_le_bytes([header[6], header[7], header[8], header[9]]) as usize;

            let total = HEADER_SIZE + len + CRC_SIZE;
            if size - offset < total as u64 {
                break;
            }
            let frame = backend.read_at(offset, total)?;
            let (body, crc_bytes) = frame.split_at(HEADER_SIZE + len);
            let expected = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
            let actual = compute_crc32(body);
            if expected != actual {
                return Err(CoreError::ChecksumMismatch {
                    offset,
                    expected,
                    actual,
                });
            }

            records.push(LogRecord::decode_payload(&body[HEADER_SIZE..])?);
            offset += total as u64;
        }

        if offset < size {
            warn!(
                offset,
                discarded = size - offset,
                "discarding torn record at end of commit log"
            );
            backend.truncate(offset)?;
        }

        Ok(records)
    }
}

impl std::fmt::Debug for CommitLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitLog")
            .field("sync_on_commit", &self.sync_on_commit)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::{CommitRecord, LogOp};
    use crate::object::{Cell, ObjectKey};
    use crate::types::TypeId;
    use objdb_storage::InMemoryBackend;

    fn commit(seq: u64) -> LogRecord {
        LogRecord::Commit(CommitRecord {
            sequence: seq,
            next_keys: vec![seq],
            ops: vec![LogOp::Put {
                object: ObjectKey::new(TypeId::new(0), seq),
                cells: vec![Cell::Text(format!("row {seq}"))],
            }],
        })
    }

    #[test]
    fn append_and_recover() {
        let log = CommitLog::new(Box::new(InMemoryBackend::new()), false);
        log.append(&commit(1)).unwrap();
        log.append(&commit(2)).unwrap();

        assert_eq!(log.recover().unwrap(), vec![commit(1), commit(2)]);
    }

    #[test]
    fn torn_tail_is_truncated() {
        let backend = InMemoryBackend::new();
        let log = CommitLog::new(Box::new(backend.clone()), false);
        log.append(&commit(1)).unwrap();
        let good = log.size().unwrap();
        let second = commit(2).encode_frame().unwrap();
        let mut raw = backend.clone();
        raw.append(&second[..second.len() - 3]).unwrap();

        assert_eq!(log.recover().unwrap(), vec![commit(1)]);
        assert_eq!(backend.data().len() as u64, good);
    }

    #[test]
    fn checksum_mismatch_is_fatal() {
        let backend = InMemoryBackend::new();
        let log = CommitLog::new(Box::new(backend.clone()), true);
        log.append(&commit(1)).unwrap();
        backend.corrupt_byte(HEADER_SIZE + 1);

        assert!(matches!(
            log.recover(),
            Err(CoreError::ChecksumMismatch { offset: 0, .. })
        ));
    }

    #[test]
    fn bad_magic_is_fatal() {
        let backend = InMemoryBackend::with_data(b"NOPE0000000000000000".to_vec());
        let log = CommitLog::new(Box::new(backend), false);
        assert!(matches!(
            log.recover(),
            Err(CoreError::LogCorruption { .. })
        ));
    }
}
