//! Commit log records and their framing.

use crate::error::{CoreError, CoreResult};
use crate::object::{Cell, ObjectKey};
use crate::schema::EntitySchema;
use serde::{Deserialize, Serialize};

/// Magic bytes opening every record.
pub(crate) const LOG_MAGIC: [u8; 4] = *b"OLOG";

/// Current record format version.
pub(crate) const LOG_VERSION: u16 = 1;

/// magic (4) + version (2) + length (4)
pub(crate) const HEADER_SIZE: usize = 10;

pub(crate) const CRC_SIZE: usize = 4;

/// A record in the commit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) enum LogRecord {
    /// First record: the schema the store was created with.
    Header { schema: Vec<EntitySchema> },
    /// One committed write transaction.
    Commit(CommitRecord),
}

/// The effects of one committed write transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct CommitRecord {
    pub(crate) sequence: u64,
    /// Per-type key counters after the commit.
    pub(crate) next_keys: Vec<u64>,
    pub(crate) ops: Vec<LogOp>,
}

/// A single row change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum LogOp {
    /// Full image of a created or modified object.
    Put { object: ObjectKey, cells: Vec<Cell> },
    /// A deleted object.
    Remove { object: ObjectKey },
}

impl LogRecord {
    /// Encodes the record with its envelope.
    pub(crate) fn encode_frame(&self) -> CoreResult<Vec<u8>> {
        let mut payload = Vec::new();
        ciborium::ser::into_writer(self, &mut payload)
            .map_err(|e| CoreError::log_corruption(format!("cannot encode record: {e}")))?;
        let len = u32::try_from(payload.len())
            .map_err(|_| CoreError::log_corruption("record payload exceeds 4 GiB"))?;

        let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
        frame.extend_from_slice(&LOG_MAGIC);
        frame.extend_from_slice(&LOG_VERSION.to_le_bytes());
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&payload);
        let crc = compute_crc32(&frame);
        frame.extend_from_slice(&crc.to_le_bytes());
        Ok(frame)
    }

    /// Decodes a record payload (the bytes between header and CRC).
    pub(crate) fn decode_payload(payload: &[u8]) -> CoreResult<Self> {
        ciborium::de::from_reader(payload)
            .map_err(|e| CoreError::log_corruption(format!("cannot decode record: {e}")))
    }
}

/// CRC32 (IEEE polynomial) over `data`.
pub(crate) fn compute_crc32(data: &[u8]) -> u32 {
    const TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                crc = if crc & 1 != 0 {
                    (crc >> 1) ^ 0xEDB8_8320
                } else {
                    crc >> 1
                };
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        crc = (crc >> 8) ^ TABLE[((crc ^ u32::from(byte)) & 0xFF) as usize];
    }
    !crc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeId;

    #[test]
    fn crc32_known_value() {
        assert_eq!(compute_crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn frame_layout() {
        let record = LogRecord::Commit(CommitRecord {
            sequence: 3,
            next_keys: vec![2],
            ops: vec![LogOp::Remove {
                object: ObjectKey::new(TypeId::new(0), 1),
            }],
        });
        let frame = record.encode_frame().unwrap();

        assert_eq!(&frame[..4], b"OLOG");
        let len = u32::from_le_bytes(frame[6..10].try_into().unwrap()) as usize;
        assert_eq!(frame.len(), HEADER_SIZE + len + CRC_SIZE);

        let decoded = LogRecord::decode_payload(&frame[HEADER_SIZE..HEADER_SIZE + len]).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn garbage_payload_is_corruption() {
        let err = LogRecord::decode_payload(&[0xFF, 0x00, 0x13]).unwrap_err();
        assert!(matches!(err, CoreError::LogCorruption { .. }));
    }
}
