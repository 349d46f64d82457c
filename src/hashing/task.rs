use std::path::PathBuf;

use bytes::Bytes;

use crate::metainfo::PieceDigest;
use crate::storage::StorageError;

/// What a piece task carries to the hash workers.
#[derive(Debug, Clone)]
pub enum Payload {
    /// Bytes read from disk.
    Data(Bytes),
    /// Real bytes mixed with placeholder bytes. The digest cannot be trusted.
    Tainted(Bytes),
    /// Entirely placeholder bytes with nothing to report.
    Faked,
    /// No bytes. The task exists to deliver an error.
    Absent,
}

/// One unit of work from the reader to the hash workers.
///
/// A piece index may be sent more than once, e.g. for a read error and later
/// for the tainted piece it causes.
#[derive(Debug, Clone)]
pub struct PieceTask {
    pub index: u32,
    pub payload: Payload,
    pub path: PathBuf,
    pub error: Option<StorageError>,
}

impl PieceTask {
    pub fn data(index: u32, data: Bytes, path: PathBuf) -> Self {
        Self {
            index,
            payload: Payload::Data(data),
            path,
            error: None,
        }
    }

    pub fn tainted(index: u32, data: Bytes, path: PathBuf) -> Self {
        Self {
            index,
            payload: Payload::Tainted(data),
            path,
            error: None,
        }
    }

    pub fn faked(index: u32, path: PathBuf) -> Self {
        Self {
            index,
            payload: Payload::Faked,
            path,
            error: None,
        }
    }

    pub fn failed(index: u32, path: PathBuf, error: StorageError) -> Self {
        Self {
            index,
            payload: Payload::Absent,
            path,
            error: Some(error),
        }
    }
}

/// A hashed (or forwarded) task on its way to the collector.
#[derive(Debug, Clone)]
pub struct PieceResult {
    pub index: u32,
    pub digest: Option<PieceDigest>,
    pub path: PathBuf,
    pub error: Option<StorageError>,
    /// The digest covers placeholder bytes and must be treated as a mismatch.
    pub tainted: bool,
}
