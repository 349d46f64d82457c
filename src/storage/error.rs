use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::metainfo::MetainfoError;

/// Errors raised while mapping, reading, hashing or verifying content.
///
/// The type is `Clone` so that one file error can be attached to every piece
/// it affects. OS errors are kept as their kind plus the raw errno.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("no such file or directory: {}", .path.display())]
    PathNotFound { path: PathBuf },

    #[error("empty file or directory: {}", .path.display())]
    PathEmpty { path: PathBuf },

    #[error("unable to read from {}: {kind}", .path.display())]
    Read {
        path: PathBuf,
        errno: Option<i32>,
        kind: io::ErrorKind,
    },

    #[error("unable to write to {}: {kind}", .path.display())]
    Write {
        path: PathBuf,
        errno: Option<i32>,
        kind: io::ErrorKind,
    },

    #[error("{}: {}", .path.display(), size_mismatch(.actual, .expected))]
    FileSize {
        path: PathBuf,
        actual: Option<u64>,
        expected: u64,
    },

    /// Digest mismatch. `piece_index` is zero-based but displayed one-based.
    #[error("corruption in piece {}, {}", .piece_index + 1, suspects(.files))]
    Content {
        piece_index: u32,
        piece_size: u64,
        files: Vec<PathBuf>,
    },

    #[error("not a directory: {}", .path.display())]
    NotDirectory { path: PathBuf },

    #[error("is a directory: {}", .path.display())]
    IsDirectory { path: PathBuf },

    #[error(transparent)]
    Metainfo(#[from] MetainfoError),

    #[error("piece index out of bounds (0 - {max}): {index}")]
    PieceIndexOutOfBounds { index: u32, max: u32 },

    #[error("position out of bounds (0 - {max}): {position}")]
    PositionOutOfBounds { position: u64, max: u64 },

    #[error("invalid byte range: {first} - {last}")]
    InvalidByteRange { first: u64, last: u64 },

    #[error("file is not part of the content: {}", .path.display())]
    FileNotInContent { path: PathBuf },

    #[error("progress callback failed: {0}")]
    Callback(Arc<dyn std::error::Error + Send + Sync>),

    #[error("failed to spawn {name} thread: {kind}")]
    Spawn { name: String, kind: io::ErrorKind },

    #[error("{0} thread panicked")]
    WorkerPanicked(&'static str),
}

impl StorageError {
    pub fn read(path: &Path, err: &io::Error) -> Self {
        StorageError::Read {
            path: path.to_path_buf(),
            errno: err.raw_os_error(),
            kind: err.kind(),
        }
    }

    /// Error for a failed `stat` of `path`.
    ///
    /// A path whose parent is a regular file does not exist either.
    pub fn from_metadata(path: &Path, err: &io::Error) -> Self {
        if is_missing(err.kind()) {
            StorageError::PathNotFound {
                path: path.to_path_buf(),
            }
        } else {
            StorageError::read(path, err)
        }
    }

    pub fn write(path: &Path, err: &io::Error) -> Self {
        StorageError::Write {
            path: path.to_path_buf(),
            errno: err.raw_os_error(),
            kind: err.kind(),
        }
    }

    /// True for errors caused by a file that does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            StorageError::PathNotFound { .. } => true,
            StorageError::Read { kind, .. } => is_missing(*kind),
            _ => false,
        }
    }

    /// The filesystem path this error is about, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            StorageError::PathNotFound { path }
            | StorageError::PathEmpty { path }
            | StorageError::Read { path, .. }
            | StorageError::Write { path, .. }
            | StorageError::FileSize { path, .. }
            | StorageError::NotDirectory { path }
            | StorageError::IsDirectory { path }
            | StorageError::FileNotInContent { path } => Some(path),
            _ => None,
        }
    }
}

fn is_missing(kind: io::ErrorKind) -> bool {
    matches!(kind, io::ErrorKind::NotFound | io::ErrorKind::NotADirectory)
}

fn size_mismatch(actual: &Option<u64>, expected: &u64) -> String {
    match actual {
        Some(actual) if actual > expected => {
            format!("too big: {actual} instead of {expected} bytes")
        }
        Some(actual) => format!("too small: {actual} instead of {expected} bytes"),
        None => format!("unknown size, expected {expected} bytes"),
    }
}

fn suspects(files: &[PathBuf]) -> String {
    match files {
        [file] => format!("in {}", file.display()),
        _ => {
            let names: Vec<_> = files.iter().map(|f| f.display().to_string()).collect();
            format!("at least one of these files is corrupt: {}", names.join(", "))
        }
    }
}
