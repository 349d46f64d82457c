use thiserror::Error;

/// Structural problems with a content descriptor or a digest blob.
///
/// These are detected before any file is opened.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetainfoError {
    /// A required field is missing or empty.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// A field has an invalid value.
    #[error("invalid field: {0}")]
    InvalidField(&'static str),

    /// The piece size is not a power of two inside the accepted range.
    #[error("piece size must be a power of two between {min} and {max}: {size}")]
    PieceSize { size: u64, min: u64, max: u64 },

    /// The digest blob is not a whole number of 20-byte digests.
    #[error("digest blob length is not a multiple of 20: {0}")]
    DigestBlobLength(usize),

    /// The digest blob does not hold one digest per piece.
    #[error("expected {expected} piece digests, found {actual}")]
    DigestCount { expected: u64, actual: u64 },

    /// The content lists no files or only empty ones.
    #[error("content is empty")]
    EmptyContent,
}
