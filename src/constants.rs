//! Hashing and verification constants.
//!
//! Piece-size bounds follow the limits enforced by common BitTorrent clients;
//! the remaining values tune the hashing pipeline and the open-file cache.

// ============================================================================
// Piece geometry
// ============================================================================

/// Smallest accepted piece size (16 KiB)
pub const PIECE_SIZE_MIN: u64 = 16 * 1024;

/// Largest accepted piece size (16 MiB)
pub const PIECE_SIZE_MAX: u64 = 16 * 1024 * 1024;

/// Length of a single SHA-1 piece digest in bytes
pub const DIGEST_LEN: usize = 20;

// ============================================================================
// Pipeline tuning
// ============================================================================

/// Bounded task queue capacity per hash worker
pub const QUEUE_SIZE_PER_WORKER: usize = 3;

/// Worker count used when the available parallelism cannot be determined
pub const FALLBACK_WORKERS: usize = 4;

// ============================================================================
// File handles
// ============================================================================

/// Maximum number of file handles the piece mapper keeps open at once
pub const DEFAULT_MAX_OPEN_FILES: usize = 10;
