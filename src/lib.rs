//! piecehash - BitTorrent piece hashing and verification
//!
//! This library maps a set of files onto the fixed-size pieces of a
//! concatenated byte stream, hashes those pieces in parallel and verifies
//! content on disk against stored SHA-1 piece digests.
//!
//! # Modules
//!
//! - [`metainfo`] - Content descriptors and digest blobs
//! - [`storage`] - Byte-range mapping and single-piece reads
//! - [`hashing`] - Reader, hash worker pool, collector and progress callback
//! - [`generate`] - Digest blob generation
//! - [`verify`] - Size and content verification
//!
//! # Examples
//!
//! ```no_run
//! use piecehash::{ContentDescriptor, FileEntry, Generator, Verifier};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let content = ContentDescriptor::multi_file(
//!     "backup",
//!     vec![
//!         FileEntry::new(["db.sqlite"], 52_428_800),
//!         FileEntry::new(["logs", "app.log"], 1_048_576),
//!     ],
//!     1 << 20,
//! );
//!
//! let blob = Generator::new(&content, "/srv/backup").run()?;
//! Verifier::new(&content, "/srv/backup", &blob).verify()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod generate;
pub mod hashing;
pub mod metainfo;
pub mod storage;
pub mod verify;

pub use config::PieceConfig;
pub use generate::{GenerateProgress, Generator};
pub use hashing::{CallbackResult, CancellableCallback};
pub use metainfo::{
    hash_piece, ContentDescriptor, ContentMode, DigestBlob, FileEntry, MetainfoError, PieceDigest,
};
pub use storage::{OpenFileCache, PieceMapper, StorageError};
pub use verify::{SizeCheckProgress, Verifier, VerifyOutcome, VerifyProgress, VerifyState};
