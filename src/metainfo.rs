//! Content descriptors and piece digests.
//!
//! This module holds the read-only input of every piece operation: an ordered
//! file list with a fixed piece size ([`ContentDescriptor`]) and the flat
//! sequence of 20-byte SHA-1 piece digests ([`DigestBlob`]).
//!
//! # Overview
//!
//! All files are treated as one concatenated byte stream that is cut into
//! pieces of `piece_size` bytes. Only the final piece may be shorter.
//!
//! # Examples
//!
//! ```
//! use piecehash::metainfo::{ContentDescriptor, DigestBlob, FileEntry, hash_piece};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let content = ContentDescriptor::multi_file(
//!     "photos",
//!     vec![
//!         FileEntry::new(["a.jpg"], 20_000),
//!         FileEntry::new(["b.jpg"], 12_768),
//!     ],
//!     16384,
//! );
//! content.validate()?;
//! assert_eq!(content.piece_count(), 2);
//!
//! let blob = DigestBlob::from_digests([hash_piece(b"first"), hash_piece(b"second")]);
//! assert_eq!(blob.len(), 2);
//! assert_eq!(blob.get(1), Some(hash_piece(b"second")));
//! # Ok(())
//! # }
//! ```

mod content;
mod error;
mod pieces;

pub use content::{ContentDescriptor, ContentMode, FileEntry};
pub use error::MetainfoError;
pub use pieces::{hash_piece, DigestBlob, PieceDigest};

#[cfg(test)]
mod tests;
