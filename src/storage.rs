//! Byte-range mapping and piece reads.
//!
//! This module translates between piece indexes, stream offsets and the
//! files of a [`ContentDescriptor`](crate::metainfo::ContentDescriptor), and
//! reads single pieces from disk.
//!
//! # Components
//!
//! - [`PieceMapper`] - Position arithmetic plus piece reads through a handle cache
//! - [`OpenFileCache`] - Bounded set of open read handles
//! - [`StorageError`] - Error taxonomy shared by every stage
//!
//! # Examples
//!
//! ```
//! use piecehash::metainfo::{ContentDescriptor, FileEntry};
//! use piecehash::storage::PieceMapper;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let content = ContentDescriptor::multi_file(
//!     "content",
//!     vec![FileEntry::new(["a"], 6), FileEntry::new(["b"], 23), FileEntry::new(["c"], 1)],
//!     6,
//! );
//! let mapper = PieceMapper::new(&content);
//!
//! let b = &content.files()[1];
//! assert_eq!(mapper.file_position(b)?, 6);
//! assert_eq!(mapper.piece_indexes_of_file(b, false)?, vec![1, 2, 3, 4]);
//! assert_eq!(mapper.piece_indexes_of_file(b, true)?, vec![1, 2, 3]);
//! # Ok(())
//! # }
//! ```

mod error;
mod handle_cache;
mod mapper;

pub use error::StorageError;
pub use handle_cache::OpenFileCache;
pub use mapper::PieceMapper;

#[cfg(test)]
mod tests;
