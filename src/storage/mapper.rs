use std::collections::BTreeSet;
use std::io::{Read, Seek, SeekFrom};
use std::ops::RangeInclusive;
use std::path::Path;

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;

use super::error::StorageError;
use super::handle_cache::OpenFileCache;
use crate::constants::DEFAULT_MAX_OPEN_FILES;
use crate::metainfo::{hash_piece, ContentDescriptor, DigestBlob, FileEntry, PieceDigest};

/// Translates between piece indexes, stream offsets and files.
///
/// Zero-length files occupy no bytes of the stream: they belong to no byte
/// range and no piece. Reading pieces goes through a bounded cache of open
/// file handles that is closed by [`close`](Self::close) or on drop.
#[derive(Debug)]
pub struct PieceMapper<'a> {
    content: &'a ContentDescriptor,
    handles: Mutex<OpenFileCache>,
}

impl<'a> PieceMapper<'a> {
    pub fn new(content: &'a ContentDescriptor) -> Self {
        Self::with_max_open_files(content, DEFAULT_MAX_OPEN_FILES)
    }

    pub fn with_max_open_files(content: &'a ContentDescriptor, max_open: usize) -> Self {
        Self {
            content,
            handles: Mutex::new(OpenFileCache::new(max_open)),
        }
    }

    pub fn content(&self) -> &'a ContentDescriptor {
        self.content
    }

    /// Position of `file` in the content's file list.
    pub fn file_index(&self, file: &FileEntry) -> Result<usize, StorageError> {
        self.content
            .files()
            .iter()
            .position(|f| f == file)
            .ok_or_else(|| StorageError::FileNotInContent {
                path: file.relative_path(),
            })
    }

    /// Stream offset of the first byte of `file`.
    pub fn file_position(&self, file: &FileEntry) -> Result<u64, StorageError> {
        let index = self.file_index(file)?;
        Ok(self.content.file_offset(index))
    }

    /// Inclusive stream range of `file`, or `None` for an empty file.
    pub fn byte_range_of_file(
        &self,
        file: &FileEntry,
    ) -> Result<Option<RangeInclusive<u64>>, StorageError> {
        let index = self.file_index(file)?;
        Ok(self.span(index).map(|(first, last)| first..=last))
    }

    /// The file owning the byte at `position`.
    pub fn file_at_position(&self, position: u64) -> Result<&'a FileEntry, StorageError> {
        let total = self.content.total_size();
        if position >= total {
            return Err(StorageError::PositionOutOfBounds {
                position,
                max: total.saturating_sub(1),
            });
        }

        let after = self
            .content
            .offsets()
            .partition_point(|&offset| offset <= position);
        Ok(&self.content.files()[after - 1])
    }

    /// Files with at least one byte in the inclusive range `first..=last`.
    pub fn files_in_byte_range(
        &self,
        first: u64,
        last: u64,
    ) -> Result<Vec<&'a FileEntry>, StorageError> {
        let files = self.content.files();
        Ok(self
            .file_indexes_in_range(first, last)?
            .into_iter()
            .map(|i| &files[i])
            .collect())
    }

    /// Files with at least one byte in the piece at `index`.
    pub fn files_at_piece_index(&self, index: u32) -> Result<Vec<&'a FileEntry>, StorageError> {
        let files = self.content.files();
        Ok(self
            .file_indexes_at_piece(index)?
            .into_iter()
            .map(|i| &files[i])
            .collect())
    }

    /// Indexes of all pieces holding bytes of `file`.
    ///
    /// With `exclusive`, a boundary piece that also holds bytes of another
    /// file is left out.
    pub fn piece_indexes_of_file(
        &self,
        file: &FileEntry,
        exclusive: bool,
    ) -> Result<Vec<u32>, StorageError> {
        let index = self.file_index(file)?;
        let Some(range) = self.piece_range(index) else {
            return Ok(Vec::new());
        };

        let (first, last) = (*range.start(), *range.end());
        let mut pieces: Vec<u32> = range.collect();
        if exclusive {
            if self.file_indexes_at_piece(first)? != [index] {
                pieces.retain(|&p| p != first);
            }
            if last != first && self.file_indexes_at_piece(last)? != [index] {
                pieces.retain(|&p| p != last);
            }
        }
        Ok(pieces)
    }

    /// Maps piece indexes relative to `file` onto absolute piece indexes.
    ///
    /// Negative values count back from the file's last piece. Out-of-range
    /// values are clamped to the file's first or last piece.
    pub fn absolute_piece_indexes(
        &self,
        file: &FileEntry,
        relative: &[i64],
    ) -> Result<BTreeSet<u32>, StorageError> {
        let index = self.file_index(file)?;
        let Some(range) = self.piece_range(index) else {
            return Ok(BTreeSet::new());
        };

        let first = *range.start();
        let rel_max = i64::from(*range.end() - first);
        Ok(relative
            .iter()
            .map(|&rel| first + clamp_relative(rel, rel_max))
            .collect())
    }

    /// Clamps piece indexes relative to `file`, keeping them relative.
    ///
    /// The upper bound is derived from the file size alone.
    pub fn relative_piece_indexes(
        &self,
        file: &FileEntry,
        relative: &[i64],
    ) -> Result<BTreeSet<u32>, StorageError> {
        self.file_index(file)?;
        if file.size == 0 {
            return Ok(BTreeSet::new());
        }

        let rel_max = i64::try_from((file.size - 1) / self.content.piece_size()).unwrap_or(i64::MAX);
        Ok(relative
            .iter()
            .map(|&rel| clamp_relative(rel, rel_max))
            .collect())
    }

    /// Reads the piece at `index` from the files under `root`.
    ///
    /// `root` is the resolved content location (see
    /// [`ContentDescriptor::fs_root`]). Every spanned file must exist with its
    /// recorded size.
    pub fn read_piece(&self, index: u32, root: &Path) -> Result<Bytes, StorageError> {
        let files = self.file_indexes_at_piece(index)?;
        let content = self.content;
        let start = u64::from(index) * content.piece_size();
        let end = start + content.piece_length(index);

        let mut buf = BytesMut::with_capacity((end - start) as usize);
        let mut handles = self.handles.lock();
        for file_index in files {
            let entry = &content.files()[file_index];
            let path = content.fs_path(root, file_index);

            let actual = std::fs::metadata(&path)
                .map_err(|e| StorageError::from_metadata(&path, &e))?
                .len();
            if actual != entry.size {
                return Err(StorageError::FileSize {
                    path,
                    actual: Some(actual),
                    expected: entry.size,
                });
            }

            let file_start = content.file_offset(file_index);
            let from = start.max(file_start);
            let to = end.min(file_start + entry.size);

            let handle = handles
                .get_or_open(&path)
                .map_err(|e| StorageError::read(&path, &e))?;
            handle
                .seek(SeekFrom::Start(from - file_start))
                .map_err(|e| StorageError::read(&path, &e))?;

            let at = buf.len();
            buf.resize(at + (to - from) as usize, 0);
            handle
                .read_exact(&mut buf[at..])
                .map_err(|e| StorageError::read(&path, &e))?;
        }

        tracing::trace!(piece = index, len = buf.len(), "read piece");
        Ok(buf.freeze())
    }

    /// Digest of the piece at `index`, or `None` if a spanned file is missing.
    pub fn piece_digest(
        &self,
        index: u32,
        root: &Path,
    ) -> Result<Option<PieceDigest>, StorageError> {
        match self.read_piece(index, root) {
            Ok(data) => Ok(Some(hash_piece(&data))),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Compares the piece at `index` against its stored digest.
    ///
    /// Returns `None` if a spanned file is missing.
    pub fn verify_piece(
        &self,
        index: u32,
        root: &Path,
        expected: &DigestBlob,
    ) -> Result<Option<bool>, StorageError> {
        let stored = expected
            .get(index)
            .ok_or(StorageError::PieceIndexOutOfBounds {
                index,
                max: u32::try_from(expected.len().saturating_sub(1)).unwrap_or(u32::MAX),
            })?;
        Ok(self
            .piece_digest(index, root)?
            .map(|digest| digest == stored))
    }

    /// Number of currently open file handles.
    pub fn open_files(&self) -> usize {
        self.handles.lock().len()
    }

    /// Closes all cached file handles.
    pub fn close(&self) {
        self.handles.lock().close_all();
    }

    pub(crate) fn file_indexes_at_piece(&self, index: u32) -> Result<Vec<usize>, StorageError> {
        let max = self.content.max_piece_index();
        if self.content.total_size() == 0 || index > max {
            return Err(StorageError::PieceIndexOutOfBounds { index, max });
        }

        let first = u64::from(index) * self.content.piece_size();
        let last = first + self.content.piece_length(index) - 1;
        self.file_indexes_in_range(first, last)
    }

    /// Piece indexes spanned by the file at `index`, `None` for empty files.
    pub(crate) fn piece_range(&self, index: usize) -> Option<RangeInclusive<u32>> {
        let (first, last) = self.span(index)?;
        let piece_size = self.content.piece_size();
        Some(piece_index(first / piece_size)..=piece_index(last / piece_size))
    }

    fn file_indexes_in_range(&self, first: u64, last: u64) -> Result<Vec<usize>, StorageError> {
        if first > last {
            return Err(StorageError::InvalidByteRange { first, last });
        }

        Ok((0..self.content.files().len())
            .filter(|&i| {
                self.span(i)
                    .is_some_and(|(start, end)| start <= last && end >= first)
            })
            .collect())
    }

    fn span(&self, index: usize) -> Option<(u64, u64)> {
        let size = self.content.files()[index].size;
        if size == 0 {
            return None;
        }
        let start = self.content.file_offset(index);
        Some((start, start + size - 1))
    }
}

fn clamp_relative(rel: i64, rel_max: i64) -> u32 {
    let rel = if rel < 0 {
        rel_max.saturating_add(rel).saturating_add(1)
    } else {
        rel
    };
    piece_index(rel.clamp(0, rel_max).unsigned_abs())
}

fn piece_index(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
