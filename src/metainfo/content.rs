use std::path::{Path, PathBuf};

use super::error::MetainfoError;
use crate::constants::{PIECE_SIZE_MAX, PIECE_SIZE_MIN};

/// A file in the concatenated content stream.
///
/// `path` holds the segments relative to the content root. For single-file
/// content it is just the content name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileEntry {
    pub path: Vec<String>,
    pub size: u64,
}

impl FileEntry {
    pub fn new<I, S>(path: I, size: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            path: path.into_iter().map(Into::into).collect(),
            size,
        }
    }

    pub fn relative_path(&self) -> PathBuf {
        self.path.iter().collect()
    }
}

/// How the content root maps onto the file list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentMode {
    /// The content root is the only file.
    SingleFile,
    /// The content root is a directory holding every file.
    MultiFile,
}

/// Ordered file list plus piece size: the input to every piece operation.
///
/// File order defines the byte layout of the stream and never changes after
/// construction. Offsets and the total size are computed once.
///
/// # Examples
///
/// ```
/// use piecehash::metainfo::{ContentDescriptor, FileEntry};
///
/// let content = ContentDescriptor::multi_file(
///     "album",
///     vec![
///         FileEntry::new(["cd1", "track01.flac"], 40_000),
///         FileEntry::new(["cd1", "track02.flac"], 30_000),
///     ],
///     16384,
/// );
///
/// assert_eq!(content.total_size(), 70_000);
/// assert_eq!(content.piece_count(), 5);
/// assert_eq!(content.piece_length(4), 70_000 - 4 * 16384);
/// ```
#[derive(Debug, Clone)]
pub struct ContentDescriptor {
    name: String,
    mode: ContentMode,
    files: Vec<FileEntry>,
    offsets: Vec<u64>,
    piece_size: u64,
    total_size: u64,
}

impl ContentDescriptor {
    /// Content made of a single file named `name`.
    pub fn single_file(name: impl Into<String>, size: u64, piece_size: u64) -> Self {
        let name = name.into();
        let file = FileEntry::new([name.clone()], size);
        Self::build(name, ContentMode::SingleFile, vec![file], piece_size)
    }

    /// Content made of `files` beneath a directory named `name`.
    pub fn multi_file(name: impl Into<String>, files: Vec<FileEntry>, piece_size: u64) -> Self {
        Self::build(name.into(), ContentMode::MultiFile, files, piece_size)
    }

    fn build(name: String, mode: ContentMode, files: Vec<FileEntry>, piece_size: u64) -> Self {
        let mut offsets = Vec::with_capacity(files.len());
        let mut offset = 0u64;
        for file in &files {
            offsets.push(offset);
            offset += file.size;
        }

        Self {
            name,
            mode,
            files,
            offsets,
            piece_size,
            total_size: offset,
        }
    }

    /// Checks the structural rules every generate or verify run relies on.
    pub fn validate(&self) -> Result<(), MetainfoError> {
        if self.name.is_empty() {
            return Err(MetainfoError::MissingField("name"));
        }
        if self.files.is_empty() {
            return Err(MetainfoError::EmptyContent);
        }
        if self.mode == ContentMode::SingleFile && self.files.len() != 1 {
            return Err(MetainfoError::InvalidField("files"));
        }

        for file in &self.files {
            if file.path.is_empty() {
                return Err(MetainfoError::MissingField("file path"));
            }
            let bad_segment = file.path.iter().any(|segment| {
                segment.is_empty()
                    || segment == "."
                    || segment == ".."
                    || segment.contains(['/', '\\'])
            });
            if bad_segment {
                return Err(MetainfoError::InvalidField("file path"));
            }
        }

        if !self.piece_size.is_power_of_two()
            || !(PIECE_SIZE_MIN..=PIECE_SIZE_MAX).contains(&self.piece_size)
        {
            return Err(MetainfoError::PieceSize {
                size: self.piece_size,
                min: PIECE_SIZE_MIN,
                max: PIECE_SIZE_MAX,
            });
        }

        if self.total_size.div_ceil(self.piece_size) > u64::from(u32::MAX) {
            return Err(MetainfoError::InvalidField("piece count"));
        }

        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> ContentMode {
        self.mode
    }

    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }

    pub fn piece_size(&self) -> u64 {
        self.piece_size
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Stream offset of the file at `index`.
    pub fn file_offset(&self, index: usize) -> u64 {
        self.offsets[index]
    }

    pub(crate) fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    pub fn piece_count(&self) -> u32 {
        if self.piece_size == 0 {
            return 0;
        }
        u32::try_from(self.total_size.div_ceil(self.piece_size)).unwrap_or(u32::MAX)
    }

    /// Index of the last piece. Zero for empty content.
    pub fn max_piece_index(&self) -> u32 {
        self.piece_count().saturating_sub(1)
    }

    /// Length of the piece at `index`; only the final piece may be short.
    pub fn piece_length(&self, index: u32) -> u64 {
        let start = u64::from(index) * self.piece_size;
        self.total_size.saturating_sub(start).min(self.piece_size)
    }

    /// Resolves the directory or file the content lives at.
    ///
    /// Without `allow_different_name` the last component of `root` is
    /// replaced by the content name.
    pub fn fs_root(&self, root: &Path, allow_different_name: bool) -> PathBuf {
        if allow_different_name || root.file_name().is_none() {
            root.to_path_buf()
        } else {
            root.with_file_name(&self.name)
        }
    }

    /// Path of the file at `index` inside the content, starting with the
    /// content name.
    pub fn content_path(&self, index: usize) -> PathBuf {
        match self.mode {
            ContentMode::SingleFile => PathBuf::from(&self.name),
            ContentMode::MultiFile => {
                Path::new(&self.name).join(self.files[index].relative_path())
            }
        }
    }

    /// On-disk location of the file at `index` under a resolved root.
    pub fn fs_path(&self, root: &Path, index: usize) -> PathBuf {
        match self.mode {
            ContentMode::SingleFile => root.to_path_buf(),
            ContentMode::MultiFile => root.join(self.files[index].relative_path()),
        }
    }
}
