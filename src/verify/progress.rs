use std::path::Path;

use crate::metainfo::{ContentDescriptor, PieceDigest};
use crate::storage::StorageError;

/// Per-file event of the size check.
#[derive(Debug)]
pub struct SizeCheckProgress<'a> {
    pub content: &'a ContentDescriptor,
    pub fs_path: &'a Path,
    /// Path of the file inside the content, starting with the content name.
    pub content_path: &'a Path,
    /// Files checked so far, including failed ones.
    pub files_done: usize,
    pub files_total: usize,
    pub error: Option<&'a StorageError>,
}

/// Per-piece event of the content check.
#[derive(Debug)]
pub struct VerifyProgress<'a> {
    pub content: &'a ContentDescriptor,
    pub path: &'a Path,
    pub pieces_done: u32,
    pub pieces_total: u32,
    pub piece_index: u32,
    pub digest: Option<&'a PieceDigest>,
    pub error: Option<&'a StorageError>,
}
