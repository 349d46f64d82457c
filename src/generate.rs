//! Piece digest generation.

use std::fs;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use crate::config::PieceConfig;
use crate::hashing::{CallbackResult, CancellableCallback, Collected, Pipeline};
use crate::metainfo::{ContentDescriptor, DigestBlob, MetainfoError};
use crate::storage::{PieceMapper, StorageError};

/// Progress event delivered to generation callbacks.
#[derive(Debug)]
pub struct GenerateProgress<'a> {
    pub content: &'a ContentDescriptor,
    /// File the reported piece ended in.
    pub path: &'a Path,
    pub pieces_done: u32,
    pub pieces_total: u32,
}

type NoProgress = fn(&GenerateProgress<'_>) -> CallbackResult;

/// Computes the digest blob of content on disk.
///
/// Generation stops at the first read or size error, with or without a
/// progress callback.
///
/// # Examples
///
/// ```no_run
/// use piecehash::{ContentDescriptor, FileEntry, Generator, PieceConfig};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let content = ContentDescriptor::multi_file(
///     "release",
///     vec![FileEntry::new(["data.bin"], 1_000_000)],
///     1 << 18,
/// );
/// let blob = Generator::new(&content, "./release")
///     .with_config(PieceConfig::default().with_threads(4))
///     .run()?;
/// assert_eq!(blob.len(), 4);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Generator<'a> {
    content: &'a ContentDescriptor,
    root: PathBuf,
    config: PieceConfig,
}

impl<'a> Generator<'a> {
    pub fn new(content: &'a ContentDescriptor, root: impl AsRef<Path>) -> Self {
        Self {
            content,
            root: root.as_ref().to_path_buf(),
            config: PieceConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PieceConfig) -> Self {
        self.config = config;
        self
    }

    /// Hashes every piece and returns the digests in index order.
    pub fn run(&self) -> Result<DigestBlob, StorageError> {
        self.generate(None::<CancellableCallback<NoProgress>>)?
            .ok_or(StorageError::Metainfo(MetainfoError::DigestCount {
                expected: u64::from(self.content.piece_count()),
                actual: 0,
            }))
    }

    /// Like [`run`](Self::run), reporting progress to `callback`.
    ///
    /// Returns `Ok(None)` if the callback cancelled the run.
    pub fn run_with_progress<F>(&self, callback: F) -> Result<Option<DigestBlob>, StorageError>
    where
        F: FnMut(&GenerateProgress<'_>) -> CallbackResult + Send,
    {
        self.generate(Some(CancellableCallback::new(callback, self.config.interval)))
    }

    fn generate<F>(
        &self,
        mut callback: Option<CancellableCallback<F>>,
    ) -> Result<Option<DigestBlob>, StorageError>
    where
        F: FnMut(&GenerateProgress<'_>) -> CallbackResult + Send,
    {
        let content = self.content;
        content.validate()?;
        let root = content.fs_root(&self.root, self.config.allow_different_name);
        check_root(content, &root)?;

        // The reader holds its own handles, one file at a time.
        let mapper = PieceMapper::new(content);
        let pipeline = Pipeline::new(&mapper, root, &self.config);
        if let Some(callback) = callback.as_mut() {
            let shutdown = pipeline.shutdown().clone();
            let (reader, workers, collector) =
                (shutdown.reader, shutdown.workers, shutdown.collector);
            callback.on_cancel(move || reader.stop());
            callback.on_cancel(move || workers.stop());
            callback.on_cancel(move || collector.stop());
        }

        tracing::debug!(
            name = content.name(),
            pieces = content.piece_count(),
            "generating piece digests"
        );
        let collected = pipeline.run(|result, progress, _| {
            if let Some(err) = &result.error {
                return Err(err.clone());
            }
            let Some(callback) = callback.as_mut() else {
                return Ok(ControlFlow::Continue(()));
            };

            let event = GenerateProgress {
                content,
                path: &result.path,
                pieces_done: progress.pieces_done,
                pieces_total: progress.pieces_total,
            };
            if callback.call(&event, progress.is_complete())? {
                Ok(ControlFlow::Break(()))
            } else {
                Ok(ControlFlow::Continue(()))
            }
        });

        match collected? {
            Collected::Cancelled => {
                tracing::debug!("generation cancelled");
                Ok(None)
            }
            Collected::Finished(digests) => {
                let expected = u64::from(content.piece_count());
                let actual = digests.len() as u64;
                if actual != expected {
                    return Err(MetainfoError::DigestCount { expected, actual }.into());
                }
                Ok(Some(DigestBlob::from_unsorted(digests)))
            }
        }
    }
}

/// Fails if the content root is missing or holds no data at all.
fn check_root(content: &ContentDescriptor, root: &Path) -> Result<(), StorageError> {
    if !root.exists() {
        return Err(StorageError::PathNotFound {
            path: root.to_path_buf(),
        });
    }

    let on_disk: u64 = (0..content.files().len())
        .filter_map(|index| fs::metadata(content.fs_path(root, index)).ok())
        .filter(|metadata| metadata.is_file())
        .map(|metadata| metadata.len())
        .sum();
    if on_disk == 0 {
        return Err(StorageError::PathEmpty {
            path: root.to_path_buf(),
        });
    }
    Ok(())
}
