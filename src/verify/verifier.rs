use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::progress::{SizeCheckProgress, VerifyProgress};
use super::state::{VerifyOutcome, VerifyState};
use crate::config::PieceConfig;
use crate::hashing::{CallbackResult, CancellableCallback, Collected, Pipeline};
use crate::metainfo::{ContentDescriptor, ContentMode, DigestBlob, MetainfoError};
use crate::storage::{PieceMapper, StorageError};

type NoProgress = fn(&VerifyProgress<'_>) -> CallbackResult;

/// Checks content on disk against stored piece digests.
///
/// Methods without a callback return the first error. The `_with_progress`
/// variants deliver errors through the callback, keep going and return a
/// [`VerifyOutcome`].
///
/// # Examples
///
/// ```no_run
/// use piecehash::{ContentDescriptor, DigestBlob, FileEntry, Verifier};
/// use std::ops::ControlFlow;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// # let stored = vec![0u8; 80];
/// let content = ContentDescriptor::multi_file(
///     "release",
///     vec![FileEntry::new(["data.bin"], 1_000_000)],
///     1 << 18,
/// );
/// let expected = DigestBlob::from_bytes(stored)?;
///
/// let mut verifier = Verifier::new(&content, "./release", &expected);
/// let outcome = verifier.verify_with_progress(|event| {
///     if let Some(err) = event.error {
///         eprintln!("{err}");
///     }
///     Ok(ControlFlow::Continue(()))
/// })?;
/// println!("ok: {}", outcome.is_success());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Verifier<'a> {
    content: &'a ContentDescriptor,
    root: PathBuf,
    expected: &'a DigestBlob,
    config: PieceConfig,
    state: VerifyState,
}

impl<'a> Verifier<'a> {
    pub fn new(
        content: &'a ContentDescriptor,
        root: impl AsRef<Path>,
        expected: &'a DigestBlob,
    ) -> Self {
        Self {
            content,
            root: root.as_ref().to_path_buf(),
            expected,
            config: PieceConfig::default(),
            state: VerifyState::Idle,
        }
    }

    pub fn with_config(mut self, config: PieceConfig) -> Self {
        self.config = config;
        self
    }

    /// Phase reached by the most recent run.
    pub fn state(&self) -> VerifyState {
        self.state
    }

    /// Checks that every file exists with its recorded size.
    pub fn verify_size(&mut self) -> Result<(), StorageError> {
        let root = self.begin(false)?;
        for index in 0..self.content.files().len() {
            if let Some(err) = self.check_file(&root, index).1 {
                self.transition(VerifyState::SizeMismatchOrMissing);
                self.transition(VerifyState::Failure);
                return Err(err);
            }
        }
        self.transition(VerifyState::Success);
        Ok(())
    }

    /// Size check reporting one event per file.
    pub fn verify_size_with_progress<F>(&mut self, callback: F) -> Result<VerifyOutcome, StorageError>
    where
        F: FnMut(&SizeCheckProgress<'_>) -> CallbackResult,
    {
        let root = self.begin(false)?;
        let mut callback = CancellableCallback::new(callback, self.config.interval);
        let content = self.content;
        let files_total = content.files().len();
        let mut errors = Vec::new();

        for index in 0..files_total {
            let (fs_path, error) = self.check_file(&root, index);
            let content_path = content.content_path(index);
            let event = SizeCheckProgress {
                content,
                fs_path: &fs_path,
                content_path: &content_path,
                files_done: index + 1,
                files_total,
                error: error.as_ref(),
            };
            let force = error.is_some() || index + 1 == files_total;
            let cancelled = callback
                .call(&event, force)
                .inspect_err(|_| self.transition(VerifyState::Failure))?;
            if let Some(err) = error {
                if errors.is_empty() {
                    self.transition(VerifyState::SizeMismatchOrMissing);
                }
                errors.push(err);
            }
            if cancelled {
                return Ok(self.finish(VerifyOutcome::Cancelled));
            }
        }

        Ok(self.finish(outcome(errors)))
    }

    /// Hashes every piece and compares it with the stored digest.
    pub fn verify_content(&mut self) -> Result<(), StorageError> {
        let root = self.begin(true)?;
        self.check_content(&root, None::<&mut CancellableCallback<NoProgress>>)
            .map(|_| ())
    }

    /// Content check reporting every piece.
    pub fn verify_content_with_progress<F>(
        &mut self,
        callback: F,
    ) -> Result<VerifyOutcome, StorageError>
    where
        F: FnMut(&VerifyProgress<'_>) -> CallbackResult + Send,
    {
        let root = self.begin(true)?;
        let mut callback = CancellableCallback::new(callback, self.config.interval);
        self.check_content(&root, Some(&mut callback))
    }

    /// Size check followed by the content check.
    ///
    /// Hashing is skipped if any file is missing or has the wrong size.
    pub fn verify(&mut self) -> Result<(), StorageError> {
        let root = self.begin(true)?;
        if let Some(err) = self.size_errors(&root).into_iter().next() {
            self.transition(VerifyState::SizeMismatchOrMissing);
            self.transition(VerifyState::Failure);
            return Err(err);
        }
        self.check_content(&root, None::<&mut CancellableCallback<NoProgress>>)
            .map(|_| ())
    }

    /// Combined check reporting through the content callback.
    ///
    /// Size errors are delivered with `pieces_done` and `piece_index` set to zero.
    pub fn verify_with_progress<F>(&mut self, callback: F) -> Result<VerifyOutcome, StorageError>
    where
        F: FnMut(&VerifyProgress<'_>) -> CallbackResult + Send,
    {
        let root = self.begin(true)?;
        let mut callback = CancellableCallback::new(callback, self.config.interval);

        let errors = self.size_errors(&root);
        if errors.is_empty() {
            return self.check_content(&root, Some(&mut callback));
        }

        self.transition(VerifyState::SizeMismatchOrMissing);
        let content = self.content;
        for err in &errors {
            let event = VerifyProgress {
                content,
                path: err.path().unwrap_or(root.as_path()),
                pieces_done: 0,
                pieces_total: content.piece_count(),
                piece_index: 0,
                digest: None,
                error: Some(err),
            };
            let cancelled = callback
                .call(&event, true)
                .inspect_err(|_| self.transition(VerifyState::Failure))?;
            if cancelled {
                return Ok(self.finish(VerifyOutcome::Cancelled));
            }
        }
        Ok(self.finish(VerifyOutcome::Failure(errors)))
    }

    /// Quick match check: compares the first, middle and last piece of
    /// every file without running the pipeline.
    pub fn verify_sample(&self) -> Result<bool, StorageError> {
        let content = self.content;
        self.validate(true)?;
        let root = content.fs_root(&self.root, self.config.allow_different_name);
        let mapper = PieceMapper::with_max_open_files(content, self.config.max_open_files);

        let mut sampled = BTreeSet::new();
        for file in content.files() {
            let count = mapper.piece_indexes_of_file(file, false)?.len() as i64;
            sampled.extend(mapper.absolute_piece_indexes(file, &[0, count / 2, -1])?);
        }

        let mut matched = true;
        for index in sampled {
            match mapper.verify_piece(index, &root, self.expected) {
                Ok(Some(true)) => {}
                Ok(_) | Err(StorageError::FileSize { .. }) => {
                    debug!(piece = index, "sampled piece does not match");
                    matched = false;
                    break;
                }
                Err(e) => {
                    mapper.close();
                    return Err(e);
                }
            }
        }
        mapper.close();
        Ok(matched)
    }

    fn begin(&mut self, with_digests: bool) -> Result<PathBuf, StorageError> {
        self.state = VerifyState::Idle;
        self.transition(VerifyState::ValidatingInput);
        self.validate(with_digests)
            .inspect_err(|_| self.transition(VerifyState::Failure))?;
        Ok(self
            .content
            .fs_root(&self.root, self.config.allow_different_name))
    }

    fn validate(&self, with_digests: bool) -> Result<(), StorageError> {
        self.content.validate()?;
        if self.content.total_size() == 0 {
            return Err(MetainfoError::EmptyContent.into());
        }
        if with_digests {
            let expected = u64::from(self.content.piece_count());
            let actual = self.expected.len() as u64;
            if expected != actual {
                return Err(MetainfoError::DigestCount { expected, actual }.into());
            }
        }
        Ok(())
    }

    fn transition(&mut self, next: VerifyState) {
        debug!(from = ?self.state, to = ?next, "verify state");
        self.state = next;
    }

    fn finish(&mut self, outcome: VerifyOutcome) -> VerifyOutcome {
        self.transition(outcome.state());
        outcome
    }

    fn size_errors(&self, root: &Path) -> Vec<StorageError> {
        (0..self.content.files().len())
            .filter_map(|index| self.check_file(root, index).1)
            .collect()
    }

    /// Existence, type and size check of one file.
    fn check_file(&self, root: &Path, index: usize) -> (PathBuf, Option<StorageError>) {
        let content = self.content;
        let path = content.fs_path(root, index);
        let expected = content.files()[index].size;

        if content.mode() == ContentMode::MultiFile && root.is_file() {
            let err = StorageError::NotDirectory {
                path: root.to_path_buf(),
            };
            return (path, Some(err));
        }

        let error = match fs::metadata(&path) {
            Err(e) => Some(StorageError::from_metadata(&path, &e)),
            Ok(metadata) if metadata.is_dir() => Some(StorageError::IsDirectory {
                path: path.clone(),
            }),
            Ok(metadata) if metadata.len() != expected => Some(StorageError::FileSize {
                path: path.clone(),
                actual: Some(metadata.len()),
                expected,
            }),
            Ok(_) => None,
        };
        (path, error)
    }

    fn check_content<F>(
        &mut self,
        root: &Path,
        mut callback: Option<&mut CancellableCallback<F>>,
    ) -> Result<VerifyOutcome, StorageError>
    where
        F: FnMut(&VerifyProgress<'_>) -> CallbackResult + Send,
    {
        let content = self.content;
        let expected = self.expected;
        let config = self.config.clone();
        let mapper = PieceMapper::new(content);
        let pipeline = Pipeline::new(&mapper, root.to_path_buf(), &config);
        if let Some(callback) = callback.as_mut() {
            let shutdown = pipeline.shutdown().clone();
            let (reader, workers, collector) =
                (shutdown.reader, shutdown.workers, shutdown.collector);
            callback.on_cancel(move || reader.stop());
            callback.on_cancel(move || workers.stop());
            callback.on_cancel(move || collector.stop());
        }

        let mut errors = Vec::new();
        let mut size_checked = HashSet::new();
        self.transition(VerifyState::Hashing);
        let collected = pipeline.run(|result, progress, skips| {
            let mut found = Vec::new();
            if let Some(err) = &result.error {
                found.push(err.clone());
            } else if let Some(digest) = &result.digest {
                let files = mapper.file_indexes_at_piece(result.index)?;
                if result.tainted || expected.get(result.index) != Some(*digest) {
                    if skips.is_enabled() && files.len() == 1 {
                        skips.request(files[0]);
                    }
                    found.push(StorageError::Content {
                        piece_index: result.index,
                        piece_size: content.piece_length(result.index),
                        files: files.iter().map(|&i| content.fs_path(root, i)).collect(),
                    });
                } else {
                    for index in files {
                        if size_checked.insert(index) {
                            found.extend(trailing_bytes(content, root, index));
                        }
                    }
                }
            }

            let Some(callback) = callback.as_mut() else {
                return match found.into_iter().next() {
                    Some(err) => Err(err),
                    None => Ok(ControlFlow::Continue(())),
                };
            };

            let mut cancelled = false;
            if found.is_empty() {
                let event = VerifyProgress {
                    content,
                    path: &result.path,
                    pieces_done: progress.pieces_done,
                    pieces_total: progress.pieces_total,
                    piece_index: result.index,
                    digest: result.digest.as_ref(),
                    error: None,
                };
                cancelled = callback.call(&event, progress.is_complete())?;
            }
            for err in found {
                let event = VerifyProgress {
                    content,
                    path: err.path().unwrap_or(result.path.as_path()),
                    pieces_done: progress.pieces_done,
                    pieces_total: progress.pieces_total,
                    piece_index: result.index,
                    digest: result.digest.as_ref(),
                    error: Some(&err),
                };
                cancelled = callback.call(&event, true)?;
                errors.push(err);
                if cancelled {
                    break;
                }
            }

            if cancelled {
                Ok(ControlFlow::Break(()))
            } else {
                Ok(ControlFlow::Continue(()))
            }
        });

        let collected = match collected {
            Ok(collected) => collected,
            Err(e) => {
                self.transition(VerifyState::Failure);
                return Err(e);
            }
        };
        match collected {
            Collected::Cancelled => Ok(self.finish(VerifyOutcome::Cancelled)),
            Collected::Finished(_) => {
                self.transition(VerifyState::Comparing);
                if !errors.is_empty() {
                    warn!(errors = errors.len(), "content does not match");
                }
                Ok(self.finish(outcome(errors)))
            }
        }
    }
}

fn outcome(errors: Vec<StorageError>) -> VerifyOutcome {
    if errors.is_empty() {
        VerifyOutcome::Success
    } else {
        VerifyOutcome::Failure(errors)
    }
}

/// Size mismatch of a file whose bytes hashed correctly.
///
/// The reader fakes files that already have the wrong size, so this only
/// catches files that grew after the reader checked them.
pub(super) fn trailing_bytes(
    content: &ContentDescriptor,
    root: &Path,
    index: usize,
) -> Option<StorageError> {
    let path = content.fs_path(root, index);
    let expected = content.files()[index].size;
    let actual = fs::metadata(&path).ok()?.len();
    (actual != expected).then(|| StorageError::FileSize {
        path,
        actual: Some(actual),
        expected,
    })
}
