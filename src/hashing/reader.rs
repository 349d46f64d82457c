use std::collections::{BTreeSet, HashSet};
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::mem;
use std::path::{Path, PathBuf};

use bytes::BytesMut;
use crossbeam::channel::{Receiver, Sender};
use tracing::{debug, trace, warn};

use super::stop::StopFlag;
use super::task::PieceTask;
use crate::storage::{PieceMapper, StorageError};

/// How a single file is consumed, decided once before its first chunk.
#[derive(Debug)]
enum FilePlan {
    /// Read the file from disk.
    RealRead(File),
    /// The file is missing or unreadable.
    FakedMissing(StorageError),
    /// The file exists with the wrong size.
    FakedSizeMismatch(StorageError),
    /// The file was marked bad. Only pieces shared with other files are read.
    FakedSkipped(Option<File>),
}

impl FilePlan {
    fn error(&self) -> Option<&StorageError> {
        match self {
            FilePlan::FakedMissing(err) | FilePlan::FakedSizeMismatch(err) => Some(err),
            FilePlan::RealRead(_) | FilePlan::FakedSkipped(_) => None,
        }
    }
}

/// Bytes collected for one piece, possibly across several files.
#[derive(Debug)]
struct PieceBuffer {
    index: u32,
    end: u64,
    data: BytesMut,
    real: u64,
    fake: u64,
    error: Option<StorageError>,
}

impl PieceBuffer {
    fn read_from(&mut self, file: &mut File, offset: u64, len: u64) -> io::Result<()> {
        let at = self.data.len();
        self.data.resize(at + len as usize, 0);
        let result = file
            .seek(SeekFrom::Start(offset))
            .and_then(|_| file.read_exact(&mut self.data[at..]));
        match result {
            Ok(()) => {
                self.real += len;
                Ok(())
            }
            Err(e) => {
                self.data.truncate(at);
                Err(e)
            }
        }
    }

    fn push_fake(&mut self, len: u64, error: Option<&StorageError>) {
        let at = self.data.len();
        self.data.resize(at + len as usize, 0);
        self.fake += len;
        if self.error.is_none() {
            self.error = error.cloned();
        }
    }
}

/// Sequential producer of piece tasks.
///
/// Walks the files in order and sends one task per piece. Files that are
/// missing or have the wrong size are replaced by placeholder bytes so the
/// offsets of later files stay correct. Consuming `run` makes a reader
/// single-use; dropping it closes the task queue.
pub struct Reader<'a> {
    mapper: &'a PieceMapper<'a>,
    root: PathBuf,
    tasks: Sender<PieceTask>,
    stop: StopFlag,
    skip_requests: Option<Receiver<usize>>,
    skipped: HashSet<usize>,
    do_not_skip: BTreeSet<u32>,
    reported: HashSet<u32>,
}

impl<'a> Reader<'a> {
    /// `root` is the resolved content location.
    pub fn new(
        mapper: &'a PieceMapper<'a>,
        root: PathBuf,
        tasks: Sender<PieceTask>,
        stop: StopFlag,
    ) -> Self {
        Self {
            mapper,
            root,
            tasks,
            stop,
            skip_requests: None,
            skipped: HashSet::new(),
            do_not_skip: BTreeSet::new(),
            reported: HashSet::new(),
        }
    }

    /// Enables skip-on-error: file indexes received on `requests` are no
    /// longer read, apart from pieces they share with other files.
    pub fn with_skip_requests(mut self, requests: Option<Receiver<usize>>) -> Self {
        self.skip_requests = requests;
        self
    }

    fn skip_on_error(&self) -> bool {
        self.skip_requests.is_some()
    }

    /// Reads every file and sends its pieces until done or stopped.
    pub fn run(mut self) {
        let content = self.mapper.content();
        debug!(
            files = content.files().len(),
            pieces = content.piece_count(),
            skip_on_error = self.skip_on_error(),
            "reader started"
        );

        let mut piece = self.piece_buffer(0);
        let mut pos = 0u64;
        for (index, entry) in content.files().iter().enumerate() {
            if self.stop.is_stopped() {
                debug!(piece = piece.index, "reader stopped between files");
                return;
            }

            self.poll_skip_requests();
            let path = content.fs_path(&self.root, index);
            let mut plan = self.plan(index, &path, entry.size);
            if let Some(err) = plan.error() {
                warn!(path = %path.display(), error = %err, "faking unusable file");
                let err = err.clone();
                if !self.report(pos, &path, err) {
                    return;
                }
            }
            // Empty files own no bytes, only their error is reported.
            if entry.size == 0 {
                continue;
            }
            if matches!(plan, FilePlan::FakedSkipped(_)) {
                self.protect_shared_pieces(index);
            }

            let file_start = pos;
            let file_end = pos + entry.size;
            while pos < file_end {
                if self.stop.is_stopped() {
                    debug!(piece = piece.index, "reader stopped");
                    return;
                }
                if self.poll_skip_requests() && self.skipped.contains(&index) {
                    plan = match plan {
                        FilePlan::RealRead(file) => {
                            debug!(path = %path.display(), "skipping rest of file");
                            self.protect_shared_pieces(index);
                            FilePlan::FakedSkipped(Some(file))
                        }
                        other => other,
                    };
                }

                let segment_end = file_end.min(piece.end);
                let len = segment_end - pos;
                let offset = pos - file_start;
                let failure = match &mut plan {
                    FilePlan::RealRead(file) => match piece.read_from(file, offset, len) {
                        Ok(()) => None,
                        Err(e) => Some(StorageError::read(&path, &e)),
                    },
                    FilePlan::FakedSkipped(Some(file)) if self.do_not_skip.contains(&piece.index) => {
                        if piece.read_from(file, offset, len).is_err() {
                            piece.push_fake(len, None);
                        }
                        None
                    }
                    FilePlan::FakedSkipped(_) => {
                        piece.push_fake(len, None);
                        None
                    }
                    FilePlan::FakedMissing(err) | FilePlan::FakedSizeMismatch(err) => {
                        piece.push_fake(len, Some(&*err));
                        None
                    }
                };

                if let Some(err) = failure {
                    warn!(path = %path.display(), error = %err, "read failed, faking rest of file");
                    piece.push_fake(len, Some(&err));
                    if !self.report(pos, &path, err.clone()) {
                        return;
                    }
                    plan = FilePlan::FakedMissing(err);
                }

                pos = segment_end;
                if pos == piece.end {
                    let next = self.piece_buffer(piece.index + 1);
                    let done = mem::replace(&mut piece, next);
                    if !self.finish(done, &path) {
                        return;
                    }
                }
            }
        }

        debug!(bytes = pos, "reader finished");
    }

    fn plan(&self, index: usize, path: &Path, expected: u64) -> FilePlan {
        if self.skipped.contains(&index) {
            return FilePlan::FakedSkipped(File::open(path).ok());
        }

        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) => return FilePlan::FakedMissing(StorageError::from_metadata(path, &e)),
        };
        if metadata.is_dir() {
            return FilePlan::FakedMissing(StorageError::IsDirectory {
                path: path.to_path_buf(),
            });
        }
        if metadata.len() != expected {
            return FilePlan::FakedSizeMismatch(StorageError::FileSize {
                path: path.to_path_buf(),
                actual: Some(metadata.len()),
                expected,
            });
        }

        match File::open(path) {
            Ok(file) => FilePlan::RealRead(file),
            Err(e) => FilePlan::FakedMissing(StorageError::read(path, &e)),
        }
    }

    /// Marks the boundary pieces a skipped file shares with other files.
    fn protect_shared_pieces(&mut self, index: usize) {
        let Some(range) = self.mapper.piece_range(index) else {
            return;
        };
        for piece in [*range.start(), *range.end()] {
            let shared = self
                .mapper
                .file_indexes_at_piece(piece)
                .map(|files| files != [index])
                .unwrap_or(false);
            if shared && self.do_not_skip.insert(piece) {
                trace!(piece, "piece shared with another file, reading it anyway");
            }
        }
    }

    /// Collects pending skip requests. Returns true if any arrived.
    fn poll_skip_requests(&mut self) -> bool {
        let Some(requests) = &self.skip_requests else {
            return false;
        };
        let mut changed = false;
        for index in requests.try_iter() {
            if self.skipped.insert(index) {
                debug!(file = index, "file marked for skipping");
                changed = true;
            }
        }
        changed
    }

    fn piece_buffer(&self, index: u32) -> PieceBuffer {
        let content = self.mapper.content();
        let start = u64::from(index) * content.piece_size();
        let end = (start + content.piece_size()).min(content.total_size());
        PieceBuffer {
            index,
            end,
            data: BytesMut::with_capacity(end.saturating_sub(start) as usize),
            real: 0,
            fake: 0,
            error: None,
        }
    }

    /// Sends an error task for the piece holding stream byte `pos`.
    fn report(&mut self, pos: u64, path: &Path, err: StorageError) -> bool {
        let content = self.mapper.content();
        let index = u32::try_from(pos / content.piece_size())
            .unwrap_or(u32::MAX)
            .min(content.max_piece_index());
        self.reported.insert(index);
        self.send(PieceTask::failed(index, path.to_path_buf(), err))
    }

    fn finish(&mut self, piece: PieceBuffer, path: &Path) -> bool {
        let PieceBuffer {
            index,
            data,
            real,
            fake,
            error,
            ..
        } = piece;
        let path = path.to_path_buf();

        let task = if fake == 0 {
            PieceTask::data(index, data.freeze(), path)
        } else if real > 0 {
            trace!(piece = index, real, fake, "piece mixes real and placeholder bytes");
            PieceTask::tainted(index, data.freeze(), path)
        } else if self.reported.contains(&index) {
            return true;
        } else {
            match error {
                Some(err) if !self.skip_on_error() => PieceTask::failed(index, path, err),
                _ => PieceTask::faked(index, path),
            }
        };
        self.send(task)
    }

    fn send(&self, task: PieceTask) -> bool {
        trace!(piece = task.index, "sending piece");
        if self.tasks.send(task).is_err() {
            debug!("task queue closed");
            return false;
        }
        true
    }
}
