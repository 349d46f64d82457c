use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

/// Bounded set of open read handles.
///
/// Once more than `max_open` files are open the oldest-opened handle is
/// closed. Handles are reused across piece reads.
#[derive(Debug)]
pub struct OpenFileCache {
    max_open: usize,
    handles: HashMap<PathBuf, File>,
    opened: VecDeque<PathBuf>,
}

impl OpenFileCache {
    pub fn new(max_open: usize) -> Self {
        Self {
            max_open: max_open.max(1),
            handles: HashMap::new(),
            opened: VecDeque::new(),
        }
    }

    /// Returns the cached handle for `path`, opening it if needed.
    pub fn get_or_open(&mut self, path: &Path) -> io::Result<&mut File> {
        if !self.handles.contains_key(path) {
            let file = File::open(path)?;
            tracing::trace!(path = %path.display(), "opened file handle");
            self.handles.insert(path.to_path_buf(), file);
            self.opened.push_back(path.to_path_buf());
            self.evict();
        }

        self.handles
            .get_mut(path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "file handle evicted"))
    }

    fn evict(&mut self) {
        while self.handles.len() > self.max_open {
            let Some(oldest) = self.opened.pop_front() else {
                break;
            };
            if self.handles.remove(&oldest).is_some() {
                tracing::trace!(path = %oldest.display(), "closed file handle");
            }
        }
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.handles.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Closes every cached handle.
    pub fn close_all(&mut self) {
        self.handles.clear();
        self.opened.clear();
    }
}
