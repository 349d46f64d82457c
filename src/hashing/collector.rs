use std::collections::HashSet;
use std::ops::ControlFlow;

use crossbeam::channel::{Receiver, Sender};
use tracing::debug;

use super::stop::Shutdown;
use super::task::PieceResult;
use crate::metainfo::PieceDigest;
use crate::storage::StorageError;

/// Progress counters at the time a result is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Distinct piece indexes seen so far.
    pub pieces_done: u32,
    pub pieces_total: u32,
}

impl Progress {
    pub fn is_complete(&self) -> bool {
        self.pieces_done >= self.pieces_total
    }
}

/// Channel back to the reader for files that should no longer be read.
#[derive(Debug, Clone, Default)]
pub struct SkipRequests {
    tx: Option<Sender<usize>>,
}

impl SkipRequests {
    pub fn new(tx: Option<Sender<usize>>) -> Self {
        Self { tx }
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Asks the reader to skip the file at `file_index`.
    pub fn request(&self, file_index: usize) {
        if let Some(tx) = &self.tx {
            // The reader may already be done.
            let _ = tx.send(file_index);
        }
    }
}

/// How a collector run ended.
#[derive(Debug)]
pub enum Collected {
    /// Every result was consumed. Digests are in arrival order.
    Finished(Vec<(u32, PieceDigest)>),
    /// The handler or another stage stopped the run.
    Cancelled,
}

/// Single consumer of hash results.
#[derive(Debug)]
pub struct Collector {
    results: Receiver<PieceResult>,
    pieces_total: u32,
    shutdown: Shutdown,
    skips: SkipRequests,
}

impl Collector {
    pub fn new(
        results: Receiver<PieceResult>,
        pieces_total: u32,
        shutdown: Shutdown,
        skips: SkipRequests,
    ) -> Self {
        Self {
            results,
            pieces_total,
            shutdown,
            skips,
        }
    }

    /// Feeds every result to `handler` until the queue closes.
    ///
    /// A handler error or break stops every stage.
    pub fn run<H>(self, mut handler: H) -> Result<Collected, StorageError>
    where
        H: FnMut(&PieceResult, Progress, &SkipRequests) -> Result<ControlFlow<()>, StorageError>,
    {
        let mut seen = HashSet::new();
        let mut digests = Vec::new();

        for result in self.results.iter() {
            seen.insert(result.index);
            if let (Some(digest), false) = (result.digest, result.tainted) {
                digests.push((result.index, digest));
            }

            let progress = Progress {
                pieces_done: u32::try_from(seen.len()).unwrap_or(u32::MAX),
                pieces_total: self.pieces_total,
            };
            match handler(&result, progress, &self.skips) {
                Ok(ControlFlow::Continue(())) => {}
                Ok(ControlFlow::Break(())) => {
                    debug!(pieces_done = progress.pieces_done, "collector cancelled");
                    self.shutdown.trigger();
                    return Ok(Collected::Cancelled);
                }
                Err(e) => {
                    debug!(piece = result.index, error = %e, "collector aborted");
                    self.shutdown.trigger();
                    return Err(e);
                }
            }

            if self.shutdown.collector.is_stopped() {
                debug!("collector stopped");
                return Ok(Collected::Cancelled);
            }
        }

        debug!(pieces = seen.len(), digests = digests.len(), "collector finished");
        Ok(Collected::Finished(digests))
    }
}
