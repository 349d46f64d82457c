use std::ops::ControlFlow;
use std::path::PathBuf;
use std::thread;

use crossbeam::channel;
use tracing::debug;

use super::collector::{Collected, Collector, Progress, SkipRequests};
use super::pool::HashWorkerPool;
use super::reader::Reader;
use super::stop::Shutdown;
use super::task::PieceResult;
use crate::config::PieceConfig;
use crate::storage::{PieceMapper, StorageError};

/// One reader, a pool of hash workers and one collector wired together.
///
/// All threads are scoped, so [`run`](Self::run) returns only after every
/// stage has exited.
pub struct Pipeline<'a> {
    mapper: &'a PieceMapper<'a>,
    root: PathBuf,
    config: &'a PieceConfig,
    shutdown: Shutdown,
}

impl<'a> Pipeline<'a> {
    pub fn new(mapper: &'a PieceMapper<'a>, root: PathBuf, config: &'a PieceConfig) -> Self {
        Self {
            mapper,
            root,
            config,
            shutdown: Shutdown::new(),
        }
    }

    /// Stop flags of this run, for wiring cancel hooks.
    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    /// Runs all stages, passing every result to `handler` on the collector thread.
    pub fn run<H>(self, handler: H) -> Result<Collected, StorageError>
    where
        H: FnMut(&PieceResult, Progress, &SkipRequests) -> Result<ControlFlow<()>, StorageError>
            + Send,
    {
        let Pipeline {
            mapper,
            root,
            config,
            shutdown,
        } = self;

        let pool = HashWorkerPool::new(config.worker_count());
        let (task_tx, task_rx) = channel::bounded(config.queue_capacity());
        let (result_tx, result_rx) = channel::unbounded();
        let (skip_tx, skip_rx) = if config.skip_on_error {
            let (tx, rx) = channel::unbounded();
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };
        debug!(
            workers = pool.workers(),
            queue = config.queue_capacity(),
            pieces = mapper.content().piece_count(),
            "starting hashing pipeline"
        );

        let spawn_error = |name: &str, err: std::io::Error| {
            shutdown.trigger();
            StorageError::Spawn {
                name: name.to_string(),
                kind: err.kind(),
            }
        };

        thread::scope(|scope| {
            let reader = Reader::new(mapper, root, task_tx, shutdown.reader.clone())
                .with_skip_requests(skip_rx);
            let reader_handle = thread::Builder::new()
                .name("piece-reader".into())
                .spawn_scoped(scope, move || reader.run())
                .map_err(|e| spawn_error("piece-reader", e))?;

            let worker_handles = pool
                .spawn(scope, task_rx, result_tx, shutdown.workers.clone())
                .inspect_err(|_| shutdown.trigger())?;

            let collector = Collector::new(
                result_rx,
                mapper.content().piece_count(),
                shutdown.clone(),
                SkipRequests::new(skip_tx),
            );
            let collector_handle = thread::Builder::new()
                .name("piece-collector".into())
                .spawn_scoped(scope, move || collector.run(handler))
                .map_err(|e| spawn_error("piece-collector", e))?;

            let collected = collector_handle.join();
            if collected.is_err() {
                shutdown.trigger();
            }
            let reader_joined = reader_handle.join();
            let workers_joined = worker_handles
                .into_iter()
                .map(|handle| handle.join())
                .all(|joined| joined.is_ok());
            debug!("hashing pipeline joined");

            let collected =
                collected.map_err(|_| StorageError::WorkerPanicked("piece-collector"))?;
            if reader_joined.is_err() {
                return Err(StorageError::WorkerPanicked("piece-reader"));
            }
            if !workers_joined {
                return Err(StorageError::WorkerPanicked("hasher"));
            }
            collected
        })
    }
}
