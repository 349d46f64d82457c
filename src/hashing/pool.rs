use std::thread::{self, Scope, ScopedJoinHandle};

use crossbeam::channel::{Receiver, Sender};
use tracing::{debug, trace};

use super::stop::StopFlag;
use super::task::{Payload, PieceResult, PieceTask};
use crate::metainfo::hash_piece;
use crate::storage::StorageError;

/// Fixed set of hash workers between the task and result queues.
#[derive(Debug, Clone, Copy)]
pub struct HashWorkerPool {
    workers: usize,
}

impl HashWorkerPool {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Starts the workers inside `scope`.
    ///
    /// Each worker owns clones of both queue ends; the result queue closes
    /// once the last worker exits.
    pub fn spawn<'scope, 'env>(
        &self,
        scope: &'scope Scope<'scope, 'env>,
        tasks: Receiver<PieceTask>,
        results: Sender<PieceResult>,
        stop: StopFlag,
    ) -> Result<Vec<ScopedJoinHandle<'scope, ()>>, StorageError> {
        let mut handles = Vec::with_capacity(self.workers);
        for id in 1..=self.workers {
            let name = format!("hasher-{id}");
            let tasks = tasks.clone();
            let results = results.clone();
            let stop = stop.clone();
            let handle = thread::Builder::new()
                .name(name.clone())
                .spawn_scoped(scope, move || hash_loop(&tasks, &results, &stop))
                .map_err(|e| StorageError::Spawn {
                    name,
                    kind: e.kind(),
                })?;
            handles.push(handle);
        }
        debug!(workers = self.workers, "hash workers started");
        Ok(handles)
    }
}

fn hash_loop(tasks: &Receiver<PieceTask>, results: &Sender<PieceResult>, stop: &StopFlag) {
    for task in tasks.iter() {
        if results.send(hash_task(task)).is_err() {
            debug!("result queue closed");
            break;
        }
        if stop.is_stopped() {
            debug!("hash worker stopped");
            break;
        }
    }
}

/// Hashes a task's payload. Error tasks are forwarded unchanged.
pub fn hash_task(task: PieceTask) -> PieceResult {
    let PieceTask {
        index,
        payload,
        path,
        error,
    } = task;

    let (digest, tainted) = match (&error, payload) {
        (Some(_), _) => (None, false),
        (None, Payload::Data(data)) => (Some(hash_piece(&data)), false),
        (None, Payload::Tainted(data)) => (Some(hash_piece(&data)), true),
        (None, Payload::Faked | Payload::Absent) => (None, false),
    };
    trace!(piece = index, hashed = digest.is_some(), "processed piece");

    PieceResult {
        index,
        digest,
        path,
        error,
        tainted,
    }
}
