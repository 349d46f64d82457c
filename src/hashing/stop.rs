use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative stop signal checked by a pipeline stage.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Stop flags of every stage of one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    pub reader: StopFlag,
    pub workers: StopFlag,
    pub collector: StopFlag,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stops every stage.
    pub fn trigger(&self) {
        self.reader.stop();
        self.workers.stop();
        self.collector.stop();
    }

    pub fn is_triggered(&self) -> bool {
        self.reader.is_stopped() || self.workers.is_stopped() || self.collector.is_stopped()
    }
}
