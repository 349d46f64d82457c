//! Runtime configuration for generation and verification runs.

use std::time::Duration;

use crate::constants::{DEFAULT_MAX_OPEN_FILES, FALLBACK_WORKERS, QUEUE_SIZE_PER_WORKER};

/// Options shared by [`Generator`](crate::Generator) and
/// [`Verifier`](crate::Verifier).
///
/// # Examples
///
/// ```
/// use piecehash::PieceConfig;
/// use std::time::Duration;
///
/// let config = PieceConfig::default()
///     .with_threads(2)
///     .with_interval(Duration::from_millis(500))
///     .with_skip_on_error(true);
///
/// assert_eq!(config.worker_count(), 2);
/// assert_eq!(config.queue_capacity(), 6);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PieceConfig {
    /// Number of hash workers. Zero uses the available CPU count.
    pub threads: usize,
    /// Minimum time between two progress callbacks. Zero reports every piece.
    pub interval: Duration,
    /// Stop reading a file for real once it has produced an error.
    pub skip_on_error: bool,
    /// Accept a content root whose last component differs from the content name.
    pub allow_different_name: bool,
    /// Open-file cache bound for single-piece reads
    /// ([`Verifier::verify_sample`](crate::Verifier::verify_sample)).
    /// Pipeline runs keep at most one file open and ignore it.
    pub max_open_files: usize,
    /// Task queue slots per hash worker.
    pub queue_factor: usize,
}

impl Default for PieceConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            interval: Duration::ZERO,
            skip_on_error: false,
            allow_different_name: true,
            max_open_files: DEFAULT_MAX_OPEN_FILES,
            queue_factor: QUEUE_SIZE_PER_WORKER,
        }
    }
}

impl PieceConfig {
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_skip_on_error(mut self, skip: bool) -> Self {
        self.skip_on_error = skip;
        self
    }

    pub fn with_allow_different_name(mut self, allow: bool) -> Self {
        self.allow_different_name = allow;
        self
    }

    pub fn with_max_open_files(mut self, max: usize) -> Self {
        self.max_open_files = max;
        self
    }

    pub fn with_queue_factor(mut self, factor: usize) -> Self {
        self.queue_factor = factor;
        self
    }

    /// Resolves `threads`, falling back to the CPU count when it is zero.
    pub fn worker_count(&self) -> usize {
        if self.threads > 0 {
            return self.threads;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(FALLBACK_WORKERS)
    }

    /// Capacity of the bounded task queue between reader and workers.
    pub fn queue_capacity(&self) -> usize {
        self.worker_count() * self.queue_factor.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PieceConfig::default();
        assert_eq!(config.threads, 0);
        assert_eq!(config.interval, Duration::ZERO);
        assert!(!config.skip_on_error);
        assert!(config.allow_different_name);
        assert_eq!(config.max_open_files, DEFAULT_MAX_OPEN_FILES);
        assert!(config.worker_count() >= 1);
    }

    #[test]
    fn test_queue_capacity_scales_with_workers() {
        let config = PieceConfig::default().with_threads(5);
        assert_eq!(config.queue_capacity(), 15);

        let config = config.with_queue_factor(0);
        assert_eq!(config.queue_capacity(), 5);
    }
}
