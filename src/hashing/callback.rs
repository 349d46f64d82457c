use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::storage::StorageError;

/// Return type of user progress callbacks.
///
/// `Ok(ControlFlow::Break(()))` asks the run to stop. An `Err` aborts the run
/// and is returned to the caller as [`StorageError::Callback`].
pub type CallbackResult = Result<ControlFlow<()>, Box<dyn std::error::Error + Send + Sync>>;

type CancelHook = Box<dyn Fn() + Send>;

/// Interval-throttled wrapper around a progress callback.
///
/// The wrapped function runs on the first event, on every forced event
/// (errors and the final event) and otherwise at most once per interval.
/// A stop request or a failing callback runs every registered cancel hook.
pub struct CancellableCallback<F> {
    callback: F,
    interval: Duration,
    last_call: Option<Instant>,
    hooks: Vec<CancelHook>,
    cancelled: bool,
}

impl<F> CancellableCallback<F> {
    pub fn new(callback: F, interval: Duration) -> Self {
        Self {
            callback,
            interval,
            last_call: None,
            hooks: Vec::new(),
            cancelled: false,
        }
    }

    /// Registers a hook that runs when the callback cancels or fails.
    pub fn on_cancel(&mut self, hook: impl Fn() + Send + 'static) {
        self.hooks.push(Box::new(hook));
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Delivers `event` if it is due.
    ///
    /// Returns `Ok(true)` when the callback requested cancellation.
    pub fn call<E>(&mut self, event: &E, force: bool) -> Result<bool, StorageError>
    where
        F: FnMut(&E) -> CallbackResult,
    {
        let due = match self.last_call {
            None => true,
            Some(last) => force || last.elapsed() >= self.interval,
        };
        if !due {
            return Ok(false);
        }

        self.last_call = Some(Instant::now());
        match (self.callback)(event) {
            Ok(ControlFlow::Continue(())) => Ok(false),
            Ok(ControlFlow::Break(())) => {
                tracing::debug!("progress callback requested cancellation");
                self.cancel();
                Ok(true)
            }
            Err(e) => {
                tracing::warn!(error = %e, "progress callback failed");
                self.cancel();
                Err(StorageError::Callback(Arc::from(e)))
            }
        }
    }

    fn cancel(&mut self) {
        self.cancelled = true;
        for hook in &self.hooks {
            hook();
        }
    }
}

impl<F> std::fmt::Debug for CancellableCallback<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellableCallback")
            .field("interval", &self.interval)
            .field("last_call", &self.last_call)
            .field("hooks", &self.hooks.len())
            .field("cancelled", &self.cancelled)
            .finish()
    }
}
