//! Concurrent piece hashing.
//!
//! A single [`Reader`] walks the files in order and sends piece-aligned
//! [`PieceTask`]s through a bounded queue to a [`HashWorkerPool`]. Workers
//! hash payloads in parallel and send [`PieceResult`]s through an unbounded
//! queue to one [`Collector`], which counts distinct pieces, buffers digests
//! and drives the progress callback.
//!
//! ```text
//! Reader --bounded--> hasher-1..N --unbounded--> Collector
//!   ^                                               |
//!   +------------------ skip requests --------------+
//! ```
//!
//! The bounded queue is the only flow control. A closed queue unblocks every
//! sender and receiver. A failing or cancelled stage sets every
//! [`StopFlag`] of the run.

mod callback;
mod collector;
mod pipeline;
mod pool;
mod reader;
mod stop;
mod task;

pub use callback::{CallbackResult, CancellableCallback};
pub use collector::{Collected, Collector, Progress, SkipRequests};
pub use pipeline::Pipeline;
pub use pool::{hash_task, HashWorkerPool};
pub use reader::Reader;
pub use stop::{Shutdown, StopFlag};
pub use task::{Payload, PieceResult, PieceTask};
