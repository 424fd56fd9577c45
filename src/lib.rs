#![forbid(unsafe_op_in_unsafe_fn)]
#![deny(missing_docs)]

//! Thread-affine task scheduling: hop a suspended computation onto the thread
//! that owns a context, with a synchronous fast path when already there.
//!
//! - [`queue`]: intrusive lock-free MPSC queue, drained in FIFO batches.
//! - [`WorkerContext`] / [`Worker`]: one dedicated thread draining a queue,
//!   idling on a condvar.
//! - [`Scheduler::schedule`]: the awaiter that moves the rest of an `async`
//!   computation onto a context's thread.
//! - [`UiContext`]: the same contract delivered through a UI event loop.
//! - [`Task`]: detached computations that resume wherever they are woken.
//!
//! Posting never allocates: the queue node lives inside the awaiting future.

mod config;
mod context;
mod error;
mod handle;
pub mod queue;
mod schedule;
mod task;
pub mod ui;
/// Thread identity, pinning and wait helpers.
pub mod util;

pub use config::{ShutdownPolicy, WorkerConfig};
pub use context::{Worker, WorkerContext};
pub use error::{Error, Result};
pub use handle::{ResumableHandle, unresumed_drops};
pub use schedule::{Schedule, ScheduleState, Scheduler};
pub use task::Task;
pub use ui::{EventLoop, UiContext, UiMessage};
pub use util::PinConfig;

/// Common imports.
pub mod prelude {
    pub use crate::{
        EventLoop, PinConfig, Schedule, Scheduler, ShutdownPolicy, Task, UiContext, UiMessage,
        Worker, WorkerConfig, WorkerContext,
    };
}
