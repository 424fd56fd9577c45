//! Errors of the worker lifecycle surface.
//!
//! Scheduling itself never fails; only spawning and tearing down the thread
//! that runs a context can.

use std::io;

/// Result alias for worker lifecycle operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure while starting or stopping a [`Worker`](crate::Worker).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The OS refused to create the worker thread.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] io::Error),
    /// The worker thread unwound instead of returning from its run loop.
    #[error("worker thread `{name}` panicked")]
    WorkerPanicked {
        /// Thread name from the worker's configuration.
        name: String,
    },
    /// The worker was already stopped and joined.
    #[error("worker already shut down")]
    AlreadyShutDown,
}
