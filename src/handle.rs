//! `ResumableHandle`: the "resume me" capability of a suspended computation.
//!
//! A handle wraps the [`Waker`] of the task that suspended. Resuming consumes
//! the handle, so a second resume does not type-check. Dropping a handle that
//! was never resumed abandons the continuation; that case is reported through
//! `tracing` and counted so tests can detect it.

use core::fmt;
use core::sync::atomic::{AtomicUsize, Ordering};
use std::task::Waker;

static UNRESUMED_DROPS: AtomicUsize = AtomicUsize::new(0);

/// Opaque, move-only capability to continue a suspended computation once.
pub struct ResumableHandle {
    waker: Option<Waker>,
}

impl ResumableHandle {
    /// Capture the remainder of the computation that owns `waker`.
    #[inline]
    pub fn from_suspended(waker: &Waker) -> Self {
        Self {
            waker: Some(waker.clone()),
        }
    }

    /// Continue the suspended computation on the calling thread.
    #[inline]
    pub fn resume(mut self) {
        if let Some(waker) = self.waker.take() {
            waker.wake();
        }
    }

    /// Release the computation without resuming it.
    ///
    /// Used by shutdown paths that deliberately cancel queued work.
    #[inline]
    pub fn cancel(mut self) {
        self.waker.take();
    }

    /// Whether `other` would resume the same computation.
    #[inline]
    pub fn will_resume(&self, other: &Waker) -> bool {
        self.waker.as_ref().is_some_and(|w| w.will_wake(other))
    }
}

impl Drop for ResumableHandle {
    fn drop(&mut self) {
        if self.waker.is_some() {
            UNRESUMED_DROPS.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("resumable handle dropped without being resumed");
        }
    }
}

impl fmt::Debug for ResumableHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResumableHandle")
            .field("armed", &self.waker.is_some())
            .finish()
    }
}

/// Number of handles dropped without a resume or explicit cancel, process-wide.
pub fn unresumed_drops() -> usize {
    UNRESUMED_DROPS.load(Ordering::Relaxed)
}
