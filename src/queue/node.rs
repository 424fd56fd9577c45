use core::cell::UnsafeCell;
use core::fmt;
use core::marker::PhantomPinned;
use core::ptr;
use core::sync::atomic::{AtomicBool, AtomicPtr, Ordering};

use crate::handle::ResumableHandle;

/// Intrusive queue element pairing a [`ResumableHandle`] with an atomic link.
///
/// A node is owned by whoever created it, normally the frame of a suspended
/// computation, and is only ever borrowed by a [`Queue`](super::Queue). It is
/// `!Unpin`: once posted its address must stay put until a consumer claims it.
pub struct TaskNode {
    pub(super) next: AtomicPtr<TaskNode>,
    queued: AtomicBool,
    ready: bool,
    handle: UnsafeCell<Option<ResumableHandle>>,
    _pinned: PhantomPinned,
}

// SAFETY: the handle slot is written only by the owner while the node is not
// queued, and taken only by the single consumer that claimed it from a queue.
// The Release CAS in `Queue::post` and the Acquire swap in `Queue::acquire`
// order those two accesses.
unsafe impl Sync for TaskNode {}

impl TaskNode {
    /// Create an unlinked node; `ready` records whether the creator was
    /// already on the target thread and can skip queuing altogether.
    pub const fn new(ready: bool) -> Self {
        Self {
            next: AtomicPtr::new(ptr::null_mut()),
            queued: AtomicBool::new(false),
            ready,
            handle: UnsafeCell::new(None),
            _pinned: PhantomPinned,
        }
    }

    /// Whether the node may continue without being queued.
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Whether the node sits in a queue and has not been claimed yet.
    #[inline]
    pub fn is_queued(&self) -> bool {
        self.queued.load(Ordering::Acquire)
    }

    /// Store the continuation to run when the node is claimed.
    ///
    /// # Safety
    ///
    /// The node must not be queued, and no other thread may access it
    /// concurrently.
    #[inline]
    pub unsafe fn arm(&self, handle: ResumableHandle) {
        debug_assert!(!self.is_queued(), "arming a queued TaskNode");
        // SAFETY: not queued, so the caller has exclusive access to the slot.
        unsafe { *self.handle.get() = Some(handle) };
    }

    /// # Safety
    ///
    /// Same exclusivity requirement as [`arm`](Self::arm).
    #[inline]
    pub(super) unsafe fn is_armed(&self) -> bool {
        // SAFETY: forwarded to the caller.
        unsafe { (*self.handle.get()).is_some() }
    }

    /// Mark `node` as queued before it is linked.
    #[inline]
    pub(super) fn enqueue(&self) {
        let was_queued = self.queued.swap(true, Ordering::Relaxed);
        debug_assert!(!was_queued, "TaskNode posted while already queued");
    }

    /// Take the handle out of a node that was removed from a queue and hand
    /// the node back to its owner.
    ///
    /// # Safety
    ///
    /// `node` must have been claimed by the calling consumer and still be
    /// live. After this returns the owner may free the node at any moment, so
    /// the caller must have read `next` beforehand and must not touch `node`
    /// again.
    #[inline]
    pub(super) unsafe fn claim(node: *const TaskNode) -> Option<ResumableHandle> {
        // SAFETY: forwarded to the caller; the slot is ours until `queued`
        // is cleared below.
        unsafe {
            let handle = (*(*node).handle.get()).take();
            (*node).queued.store(false, Ordering::Release);
            handle
        }
    }
}

impl Default for TaskNode {
    fn default() -> Self {
        Self::new(false)
    }
}

impl Drop for TaskNode {
    fn drop(&mut self) {
        if *self.queued.get_mut() {
            // A queue still points at this storage; continuing would hand a
            // dangling node to the consumer.
            tracing::error!("TaskNode dropped while still queued; aborting");
            std::process::abort();
        }
    }
}

impl fmt::Debug for TaskNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskNode")
            .field("ready", &self.ready)
            .field("queued", &self.is_queued())
            .finish_non_exhaustive()
    }
}
