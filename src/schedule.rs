//! Thread-affine scheduling: "run the rest of this computation on thread X".
//!
//! [`Scheduler`] is implemented by every context that owns a thread. Awaiting
//! [`Scheduler::schedule`] either continues immediately, when the caller is
//! already on that thread, or parks the computation in the context's queue
//! until the owning thread resumes it.

use core::fmt;
use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll};

use crate::handle::ResumableHandle;
use crate::queue::TaskNode;

/// A context that resumes queued computations on the thread it owns.
pub trait Scheduler {
    /// Whether the calling thread is the one this context resumes on.
    fn is_current(&self) -> bool;

    /// Queue an armed node for resumption on the owning thread.
    ///
    /// # Safety
    ///
    /// Same contract as [`Queue::post`](crate::queue::Queue::post): the node
    /// must be armed, not already queued, and must stay alive at the same
    /// address until the context claims it.
    unsafe fn post(&self, node: Pin<&TaskNode>);

    /// Awaiter that hops onto this context, skipping the queue when the
    /// caller is already on the owning thread.
    ///
    /// The thread check happens here, so create the awaiter on the thread
    /// that awaits it.
    fn schedule(&self) -> Schedule<'_, Self>
    where
        Self: Sized,
    {
        Schedule::new(self, false)
    }

    /// Awaiter that always goes through the queue, even from the owning
    /// thread. Useful to yield to other queued work.
    fn schedule_post(&self) -> Schedule<'_, Self>
    where
        Self: Sized,
    {
        Schedule::new(self, true)
    }
}

/// Lifecycle of a single [`Schedule`] awaiter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScheduleState {
    /// Not polled yet.
    Created,
    /// Already on the target thread; continued without queuing.
    ReadyImmediate,
    /// Posted to the context and waiting for the owning thread.
    Queued,
    /// Resumed by the owning thread.
    Resumed,
}

/// Future returned by [`Scheduler::schedule`]; embeds its own queue node.
///
/// Once queued, it completes only when polled on the owning thread.
#[must_use = "futures do nothing unless awaited"]
pub struct Schedule<'a, S: Scheduler> {
    scheduler: &'a S,
    node: TaskNode,
    state: ScheduleState,
}

impl<'a, S: Scheduler> Schedule<'a, S> {
    /// Build an awaiter for `scheduler`; `force_post` disables the
    /// same-thread fast path.
    pub fn new(scheduler: &'a S, force_post: bool) -> Self {
        let ready = !force_post && scheduler.is_current();
        Self {
            scheduler,
            node: TaskNode::new(ready),
            state: ScheduleState::Created,
        }
    }

    /// The readiness check: `true` means "continue without suspending".
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.node.is_ready()
    }

    /// Where this awaiter is in its lifecycle.
    #[inline]
    pub fn state(&self) -> ScheduleState {
        self.state
    }
}

impl<S: Scheduler> Future for Schedule<'_, S> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        // SAFETY: `node` is never moved out of `self`; only `state` is
        // written through this reference.
        let this = unsafe { self.get_unchecked_mut() };
        match this.state {
            ScheduleState::Created if this.node.is_ready() => {
                this.state = ScheduleState::ReadyImmediate;
                Poll::Ready(())
            }
            ScheduleState::Created => {
                this.state = ScheduleState::Queued;
                // SAFETY: the node is unqueued and only this frame sees it.
                unsafe { this.node.arm(ResumableHandle::from_suspended(cx.waker())) };
                // SAFETY: `this` is pinned, so is the node embedded in it, and
                // the node's drop aborts rather than free it while queued.
                let node = unsafe { Pin::new_unchecked(&this.node) };
                // SAFETY: see above; once posted the node is not touched
                // here until the owner claims it.
                unsafe { this.scheduler.post(node) };
                Poll::Pending
            }
            // Claimed but polled elsewhere: the owner's resume polls again
            // on the right thread.
            ScheduleState::Queued if this.node.is_queued() || !this.scheduler.is_current() => {
                Poll::Pending
            }
            ScheduleState::Queued => {
                this.state = ScheduleState::Resumed;
                Poll::Ready(())
            }
            ScheduleState::ReadyImmediate | ScheduleState::Resumed => Poll::Ready(()),
        }
    }
}

impl<S: Scheduler> fmt::Debug for Schedule<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schedule")
            .field("state", &self.state)
            .field("ready", &self.node.is_ready())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::Queue;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::task::{Wake, Waker};

    struct Inline {
        queue: Queue,
        current: AtomicBool,
    }

    impl Scheduler for Inline {
        fn is_current(&self) -> bool {
            self.current.load(Ordering::SeqCst)
        }

        unsafe fn post(&self, node: Pin<&TaskNode>) {
            // SAFETY: forwarded.
            unsafe { self.queue.post(node) };
        }
    }

    struct Noop;

    impl Wake for Noop {
        fn wake(self: Arc<Self>) {}
    }

    fn inline(current: bool) -> Inline {
        Inline {
            queue: Queue::new(),
            current: AtomicBool::new(current),
        }
    }

    #[test]
    fn fast_path_never_touches_the_queue() {
        let sched = inline(true);
        let mut fut = Box::pin(sched.schedule());
        assert!(fut.is_ready());
        let waker = Waker::from(Arc::new(Noop));
        let mut cx = Context::from_waker(&waker);
        assert_eq!(fut.as_mut().poll(&mut cx), Poll::Ready(()));
        assert_eq!(fut.state(), ScheduleState::ReadyImmediate);
        assert!(sched.queue.is_empty());
    }

    #[test]
    fn forced_post_queues_even_on_the_owning_thread() {
        let sched = inline(true);
        let mut fut = Box::pin(sched.schedule_post());
        assert!(!fut.is_ready());
        let waker = Waker::from(Arc::new(Noop));
        let mut cx = Context::from_waker(&waker);

        assert_eq!(fut.as_mut().poll(&mut cx), Poll::Pending);
        assert_eq!(fut.state(), ScheduleState::Queued);
        // Spurious poll while still queued stays pending.
        assert_eq!(fut.as_mut().poll(&mut cx), Poll::Pending);

        assert_eq!(sched.queue.acquire().resume_all(), 1);
        assert_eq!(fut.as_mut().poll(&mut cx), Poll::Ready(()));
        assert_eq!(fut.state(), ScheduleState::Resumed);
    }

    #[test]
    fn off_thread_awaiter_suspends() {
        let sched = inline(false);
        let mut fut = Box::pin(sched.schedule());
        assert_eq!(fut.state(), ScheduleState::Created);
        let waker = Waker::from(Arc::new(Noop));
        let mut cx = Context::from_waker(&waker);
        assert_eq!(fut.as_mut().poll(&mut cx), Poll::Pending);
        assert!(!sched.queue.is_empty());
        // Resumed from the owning thread.
        assert_eq!(sched.queue.acquire().resume_all(), 1);
        sched.current.store(true, Ordering::SeqCst);
        assert_eq!(fut.as_mut().poll(&mut cx), Poll::Ready(()));
    }

    #[test]
    fn claimed_node_does_not_complete_off_the_owning_thread() {
        let sched = inline(false);
        let mut fut = Box::pin(sched.schedule());
        let waker = Waker::from(Arc::new(Noop));
        let mut cx = Context::from_waker(&waker);
        assert_eq!(fut.as_mut().poll(&mut cx), Poll::Pending);

        // Claimed by the consumer but not resumed yet.
        let mut chain = sched.queue.acquire();
        let handle = chain.next().unwrap();
        assert!(!fut.node.is_queued());
        assert_eq!(fut.as_mut().poll(&mut cx), Poll::Pending);
        assert_eq!(fut.state(), ScheduleState::Queued);

        sched.current.store(true, Ordering::SeqCst);
        handle.resume();
        assert_eq!(fut.as_mut().poll(&mut cx), Poll::Ready(()));
        assert_eq!(fut.state(), ScheduleState::Resumed);
    }
}
