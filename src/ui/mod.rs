//! Resuming computations on a UI thread through its native event loop.
//!
//! A UI thread must keep pumping messages, so it cannot sleep on a condvar
//! like a [`WorkerContext`](crate::WorkerContext). [`UiContext`] keeps the same
//! lock-free queue but replaces the wakeup: a post onto an empty queue sends a
//! [`UiMessage::Resume`] to the event loop, and the loop's message handler
//! drains the queue on the UI thread. A second message, [`UiMessage::Create`],
//! runs a one-time bootstrap once the surface exists, which decouples creating
//! the surface from the first computation that runs on it.

mod message;
#[cfg(windows)]
mod win32;

pub use message::{USER_BASE, UiMessage};
#[cfg(windows)]
pub use win32::Win32Window;

use core::fmt;
use core::future::Future;
use core::pin::Pin;
use core::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::queue::{Queue, TaskNode};
use crate::schedule::Scheduler;
use crate::task::Task;

/// Host primitives a UI event loop provides to the scheduler.
pub trait EventLoop: Send + Sync {
    /// Whether the calling thread owns the event loop's surface.
    fn is_owner_thread(&self) -> bool;

    /// Post `message` to the event loop without waiting for it to be handled.
    /// Returns `false` if the host could not queue it.
    fn post_message(&self, message: UiMessage) -> bool;
}

type Bootstrap = Box<dyn FnOnce() + Send + 'static>;

/// Scheduler whose resumptions are delivered by a UI event loop.
pub struct UiContext<L: EventLoop> {
    queue: Queue,
    event_loop: L,
    bootstrap: Mutex<Option<Bootstrap>>,
    // The last resume message was rejected; the next post must send one.
    resend: AtomicBool,
}

impl<L: EventLoop> UiContext<L> {
    /// Wrap the event loop of a UI thread.
    pub fn new(event_loop: L) -> Self {
        Self {
            queue: Queue::new(),
            event_loop,
            bootstrap: Mutex::new(None),
            resend: AtomicBool::new(false),
        }
    }

    /// The wrapped event loop.
    #[inline]
    pub fn event_loop(&self) -> &L {
        &self.event_loop
    }

    /// Register `bootstrap` to run on the UI thread when the create message
    /// arrives, and post that message. Returns whether the post succeeded.
    pub fn on_create<F>(&self, bootstrap: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        if self.bootstrap.lock().replace(Box::new(bootstrap)).is_some() {
            tracing::warn!("replaced a UI bootstrap that never ran");
        }
        let posted = self.event_loop.post_message(UiMessage::Create);
        if !posted {
            tracing::error!("event loop rejected the create message");
        }
        posted
    }

    /// [`on_create`](Self::on_create) that starts a detached task.
    pub fn on_create_task<F>(&self, future: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.on_create(move || Task::detach(future))
    }

    /// Window-procedure hook: handle `raw` if it is one of ours.
    ///
    /// Must be called on the UI thread. Returns `false` for foreign messages
    /// so the host can process them itself.
    pub fn handle_message(&self, raw: u32) -> bool {
        match UiMessage::from_raw(raw) {
            Some(UiMessage::Create) => {
                self.run_bootstrap();
                true
            }
            Some(UiMessage::Resume) => {
                self.process();
                true
            }
            None => false,
        }
    }

    /// Resume everything queued so far on the calling (UI) thread.
    pub fn process(&self) -> usize {
        debug_assert!(
            self.event_loop.is_owner_thread(),
            "UiContext drained off its UI thread"
        );
        let resumed = self.queue.acquire().resume_all();
        if resumed > 0 {
            tracing::trace!(resumed, "resumed on UI thread");
        }
        resumed
    }

    fn run_bootstrap(&self) {
        let bootstrap = self.bootstrap.lock().take();
        match bootstrap {
            Some(bootstrap) => bootstrap(),
            None => tracing::debug!("create message without a pending bootstrap"),
        }
    }
}

impl<L: EventLoop> Scheduler for UiContext<L> {
    fn is_current(&self) -> bool {
        self.event_loop.is_owner_thread()
    }

    unsafe fn post(&self, node: Pin<&TaskNode>) {
        // SAFETY: forwarded to the caller.
        let was_empty = unsafe { self.queue.post(node) };
        // A non-empty queue already has a resume message in flight, unless
        // the host rejected it.
        let resend = self.resend.swap(false, Ordering::AcqRel);
        if (was_empty || resend) && !self.event_loop.post_message(UiMessage::Resume) {
            self.resend.store(true, Ordering::Release);
            tracing::error!("event loop rejected a resume message; the next post retries");
        }
    }
}

impl<L: EventLoop> Drop for UiContext<L> {
    fn drop(&mut self) {
        let cancelled = self.queue.acquire().cancel_all();
        if cancelled > 0 {
            tracing::warn!(cancelled, "UI context dropped with queued computations");
        }
    }
}

impl<L: EventLoop + fmt::Debug> fmt::Debug for UiContext<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UiContext")
            .field("event_loop", &self.event_loop)
            .field("queue", &self.queue)
            .field("bootstrap_pending", &self.bootstrap.lock().is_some())
            .finish()
    }
}
