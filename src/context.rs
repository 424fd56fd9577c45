//! Worker contexts: a lock-free inbound queue drained by one dedicated thread.
//!
//! [`WorkerContext::run`] is the whole body of the worker thread. It claims
//! the pending chain, resumes every node in submission order, and sleeps on a
//! condition variable when the queue is empty. The mutex next to that condvar
//! guards only the sleep decision; the queue itself is never locked.
//!
//! [`Worker`] owns such a thread and tears it down on drop.

use core::fmt;
use core::pin::Pin;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering, fence};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};

use crate::config::{ShutdownPolicy, WorkerConfig};
use crate::error::{Error, Result};
use crate::queue::{Queue, TaskNode};
use crate::schedule::Scheduler;
use crate::util::pin_current_thread;
use crate::util::thread_id::{self, NO_THREAD};

/// Single-consumer execution context owned by one thread at a time.
pub struct WorkerContext {
    queue: Queue,
    stop: AtomicBool,
    // Set once the run loop has made its final empty check.
    closed: AtomicBool,
    running: AtomicBool,
    thread: AtomicUsize,
    lock: Mutex<()>,
    cv: Condvar,
    policy: ShutdownPolicy,
}

impl WorkerContext {
    /// A context with the default shutdown policy.
    pub fn new() -> Self {
        Self::with_policy(ShutdownPolicy::default())
    }

    /// A context with an explicit shutdown policy.
    pub fn with_policy(policy: ShutdownPolicy) -> Self {
        Self {
            queue: Queue::new(),
            stop: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            running: AtomicBool::new(false),
            thread: AtomicUsize::new(NO_THREAD),
            lock: Mutex::new(()),
            cv: Condvar::new(),
            policy,
        }
    }

    /// Drain the queue on the calling thread until stopped.
    ///
    /// Returns once a stop was requested and the queue was observed empty.
    /// Only one thread may run a context at a time.
    pub fn run(&self) {
        // Reopen before publishing `running`, so a producer that saw the
        // loop running never finds the context closed.
        self.closed.store(false, Ordering::SeqCst);
        self.thread.store(thread_id::current(), Ordering::Release);
        let entered = !self.running.swap(true, Ordering::AcqRel);
        debug_assert!(entered, "WorkerContext::run entered by a second thread");
        tracing::debug!(policy = ?self.policy, "worker run loop started");
        let _exit = RunExit(self);

        let mut resumed = 0usize;
        loop {
            let chain = {
                let mut guard = self.lock.lock();
                loop {
                    let chain = self.queue.acquire();
                    if !chain.is_empty() {
                        break Some(chain);
                    }
                    if self.stop.load(Ordering::Acquire) {
                        break None;
                    }
                    self.cv.wait(&mut guard);
                }
            };
            let Some(chain) = chain else { break };
            let batch = chain.resume_all();
            tracing::trace!(batch, "drained batch");
            resumed += batch;
        }

        tracing::debug!(resumed, "worker run loop stopped");
    }

    /// Whether the calling thread is currently running this context.
    #[inline]
    pub fn is_current(&self) -> bool {
        self.thread.load(Ordering::Acquire) == thread_id::current()
    }

    /// Whether some thread is inside [`run`](Self::run).
    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Whether a stop has been requested.
    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Ask the run loop to return once the queue is empty. Idempotent.
    ///
    /// Already queued computations are still resumed; see
    /// [`ShutdownPolicy`] for those posted after the loop's final check.
    pub fn stop(&self) {
        self.set_stop(true);
    }

    /// Set or clear the stop request and wake the run loop.
    pub fn set_stop(&self, stop: bool) {
        self.stop.store(stop, Ordering::Release);
        self.notify(true);
    }

    /// The shutdown policy this context was created with.
    pub fn policy(&self) -> ShutdownPolicy {
        self.policy
    }

    fn notify(&self, all: bool) {
        // Pass through the lock so a consumer between its empty check and
        // its wait cannot miss this wakeup.
        drop(self.lock.lock());
        if all {
            self.cv.notify_all();
        } else {
            self.cv.notify_one();
        }
    }

    fn close(&self) {
        match self.policy {
            ShutdownPolicy::Cancel => {
                self.closed.store(true, Ordering::Relaxed);
                // Pairs with the fence in `post`: either the producer sees
                // `closed`, or this acquire sees its node.
                fence(Ordering::SeqCst);
                let cancelled = self.queue.acquire().cancel_all();
                if cancelled > 0 {
                    tracing::warn!(cancelled, "cancelled computations posted during shutdown");
                }
            }
            ShutdownPolicy::Abandon => {
                if !self.queue.is_empty() {
                    tracing::warn!("abandoning computations posted during shutdown");
                }
            }
        }
    }
}

/// Leaves the context closed and idle when `run` returns or unwinds.
struct RunExit<'a>(&'a WorkerContext);

impl Drop for RunExit<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            tracing::error!("worker run loop unwound out of a resumption");
        }
        self.0.thread.store(NO_THREAD, Ordering::Release);
        self.0.close();
        self.0.running.store(false, Ordering::Release);
    }
}

impl Scheduler for WorkerContext {
    fn is_current(&self) -> bool {
        WorkerContext::is_current(self)
    }

    unsafe fn post(&self, node: Pin<&TaskNode>) {
        // SAFETY: forwarded to the caller.
        unsafe { self.queue.post(node) };

        if self.policy == ShutdownPolicy::Cancel {
            fence(Ordering::SeqCst);
            if self.closed.load(Ordering::Relaxed) {
                let cancelled = self.queue.acquire().cancel_all();
                tracing::warn!(cancelled, "post to a stopped worker context cancelled");
                return;
            }
        }
        self.notify(false);
    }
}

impl Default for WorkerContext {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WorkerContext {
    fn drop(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        match self.policy {
            ShutdownPolicy::Cancel => {
                let cancelled = self.queue.acquire().cancel_all();
                tracing::warn!(cancelled, "worker context dropped with queued computations");
            }
            ShutdownPolicy::Abandon => {
                tracing::warn!("worker context dropped with queued computations; abandoning them");
            }
        }
    }
}

impl fmt::Debug for WorkerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerContext")
            .field("running", &self.is_running())
            .field("stopped", &self.is_stopped())
            .field("queue", &self.queue)
            .field("policy", &self.policy)
            .finish()
    }
}

/// A dedicated thread running a [`WorkerContext`].
///
/// Dropping the worker stops the context and joins the thread.
pub struct Worker {
    context: Arc<WorkerContext>,
    name: String,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawn a worker thread configured by `config`.
    pub fn spawn(config: WorkerConfig) -> Result<Self> {
        let context = Arc::new(WorkerContext::with_policy(config.shutdown));
        let worker_ctx = context.clone();
        let pin = config.pin;

        let mut builder = thread::Builder::new().name(config.name.clone());
        if let Some(bytes) = config.stack_size {
            builder = builder.stack_size(bytes);
        }
        let thread = builder
            .spawn(move || {
                if let Some(pin) = pin {
                    if let Err(err) = pin_current_thread(&pin) {
                        tracing::warn!(%err, ?pin, "failed to pin worker thread");
                    }
                }
                worker_ctx.run();
            })
            .map_err(Error::Spawn)?;

        tracing::debug!(name = %config.name, "spawned worker");
        Ok(Self {
            context,
            name: config.name,
            thread: Some(thread),
        })
    }

    /// The context this worker drains; clone the `Arc` to hand it out.
    #[inline]
    pub fn context(&self) -> &Arc<WorkerContext> {
        &self.context
    }

    /// Thread name of this worker.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop the context and join the worker thread.
    pub fn shutdown(&mut self) -> Result<()> {
        let handle = self.thread.take().ok_or(Error::AlreadyShutDown)?;
        self.context.stop();
        if self.context.is_current() {
            // Cannot join ourselves; the loop returns after this batch.
            tracing::warn!(name = %self.name, "worker shut down from its own thread; detaching");
            return Ok(());
        }
        handle.join().map_err(|_| Error::WorkerPanicked {
            name: self.name.clone(),
        })
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if self.thread.is_none() {
            return;
        }
        if let Err(err) = self.shutdown() {
            tracing::error!(%err, "worker teardown failed");
        }
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("name", &self.name)
            .field("context", &self.context)
            .finish()
    }
}
