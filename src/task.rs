//! Detached, eagerly started tasks whose wakeups resume them in place.
//!
//! A [`Task`] is the fire-and-forget computation the schedulers move between
//! threads. It starts running on the thread that detaches it and keeps going
//! until it first suspends. Waking it polls the future right there on the
//! waking thread, which is what lets a worker loop "resume" a computation by
//! resuming its handle: the remainder of the computation then runs on the
//! worker.
//!
//! A wake from another thread can arrive while the task is still inside the
//! poll that posted it (the post happens just before `Poll::Pending` is
//! returned). The waker then waits on a short [`WaitBudget`] for that poll to
//! return and polls afterwards. A wake from inside the task's own poll is
//! remembered and re-polled as soon as the current poll returns.
//!
//! A panic inside a poll ends the task. It is logged and never unwinds into
//! the thread that resumed the task.

use core::any::Any;
use core::future::Future;
use core::pin::Pin;
use core::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use core::task::Context;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::task::{Wake, Waker};

use parking_lot::Mutex;

use crate::util::WaitBudget;
use crate::util::thread_id::{self, NO_THREAD};

const IDLE: u8 = 0;
const POLLING: u8 = 1;
const NOTIFIED: u8 = 2;
const COMPLETE: u8 = 3;

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// A detached computation. See the module docs for how it is resumed.
pub struct Task {
    state: AtomicU8,
    poller: AtomicUsize,
    // Only locked by the thread that moved `state` to POLLING.
    future: Mutex<Option<BoxFuture>>,
}

impl Task {
    /// Start `future` on the calling thread and let it run to completion on
    /// whatever threads resume it. The result is not observable; completion
    /// is implicit.
    pub fn detach<F>(future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let task = Arc::new(Task {
            state: AtomicU8::new(IDLE),
            poller: AtomicUsize::new(NO_THREAD),
            future: Mutex::new(Some(Box::pin(future))),
        });
        task.run();
    }

    fn run(self: &Arc<Self>) {
        let me = thread_id::current();
        let mut budget = WaitBudget::handoff();
        loop {
            match self
                .state
                .compare_exchange(IDLE, POLLING, Ordering::Acquire, Ordering::Acquire)
            {
                Ok(_) => break,
                Err(COMPLETE) => return,
                Err(_) if self.poller.load(Ordering::Acquire) == me => {
                    // Woken from inside our own poll; the poll loop below
                    // picks this up once the current poll returns.
                    let _ = self.state.compare_exchange(
                        POLLING,
                        NOTIFIED,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    );
                    return;
                }
                Err(_) => budget.step(),
            }
        }
        if budget.yields() > 0 {
            tracing::trace!(yields = budget.yields(), "waited for a peer poll to return");
        }

        self.poller.store(me, Ordering::Release);
        let waker = Waker::from(self.clone());
        let mut cx = Context::from_waker(&waker);
        loop {
            let finished = {
                let mut slot = self.future.lock();
                let ready = match slot.as_mut() {
                    Some(future) => {
                        let polled =
                            panic::catch_unwind(AssertUnwindSafe(|| future.as_mut().poll(&mut cx)));
                        match polled {
                            Ok(poll) => poll.is_ready(),
                            Err(payload) => {
                                tracing::error!(
                                    panic = panic_message(payload.as_ref()),
                                    "task panicked while being polled; it will not run again"
                                );
                                true
                            }
                        }
                    }
                    None => true,
                };
                if ready {
                    slot.take();
                }
                ready
            };
            if finished {
                self.poller.store(NO_THREAD, Ordering::Release);
                self.state.store(COMPLETE, Ordering::Release);
                return;
            }
            // Clear the poller id while still POLLING so it can never clobber
            // the id of the next thread to poll.
            self.poller.store(NO_THREAD, Ordering::Release);
            if self
                .state
                .compare_exchange(POLLING, IDLE, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return;
            }
            // NOTIFIED by a self-wake.
            self.state.store(POLLING, Ordering::Release);
            self.poller.store(me, Ordering::Release);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "<non-string panic payload>"
    }
}

impl Wake for Task {
    fn wake(self: Arc<Self>) {
        self.run();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.run();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::task::Poll;
    use std::sync::atomic::AtomicBool;

    /// Pending once, waking itself from inside the poll.
    struct YieldNow(bool);

    impl Future for YieldNow {
        type Output = ();
        fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
            if self.0 {
                return Poll::Ready(());
            }
            self.0 = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }

    #[test]
    fn runs_eagerly_to_completion() {
        let done = Arc::new(AtomicBool::new(false));
        let flag = done.clone();
        Task::detach(async move { flag.store(true, Ordering::SeqCst) });
        assert!(done.load(Ordering::SeqCst));
    }

    #[test]
    fn self_wake_repolls_on_the_same_thread() {
        let done = Arc::new(AtomicBool::new(false));
        let flag = done.clone();
        Task::detach(async move {
            YieldNow(false).await;
            YieldNow(false).await;
            flag.store(true, Ordering::SeqCst);
        });
        assert!(done.load(Ordering::SeqCst));
    }

    #[test]
    fn panic_ends_the_task_without_unwinding_into_the_waker() {
        let (tx, rx) = std::sync::mpsc::channel::<Waker>();
        let dropped = Arc::new(AtomicBool::new(false));

        struct SetOnDrop(Arc<AtomicBool>);
        impl Drop for SetOnDrop {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        struct Park(Option<std::sync::mpsc::Sender<Waker>>);
        impl Future for Park {
            type Output = ();
            fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
                match self.0.take() {
                    Some(tx) => {
                        tx.send(cx.waker().clone()).unwrap();
                        Poll::Pending
                    }
                    None => Poll::Ready(()),
                }
            }
        }

        let guard = SetOnDrop(dropped.clone());
        Task::detach(async move {
            let _guard = guard;
            Park(Some(tx)).await;
            panic!("boom");
        });

        let waker = rx.recv().unwrap();
        waker.wake_by_ref();
        assert!(dropped.load(Ordering::SeqCst));
        // A completed task ignores further wakeups.
        waker.wake();
    }

    #[test]
    fn wake_from_another_thread_resumes_there() {
        let (tx, rx) = std::sync::mpsc::channel::<Waker>();
        let (done_tx, done_rx) = std::sync::mpsc::channel::<usize>();

        struct Park(Option<std::sync::mpsc::Sender<Waker>>);
        impl Future for Park {
            type Output = ();
            fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
                match self.0.take() {
                    Some(tx) => {
                        tx.send(cx.waker().clone()).unwrap();
                        Poll::Pending
                    }
                    None => Poll::Ready(()),
                }
            }
        }

        Task::detach(async move {
            Park(Some(tx)).await;
            done_tx.send(thread_id::current()).unwrap();
        });

        let waker = rx.recv().unwrap();
        let resumer = std::thread::spawn(move || {
            waker.wake();
            thread_id::current()
        });
        let resumer_id = resumer.join().unwrap();
        assert_eq!(done_rx.recv().unwrap(), resumer_id);
    }
}
