#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

pub const TIMEOUT: Duration = Duration::from_secs(10);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Blocks a test thread until `n` events were counted down.
pub struct Countdown {
    left: Mutex<usize>,
    cv: Condvar,
}

impl Countdown {
    pub fn new(n: usize) -> Arc<Self> {
        Arc::new(Self {
            left: Mutex::new(n),
            cv: Condvar::new(),
        })
    }

    pub fn count_down(&self) {
        let mut left = self.left.lock();
        *left = left.checked_sub(1).expect("counted down past zero");
        if *left == 0 {
            self.cv.notify_all();
        }
    }

    /// `true` if the count reached zero before `timeout`.
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut left = self.left.lock();
        while *left > 0 {
            if self.cv.wait_until(&mut left, deadline).timed_out() {
                return *left == 0;
            }
        }
        true
    }
}

/// Observes whether a [`DropGuard`] handed to a future was released.
#[derive(Clone, Default)]
pub struct DropFlag(Arc<AtomicBool>);

impl DropFlag {
    pub fn guard(&self) -> DropGuard {
        DropGuard(self.0.clone())
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Sets its [`DropFlag`] when dropped.
pub struct DropGuard(Arc<AtomicBool>);

impl Drop for DropGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}
