//! Cheap per-thread identity usable inside atomics.
//!
//! `std::thread::ThreadId` cannot be stored in an atomic, so every thread
//! lazily draws a `usize` from a global counter instead. Zero is never handed
//! out and stands for "no thread".

use std::sync::atomic::{AtomicUsize, Ordering};

/// Sentinel meaning "no thread is published".
pub const NO_THREAD: usize = 0;

static NEXT_THREAD_ID: AtomicUsize = AtomicUsize::new(1);

thread_local! {
    static THREAD_ID: usize = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
}

/// Identity of the calling thread; never [`NO_THREAD`].
#[inline]
pub fn current() -> usize {
    THREAD_ID.with(|id| *id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_stable_per_thread_and_distinct_across_threads() {
        let here = current();
        assert_ne!(here, NO_THREAD);
        assert_eq!(here, current());

        let there = std::thread::spawn(current).join().unwrap();
        assert_ne!(there, NO_THREAD);
        assert_ne!(here, there);
    }
}
