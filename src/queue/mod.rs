//! Lock-free multi-producer/single-consumer queue with FIFO drain.
//!
//! Producers push onto an intrusive LIFO stack with a CAS loop; the consumer
//! claims the whole stack with one swap and reverses it in place, so each
//! drained batch comes out in submission order. Pushing never allocates and
//! never blocks.

mod node;

pub use node::TaskNode;

use core::fmt;
use core::marker::PhantomData;
use core::pin::Pin;
use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};

use crossbeam_utils::CachePadded;

use crate::handle::ResumableHandle;

/// Intrusive MPSC queue of [`TaskNode`]s.
pub struct Queue {
    // Only concurrently mutated word; keep it off neighbouring lines.
    head: CachePadded<AtomicPtr<TaskNode>>,
}

impl Queue {
    /// An empty queue.
    pub const fn new() -> Self {
        Self {
            head: CachePadded::new(AtomicPtr::new(ptr::null_mut())),
        }
    }

    /// Splice `node` onto the queue. Callable from any thread.
    ///
    /// Returns `true` if the queue was empty before this push.
    ///
    /// # Safety
    ///
    /// `node` must be armed, must not already be queued, and must stay alive
    /// at the same address until a consumer claims it from this queue.
    pub unsafe fn post(&self, node: Pin<&TaskNode>) -> bool {
        let node = node.get_ref();
        // SAFETY: not yet published, so the producer still owns the slot.
        debug_assert!(unsafe { node.is_armed() }, "posting an unarmed TaskNode");
        node.enqueue();

        let node_ptr = node as *const TaskNode as *mut TaskNode;
        let mut head = self.head.load(Ordering::Relaxed);
        loop {
            node.next.store(head, Ordering::Relaxed);
            match self
                .head
                .compare_exchange_weak(head, node_ptr, Ordering::Release, Ordering::Relaxed)
            {
                Ok(_) => return head.is_null(),
                Err(current) => head = current,
            }
        }
    }

    /// Claim every node posted so far, in FIFO order.
    ///
    /// Posts racing with this call land either in the returned chain or in
    /// the next one. An empty chain means the caller should wait, not spin.
    pub fn acquire(&self) -> Chain<'_> {
        let mut head = self.head.swap(ptr::null_mut(), Ordering::Acquire);
        let mut prev: *mut TaskNode = ptr::null_mut();
        while !head.is_null() {
            // SAFETY: the swap made these nodes exclusively ours, and the
            // post contract keeps them alive until claimed.
            let next = unsafe { (*head).next.swap(prev, Ordering::Relaxed) };
            prev = head;
            head = next;
        }
        Chain {
            head: prev,
            _queue: PhantomData,
        }
    }

    /// Whether nothing is waiting to be acquired.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire).is_null()
    }
}

impl Default for Queue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("empty", &self.is_empty())
            .finish()
    }
}

/// A batch of nodes claimed by [`Queue::acquire`], oldest first.
///
/// Iterating yields each node's handle and releases the node back to its
/// owner. Nodes left unclaimed when the chain is dropped are cancelled.
pub struct Chain<'q> {
    head: *mut TaskNode,
    _queue: PhantomData<&'q Queue>,
}

impl Chain<'_> {
    /// Whether the batch holds no further nodes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_null()
    }

    /// Resume every node in order; returns how many were resumed.
    pub fn resume_all(self) -> usize {
        let mut resumed = 0;
        for handle in self {
            handle.resume();
            resumed += 1;
        }
        resumed
    }

    /// Release every node without resuming it; returns how many were dropped.
    pub fn cancel_all(mut self) -> usize {
        self.cancel_rest()
    }

    fn cancel_rest(&mut self) -> usize {
        self.by_ref().map(ResumableHandle::cancel).count()
    }
}

impl Iterator for Chain<'_> {
    type Item = ResumableHandle;

    fn next(&mut self) -> Option<ResumableHandle> {
        while !self.head.is_null() {
            let node = self.head;
            // SAFETY: the node is claimed and alive; read the link before
            // handing the node back, since resuming may free it.
            self.head = unsafe { (*node).next.load(Ordering::Relaxed) };
            // SAFETY: `node` is not touched after this call.
            if let Some(handle) = unsafe { TaskNode::claim(node) } {
                return Some(handle);
            }
        }
        None
    }
}

impl Drop for Chain<'_> {
    fn drop(&mut self) {
        let cancelled = self.cancel_rest();
        if cancelled > 0 {
            tracing::warn!(cancelled, "dropped a partially drained chain");
        }
    }
}

impl fmt::Debug for Chain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("empty", &self.is_empty())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::task::{Wake, Waker};

    struct Tag(usize, Arc<Mutex<Vec<usize>>>);

    impl Wake for Tag {
        fn wake(self: Arc<Self>) {
            self.1.lock().unwrap().push(self.0);
        }
    }

    fn armed_nodes(n: usize, log: &Arc<Mutex<Vec<usize>>>) -> Vec<Pin<Box<TaskNode>>> {
        (0..n)
            .map(|i| {
                let node = Box::pin(TaskNode::new(false));
                let waker = Waker::from(Arc::new(Tag(i, log.clone())));
                unsafe { node.arm(ResumableHandle::from_suspended(&waker)) };
                node
            })
            .collect()
    }

    #[test]
    fn empty_acquire_yields_empty_chain() {
        let q = Queue::new();
        let chain = q.acquire();
        assert!(chain.is_empty());
        assert_eq!(chain.resume_all(), 0);
    }

    #[test]
    fn drain_restores_submission_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let nodes = armed_nodes(5, &log);
        let q = Queue::new();
        let mut first = true;
        for node in &nodes {
            let was_empty = unsafe { q.post(node.as_ref()) };
            assert_eq!(was_empty, first);
            first = false;
        }
        assert!(nodes.iter().all(|n| n.is_queued()));

        assert_eq!(q.acquire().resume_all(), 5);
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        assert!(nodes.iter().all(|n| !n.is_queued()));
        assert!(q.is_empty());
    }

    #[test]
    fn single_node_round_trip_and_repost() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let nodes = armed_nodes(1, &log);
        let q = Queue::new();
        unsafe { q.post(nodes[0].as_ref()) };
        assert_eq!(q.acquire().resume_all(), 1);

        // A claimed node can be armed and posted again.
        let waker = Waker::from(Arc::new(Tag(7, log.clone())));
        unsafe { nodes[0].arm(ResumableHandle::from_suspended(&waker)) };
        unsafe { q.post(nodes[0].as_ref()) };
        assert_eq!(q.acquire().resume_all(), 1);
        assert_eq!(*log.lock().unwrap(), vec![0, 7]);
    }

    #[test]
    fn dropped_chain_cancels_the_remainder() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let nodes = armed_nodes(3, &log);
        let q = Queue::new();
        for node in &nodes {
            unsafe { q.post(node.as_ref()) };
        }
        let mut chain = q.acquire();
        chain.next().unwrap().resume();
        drop(chain);

        assert_eq!(*log.lock().unwrap(), vec![0]);
        assert!(nodes.iter().all(|n| !n.is_queued()));
    }
}
