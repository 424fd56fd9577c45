/// Best-effort CPU pinning for worker threads.
pub mod affinity;
/// Per-thread identities that fit in an atomic.
pub mod thread_id;
/// Spin/yield budget for short handoffs.
pub mod wait;

pub use affinity::{PinConfig, pin_current_thread};
pub use wait::WaitBudget;
