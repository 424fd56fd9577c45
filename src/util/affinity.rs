//! Optional CPU pinning for worker threads.
//!
//! Linux pins through `sched_setaffinity`; other targets accept the request
//! and do nothing. Pinning is best effort and never prevents a worker from
//! starting.

use std::io;

/// Where a worker thread should run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PinConfig {
    /// Logical core to pin the worker thread to.
    pub core_id: Option<usize>,
}

impl PinConfig {
    /// Pin to a single logical core.
    pub fn core(core_id: usize) -> Self {
        Self {
            core_id: Some(core_id),
        }
    }
}

/// Apply `cfg` to the calling thread.
pub fn pin_current_thread(cfg: &PinConfig) -> io::Result<()> {
    let Some(core) = cfg.core_id else {
        return Ok(());
    };

    pin_to_core(core)
}

#[cfg(target_os = "linux")]
fn pin_to_core(core: usize) -> io::Result<()> {
    if core >= libc::CPU_SETSIZE as usize {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("core {core} exceeds CPU_SETSIZE"),
        ));
    }
    // SAFETY: `set` is a plain bitset owned by this frame and `core` was
    // bounds-checked against CPU_SETSIZE above.
    let rc = unsafe {
        let mut set: libc::cpu_set_t = core::mem::zeroed();
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(core, &mut set);
        libc::sched_setaffinity(0, core::mem::size_of::<libc::cpu_set_t>(), &set)
    };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn pin_to_core(core: usize) -> io::Result<()> {
    tracing::debug!(core, "thread pinning not supported on this target");
    Ok(())
}
