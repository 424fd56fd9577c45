//! `EventLoop` backed by a Win32 window handle.

use core::ptr;

use winapi::shared::windef::HWND;
use winapi::um::processthreadsapi::GetCurrentThreadId;
use winapi::um::winuser::{GetWindowThreadProcessId, PostMessageW};

use super::{EventLoop, UiMessage};

/// Posts scheduling messages to a window owned by a UI thread.
///
/// The host's window procedure must pass every message to
/// [`UiContext::handle_message`](super::UiContext::handle_message).
#[derive(Debug)]
pub struct Win32Window {
    hwnd: HWND,
}

// SAFETY: an HWND is a process-wide handle; `PostMessageW` and
// `GetWindowThreadProcessId` may be called with it from any thread.
unsafe impl Send for Win32Window {}
// SAFETY: see above; the handle is never dereferenced.
unsafe impl Sync for Win32Window {}

impl Win32Window {
    /// Wrap a window handle.
    ///
    /// # Safety
    ///
    /// `hwnd` must identify a window that outlives this value.
    pub unsafe fn new(hwnd: HWND) -> Self {
        Self { hwnd }
    }

    /// The wrapped window handle.
    pub fn hwnd(&self) -> HWND {
        self.hwnd
    }
}

impl EventLoop for Win32Window {
    fn is_owner_thread(&self) -> bool {
        // SAFETY: plain Win32 queries on a valid window handle.
        unsafe { GetCurrentThreadId() == GetWindowThreadProcessId(self.hwnd, ptr::null_mut()) }
    }

    fn post_message(&self, message: UiMessage) -> bool {
        // SAFETY: posting does not dereference anything we own.
        unsafe { PostMessageW(self.hwnd, message.raw(), 0, 0) != 0 }
    }
}
