/// First id available for application-defined messages (Win32 `WM_USER`).
pub const USER_BASE: u32 = 0x0400;

const CREATE_ID: u32 = USER_BASE + 1;
const RESUME_ID: u32 = USER_BASE + 2;

/// The two messages a host event loop forwards to a [`UiContext`](super::UiContext).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UiMessage {
    /// The surface is ready; run the one-time bootstrap.
    Create,
    /// Queued computations are waiting to be resumed on the UI thread.
    Resume,
}

impl UiMessage {
    /// Raw message id reserved for this message.
    #[inline]
    pub const fn raw(self) -> u32 {
        match self {
            UiMessage::Create => CREATE_ID,
            UiMessage::Resume => RESUME_ID,
        }
    }

    /// Map a raw id from the event loop back to a message, if it is ours.
    #[inline]
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            CREATE_ID => Some(UiMessage::Create),
            RESUME_ID => Some(UiMessage::Resume),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_ids_are_distinct_and_reversible() {
        assert_ne!(UiMessage::Create.raw(), UiMessage::Resume.raw());
        for msg in [UiMessage::Create, UiMessage::Resume] {
            assert_eq!(UiMessage::from_raw(msg.raw()), Some(msg));
        }
        assert_eq!(UiMessage::from_raw(USER_BASE), None);
        assert_eq!(UiMessage::from_raw(0x0010), None);
    }
}
