//! Per-session ephemeral state.
//!
//! A `SessionContext` lives exactly as long as one client session: it is
//! created when the session starts and replaced when the session ends
//! (logout, external sign-out or a switch to another identity). Nothing here is persisted to the profile store.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use nexus_core::SessionId;

#[derive(Debug)]
struct SessionFlags {
    id: SessionId,
    step_up_verified: AtomicBool,
    nudge_dismissed: AtomicBool,
}

/// Handle to the current session's flags.
///
/// Clones share the same session; a fresh session is obtained with
/// [`SessionContext::start`]. Flags only ever go from unset to set within a
/// session.
#[derive(Debug, Clone)]
pub struct SessionContext {
    inner: Arc<SessionFlags>,
}

impl SessionContext {
    pub fn start() -> Self {
        Self {
            inner: Arc::new(SessionFlags {
                id: SessionId::new(),
                step_up_verified: AtomicBool::new(false),
                nudge_dismissed: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> SessionId {
        self.inner.id
    }

    /// Whether this session passed step-up verification.
    pub fn is_verified(&self) -> bool {
        self.inner.step_up_verified.load(Ordering::Acquire)
    }

    pub fn mark_verified(&self) {
        self.inner.step_up_verified.store(true, Ordering::Release);
    }

    /// Whether the 2FA reminder was dismissed in this session.
    pub fn nudge_dismissed(&self) -> bool {
        self.inner.nudge_dismissed.load(Ordering::Acquire)
    }

    pub fn dismiss_nudge(&self) {
        self.inner.nudge_dismissed.store(true, Ordering::Release);
    }

    /// True when both handles refer to the same session.
    pub fn same_session(&self, other: &SessionContext) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_session_has_no_flags_set() {
        let session = SessionContext::start();
        assert!(!session.is_verified());
        assert!(!session.nudge_dismissed());
    }

    #[test]
    fn clones_share_flags() {
        let session = SessionContext::start();
        let handle = session.clone();

        handle.mark_verified();
        handle.dismiss_nudge();

        assert!(session.is_verified());
        assert!(session.nudge_dismissed());
        assert!(session.same_session(&handle));
    }

    #[test]
    fn new_session_does_not_inherit_flags() {
        let first = SessionContext::start();
        first.mark_verified();
        first.dismiss_nudge();

        let second = SessionContext::start();
        assert!(!second.is_verified());
        assert!(!second.nudge_dismissed());
        assert!(!first.same_session(&second));
        assert_ne!(first.id(), second.id());
    }
}
