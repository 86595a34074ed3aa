//! Advisory "enable 2FA" reminder, shown at most until dismissed per session.
//!
//! Unlike the gate this never blocks navigation.

use nexus_auth::{Profile, SessionContext};

#[derive(Debug, Default, Clone, Copy)]
pub struct NudgeScheduler;

impl NudgeScheduler {
    pub fn new() -> Self {
        Self
    }

    pub fn should_show(&self, profile: Option<&Profile>, session: &SessionContext) -> bool {
        match profile {
            Some(p) => !p.two_fa_enabled && !session.nudge_dismissed(),
            None => false,
        }
    }

    /// Hide the reminder for the rest of this session only.
    pub fn dismiss(&self, session: &SessionContext) {
        if !session.nudge_dismissed() {
            tracing::debug!(session_id = %session.id(), "2FA reminder dismissed");
        }
        session.dismiss_nudge();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Utc;
    use nexus_auth::{IdentityKey, ProvisioningPolicy};
    use nexus_core::ProfileId;

    fn profile(two_fa_enabled: bool) -> Profile {
        let draft = ProvisioningPolicy::default()
            .member_draft(IdentityKey::parse("a@example.com").unwrap());
        let mut p = Profile::from_draft(ProfileId::new(), draft, Utc::now());
        p.two_fa_enabled = two_fa_enabled;
        p
    }

    #[test]
    fn shown_only_for_profiles_without_2fa() {
        let nudges = NudgeScheduler::new();
        let session = SessionContext::start();

        assert!(nudges.should_show(Some(&profile(false)), &session));
        assert!(!nudges.should_show(Some(&profile(true)), &session));
        assert!(!nudges.should_show(None, &session));
    }

    #[test]
    fn dismissal_lasts_for_the_session_only() {
        let nudges = NudgeScheduler::new();
        let p = profile(false);
        let session = SessionContext::start();

        nudges.dismiss(&session);
        assert!(!nudges.should_show(Some(&p), &session));
        assert!(!nudges.should_show(Some(&p), &session.clone()));

        let next = SessionContext::start();
        assert!(nudges.should_show(Some(&p), &next));
    }
}
