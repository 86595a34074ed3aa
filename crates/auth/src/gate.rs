use serde::{Deserialize, Serialize};

use crate::{Profile, Route, SessionContext};

/// Outcome of the security gate for the current (profile, route, session).
///
/// There is no terminal state: the gate is re-derived from current inputs on
/// every profile load, navigation and verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    /// Profile not available yet (loading or failed). Content renders with an
    /// unprivileged view.
    NoProfile,
    /// Privileged account without 2FA, away from the security route.
    Enforce2faSetup,
    /// 2FA is enabled and this session has not passed step-up yet.
    AwaitStepUp,
    Authorized,
}

impl GateState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateState::NoProfile => "no_profile",
            GateState::Enforce2faSetup => "enforce_2fa_setup",
            GateState::AwaitStepUp => "await_step_up",
            GateState::Authorized => "authorized",
        }
    }

    /// Whether the underlying application content may render.
    pub fn allows_content(&self) -> bool {
        matches!(self, GateState::NoProfile | GateState::Authorized)
    }

    /// Human-readable reason, for logs.
    pub fn reason(&self) -> &'static str {
        match self {
            GateState::NoProfile => "profile unavailable; rendering unprivileged view",
            GateState::Enforce2faSetup => "privileged account must enroll a second factor",
            GateState::AwaitStepUp => "session has not passed step-up verification",
            GateState::Authorized => "no gate condition applies",
        }
    }
}

impl core::fmt::Display for GateState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static inputs of the gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatePolicy {
    /// The one route reachable while 2FA enrollment is being enforced.
    pub security_route: Route,
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            security_route: Route::new("/Security"),
        }
    }
}

impl GatePolicy {
    pub fn new(security_route: Route) -> Self {
        Self { security_route }
    }

    pub fn is_security_route(&self, route: &Route) -> bool {
        *route == self.security_route
    }
}

/// Derive the gate state.
///
/// Enrollment is checked before step-up: a privileged account with 2FA
/// disabled has nothing to step up with.
///
/// - No IO
/// - No panics
/// - Restriction flags (`is_blocked`, `security_lockdown`) are not consulted
pub fn evaluate(
    profile: Option<&Profile>,
    route: &Route,
    session: &SessionContext,
    policy: &GatePolicy,
) -> GateState {
    let Some(profile) = profile else {
        return GateState::NoProfile;
    };

    if profile.is_privileged() && !profile.two_fa_enabled && !policy.is_security_route(route) {
        return GateState::Enforce2faSetup;
    }

    if profile.two_fa_enabled && !session.is_verified() {
        return GateState::AwaitStepUp;
    }

    GateState::Authorized
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Utc;
    use proptest::prelude::*;

    use nexus_core::ProfileId;

    use crate::{IdentityKey, ProvisioningPolicy, Role};

    fn profile(role: Role, two_fa_enabled: bool) -> Profile {
        let key = IdentityKey::parse("someone@example.com").unwrap();
        let mut draft = ProvisioningPolicy::default().member_draft(key);
        draft.role = role;
        let mut profile = Profile::from_draft(ProfileId::new(), draft, Utc::now());
        profile.two_fa_enabled = two_fa_enabled;
        if two_fa_enabled {
            profile.two_fa_secret = Some("JBSWY3DPEHPK3PXPJBSWY3DPEHPK3PXP".to_string());
        }
        profile
    }

    fn role_strategy() -> impl Strategy<Value = Role> {
        prop_oneof![Just(Role::User), Just(Role::Admin), Just(Role::Owner)]
    }

    fn route_strategy() -> impl Strategy<Value = Route> {
        "/[A-Za-z]{0,12}".prop_map(Route::new)
    }

    #[test]
    fn missing_profile_is_fail_open() {
        let state = evaluate(
            None,
            &Route::new("/Admin"),
            &SessionContext::start(),
            &GatePolicy::default(),
        );
        assert_eq!(state, GateState::NoProfile);
        assert!(state.allows_content());
    }

    #[test]
    fn owner_without_2fa_is_sent_to_setup() {
        let owner = profile(Role::Owner, false);
        let state = evaluate(
            Some(&owner),
            &Route::root(),
            &SessionContext::start(),
            &GatePolicy::default(),
        );
        assert_eq!(state, GateState::Enforce2faSetup);
        assert!(!state.allows_content());
    }

    #[test]
    fn security_route_is_exempt_from_setup_enforcement() {
        let admin = profile(Role::Admin, false);
        let state = evaluate(
            Some(&admin),
            &Route::new("/Security"),
            &SessionContext::start(),
            &GatePolicy::default(),
        );
        assert_eq!(state, GateState::Authorized);
    }

    #[test]
    fn configured_security_route_is_honoured() {
        let admin = profile(Role::Admin, false);
        let policy = GatePolicy::new(Route::new("/settings/security"));
        let session = SessionContext::start();

        assert_eq!(
            evaluate(Some(&admin), &Route::new("/settings/security"), &session, &policy),
            GateState::Authorized
        );
        assert_eq!(
            evaluate(Some(&admin), &Route::new("/Security"), &session, &policy),
            GateState::Enforce2faSetup
        );
    }

    #[test]
    fn plain_user_without_2fa_is_authorized() {
        let user = profile(Role::User, false);
        let state = evaluate(
            Some(&user),
            &Route::new("/History"),
            &SessionContext::start(),
            &GatePolicy::default(),
        );
        assert_eq!(state, GateState::Authorized);
    }

    #[test]
    fn verification_moves_step_up_to_authorized() {
        let user = profile(Role::Owner, true);
        let session = SessionContext::start();
        let policy = GatePolicy::default();
        let route = Route::new("/Owner");

        assert_eq!(
            evaluate(Some(&user), &route, &session, &policy),
            GateState::AwaitStepUp
        );

        session.mark_verified();
        assert_eq!(
            evaluate(Some(&user), &route, &session, &policy),
            GateState::Authorized
        );
    }

    #[test]
    fn restriction_flags_do_not_change_the_gate() {
        let mut user = profile(Role::User, false);
        user.is_blocked = true;
        user.security_lockdown = true;

        let state = evaluate(
            Some(&user),
            &Route::root(),
            &SessionContext::start(),
            &GatePolicy::default(),
        );
        assert_eq!(state, GateState::Authorized);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Privileged accounts without 2FA see the setup interstitial on every
        /// route except the security route.
        #[test]
        fn privileged_without_2fa_enforced_everywhere_but_security(
            privileged in prop_oneof![Just(Role::Admin), Just(Role::Owner)],
            route in route_strategy(),
            verified in any::<bool>(),
        ) {
            let p = profile(privileged, false);
            let session = SessionContext::start();
            if verified {
                session.mark_verified();
            }
            let policy = GatePolicy::default();

            let state = evaluate(Some(&p), &route, &session, &policy);
            if policy.is_security_route(&route) {
                prop_assert_eq!(state, GateState::Authorized);
            } else {
                prop_assert_eq!(state, GateState::Enforce2faSetup);
            }
        }

        /// Any account with 2FA enabled and an unverified session awaits
        /// step-up regardless of route.
        #[test]
        fn enrolled_unverified_always_awaits_step_up(
            role in role_strategy(),
            route in route_strategy(),
        ) {
            let p = profile(role, true);
            let state = evaluate(Some(&p), &route, &SessionContext::start(), &GatePolicy::default());
            prop_assert_eq!(state, GateState::AwaitStepUp);
        }

        /// A verified session with 2FA enabled is never blocked.
        #[test]
        fn enrolled_verified_is_authorized(
            role in role_strategy(),
            route in route_strategy(),
        ) {
            let p = profile(role, true);
            let session = SessionContext::start();
            session.mark_verified();
            let state = evaluate(Some(&p), &route, &session, &GatePolicy::default());
            prop_assert_eq!(state, GateState::Authorized);
        }
    }
}
