//! View types handed to the rendering layer.

use serde::{Deserialize, Serialize};

use nexus_auth::{GateState, Plan, Profile, Role, Route};

/// What the shell should render for the current navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderDecision {
    /// Full-screen "set up mandatory 2FA" interstitial linking to the
    /// security route.
    Enforce2faSetup { role: Role },
    /// Code-entry interstitial (TOTP or backup code).
    StepUp,
    /// The underlying application content.
    Content,
}

impl RenderDecision {
    pub fn from_gate(state: GateState, profile: Option<&Profile>) -> Self {
        match state {
            GateState::Enforce2faSetup => RenderDecision::Enforce2faSetup {
                role: profile.map(|p| p.role).unwrap_or_default(),
            },
            GateState::AwaitStepUp => RenderDecision::StepUp,
            GateState::NoProfile | GateState::Authorized => RenderDecision::Content,
        }
    }
}

/// Account badge for display (role, plan, credits).
///
/// Without a profile the badge falls back to an unprivileged free account
/// with no credits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub role: Role,
    pub plan: Plan,
    pub credits: i64,
    pub two_fa_enabled: bool,
    /// Blocked or locked down; displayed only, never enforced here.
    pub restricted: bool,
}

impl Default for AccountSummary {
    fn default() -> Self {
        Self {
            role: Role::User,
            plan: Plan::FREE,
            credits: 0,
            two_fa_enabled: false,
            restricted: false,
        }
    }
}

impl AccountSummary {
    pub fn from_profile(profile: Option<&Profile>) -> Self {
        match profile {
            Some(p) => Self {
                role: p.role,
                plan: p.plan.clone(),
                credits: p.credits,
                two_fa_enabled: p.two_fa_enabled,
                restricted: p.is_restricted(),
            },
            None => Self::default(),
        }
    }
}

/// Everything the rendering layer needs after a navigation or verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellView {
    pub route: Route,
    pub gate: GateState,
    pub render: RenderDecision,
    pub account: AccountSummary,
    pub show_nudge: bool,
}
