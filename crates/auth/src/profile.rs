//! Account profile: the authorization-relevant record of one identity.
//!
//! Profiles are created once (by the bootstrapper) and later mutated only by
//! the security service (2FA enrollment, restriction flags). This crate never
//! deletes them.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use nexus_core::{Entity, ProfileId};

use crate::{IdentityKey, Role};

// ─────────────────────────────────────────────────────────────────────────────
// Plan
// ─────────────────────────────────────────────────────────────────────────────

/// Billing plan name.
///
/// Opaque to the gate beyond "read and display".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Plan(Cow<'static, str>);

impl Plan {
    pub const ELITE: Plan = Plan(Cow::Borrowed("elite"));
    pub const FREE: Plan = Plan(Cow::Borrowed("free"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Plan {
    fn default() -> Self {
        Self::FREE
    }
}

impl core::fmt::Display for Plan {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Provisioning policy
// ─────────────────────────────────────────────────────────────────────────────

/// Plan and credit allotment granted to a freshly created profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub plan: Plan,
    pub credits: i64,
}

/// Initial allotments for new accounts.
///
/// The first account in an empty system is elevated to owner and receives
/// `owner`; every later account receives `member`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningPolicy {
    pub owner: Grant,
    pub member: Grant,
}

impl Default for ProvisioningPolicy {
    fn default() -> Self {
        Self {
            owner: Grant {
                plan: Plan::ELITE,
                credits: 1000,
            },
            member: Grant {
                plan: Plan::FREE,
                credits: 20,
            },
        }
    }
}

impl ProvisioningPolicy {
    /// Draft for the first account in the system.
    pub fn owner_draft(&self, owner: IdentityKey) -> ProfileDraft {
        ProfileDraft::new(owner, Role::Owner, &self.owner)
    }

    /// Draft for any account created once an owner exists.
    pub fn member_draft(&self, owner: IdentityKey) -> ProfileDraft {
        ProfileDraft::new(owner, Role::User, &self.member)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Profile
// ─────────────────────────────────────────────────────────────────────────────

/// Fields supplied when creating a profile. The store assigns `id` and
/// `created_at`; security fields start cleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileDraft {
    pub owner: IdentityKey,
    pub role: Role,
    pub plan: Plan,
    pub credits: i64,
    pub total_usage: i64,
}

impl ProfileDraft {
    fn new(owner: IdentityKey, role: Role, grant: &Grant) -> Self {
        Self {
            owner,
            role,
            plan: grant.plan.clone(),
            credits: grant.credits,
            total_usage: 0,
        }
    }
}

/// Persistent account record.
///
/// # Invariants
/// - At most one profile per `owner` identity key.
/// - `two_fa_enabled` without a `two_fa_secret` can only be satisfied by
///   backup codes.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    pub owner: IdentityKey,
    pub role: Role,
    pub plan: Plan,
    pub credits: i64,
    pub total_usage: i64,
    pub two_fa_enabled: bool,
    pub two_fa_secret: Option<String>,
    pub is_blocked: bool,
    pub security_lockdown: bool,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    /// Materialize a draft as a stored record.
    pub fn from_draft(id: ProfileId, draft: ProfileDraft, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            owner: draft.owner,
            role: draft.role,
            plan: draft.plan,
            credits: draft.credits,
            total_usage: draft.total_usage,
            two_fa_enabled: false,
            two_fa_secret: None,
            is_blocked: false,
            security_lockdown: false,
            created_at,
        }
    }

    pub fn is_privileged(&self) -> bool {
        self.role.is_privileged()
    }

    /// Blocked or locked down by the security service.
    pub fn is_restricted(&self) -> bool {
        self.is_blocked || self.security_lockdown
    }
}

impl Entity for Profile {
    type Id = ProfileId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

// The TOTP secret must never reach logs.
impl core::fmt::Debug for Profile {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Profile")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("role", &self.role)
            .field("plan", &self.plan)
            .field("credits", &self.credits)
            .field("total_usage", &self.total_usage)
            .field("two_fa_enabled", &self.two_fa_enabled)
            .field(
                "two_fa_secret",
                &self.two_fa_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("is_blocked", &self.is_blocked)
            .field("security_lockdown", &self.security_lockdown)
            .field("created_at", &self.created_at)
            .finish()
    }
}
