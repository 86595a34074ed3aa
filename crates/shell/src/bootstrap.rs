//! Profile bootstrap: resolve (or create) the profile of the current identity.
//!
//! ```text
//! Identity
//!   ↓
//! 1. find_by_owner(key) ── found ──▶ on_login hook ──▶ Existing(profile)
//!   ↓ none
//! 2. find_by_role(owner) ── empty ──▶ owner draft (elite, 1000)
//!   ↓ some                          user draft  (free, 20)
//! 3. create(draft)  (atomic conditional insert)
//!   │  OwnerSlotTaken ─▶ retry once as user draft
//!   │  DuplicateOwner ─▶ re-read and return the winner's profile
//!   ↓
//! 4. audit "register" (best-effort) ──▶ Registered { profile, owner_elevated }
//! ```
//!
//! Audit and login-hook failures are logged and swallowed; they never fail
//! the bootstrap.

use serde_json::json;
use thiserror::Error;

use nexus_auth::{Identity, Profile, ProfileDraft, ProvisioningPolicy, Role};
use nexus_infra::{ProfileStore, SecurityEvent, SecurityEventKind, SecurityService, StoreError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BootstrapError {
    #[error("profile store error: {0}")]
    Store(#[from] StoreError),

    /// The store reported a duplicate but the existing profile could not be read back.
    #[error("profile for '{0}' vanished after duplicate insert")]
    Inconsistent(String),
}

/// How the profile was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bootstrapped {
    Existing(Profile),
    Registered { profile: Profile, owner_elevated: bool },
}

impl Bootstrapped {
    pub fn profile(&self) -> &Profile {
        match self {
            Bootstrapped::Existing(profile) => profile,
            Bootstrapped::Registered { profile, .. } => profile,
        }
    }

    pub fn into_profile(self) -> Profile {
        match self {
            Bootstrapped::Existing(profile) => profile,
            Bootstrapped::Registered { profile, .. } => profile,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Bootstrapped::Registered { .. })
    }
}

/// Resolves exactly one profile per identity.
pub struct ProfileBootstrapper<S, A> {
    store: S,
    security: A,
    policy: ProvisioningPolicy,
}

impl<S, A> ProfileBootstrapper<S, A>
where
    S: ProfileStore,
    A: SecurityService,
{
    pub fn new(store: S, security: A, policy: ProvisioningPolicy) -> Self {
        Self {
            store,
            security,
            policy,
        }
    }

    pub fn policy(&self) -> &ProvisioningPolicy {
        &self.policy
    }

    pub async fn bootstrap(&self, identity: &Identity) -> Result<Bootstrapped, BootstrapError> {
        if let Some(existing) = self.find_existing(identity).await? {
            if let Err(err) = self.security.on_login(&existing).await {
                tracing::warn!(profile_id = %existing.id, "login security hook failed: {err}");
            }
            return Ok(Bootstrapped::Existing(existing));
        }

        let owners = self.store.find_by_role(Role::Owner).await?;
        let draft = if owners.is_empty() {
            self.policy.owner_draft(identity.key.clone())
        } else {
            self.policy.member_draft(identity.key.clone())
        };

        let profile = match self.store.create(draft).await {
            Ok(profile) => profile,
            Err(StoreError::OwnerSlotTaken) => {
                tracing::info!(identity = %identity.key, "owner slot claimed concurrently; registering as user");
                match self.create_member(identity).await? {
                    Some(profile) => profile,
                    None => return self.existing_after_race(identity).await,
                }
            }
            Err(StoreError::DuplicateOwner(_)) => return self.existing_after_race(identity).await,
            Err(err) => {
                tracing::error!(identity = %identity.key, "failed to create profile: {err}");
                return Err(err.into());
            }
        };

        let owner_elevated = profile.role == Role::Owner;
        tracing::info!(
            identity = %identity.key,
            profile_id = %profile.id,
            role = %profile.role,
            "registered new profile"
        );
        self.audit_registration(&profile, owner_elevated).await;

        Ok(Bootstrapped::Registered {
            profile,
            owner_elevated,
        })
    }

    async fn find_existing(&self, identity: &Identity) -> Result<Option<Profile>, BootstrapError> {
        let mut found = self.store.find_by_owner(&identity.key).await?;
        if found.len() > 1 {
            tracing::warn!(
                identity = %identity.key,
                count = found.len(),
                "multiple profiles for one identity; using the oldest"
            );
            found.sort_by_key(|p| p.created_at);
        }
        Ok(found.into_iter().next())
    }

    /// Create a user-role profile; `None` if another bootstrap for the same
    /// identity won the insert.
    async fn create_member(&self, identity: &Identity) -> Result<Option<Profile>, BootstrapError> {
        let draft: ProfileDraft = self.policy.member_draft(identity.key.clone());
        match self.store.create(draft).await {
            Ok(profile) => Ok(Some(profile)),
            Err(StoreError::DuplicateOwner(_)) => Ok(None),
            Err(err) => {
                tracing::error!(identity = %identity.key, "failed to create profile: {err}");
                Err(err.into())
            }
        }
    }

    async fn existing_after_race(&self, identity: &Identity) -> Result<Bootstrapped, BootstrapError> {
        tracing::debug!(identity = %identity.key, "profile created concurrently; reusing it");
        self.find_existing(identity)
            .await?
            .map(Bootstrapped::Existing)
            .ok_or_else(|| BootstrapError::Inconsistent(identity.key.to_string()))
    }

    async fn audit_registration(&self, profile: &Profile, owner_elevated: bool) {
        let event = SecurityEvent::new(
            SecurityEventKind::Register,
            json!({
                "role": if owner_elevated { "OWNER (First User)" } else { "User" },
                "owner_elevated": owner_elevated,
                "details": "New account created",
            }),
        );
        if let Err(err) = self.security.log_event(profile, event).await {
            tracing::warn!(profile_id = %profile.id, "failed to audit registration: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use nexus_auth::{IdentityKey, Plan};
    use nexus_infra::{InMemoryProfileStore, InMemorySecurityService};

    fn identity(raw: &str) -> Identity {
        Identity::new(IdentityKey::parse(raw).unwrap())
    }

    fn setup() -> (
        ProfileBootstrapper<Arc<InMemoryProfileStore>, Arc<InMemorySecurityService>>,
        Arc<InMemoryProfileStore>,
        Arc<InMemorySecurityService>,
    ) {
        let store = Arc::new(InMemoryProfileStore::new());
        let security = Arc::new(InMemorySecurityService::new());
        let bootstrapper =
            ProfileBootstrapper::new(store.clone(), security.clone(), ProvisioningPolicy::default());
        (bootstrapper, store, security)
    }

    #[tokio::test]
    async fn first_identity_becomes_owner() {
        let (bootstrapper, _store, security) = setup();

        let outcome = bootstrapper.bootstrap(&identity("first@example.com")).await.unwrap();
        let Bootstrapped::Registered { profile, owner_elevated } = outcome else {
            panic!("expected registration");
        };

        assert!(owner_elevated);
        assert_eq!(profile.role, Role::Owner);
        assert_eq!(profile.plan, Plan::ELITE);
        assert_eq!(profile.credits, 1000);

        let registrations = security.events_of(SecurityEventKind::Register);
        assert_eq!(registrations.len(), 1);
        assert_eq!(registrations[0].details["owner_elevated"], true);
    }

    #[tokio::test]
    async fn later_identities_become_users() {
        let (bootstrapper, _store, security) = setup();
        bootstrapper.bootstrap(&identity("first@example.com")).await.unwrap();

        for raw in ["second@example.com", "third@example.com"] {
            let profile = bootstrapper.bootstrap(&identity(raw)).await.unwrap().into_profile();
            assert_eq!(profile.role, Role::User);
            assert_eq!(profile.plan, Plan::FREE);
            assert_eq!(profile.credits, 20);
        }

        let registrations = security.events_of(SecurityEventKind::Register);
        assert_eq!(registrations.len(), 3);
        assert_eq!(registrations[2].details["role"], "User");
    }

    #[tokio::test]
    async fn existing_profile_is_returned_and_login_hook_fires() {
        let (bootstrapper, store, security) = setup();
        let created = bootstrapper
            .bootstrap(&identity("a@example.com"))
            .await
            .unwrap()
            .into_profile();

        let again = bootstrapper.bootstrap(&identity("A@Example.com")).await.unwrap();
        assert!(!again.is_new());
        assert_eq!(again.profile(), &created);
        assert_eq!(store.len(), 1);
        assert_eq!(security.events_of(SecurityEventKind::Login).len(), 1);
    }

    #[tokio::test]
    async fn audit_failure_does_not_fail_bootstrap() {
        let (bootstrapper, store, security) = setup();
        security.reject_audit(true);

        let outcome = bootstrapper.bootstrap(&identity("a@example.com")).await.unwrap();
        assert!(outcome.is_new());
        assert_eq!(store.len(), 1);

        let again = bootstrapper.bootstrap(&identity("a@example.com")).await.unwrap();
        assert!(!again.is_new());
    }

    #[tokio::test]
    async fn store_failure_is_reported() {
        let (bootstrapper, store, _security) = setup();
        store.reject_writes(true);

        let err = bootstrapper.bootstrap(&identity("a@example.com")).await.unwrap_err();
        assert!(matches!(err, BootstrapError::Store(StoreError::Unavailable(_))));
        assert!(store.is_empty());
    }

    /// Store that yields to the runtime after every read, so joined
    /// bootstraps interleave their read and create steps.
    struct Yielding(Arc<InMemoryProfileStore>);

    #[async_trait::async_trait]
    impl ProfileStore for Yielding {
        async fn find_by_owner(&self, owner: &IdentityKey) -> Result<Vec<Profile>, StoreError> {
            let found = self.0.find_by_owner(owner).await;
            tokio::task::yield_now().await;
            found
        }

        async fn find_by_role(&self, role: Role) -> Result<Vec<Profile>, StoreError> {
            let found = self.0.find_by_role(role).await;
            tokio::task::yield_now().await;
            found
        }

        async fn create(&self, draft: ProfileDraft) -> Result<Profile, StoreError> {
            self.0.create(draft).await
        }
    }

    fn interleaved_setup() -> (
        ProfileBootstrapper<Yielding, Arc<InMemorySecurityService>>,
        Arc<InMemoryProfileStore>,
        Arc<InMemorySecurityService>,
    ) {
        let store = Arc::new(InMemoryProfileStore::new());
        let security = Arc::new(InMemorySecurityService::new());
        let bootstrapper = ProfileBootstrapper::new(
            Yielding(store.clone()),
            security.clone(),
            ProvisioningPolicy::default(),
        );
        (bootstrapper, store, security)
    }

    #[tokio::test]
    async fn interleaved_bootstraps_of_one_identity_create_one_profile() {
        let (bootstrapper, store, security) = interleaved_setup();
        let who = identity("race@example.com");

        let (a, b, c) = tokio::join!(
            bootstrapper.bootstrap(&who),
            bootstrapper.bootstrap(&who),
            bootstrapper.bootstrap(&who),
        );
        let outcomes = [a.unwrap(), b.unwrap(), c.unwrap()];

        assert_eq!(store.len(), 1);
        let id = outcomes[0].profile().id;
        assert!(outcomes.iter().all(|o| o.profile().id == id));
        assert_eq!(outcomes.iter().filter(|o| o.is_new()).count(), 1);
        assert_eq!(security.events_of(SecurityEventKind::Register).len(), 1);
    }

    /// Store whose first read of each kind misses, as if another client
    /// inserted between our read and our write.
    struct StaleReads {
        inner: Arc<InMemoryProfileStore>,
        hide_owner_lookup: std::sync::atomic::AtomicBool,
        hide_role_lookup: std::sync::atomic::AtomicBool,
    }

    impl StaleReads {
        fn new(inner: Arc<InMemoryProfileStore>) -> Self {
            Self {
                inner,
                hide_owner_lookup: std::sync::atomic::AtomicBool::new(true),
                hide_role_lookup: std::sync::atomic::AtomicBool::new(true),
            }
        }
    }

    #[async_trait::async_trait]
    impl ProfileStore for StaleReads {
        async fn find_by_owner(&self, owner: &IdentityKey) -> Result<Vec<Profile>, StoreError> {
            if self.hide_owner_lookup.swap(false, std::sync::atomic::Ordering::SeqCst) {
                return Ok(vec![]);
            }
            self.inner.find_by_owner(owner).await
        }

        async fn find_by_role(&self, role: Role) -> Result<Vec<Profile>, StoreError> {
            if self.hide_role_lookup.swap(false, std::sync::atomic::Ordering::SeqCst) {
                return Ok(vec![]);
            }
            self.inner.find_by_role(role).await
        }

        async fn create(&self, draft: ProfileDraft) -> Result<Profile, StoreError> {
            self.inner.create(draft).await
        }
    }

    #[tokio::test]
    async fn lost_owner_claim_falls_back_to_user() {
        let store = Arc::new(InMemoryProfileStore::new());
        let policy = ProvisioningPolicy::default();
        store
            .create(policy.owner_draft(IdentityKey::parse("winner@example.com").unwrap()))
            .await
            .unwrap();

        let bootstrapper = ProfileBootstrapper::new(
            StaleReads::new(store.clone()),
            Arc::new(InMemorySecurityService::new()),
            policy,
        );

        let outcome = bootstrapper.bootstrap(&identity("loser@example.com")).await.unwrap();
        let Bootstrapped::Registered { profile, owner_elevated } = outcome else {
            panic!("expected registration");
        };
        assert!(!owner_elevated);
        assert_eq!(profile.role, Role::User);
        assert_eq!(store.find_by_role(Role::Owner).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_insert_reuses_existing_profile() {
        let store = Arc::new(InMemoryProfileStore::new());
        let policy = ProvisioningPolicy::default();
        let existing = store
            .create(policy.member_draft(IdentityKey::parse("dup@example.com").unwrap()))
            .await
            .unwrap();

        let bootstrapper = ProfileBootstrapper::new(
            StaleReads::new(store.clone()),
            Arc::new(InMemorySecurityService::new()),
            policy,
        );

        let outcome = bootstrapper.bootstrap(&identity("dup@example.com")).await.unwrap();
        assert_eq!(outcome, Bootstrapped::Existing(existing));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn interleaved_first_bootstraps_elect_a_single_owner() {
        let (bootstrapper, store, _security) = interleaved_setup();
        let (a, b) = (identity("a@example.com"), identity("b@example.com"));

        let (ra, rb) = tokio::join!(bootstrapper.bootstrap(&a), bootstrapper.bootstrap(&b));
        let roles = [ra.unwrap().profile().role, rb.unwrap().profile().role];

        assert_eq!(store.len(), 2);
        assert_eq!(roles.iter().filter(|r| **r == Role::Owner).count(), 1);
        assert_eq!(roles.iter().filter(|r| **r == Role::User).count(), 1);
    }
}
