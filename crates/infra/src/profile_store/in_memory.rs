use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;

use nexus_auth::{IdentityKey, Profile, ProfileDraft, Role};
use nexus_core::{Entity, ProfileId};

use super::r#trait::{ProfileStore, StoreError};

/// In-memory profile store.
///
/// Intended for tests/dev. Both uniqueness checks of `create()` run under a
/// single write lock, which makes the owner claim atomic.
#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    profiles: RwLock<HashMap<IdentityKey, Profile>>,
    owner_lookups: AtomicUsize,
    reject_writes: AtomicBool,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.profiles.read().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `find_by_owner` calls served so far.
    pub fn owner_lookups(&self) -> usize {
        self.owner_lookups.load(Ordering::Relaxed)
    }

    /// Make every subsequent `create()` fail with `Unavailable`.
    pub fn reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::Relaxed);
    }

    /// Enroll (`Some(secret)`) or remove (`None`) the TOTP second factor.
    ///
    /// Stands in for the security service's write path.
    pub fn set_two_factor(&self, id: ProfileId, secret: Option<String>) -> Result<Profile, StoreError> {
        self.update(id, |p| {
            p.two_fa_enabled = secret.is_some();
            p.two_fa_secret = secret;
        })
    }

    pub fn set_restrictions(
        &self,
        id: ProfileId,
        is_blocked: bool,
        security_lockdown: bool,
    ) -> Result<Profile, StoreError> {
        self.update(id, |p| {
            p.is_blocked = is_blocked;
            p.security_lockdown = security_lockdown;
        })
    }

    pub fn set_role(&self, id: ProfileId, role: Role) -> Result<Profile, StoreError> {
        self.update(id, |p| p.role = role)
    }

    fn update(&self, id: ProfileId, f: impl FnOnce(&mut Profile)) -> Result<Profile, StoreError> {
        let mut profiles = self
            .profiles
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;

        let profile = profiles
            .values_mut()
            .find(|p| p.id() == &id)
            .ok_or_else(|| StoreError::Unavailable(format!("unknown profile {id}")))?;
        f(profile);
        Ok(profile.clone())
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn find_by_owner(&self, owner: &IdentityKey) -> Result<Vec<Profile>, StoreError> {
        self.owner_lookups.fetch_add(1, Ordering::Relaxed);

        let profiles = self
            .profiles
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;

        Ok(profiles.get(owner).cloned().into_iter().collect())
    }

    async fn find_by_role(&self, role: Role) -> Result<Vec<Profile>, StoreError> {
        let profiles = self
            .profiles
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;

        let mut matching: Vec<Profile> = profiles
            .values()
            .filter(|p| p.role == role)
            .cloned()
            .collect();
        matching.sort_by_key(|p| p.created_at);
        Ok(matching)
    }

    async fn create(&self, draft: ProfileDraft) -> Result<Profile, StoreError> {
        if self.reject_writes.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable("writes rejected".to_string()));
        }

        let mut profiles = self
            .profiles
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;

        if profiles.contains_key(&draft.owner) {
            return Err(StoreError::DuplicateOwner(draft.owner));
        }

        if draft.role == Role::Owner && profiles.values().any(|p| p.role == Role::Owner) {
            return Err(StoreError::OwnerSlotTaken);
        }

        let profile = Profile::from_draft(ProfileId::new(), draft, Utc::now());
        profiles.insert(profile.owner.clone(), profile.clone());
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use nexus_auth::ProvisioningPolicy;

    fn key(raw: &str) -> IdentityKey {
        IdentityKey::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn create_then_find_by_owner() {
        let store = InMemoryProfileStore::new();
        let created = store
            .create(ProvisioningPolicy::default().member_draft(key("a@example.com")))
            .await
            .unwrap();

        let found = store.find_by_owner(&key("a@example.com")).await.unwrap();
        assert_eq!(found, vec![created]);
        assert!(store.find_by_owner(&key("b@example.com")).await.unwrap().is_empty());
        assert_eq!(store.owner_lookups(), 2);
    }

    #[tokio::test]
    async fn second_profile_for_same_identity_is_rejected() {
        let store = InMemoryProfileStore::new();
        let policy = ProvisioningPolicy::default();

        store.create(policy.member_draft(key("a@example.com"))).await.unwrap();
        let err = store
            .create(policy.member_draft(key("A@example.com")))
            .await
            .unwrap_err();

        assert_eq!(err, StoreError::DuplicateOwner(key("a@example.com")));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn owner_slot_can_only_be_claimed_once() {
        let store = InMemoryProfileStore::new();
        let policy = ProvisioningPolicy::default();

        store.create(policy.owner_draft(key("first@example.com"))).await.unwrap();
        let err = store
            .create(policy.owner_draft(key("second@example.com")))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::OwnerSlotTaken);

        let owners = store.find_by_role(Role::Owner).await.unwrap();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].owner, key("first@example.com"));
    }

    #[tokio::test]
    async fn rejected_writes_surface_as_unavailable() {
        let store = InMemoryProfileStore::new();
        store.reject_writes(true);

        let err = store
            .create(ProvisioningPolicy::default().member_draft(key("a@example.com")))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn two_factor_mutator_updates_stored_record() {
        let store = InMemoryProfileStore::new();
        let created = store
            .create(ProvisioningPolicy::default().member_draft(key("a@example.com")))
            .await
            .unwrap();

        let updated = store
            .set_two_factor(created.id, Some("JBSWY3DPEHPK3PXPJBSWY3DPEHPK3PXP".to_string()))
            .unwrap();
        assert!(updated.two_fa_enabled);

        let found = store.find_by_owner(&key("a@example.com")).await.unwrap();
        assert!(found[0].two_fa_enabled);

        let cleared = store.set_two_factor(created.id, None).unwrap();
        assert!(!cleared.two_fa_enabled);
        assert!(cleared.two_fa_secret.is_none());
    }
}
