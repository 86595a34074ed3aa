use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use nexus_auth::{IdentityKey, Profile, ProfileDraft, Role};

/// Profile store operation error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The identity already has a profile (uniqueness per identity).
    #[error("a profile already exists for identity '{0}'")]
    DuplicateOwner(IdentityKey),

    /// An owner draft was submitted but an owner profile already exists.
    #[error("owner slot already claimed")]
    OwnerSlotTaken,

    /// Backend unreachable or failed.
    #[error("profile store unavailable: {0}")]
    Unavailable(String),
}

/// Persistent account records.
///
/// ## Create semantics
///
/// `create()` must be atomic with respect to concurrent creates:
/// - reject a draft whose `owner` already has a profile (`DuplicateOwner`)
/// - reject a `Role::Owner` draft while any owner profile exists
///   (`OwnerSlotTaken`); this is the "claim owner slot" operation
/// - assign `id` and `created_at`
///
/// Implementations backed by a database express both checks as unique
/// constraints / a conditional insert in one transaction.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Profiles owned by an identity (at most one for a consistent store).
    async fn find_by_owner(&self, owner: &IdentityKey) -> Result<Vec<Profile>, StoreError>;

    /// All profiles holding a role.
    async fn find_by_role(&self, role: Role) -> Result<Vec<Profile>, StoreError>;

    /// Atomically insert a new profile.
    async fn create(&self, draft: ProfileDraft) -> Result<Profile, StoreError>;
}

#[async_trait]
impl<S> ProfileStore for Arc<S>
where
    S: ProfileStore + ?Sized,
{
    async fn find_by_owner(&self, owner: &IdentityKey) -> Result<Vec<Profile>, StoreError> {
        (**self).find_by_owner(owner).await
    }

    async fn find_by_role(&self, role: Role) -> Result<Vec<Profile>, StoreError> {
        (**self).find_by_role(role).await
    }

    async fn create(&self, draft: ProfileDraft) -> Result<Profile, StoreError> {
        (**self).create(draft).await
    }
}
