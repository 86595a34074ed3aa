//! Collaborator boundaries of the account gate: identity provider, profile
//! store and security service.
//!
//! Each boundary is an async trait plus an in-memory adapter for tests, the
//! demo binary and local development.

pub mod identity;
pub mod profile_store;
pub mod security;

pub use identity::{IdentityError, IdentityProvider, InMemoryIdentityProvider};
pub use profile_store::{InMemoryProfileStore, ProfileStore, StoreError};
pub use security::{
    AuditRecord, InMemorySecurityService, SecurityError, SecurityEvent, SecurityEventKind,
    SecurityService,
};
