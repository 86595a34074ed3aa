//! Identity-keyed profile cache.
//!
//! Spares the profile store a lookup on every navigation. Entries are
//! invalidated on logout and explicit refresh, and expire after a max age.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};

use nexus_auth::{IdentityKey, Profile};

#[derive(Debug, Clone)]
struct CachedProfile {
    profile: Profile,
    cached_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct ProfileCache {
    entries: RwLock<HashMap<IdentityKey, CachedProfile>>,
}

impl ProfileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached profile for an identity, unless older than `max_age`.
    pub fn get(&self, key: &IdentityKey, max_age: Duration) -> Option<Profile> {
        self.get_at(key, max_age, Utc::now())
    }

    fn get_at(&self, key: &IdentityKey, max_age: Duration, now: DateTime<Utc>) -> Option<Profile> {
        let entries = self.entries.read().ok()?;
        let entry = entries.get(key)?;

        let age = now.signed_duration_since(entry.cached_at);
        if age > max_age {
            tracing::debug!(identity = %key, "cached profile expired");
            return None;
        }

        Some(entry.profile.clone())
    }

    pub fn put(&self, profile: Profile) {
        self.put_at(profile, Utc::now());
    }

    fn put_at(&self, profile: Profile, cached_at: DateTime<Utc>) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(profile.owner.clone(), CachedProfile { profile, cached_at });
        }
    }

    pub fn invalidate(&self, key: &IdentityKey) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(key);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
