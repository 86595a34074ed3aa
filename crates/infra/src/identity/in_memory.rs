use std::sync::RwLock;

use async_trait::async_trait;

use nexus_auth::Identity;

use super::r#trait::{IdentityError, IdentityProvider};

/// Identity provider holding a single signed-in caller.
///
/// Intended for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryIdentityProvider {
    current: RwLock<Option<Identity>>,
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(identity: Identity) -> Self {
        Self {
            current: RwLock::new(Some(identity)),
        }
    }

    /// Switch the signed-in caller.
    pub fn sign_in(&self, identity: Identity) {
        if let Ok(mut current) = self.current.write() {
            *current = Some(identity);
        }
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn current_identity(&self) -> Result<Option<Identity>, IdentityError> {
        let current = self
            .current
            .read()
            .map_err(|_| IdentityError::Unavailable("lock poisoned".to_string()))?;
        Ok(current.clone())
    }

    async fn end_session(&self) -> Result<(), IdentityError> {
        let mut current = self
            .current
            .write()
            .map_err(|_| IdentityError::Unavailable("lock poisoned".to_string()))?;
        *current = None;
        Ok(())
    }
}
