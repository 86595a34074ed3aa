use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use nexus_auth::Identity;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Source of the authenticated caller.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The current caller, or `None` when nobody is signed in.
    async fn current_identity(&self) -> Result<Option<Identity>, IdentityError>;

    /// Sign the current caller out.
    async fn end_session(&self) -> Result<(), IdentityError>;
}

#[async_trait]
impl<P> IdentityProvider for Arc<P>
where
    P: IdentityProvider + ?Sized,
{
    async fn current_identity(&self) -> Result<Option<Identity>, IdentityError> {
        (**self).current_identity().await
    }

    async fn end_session(&self) -> Result<(), IdentityError> {
        (**self).end_session().await
    }
}
