use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use nexus_auth::Profile;
use nexus_core::ProfileId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SecurityError {
    /// The stored TOTP secret could not be decoded or is too short.
    #[error("invalid TOTP secret: {0}")]
    InvalidSecret(String),

    #[error("audit log rejected event: {0}")]
    Audit(String),

    #[error("security service unavailable: {0}")]
    Unavailable(String),
}

/// Audited security event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventKind {
    Register,
    Login,
    StepUpVerified,
    StepUpFailed,
}

impl SecurityEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityEventKind::Register => "register",
            SecurityEventKind::Login => "login",
            SecurityEventKind::StepUpVerified => "step_up_verified",
            SecurityEventKind::StepUpFailed => "step_up_failed",
        }
    }
}

impl core::fmt::Display for SecurityEventKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event submitted to the audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub kind: SecurityEventKind,
    pub details: JsonValue,
}

impl SecurityEvent {
    pub fn new(kind: SecurityEventKind, details: JsonValue) -> Self {
        Self { kind, details }
    }
}

/// Second-factor verification and security auditing.
///
/// Audit operations are best-effort from the caller's perspective: callers
/// log and swallow their errors.
#[async_trait]
pub trait SecurityService: Send + Sync {
    /// Check a time-based one-time code against a base32 secret.
    async fn verify_totp(&self, code: &str, secret: &str) -> Result<bool, SecurityError>;

    /// Check (and consume) a backup code issued to a profile.
    async fn verify_backup_code(&self, profile_id: ProfileId, code: &str) -> Result<bool, SecurityError>;

    async fn log_event(&self, profile: &Profile, event: SecurityEvent) -> Result<(), SecurityError>;

    /// Post-login hook (anomaly detection etc.). Fire-and-forget.
    async fn on_login(&self, profile: &Profile) -> Result<(), SecurityError>;
}

#[async_trait]
impl<S> SecurityService for Arc<S>
where
    S: SecurityService + ?Sized,
{
    async fn verify_totp(&self, code: &str, secret: &str) -> Result<bool, SecurityError> {
        (**self).verify_totp(code, secret).await
    }

    async fn verify_backup_code(&self, profile_id: ProfileId, code: &str) -> Result<bool, SecurityError> {
        (**self).verify_backup_code(profile_id, code).await
    }

    async fn log_event(&self, profile: &Profile, event: SecurityEvent) -> Result<(), SecurityError> {
        (**self).log_event(profile, event).await
    }

    async fn on_login(&self, profile: &Profile) -> Result<(), SecurityError> {
        (**self).on_login(profile).await
    }
}
