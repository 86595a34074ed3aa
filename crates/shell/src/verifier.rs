//! Step-up verification for the current session.

use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use nexus_auth::{Profile, SessionContext};
use nexus_infra::{SecurityEvent, SecurityEventKind, SecurityService};

/// Backup codes are exactly this many characters long.
pub const BACKUP_CODE_LEN: usize = 8;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum VerifyError {
    /// Neither the TOTP nor the backup-code check accepted the code.
    #[error("invalid code")]
    InvalidCode,

    #[error("no profile to verify against")]
    NoProfile,
}

/// Which credential passed the check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepUpMethod {
    Totp,
    BackupCode,
}

/// Validates one-time codes and marks the session verified.
///
/// No attempt counting or lockout: every failure may be retried.
pub struct SessionVerifier<A> {
    security: A,
}

impl<A> SessionVerifier<A>
where
    A: SecurityService,
{
    pub fn new(security: A) -> Self {
        Self { security }
    }

    pub async fn verify(
        &self,
        code: &str,
        profile: &Profile,
        session: &SessionContext,
    ) -> Result<StepUpMethod, VerifyError> {
        let method = if self.check_totp(code, profile).await {
            Some(StepUpMethod::Totp)
        } else if code.chars().count() == BACKUP_CODE_LEN && self.check_backup(code, profile).await {
            Some(StepUpMethod::BackupCode)
        } else {
            None
        };

        match method {
            Some(method) => {
                session.mark_verified();
                tracing::info!(
                    profile_id = %profile.id,
                    session_id = %session.id(),
                    ?method,
                    "session step-up verified"
                );
                self.audit(profile, SecurityEventKind::StepUpVerified, json!({ "method": method }))
                    .await;
                Ok(method)
            }
            None => {
                tracing::info!(profile_id = %profile.id, session_id = %session.id(), "step-up code rejected");
                self.audit(profile, SecurityEventKind::StepUpFailed, json!({})).await;
                Err(VerifyError::InvalidCode)
            }
        }
    }

    async fn check_totp(&self, code: &str, profile: &Profile) -> bool {
        let Some(secret) = profile.two_fa_secret.as_deref() else {
            return false;
        };
        match self.security.verify_totp(code, secret).await {
            Ok(valid) => valid,
            Err(err) => {
                tracing::warn!(profile_id = %profile.id, "TOTP check failed: {err}");
                false
            }
        }
    }

    async fn check_backup(&self, code: &str, profile: &Profile) -> bool {
        match self.security.verify_backup_code(profile.id, code).await {
            Ok(valid) => valid,
            Err(err) => {
                tracing::warn!(profile_id = %profile.id, "backup code check failed: {err}");
                false
            }
        }
    }

    async fn audit(&self, profile: &Profile, kind: SecurityEventKind, details: serde_json::Value) {
        if let Err(err) = self.security.log_event(profile, SecurityEvent::new(kind, details)).await {
            tracing::warn!(profile_id = %profile.id, "failed to audit {kind}: {err}");
        }
    }
}
