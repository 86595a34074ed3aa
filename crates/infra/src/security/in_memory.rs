use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value as JsonValue, json};
use totp_rs::{Algorithm, Secret, TOTP};

use nexus_auth::Profile;
use nexus_core::ProfileId;

use super::r#trait::{SecurityError, SecurityEvent, SecurityEventKind, SecurityService};

const TOTP_DIGITS: usize = 6;
const TOTP_SKEW: u8 = 1;
const TOTP_STEP_SECONDS: u64 = 30;
const TOTP_ISSUER: &str = "Nexus";

/// One entry of the recorded audit trail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRecord {
    pub profile_id: ProfileId,
    pub kind: SecurityEventKind,
    pub details: JsonValue,
    pub recorded_at: DateTime<Utc>,
}

/// In-memory security service.
///
/// - TOTP: RFC 6238, SHA-1, 6 digits, 30 s step, ±1 step skew
/// - Backup codes: single use, compared case-insensitively
/// - Audit: appended to an in-memory trail
///
/// Intended for tests/dev.
#[derive(Debug, Default)]
pub struct InMemorySecurityService {
    backup_codes: RwLock<HashMap<ProfileId, Vec<String>>>,
    audit: RwLock<Vec<AuditRecord>>,
    backup_checks: AtomicUsize,
    reject_audit: AtomicBool,
}

impl InMemorySecurityService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a fresh base32 secret suitable for `verify_totp`.
    pub fn generate_secret() -> String {
        Secret::generate_secret().to_encoded().to_string()
    }

    /// Current code for a secret (what an authenticator app would show).
    pub fn current_code(secret: &str) -> Result<String, SecurityError> {
        totp_for(secret)?
            .generate_current()
            .map_err(|e| SecurityError::Unavailable(format!("system clock error: {e}")))
    }

    /// Replace the backup codes issued to a profile.
    pub fn set_backup_codes<I, C>(&self, profile_id: ProfileId, codes: I)
    where
        I: IntoIterator<Item = C>,
        C: AsRef<str>,
    {
        let codes = codes
            .into_iter()
            .map(|c| normalize_backup_code(c.as_ref()))
            .collect();
        if let Ok(mut map) = self.backup_codes.write() {
            map.insert(profile_id, codes);
        }
    }

    pub fn remaining_backup_codes(&self, profile_id: ProfileId) -> usize {
        self.backup_codes
            .read()
            .ok()
            .and_then(|map| map.get(&profile_id).map(Vec::len))
            .unwrap_or(0)
    }

    /// Number of backup-code checks served so far.
    pub fn backup_checks(&self) -> usize {
        self.backup_checks.load(Ordering::Relaxed)
    }

    /// Make audit operations (`log_event`, `on_login`) fail.
    pub fn reject_audit(&self, reject: bool) {
        self.reject_audit.store(reject, Ordering::Relaxed);
    }

    /// Snapshot of the audit trail, oldest first.
    pub fn audit_trail(&self) -> Vec<AuditRecord> {
        self.audit.read().map(|a| a.clone()).unwrap_or_default()
    }

    pub fn events_of(&self, kind: SecurityEventKind) -> Vec<AuditRecord> {
        self.audit_trail()
            .into_iter()
            .filter(|r| r.kind == kind)
            .collect()
    }

    fn record(&self, profile_id: ProfileId, kind: SecurityEventKind, details: JsonValue) -> Result<(), SecurityError> {
        if self.reject_audit.load(Ordering::Relaxed) {
            return Err(SecurityError::Audit(format!("{kind} rejected")));
        }

        let mut audit = self
            .audit
            .write()
            .map_err(|_| SecurityError::Unavailable("lock poisoned".to_string()))?;
        audit.push(AuditRecord {
            profile_id,
            kind,
            details,
            recorded_at: Utc::now(),
        });
        Ok(())
    }
}

/// Verifier for a base32 secret. The account label is not part of the code.
fn totp_for(secret: &str) -> Result<TOTP, SecurityError> {
    let bytes = Secret::Encoded(secret.trim().to_uppercase())
        .to_bytes()
        .map_err(|e| SecurityError::InvalidSecret(format!("{e:?}")))?;

    TOTP::new(
        Algorithm::SHA1,
        TOTP_DIGITS,
        TOTP_SKEW,
        TOTP_STEP_SECONDS,
        bytes,
        Some(TOTP_ISSUER.to_string()),
        "user".to_string(),
    )
    .map_err(|e| SecurityError::InvalidSecret(format!("{e:?}")))
}

fn normalize_backup_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

#[async_trait]
impl SecurityService for InMemorySecurityService {
    async fn verify_totp(&self, code: &str, secret: &str) -> Result<bool, SecurityError> {
        let totp = totp_for(secret)?;
        Ok(totp.check_current(code.trim()).unwrap_or(false))
    }

    async fn verify_backup_code(&self, profile_id: ProfileId, code: &str) -> Result<bool, SecurityError> {
        self.backup_checks.fetch_add(1, Ordering::Relaxed);

        let candidate = normalize_backup_code(code);
        let mut map = self
            .backup_codes
            .write()
            .map_err(|_| SecurityError::Unavailable("lock poisoned".to_string()))?;

        let Some(codes) = map.get_mut(&profile_id) else {
            return Ok(false);
        };

        match codes.iter().position(|c| *c == candidate) {
            Some(idx) => {
                codes.swap_remove(idx);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn log_event(&self, profile: &Profile, event: SecurityEvent) -> Result<(), SecurityError> {
        tracing::info!(
            profile_id = %profile.id,
            event = %event.kind,
            "security event"
        );
        self.record(profile.id, event.kind, event.details)
    }

    async fn on_login(&self, profile: &Profile) -> Result<(), SecurityError> {
        self.record(
            profile.id,
            SecurityEventKind::Login,
            json!({ "role": profile.role.as_str() }),
        )
    }
}
