use serde::{Deserialize, Serialize};

use nexus_core::{DomainError, DomainResult};

/// Stable key of an authenticated caller (email-like).
///
/// Profiles are keyed by this value: at most one profile exists per key.
/// Keys are compared case-insensitively, so they are stored trimmed and
/// lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityKey(String);

impl IdentityKey {
    pub fn parse(raw: impl AsRef<str>) -> DomainResult<Self> {
        let normalized = raw.as_ref().trim().to_lowercase();
        if normalized.is_empty() {
            return Err(DomainError::validation("identity key must not be empty"));
        }
        if normalized.chars().any(char::is_whitespace) {
            return Err(DomainError::validation(format!(
                "identity key '{normalized}' contains whitespace"
            )));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl core::str::FromStr for IdentityKey {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// The caller as reported by the identity provider.
///
/// Not owned by this system; only the key is used for authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub key: IdentityKey,
    pub display_name: Option<String>,
}

impl Identity {
    pub fn new(key: IdentityKey) -> Self {
        Self {
            key,
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}
