use serde::{Deserialize, Serialize};

/// Current navigation target (path only, no query or fragment).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Route(String);

impl Route {
    /// Build a route from a location path.
    ///
    /// Query strings and fragments are dropped and an empty path becomes `/`.
    pub fn new(path: impl AsRef<str>) -> Self {
        let path = path.as_ref().trim();
        let end = path.find(['?', '#']).unwrap_or(path.len());
        let path = &path[..end];
        if path.is_empty() {
            Self("/".to_string())
        } else if path.starts_with('/') {
            Self(path.to_string())
        } else {
            Self(format!("/{path}"))
        }
    }

    pub fn root() -> Self {
        Self("/".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Route {
    fn default() -> Self {
        Self::root()
    }
}

impl core::fmt::Display for Route {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
