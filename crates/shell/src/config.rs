//! Shell configuration (environment-driven).

use chrono::Duration;

use nexus_auth::{GatePolicy, Grant, Plan, ProvisioningPolicy, Route};

pub const ENV_SECURITY_ROUTE: &str = "NEXUS_SECURITY_ROUTE";
pub const ENV_OWNER_PLAN: &str = "NEXUS_OWNER_PLAN";
pub const ENV_OWNER_CREDITS: &str = "NEXUS_OWNER_CREDITS";
pub const ENV_STARTER_PLAN: &str = "NEXUS_STARTER_PLAN";
pub const ENV_STARTER_CREDITS: &str = "NEXUS_STARTER_CREDITS";
pub const ENV_PROFILE_CACHE_TTL_SECS: &str = "NEXUS_PROFILE_CACHE_TTL_SECS";

const DEFAULT_PROFILE_CACHE_TTL_SECS: i64 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    pub gate: GatePolicy,
    pub provisioning: ProvisioningPolicy,
    /// Max age of cached profiles; `None` (the default) disables the cache so
    /// every navigation re-fetches and sees out-of-band profile changes.
    pub profile_cache_ttl: Option<Duration>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            gate: GatePolicy::default(),
            provisioning: ProvisioningPolicy::default(),
            profile_cache_ttl: None,
        }
    }
}

impl ShellConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable source.
    ///
    /// Unparsable values fall back to defaults with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let security_route = lookup(ENV_SECURITY_ROUTE)
            .filter(|v| !v.trim().is_empty())
            .map(Route::new)
            .unwrap_or(defaults.gate.security_route);

        let owner = Grant {
            plan: lookup(ENV_OWNER_PLAN)
                .filter(|v| !v.trim().is_empty())
                .map(|v| Plan::new(v.trim().to_string()))
                .unwrap_or(defaults.provisioning.owner.plan),
            credits: parse_or(&lookup, ENV_OWNER_CREDITS, defaults.provisioning.owner.credits),
        };

        let member = Grant {
            plan: lookup(ENV_STARTER_PLAN)
                .filter(|v| !v.trim().is_empty())
                .map(|v| Plan::new(v.trim().to_string()))
                .unwrap_or(defaults.provisioning.member.plan),
            credits: parse_or(&lookup, ENV_STARTER_CREDITS, defaults.provisioning.member.credits),
        };

        // 0 disables caching.
        let ttl_secs = parse_or(&lookup, ENV_PROFILE_CACHE_TTL_SECS, DEFAULT_PROFILE_CACHE_TTL_SECS);
        let profile_cache_ttl = (ttl_secs > 0).then(|| Duration::seconds(ttl_secs));

        Self {
            gate: GatePolicy::new(security_route),
            provisioning: ProvisioningPolicy { owner, member },
            profile_cache_ttl,
        }
    }
}

fn parse_or<F>(lookup: &F, name: &str, default: i64) -> i64
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => default,
        Some(raw) => match raw.trim().parse::<i64>() {
            Ok(v) if v >= 0 => v,
            _ => {
                tracing::warn!("{name}={raw:?} is not a non-negative integer; using default {default}");
                default
            }
        },
    }
}
