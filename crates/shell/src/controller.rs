//! Shell controller: drives the gate on every navigation.
//!
//! The controller owns the only mutable state of the gate (current route,
//! resolved profile, session context) and a generation counter. Each
//! navigation takes a ticket; results for a ticket that is no longer current
//! are dropped so a slow response can never overwrite a newer one.
//!
//! Shell state sits behind a `std::sync::Mutex` that is never held across an
//! `.await`.

use std::sync::{Arc, Mutex, MutexGuard};

use nexus_auth::{GateState, IdentityKey, Profile, Route, SessionContext, evaluate};
use nexus_infra::{IdentityError, IdentityProvider, ProfileStore, SecurityService};

use crate::bootstrap::ProfileBootstrapper;
use crate::cache::ProfileCache;
use crate::config::ShellConfig;
use crate::nudge::NudgeScheduler;
use crate::types::{AccountSummary, RenderDecision, ShellView};
use crate::verifier::{SessionVerifier, StepUpMethod, VerifyError};

/// Handle for one navigation; results are applied only while it is current.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationTicket {
    generation: u64,
    route: Route,
}

impl NavigationTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn route(&self) -> &Route {
        &self.route
    }
}

/// Where a resolved profile came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileSource {
    Cache,
    Store,
    Registered,
}

/// Outcome of identity + profile resolution for one navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Nobody is signed in.
    Anonymous,
    Resolved {
        identity: IdentityKey,
        profile: Profile,
        source: ProfileSource,
    },
    /// Identity or profile could not be resolved; the shell degrades to an
    /// unprivileged view.
    Failed {
        identity: Option<IdentityKey>,
        reason: String,
    },
}

#[derive(Debug)]
struct ShellState {
    generation: u64,
    route: Route,
    identity: Option<IdentityKey>,
    profile: Option<Profile>,
    session: SessionContext,
    gate: GateState,
}

pub struct ShellController {
    identity: Arc<dyn IdentityProvider>,
    bootstrapper: ProfileBootstrapper<Arc<dyn ProfileStore>, Arc<dyn SecurityService>>,
    verifier: SessionVerifier<Arc<dyn SecurityService>>,
    nudges: NudgeScheduler,
    cache: ProfileCache,
    config: ShellConfig,
    state: Mutex<ShellState>,
}

impl ShellController {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn ProfileStore>,
        security: Arc<dyn SecurityService>,
        config: ShellConfig,
    ) -> Self {
        let session = SessionContext::start();
        tracing::info!(session_id = %session.id(), "client session started");

        Self {
            identity,
            bootstrapper: ProfileBootstrapper::new(
                store,
                security.clone(),
                config.provisioning.clone(),
            ),
            verifier: SessionVerifier::new(security),
            nudges: NudgeScheduler::new(),
            cache: ProfileCache::new(),
            config,
            state: Mutex::new(ShellState {
                generation: 0,
                route: Route::root(),
                identity: None,
                profile: None,
                session,
                gate: GateState::NoProfile,
            }),
        }
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    pub fn cache(&self) -> &ProfileCache {
        &self.cache
    }

    /// Handle to the current session.
    pub fn session(&self) -> SessionContext {
        self.lock().session.clone()
    }

    pub fn profile(&self) -> Option<Profile> {
        self.lock().profile.clone()
    }

    /// Start a navigation: the route becomes current immediately and every
    /// earlier ticket becomes stale.
    ///
    /// Leaving the security route drops the cached profile, since 2FA
    /// enrollment happens there.
    pub fn begin_navigation(&self, route: Route) -> NavigationTicket {
        let mut state = self.lock();
        let policy = &self.config.gate;
        if policy.is_security_route(&state.route) && !policy.is_security_route(&route) {
            if let Some(key) = &state.identity {
                self.cache.invalidate(key);
            }
        }

        state.generation += 1;
        state.route = route.clone();
        self.rederive(&mut state);

        tracing::debug!(generation = state.generation, route = %route, "navigation started");
        NavigationTicket {
            generation: state.generation,
            route,
        }
    }

    /// Resolve identity and profile for a navigation. Does not touch shell
    /// state.
    pub async fn resolve(&self, ticket: &NavigationTicket) -> Resolution {
        let identity = match self.identity.current_identity().await {
            Ok(Some(identity)) => identity,
            Ok(None) => return Resolution::Anonymous,
            Err(err) => {
                tracing::warn!(generation = ticket.generation, "identity lookup failed: {err}");
                return Resolution::Failed {
                    identity: None,
                    reason: err.to_string(),
                };
            }
        };

        if let Some(ttl) = self.config.profile_cache_ttl {
            if let Some(profile) = self.cache.get(&identity.key, ttl) {
                return Resolution::Resolved {
                    identity: identity.key,
                    profile,
                    source: ProfileSource::Cache,
                };
            }
        }

        match self.bootstrapper.bootstrap(&identity).await {
            Ok(outcome) => {
                let source = if outcome.is_new() {
                    ProfileSource::Registered
                } else {
                    ProfileSource::Store
                };
                Resolution::Resolved {
                    identity: identity.key,
                    profile: outcome.into_profile(),
                    source,
                }
            }
            Err(err) => {
                tracing::error!(identity = %identity.key, "failed to init profile: {err}");
                Resolution::Failed {
                    identity: Some(identity.key),
                    reason: err.to_string(),
                }
            }
        }
    }

    /// Apply a resolution if its ticket is still current.
    ///
    /// Returns `None` (and changes nothing, cache included) for a stale
    /// ticket. A sign-out or a different signed-in identity ends the local
    /// session, so step-up and nudge flags never carry over.
    pub fn complete_navigation(
        &self,
        ticket: &NavigationTicket,
        resolution: Resolution,
    ) -> Option<ShellView> {
        let mut state = self.lock();
        if ticket.generation != state.generation {
            tracing::debug!(
                ticket = ticket.generation,
                current = state.generation,
                "discarding stale navigation result"
            );
            return None;
        }

        let identity_changed = match &resolution {
            Resolution::Anonymous => state.identity.is_some(),
            Resolution::Resolved { identity, .. }
            | Resolution::Failed {
                identity: Some(identity),
                ..
            } => state.identity.as_ref().is_some_and(|prev| prev != identity),
            Resolution::Failed { identity: None, .. } => false,
        };
        if identity_changed {
            self.cache.clear();
            self.restart_session(&mut state);
        }

        match resolution {
            Resolution::Anonymous => {
                state.identity = None;
                state.profile = None;
            }
            Resolution::Resolved {
                identity,
                profile,
                source,
            } => {
                if source != ProfileSource::Cache && self.config.profile_cache_ttl.is_some() {
                    self.cache.put(profile.clone());
                }
                if profile.is_restricted() {
                    // Observed only; no deny path is defined for these flags.
                    tracing::warn!(
                        profile_id = %profile.id,
                        is_blocked = profile.is_blocked,
                        security_lockdown = profile.security_lockdown,
                        "profile is restricted"
                    );
                }
                state.identity = Some(identity);
                state.profile = Some(profile);
            }
            Resolution::Failed { identity, .. } => {
                // Provider errors leave the last known identity in place.
                if identity.is_some() {
                    state.identity = identity;
                }
                state.profile = None;
            }
        }

        self.rederive(&mut state);
        Some(self.view_of(&state))
    }

    /// Full navigation cycle. A superseded navigation returns the view of
    /// whatever is current instead of its own result.
    pub async fn navigate(&self, route: Route) -> ShellView {
        let ticket = self.begin_navigation(route);
        let resolution = self.resolve(&ticket).await;
        match self.complete_navigation(&ticket, resolution) {
            Some(view) => view,
            None => self.view(),
        }
    }

    pub fn view(&self) -> ShellView {
        let state = self.lock();
        self.view_of(&state)
    }

    /// Submit a step-up code for the current session.
    ///
    /// On success the gate is re-derived from the held profile; nothing is
    /// re-fetched.
    pub async fn submit_step_up(&self, code: &str) -> Result<(StepUpMethod, ShellView), VerifyError> {
        let (profile, session) = {
            let state = self.lock();
            (state.profile.clone(), state.session.clone())
        };
        let profile = profile.ok_or(VerifyError::NoProfile)?;

        let method = self.verifier.verify(code, &profile, &session).await?;

        let mut state = self.lock();
        self.rederive(&mut state);
        Ok((method, self.view_of(&state)))
    }

    pub fn dismiss_nudge(&self) -> ShellView {
        let state = self.lock();
        self.nudges.dismiss(&state.session);
        self.view_of(&state)
    }

    /// Drop the cached profile for the current identity and re-run the
    /// current route.
    pub async fn refresh(&self) -> ShellView {
        let (identity, route) = {
            let state = self.lock();
            (state.identity.clone(), state.route.clone())
        };
        if let Some(key) = identity {
            self.cache.invalidate(&key);
        }
        self.navigate(route).await
    }

    /// End the session at the identity provider and start a fresh local one.
    ///
    /// Local state is reset even if the provider call fails.
    pub async fn logout(&self) -> Result<ShellView, IdentityError> {
        let ended = self.identity.end_session().await;
        if let Err(err) = &ended {
            tracing::warn!("identity provider failed to end session: {err}");
        }

        self.cache.clear();
        let mut state = self.lock();
        state.generation += 1;
        state.identity = None;
        state.profile = None;
        self.restart_session(&mut state);
        self.rederive(&mut state);

        let view = self.view_of(&state);
        ended.map(|()| view)
    }

    fn restart_session(&self, state: &mut ShellState) {
        let next = SessionContext::start();
        tracing::info!(
            ended = %state.session.id(),
            started = %next.id(),
            "client session restarted"
        );
        state.session = next;
    }

    fn rederive(&self, state: &mut ShellState) {
        let next = evaluate(
            state.profile.as_ref(),
            &state.route,
            &state.session,
            &self.config.gate,
        );
        if next != state.gate {
            tracing::info!(
                from = %state.gate,
                to = %next,
                route = %state.route,
                reason = next.reason(),
                "gate transition"
            );
            state.gate = next;
        }
    }

    fn view_of(&self, state: &ShellState) -> ShellView {
        let profile = state.profile.as_ref();
        ShellView {
            route: state.route.clone(),
            gate: state.gate,
            render: RenderDecision::from_gate(state.gate, profile),
            account: AccountSummary::from_profile(profile),
            show_nudge: self.nudges.should_show(profile, &state.session),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ShellState> {
        // State is replaced wholesale under the lock, so a poisoned guard
        // still holds a consistent value.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
