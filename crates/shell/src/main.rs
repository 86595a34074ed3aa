//! Demo walk-through of the account gate against in-memory adapters.
//!
//! Prints one JSON view per step to stdout; logs go through the shared
//! subscriber.

use std::sync::Arc;

use anyhow::Context;

use nexus_auth::{Identity, IdentityKey, Route};
use nexus_infra::{InMemoryIdentityProvider, InMemoryProfileStore, InMemorySecurityService};
use nexus_shell::{ShellConfig, ShellController, ShellView};

const ENV_DEMO_IDENTITY: &str = "NEXUS_DEMO_IDENTITY";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    nexus_observability::init();

    let config = ShellConfig::from_env();
    let raw_identity = std::env::var(ENV_DEMO_IDENTITY).unwrap_or_else(|_| {
        tracing::warn!("{ENV_DEMO_IDENTITY} not set; using owner@example.com");
        "owner@example.com".to_string()
    });
    let key = IdentityKey::parse(&raw_identity).context("invalid demo identity")?;

    let identity = Arc::new(InMemoryIdentityProvider::signed_in(Identity::new(key)));
    let store = Arc::new(InMemoryProfileStore::new());
    let security = Arc::new(InMemorySecurityService::new());
    let shell = ShellController::new(identity.clone(), store.clone(), security.clone(), config);

    let dashboard = Route::new("/dashboard");
    let security_route = shell.config().gate.security_route.clone();

    print_step("first visit", &shell.navigate(dashboard.clone()).await)?;
    print_step("security page", &shell.navigate(security_route).await)?;

    let profile = shell.profile().context("demo identity has no profile")?;
    let secret = InMemorySecurityService::generate_secret();
    store.set_two_factor(profile.id, Some(secret.clone()))?;
    print_step("after 2FA enrollment", &shell.refresh().await)?;

    match shell.submit_step_up("000000").await {
        Ok(_) => tracing::warn!("placeholder code was accepted"),
        Err(err) => tracing::info!("wrong code rejected: {err}"),
    }

    let code = InMemorySecurityService::current_code(&secret)?;
    let (method, view) = shell.submit_step_up(&code).await?;
    tracing::info!(?method, "step-up accepted");
    print_step("after step-up", &view)?;
    print_step("next navigation", &shell.navigate(dashboard.clone()).await)?;

    print_step("after logout", &shell.logout().await?)?;

    tracing::info!(audit_events = security.audit_trail().len(), "demo finished");
    Ok(())
}

fn print_step(step: &str, view: &ShellView) -> anyhow::Result<()> {
    let json = serde_json::to_string(view)?;
    println!("{step}: {json}");
    Ok(())
}
