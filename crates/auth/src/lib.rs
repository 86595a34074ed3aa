//! `nexus-auth`: pure account/authorization policy for the shell gate.
//!
//! This crate is intentionally decoupled from storage, transport and async.
//! Everything here is a deterministic function of its inputs.

pub mod gate;
pub mod identity;
pub mod profile;
pub mod roles;
pub mod route;
pub mod session;

pub use gate::{GatePolicy, GateState, evaluate};
pub use identity::{Identity, IdentityKey};
pub use profile::{Grant, Plan, Profile, ProfileDraft, ProvisioningPolicy};
pub use roles::Role;
pub use route::Route;
pub use session::SessionContext;
