//! `nexus-shell`
//!
//! **Responsibility:** Client-side account gate of the Nexus shell.
//!
//! This crate provides:
//! - Profile bootstrap on first sign-in (owner election, starter grants)
//! - The per-navigation security gate (mandatory 2FA for privileged roles,
//!   once-per-session step-up)
//! - Step-up code verification (TOTP, then single-use backup code)
//! - The advisory 2FA reminder
//!
//! The gate is a UX guard. The backend remains the authority on every
//! privileged operation.

pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod controller;
pub mod nudge;
pub mod types;
pub mod verifier;

pub use bootstrap::{BootstrapError, Bootstrapped, ProfileBootstrapper};
pub use cache::ProfileCache;
pub use config::ShellConfig;
pub use controller::{NavigationTicket, ProfileSource, Resolution, ShellController};
pub use nudge::NudgeScheduler;
pub use types::{AccountSummary, RenderDecision, ShellView};
pub use verifier::{BACKUP_CODE_LEN, SessionVerifier, StepUpMethod, VerifyError};
