//! `nexus-core`: shared building blocks for the account gate.
//!
//! This crate contains **pure** primitives (no IO, no async).

pub mod entity;
pub mod error;
pub mod id;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{ProfileId, SessionId};
