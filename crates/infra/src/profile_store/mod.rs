//! Profile store boundary.
//!
//! Profiles are keyed by the owning identity. Creation is an atomic,
//! conditional insert so that "first account becomes owner" cannot be won by
//! two callers at once.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryProfileStore;
pub use r#trait::{ProfileStore, StoreError};
