//! Identity provider boundary: "who is calling" and "end this session".

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryIdentityProvider;
pub use r#trait::{IdentityError, IdentityProvider};
