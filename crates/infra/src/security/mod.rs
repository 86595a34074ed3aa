//! Security service boundary: second-factor checks and the audit trail.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::{AuditRecord, InMemorySecurityService};
pub use r#trait::{SecurityError, SecurityEvent, SecurityEventKind, SecurityService};
