//! Shared tracing setup for Nexus binaries.

pub mod logging;

pub use logging::LogFormat;

/// Initialize process-wide logging from the environment.
///
/// Safe to call multiple times; later calls are no-ops.
pub fn init() {
    logging::init(LogFormat::from_env());
}
