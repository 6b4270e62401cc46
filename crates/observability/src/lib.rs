//! Process-wide tracing setup shared by Warden binaries.

pub mod tracing;

pub use self::tracing::{AUDIT_TARGET, DEFAULT_DIRECTIVE};

/// Install the JSON subscriber (`RUST_LOG`, default `info`).
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    self::tracing::init(DEFAULT_DIRECTIVE);
}

/// Same as [`init`] with a different fallback directive.
pub fn init_with_default(directive: &str) {
    self::tracing::init(directive);
}
