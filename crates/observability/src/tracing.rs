//! JSON tracing subscriber.
//!
//! Audit events (privileged cross-tenant access, API token lifecycle,
//! membership changes) are emitted with `target: "audit"`; the target is kept
//! in the output so they can be routed separately.

use tracing_subscriber::EnvFilter;

pub const DEFAULT_DIRECTIVE: &str = "info";
pub const AUDIT_TARGET: &str = "audit";

/// Initialize tracing for the process. `RUST_LOG` wins over `fallback`.
pub fn init(fallback: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(true)
        .with_current_span(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init(DEFAULT_DIRECTIVE);
        init("debug");
        tracing::info!(target: AUDIT_TARGET, "still logging");
    }
}
