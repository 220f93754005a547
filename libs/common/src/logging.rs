//! Structured logging bootstrap, the way the teacher's service binaries
//! initialize `tracing-subscriber` in `main()`, minus the `actix-web`
//! request-span layer this workspace has no HTTP surface for.

use tracing_subscriber::EnvFilter;

/// Initializes a global `tracing` subscriber with JSON output and an
/// env-filter defaulting to `info`. Safe to call once per process; a
/// second call is a silent no-op (mirrors `tracing_subscriber`'s own
/// `set_global_default` semantics).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .json()
        .try_init();
}
