//! One-shot structured logging setup (ambient stack, grounded on
//! suatkocar-codegraph's `observability::init_logging`; the teacher has no
//! equivalent and relies on bare `eprintln!`).

use tracing_subscriber::EnvFilter;

/// Initialise `tracing` with `RUST_LOG` support, defaulting to `code_graph=info`.
/// Safe to call more than once — `try_init` swallows the "already set" error so
/// tests that spin up multiple components don't panic.
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("code_graph=info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .try_init();
}
