//! Tracing subscriber setup for the binary

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber. `RUST_LOG` wins over `verbose`.
/// Calling this twice is harmless; the second install is ignored.
pub fn init(verbose: bool) {
    let fallback = if verbose { "vigil=debug" } else { "vigil=info" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_target(false)
        .try_init();
}
