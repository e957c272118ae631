//! Tracing setup for the pivot binary.
//!
//! Progress messages ("Running: ...", "Resolved to: ...") are emitted at
//! `info` and are the tool's normal console output, so `info` is the default
//! level rather than a debugging aid.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG` env var. Defaults to `info` if unset.
/// Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=pivot=debug pivot quay.io/openshift/os@sha256:...
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
