//! Feature-gated tracing for the table builder.
//!
//! With the `tracing` feature enabled this module re-exports the `tracing`
//! macros the crate uses; call sites are themselves feature-gated, so a
//! default build carries no instrumentation at all.

#[cfg(feature = "tracing")]
pub use tracing::{debug, debug_span, info, trace, warn};

/// Initialize a tracing subscriber for tests and development.
///
/// Respects `RUST_LOG`-style filtering via `EnvFilter`; defaults to `info`.
/// Safe to call more than once.
#[cfg(feature = "tracing")]
pub fn init_subscriber() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_ansi(false),
        )
        .with(filter)
        .try_init()
        .ok();
}

#[cfg(not(feature = "tracing"))]
pub fn init_subscriber() {}
