//! Tracing infrastructure for the queue and its delivery loop.
//!
//! Enable with `--features tracing`. All trace macros become no-ops when
//! the feature is disabled, so the hot push/pop path pays nothing for them.

/// Initialize the tracing subscriber with timestamps.
///
/// Call this at the start of tests or the demo binary to enable trace output.
/// The filter defaults to `delivery_queue=trace` and honours `RUST_LOG`.
/// Does nothing if the `tracing` feature is not enabled.
#[cfg(feature = "tracing")]
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("delivery_queue=trace"));

    // A second call (e.g. from several tests) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_file(false)
                .with_line_number(false)
                .with_timer(fmt::time::uptime()),
        )
        .with(filter)
        .try_init();
}

#[cfg(not(feature = "tracing"))]
pub const fn init_tracing() {}

#[cfg(feature = "tracing")]
pub(crate) use tracing::{debug, error, info, trace, warn};

// With the feature off every level expands to nothing.
#[cfg(not(feature = "tracing"))]
macro_rules! disabled {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
pub(crate) use disabled as debug;
#[cfg(not(feature = "tracing"))]
pub(crate) use disabled as error;
#[cfg(not(feature = "tracing"))]
pub(crate) use disabled as info;
#[cfg(not(feature = "tracing"))]
pub(crate) use disabled as trace;
#[cfg(not(feature = "tracing"))]
pub(crate) use disabled as warn;
