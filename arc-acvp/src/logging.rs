#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]

//! # Structured logging
//!
//! Subscriber setup for binaries and tools built on this crate. Output goes to
//! stderr because a subject process uses stdout for the wire protocol.
//! `RUST_LOG` overrides the configured level.

use tracing::Level;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Default level when `RUST_LOG` is unset
    pub log_level: Level,
    /// Include the event target (module path)
    pub with_target: bool,
    /// Include thread ids
    pub with_thread_ids: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self { log_level: Level::INFO, with_target: true, with_thread_ids: false }
    }
}

impl TracingConfig {
    /// Debug-level logging
    #[must_use]
    pub fn debug() -> Self {
        Self { log_level: Level::DEBUG, ..Default::default() }
    }

    /// Trace-level logging, including every Monte Carlo round
    #[must_use]
    pub fn trace() -> Self {
        Self { log_level: Level::TRACE, with_thread_ids: true, ..Default::default() }
    }
}

/// Install the global subscriber.
///
/// # Errors
/// Returns an error if a global subscriber is already installed.
///
/// # Example
/// ```no_run
/// use arc_acvp::logging::{TracingConfig, init_tracing};
///
/// init_tracing(&TracingConfig::default()).ok();
/// ```
pub fn init_tracing(config: &TracingConfig) -> Result<(), TryInitError> {
    let filter =
        EnvFilter::builder().with_default_directive(config.log_level.into()).from_env_lossy();

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(config.with_target)
                .with_thread_ids(config.with_thread_ids),
        )
        .with(filter)
        .try_init()
}
