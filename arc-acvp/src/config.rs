//! Configuration for the vector-set engine and the subprocess transport.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]

use crate::error::{AcvpError, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Engine settings shared by every vector set processed with it.
///
/// # Examples
/// ```rust
/// use arc_acvp::config::EngineConfig;
///
/// let config = EngineConfig::new().with_max_in_flight(8);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Maximum number of asynchronous (AFT) transactions outstanding at once.
    ///
    /// Submission waits for a slot once the limit is reached.
    /// Default: `64`
    pub max_in_flight: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { max_in_flight: 64 }
    }
}

impl EngineConfig {
    /// Create a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the outstanding-transaction limit.
    #[must_use]
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight;
        self
    }

    /// Check the settings are usable.
    ///
    /// # Errors
    /// Returns [`AcvpError::Configuration`] if `max_in_flight` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.max_in_flight == 0 {
            return Err(AcvpError::Configuration(
                "max_in_flight must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// How to start and talk to a subject-under-test process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubprocessConfig {
    /// Executable implementing the subject protocol on stdin/stdout.
    pub program: PathBuf,
    /// Arguments passed to the executable.
    pub args: Vec<String>,
    /// Deadline for a single transaction.
    /// Default: 60 seconds
    pub transact_timeout: Duration,
}

impl SubprocessConfig {
    /// Configuration for `program` with no arguments and the default timeout.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into(), args: Vec::new(), transact_timeout: Duration::from_secs(60) }
    }

    /// Append an argument.
    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set the per-transaction deadline.
    #[must_use]
    pub fn with_transact_timeout(mut self, timeout: Duration) -> Self {
        self.transact_timeout = timeout;
        self
    }

    /// Check the settings are usable.
    ///
    /// # Errors
    /// Returns [`AcvpError::Configuration`] if the program path is empty or the
    /// timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if self.program.as_os_str().is_empty() {
            return Err(AcvpError::Configuration("subject program path is empty".to_string()));
        }
        if self.transact_timeout.is_zero() {
            return Err(AcvpError::Configuration("transact_timeout must be non-zero".to_string()));
        }
        Ok(())
    }
}
