//! Error types for ACVP vector-set processing.
//!
//! Three layers, matching where a failure can originate:
//! - [`CodecError`]: hex and fixed-width integer decoding.
//! - [`SubjectError`]: the subject-under-test or the transport that reaches it.
//! - [`AcvpError`]: the engine-level taxonomy returned from processing a vector set.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while decoding hex text or fixed-width integers.
///
/// `PartialEq` only: `hex::FromHexError` has no `Eq`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodecError {
    /// Hex text has odd length or contains non-hex characters.
    #[error("malformed hex encoding: {0}")]
    MalformedEncoding(#[from] hex::FromHexError),

    /// A fixed-width field did not have the expected number of bytes.
    #[error("invalid field length: expected {expected} bytes, got {actual}")]
    InvalidLength {
        /// Required length in bytes.
        expected: usize,
        /// Length actually supplied.
        actual: usize,
    },
}

/// Failures of the subject-under-test or of the transport that reaches it.
#[derive(Debug, Error)]
pub enum SubjectError {
    /// Reading from or writing to the subject failed.
    #[error("subject I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The subject exited or the transport was shut down.
    #[error("subject closed the connection")]
    Closed,

    /// The subject did not answer within the configured deadline.
    #[error("subject did not answer {operation} within {after:?}")]
    Timeout {
        /// Operation that timed out.
        operation: String,
        /// Deadline that expired.
        after: Duration,
    },

    /// The subject returned a different number of results than requested.
    #[error("{operation}: expected {expected} results, subject returned {actual}")]
    ResultCount {
        /// Operation that was issued.
        operation: String,
        /// Number of results requested.
        expected: usize,
        /// Number of results received.
        actual: usize,
    },

    /// A result had the right count but unusable contents.
    #[error("malformed subject result: {0}")]
    MalformedResult(String),

    /// The wire framing was violated.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// The subject reported a failure for this request.
    #[error("subject rejected {operation}: {message}")]
    Rejected {
        /// Operation that was rejected.
        operation: String,
        /// Reason given.
        message: String,
    },
}

/// Position of a problem inside a vector set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorLocation {
    /// A whole test group.
    Group {
        /// Test group id (`tgId`).
        group_id: u64,
    },
    /// One test case within a group.
    Case {
        /// Test group id (`tgId`).
        group_id: u64,
        /// Test case id (`tcId`).
        test_id: u64,
    },
}

impl VectorLocation {
    /// Location of a test group.
    #[must_use]
    pub fn group(group_id: u64) -> Self {
        Self::Group { group_id }
    }

    /// Location of a test case.
    #[must_use]
    pub fn case(group_id: u64, test_id: u64) -> Self {
        Self::Case { group_id, test_id }
    }

    /// Test group id of this location.
    #[must_use]
    pub fn group_id(&self) -> u64 {
        match self {
            Self::Group { group_id } | Self::Case { group_id, .. } => *group_id,
        }
    }
}

impl fmt::Display for VectorLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Group { group_id } => write!(f, "test group {group_id}"),
            Self::Case { group_id, test_id } => write!(f, "test case {group_id}/{test_id}"),
        }
    }
}

/// Errors from processing an ACVP vector set.
///
/// Every variant is terminal for the whole set: no partial response is produced
/// once one of these is returned.
#[derive(Debug, Error)]
pub enum AcvpError {
    /// The payload does not deserialize into the expected structure.
    #[error("malformed vector set: {0}")]
    MalformedInput(#[from] serde_json::Error),

    /// A bit-length, alignment or encoding invariant is violated.
    #[error("{location}: {reason}")]
    InvalidTestVector {
        /// Offending group or test case.
        location: VectorLocation,
        /// What is wrong with it.
        reason: String,
    },

    /// An asynchronous (AFT) transaction failed.
    #[error("{location}: subject failure: {source}")]
    SubjectFailure {
        /// Test case being executed.
        location: VectorLocation,
        /// Underlying subject error.
        #[source]
        source: SubjectError,
    },

    /// A Monte Carlo chain could not continue.
    #[error("{location}: Monte Carlo chain aborted in round {round}: {source}")]
    MonteCarloAborted {
        /// Test case whose chain was aborted.
        location: VectorLocation,
        /// Zero-based round that failed.
        round: usize,
        /// Underlying subject error.
        #[source]
        source: SubjectError,
    },

    /// A completion task panicked or was cancelled.
    #[error("completion task failed: {0}")]
    Task(String),

    /// Encoding the response failed.
    #[error("response serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// Engine or transport configuration is unusable.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl AcvpError {
    /// Builds an [`AcvpError::InvalidTestVector`].
    pub fn invalid(location: VectorLocation, reason: impl Into<String>) -> Self {
        Self::InvalidTestVector { location, reason: reason.into() }
    }
}

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, AcvpError>;
