#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![deny(clippy::panic)]

//! Transactions against the subject-under-test.
//!
//! A [`Transactor`] issues an operation with byte-string arguments and returns the
//! subject's byte-string results. Two modes are offered:
//!
//! - **blocking** ([`Transactor::transact`]): the caller awaits the result set. Used
//!   where the next request depends on this one (Monte Carlo rounds).
//! - **non-blocking** ([`Transactor::transact_async`]): returns a [`Completion`] that
//!   can be driven elsewhere. Completions may finish in any order.
//!
//! Ordering across completions is the assembler's job, not the transactor's.
//!
//! Implementations:
//! - [`subprocess::SubprocessTransactor`]: a child process speaking the [`wire`] framing.
//! - [`scripted::ScriptedTransactor`]: in-memory test double.

pub mod scripted;
pub mod subprocess;
pub mod wire;

pub use scripted::{RecordedCall, ScriptedTransactor};
pub use subprocess::SubprocessTransactor;

use crate::error::SubjectError;
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Result set returned by the subject: one byte string per requested result.
pub type Results = Vec<Vec<u8>>;

/// Pending result of a non-blocking transaction.
pub type Completion = Pin<Box<dyn Future<Output = Result<Results, SubjectError>> + Send + 'static>>;

/// Request/response access to a subject-under-test.
#[async_trait]
pub trait Transactor: Send + Sync + 'static {
    /// Issues `operation` and waits for exactly `expected_results` results.
    ///
    /// # Errors
    /// Returns a [`SubjectError`] if the subject fails, the transport breaks, or the
    /// result count differs from `expected_results`.
    async fn transact(
        &self,
        operation: &str,
        expected_results: usize,
        args: &[&[u8]],
    ) -> Result<Results, SubjectError>;

    /// Issues `operation` without waiting; the returned [`Completion`] resolves to the
    /// result set.
    fn transact_async(
        self: Arc<Self>,
        operation: String,
        expected_results: usize,
        args: Vec<Vec<u8>>,
    ) -> Completion {
        Box::pin(async move {
            let borrowed: Vec<&[u8]> = args.iter().map(Vec::as_slice).collect();
            self.transact(&operation, expected_results, &borrowed).await
        })
    }
}

/// Rejects a result set whose size differs from what was requested.
///
/// # Errors
/// Returns [`SubjectError::ResultCount`] on mismatch.
pub fn check_result_count(
    operation: &str,
    expected_results: usize,
    results: Results,
) -> Result<Results, SubjectError> {
    if results.len() != expected_results {
        return Err(SubjectError::ResultCount {
            operation: operation.to_string(),
            expected: expected_results,
            actual: results.len(),
        });
    }
    Ok(results)
}
