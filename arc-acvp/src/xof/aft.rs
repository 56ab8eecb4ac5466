#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![deny(clippy::panic)]

//! Algorithm Functional Test execution.
//!
//! Every case is one non-blocking transaction returning a single digest. Cases do
//! not depend on each other, so they are all submitted before any is awaited.

use super::types::TestCaseResponse;
use super::validate::AftCase;
use crate::assembler::GroupResponseBuilder;
use crate::codec;
use crate::error::{AcvpError, Result, SubjectError, VectorLocation};
use crate::transact::Transactor;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::error;

/// Submits functional test cases to the subject.
pub struct AftRunner {
    transactor: Arc<dyn Transactor>,
    operation: String,
    in_flight: Arc<Semaphore>,
}

impl AftRunner {
    /// Runner issuing `operation`, with at most `max_in_flight` transactions
    /// outstanding.
    pub fn new(
        transactor: Arc<dyn Transactor>,
        operation: impl Into<String>,
        max_in_flight: usize,
    ) -> Self {
        Self {
            transactor,
            operation: operation.into(),
            in_flight: Arc::new(Semaphore::new(max_in_flight)),
        }
    }

    /// Subject arguments for `case`: message, output length in bytes (u32 LE),
    /// function name, customization.
    #[must_use]
    pub fn arguments(case: &AftCase) -> Vec<Vec<u8>> {
        vec![
            case.message.clone(),
            codec::uint32_le(case.out_len_bits / 8),
            case.function_name.clone(),
            case.customization.clone(),
        ]
    }

    /// Submits `case` and registers its completion with `group`.
    ///
    /// Waits only for an in-flight slot, never for the subject's answer.
    ///
    /// # Errors
    /// Returns [`AcvpError::Task`] if the in-flight limiter has been closed.
    pub async fn dispatch(
        &self,
        group_id: u64,
        case: &AftCase,
        group: &mut GroupResponseBuilder,
    ) -> Result<()> {
        let permit = Arc::clone(&self.in_flight)
            .acquire_owned()
            .await
            .map_err(|e| AcvpError::Task(e.to_string()))?;

        let location = VectorLocation::case(group_id, case.tc_id);
        let completion = Arc::clone(&self.transactor).transact_async(
            self.operation.clone(),
            1,
            Self::arguments(case),
        );
        let (tc_id, out_len_bits) = (case.tc_id, case.out_len_bits);

        group.push_pending(async move {
            let answer = completion.await;
            drop(permit);
            let results = answer.map_err(|source| {
                error!(%location, "Functional test failed: {}", source);
                AcvpError::SubjectFailure { location, source }
            })?;
            let [digest] = <[Vec<u8>; 1]>::try_from(results).map_err(|results| {
                AcvpError::SubjectFailure {
                    location,
                    source: SubjectError::MalformedResult(format!(
                        "expected 1 digest, got {} results",
                        results.len()
                    )),
                }
            })?;
            Ok(TestCaseResponse::digest(tc_id, codec::encode_hex(&digest), out_len_bits))
        });
        Ok(())
    }
}
