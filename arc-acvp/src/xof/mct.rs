#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![deny(clippy::panic)]

//! Monte Carlo Test execution.
//!
//! A chain is 100 blocking transactions. Round `n + 1` is issued with the message,
//! output length and customization returned by round `n`, so rounds of one chain
//! never overlap. Chains of different cases are independent.

use super::types::{MctResult, TestCaseResponse};
use super::validate::{MctCase, MctParams};
use crate::codec;
use crate::error::{AcvpError, Result, SubjectError, VectorLocation};
use crate::transact::Transactor;
use tracing::{error, instrument, trace};

/// Rounds per Monte Carlo chain.
pub const MCT_ROUNDS: usize = 100;

/// Inputs of the next round.
struct ChainState {
    message: Vec<u8>,
    output_len_bits: u32,
    customization: Vec<u8>,
}

/// Runs Monte Carlo chains against the subject.
#[derive(Debug, Clone)]
pub struct MctRunner {
    operation: String,
}

impl MctRunner {
    pub fn new(operation: impl Into<String>) -> Self {
        Self { operation: operation.into() }
    }

    /// Runs the full chain for `case` and returns its response.
    ///
    /// # Errors
    /// Returns [`AcvpError::MonteCarloAborted`] if any round fails; nothing from the
    /// chain is kept in that case.
    #[instrument(level = "debug", skip_all, fields(tg_id = group_id, tc_id = case.tc_id))]
    pub async fn run(
        &self,
        transactor: &dyn Transactor,
        group_id: u64,
        params: &MctParams,
        case: MctCase,
    ) -> Result<TestCaseResponse> {
        let location = VectorLocation::case(group_id, case.tc_id);
        let mut state = ChainState {
            message: case.message,
            output_len_bits: params.max_out_bits,
            customization: Vec::new(),
        };
        let mut results = Vec::with_capacity(MCT_ROUNDS);

        for round in 0..MCT_ROUNDS {
            state = self.round(transactor, params, &state).await.map_err(|source| {
                error!(%location, round, "Monte Carlo chain aborted: {}", source);
                AcvpError::MonteCarloAborted { location, round, source }
            })?;
            let out_len = u32::try_from(codec::bit_length(&state.message)).map_err(|_| {
                AcvpError::MonteCarloAborted {
                    location,
                    round,
                    source: SubjectError::MalformedResult(format!(
                        "message of {} bytes is too long",
                        state.message.len()
                    )),
                }
            })?;
            trace!(round, out_len, next_out_len = state.output_len_bits, "Monte Carlo round");
            results.push(MctResult { md: codec::encode_hex(&state.message), out_len });
        }

        Ok(TestCaseResponse::monte_carlo(case.tc_id, results))
    }

    /// Subject arguments for one round.
    fn arguments(params: &MctParams, state: &ChainState) -> [Vec<u8>; 6] {
        [
            state.message.clone(),
            codec::uint32_le(params.min_out_bits),
            codec::uint32_le(params.max_out_bits),
            codec::uint32_le(state.output_len_bits),
            codec::uint32_le(params.increment_bits),
            state.customization.clone(),
        ]
    }

    async fn round(
        &self,
        transactor: &dyn Transactor,
        params: &MctParams,
        state: &ChainState,
    ) -> std::result::Result<ChainState, SubjectError> {
        let args = Self::arguments(params, state);
        let borrowed: Vec<&[u8]> = args.iter().map(Vec::as_slice).collect();
        let results = transactor.transact(&self.operation, 3, &borrowed).await?;

        let [message, encoded_len, customization] = <[Vec<u8>; 3]>::try_from(results)
            .map_err(|r| {
                SubjectError::MalformedResult(format!("expected 3 results, got {}", r.len()))
            })?;
        let output_len_bits = codec::read_uint32_le(&encoded_len).map_err(|e| {
            SubjectError::MalformedResult(format!("next output length: {e}"))
        })?;
        Ok(ChainState { message, output_len_bits, customization })
    }
}
