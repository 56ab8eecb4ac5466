#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![deny(clippy::panic)]

//! cSHAKE vector-set processing.
//!
//! [`XofHandler::process`] takes a raw vector set through parse, validation and
//! execution:
//!
//! ```text
//! bytes -> types::parse_vector_set -> validate::validate_vector_set
//!       -> { aft::AftRunner | mct::MctRunner } -> ResponseAssembler -> responses
//! ```
//!
//! Every group is validated before the first subject call, so an invalid set never
//! reaches the subject.

pub mod aft;
pub mod mct;
pub mod types;
pub mod validate;

use crate::assembler::{GroupResponseBuilder, ResponseAssembler};
use crate::config::EngineConfig;
use crate::error::{AcvpError, Result};
use crate::transact::Transactor;
use aft::AftRunner;
use mct::MctRunner;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use types::TestGroupResponse;
use validate::GroupTests;

/// XOF algorithms the handler can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XofAlgorithm {
    CShake128,
    CShake256,
}

impl XofAlgorithm {
    /// ACVP algorithm name, also the subject operation for functional tests.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::CShake128 => "cSHAKE-128",
            Self::CShake256 => "cSHAKE-256",
        }
    }

    /// Subject operation for one Monte Carlo round.
    #[must_use]
    pub fn monte_carlo_operation(self) -> String {
        format!("{}/MCT", self.name())
    }
}

impl fmt::Display for XofAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for XofAlgorithm {
    type Err = AcvpError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cSHAKE-128" => Ok(Self::CShake128),
            "cSHAKE-256" => Ok(Self::CShake256),
            other => Err(AcvpError::Configuration(format!("unsupported XOF algorithm {other:?}"))),
        }
    }
}

/// Processes vector sets for one XOF algorithm.
#[derive(Debug, Clone)]
pub struct XofHandler {
    algorithm: XofAlgorithm,
    config: EngineConfig,
}

impl XofHandler {
    /// # Errors
    /// Returns [`AcvpError::Configuration`] if `config` is invalid.
    pub fn new(algorithm: XofAlgorithm, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { algorithm, config })
    }

    #[must_use]
    pub fn algorithm(&self) -> XofAlgorithm {
        self.algorithm
    }

    /// Runs every test case of `vector_set` against `transactor`.
    ///
    /// Groups come back in input order, and cases in each group in input order.
    ///
    /// # Errors
    /// - [`AcvpError::MalformedInput`] if the payload does not parse
    /// - [`AcvpError::InvalidTestVector`] if any case fails validation (no subject
    ///   call is made)
    /// - [`AcvpError::SubjectFailure`] / [`AcvpError::MonteCarloAborted`] if the
    ///   subject fails
    #[instrument(skip_all, fields(algorithm = %self.algorithm, payload_len = vector_set.len()))]
    pub async fn process(
        &self,
        vector_set: &[u8],
        transactor: Arc<dyn Transactor>,
    ) -> Result<Vec<TestGroupResponse>> {
        let set = types::parse_vector_set(vector_set)?;
        let groups = validate::validate_vector_set(&set)?;
        info!(
            vs_id = ?set.vs_id,
            groups = groups.len(),
            tests = groups.iter().map(|g| g.len()).sum::<usize>(),
            "Vector set validated"
        );

        let aft = AftRunner::new(
            Arc::clone(&transactor),
            self.algorithm.name(),
            self.config.max_in_flight,
        );
        let mct = MctRunner::new(self.algorithm.monte_carlo_operation());
        let mut assembler = ResponseAssembler::new();

        for group in groups {
            debug!(
                tg_id = group.tg_id,
                test_type = %group.test_type(),
                tests = group.len(),
                "Running group"
            );
            let mut builder = GroupResponseBuilder::new(group.tg_id);
            match group.tests {
                GroupTests::Aft(cases) => {
                    for case in &cases {
                        aft.dispatch(group.tg_id, case, &mut builder).await?;
                    }
                }
                GroupTests::Mct { params, cases } => {
                    for case in cases {
                        let response =
                            mct.run(transactor.as_ref(), group.tg_id, &params, case).await?;
                        builder.push_ready(response);
                    }
                }
            }
            assembler.checkpoint(builder);
        }

        let responses = assembler.drain().await?;
        info!(groups = responses.len(), "Vector set complete");
        Ok(responses)
    }

    /// Like [`process`](Self::process), returning the JSON-encoded response.
    ///
    /// # Errors
    /// As [`process`](Self::process), plus [`AcvpError::Serialization`].
    pub async fn process_json(
        &self,
        vector_set: &[u8],
        transactor: Arc<dyn Transactor>,
    ) -> Result<Vec<u8>> {
        let responses = self.process(vector_set, transactor).await?;
        serde_json::to_vec(&responses).map_err(AcvpError::Serialization)
    }
}
