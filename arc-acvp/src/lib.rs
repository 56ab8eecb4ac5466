#![deny(unsafe_code)]
#![allow(missing_docs)]
#![warn(clippy::unwrap_used)]
#![deny(clippy::panic)]

//! LatticeArc ACVP
//!
//! Executes ACVP extendable-output-function (cSHAKE) test vectors against an
//! external subject-under-test and assembles the response document.
//!
//! ## Modules
//!
//! - **xof**: vector-set parsing, validation, AFT and Monte Carlo execution
//! - **assembler**: ordered per-group response assembly
//! - **transact**: the subject contract, a subprocess transport and a scripted double
//! - **codec**: hex and little-endian integer helpers
//! - **config**: engine and transport settings
//! - **logging**: tracing subscriber setup
//!
//! ## Example
//!
//! ```rust,no_run
//! use arc_acvp::config::{EngineConfig, SubprocessConfig};
//! use arc_acvp::transact::SubprocessTransactor;
//! use arc_acvp::xof::{XofAlgorithm, XofHandler};
//! use std::sync::Arc;
//!
//! # async fn run(vector_set: &[u8]) -> arc_acvp::Result<Vec<u8>> {
//! let subject = Arc::new(SubprocessTransactor::spawn(&SubprocessConfig::new("./xof-subject"))?);
//! let handler = XofHandler::new(XofAlgorithm::CShake128, EngineConfig::default())?;
//! handler.process_json(vector_set, subject).await
//! # }
//! ```

pub mod assembler;
pub mod codec;
pub mod config;
pub mod error;
pub mod logging;
pub mod transact;
pub mod xof;

pub use assembler::{GroupResponseBuilder, ResponseAssembler};
pub use config::{EngineConfig, SubprocessConfig};
pub use error::{AcvpError, CodecError, Result, SubjectError, VectorLocation};
pub use transact::{ScriptedTransactor, SubprocessTransactor, Transactor};
pub use xof::types::{MctResult, TestCaseResponse, TestGroupResponse, TestOutcome};
pub use xof::{XofAlgorithm, XofHandler};
