#![deny(unsafe_code)]
#![allow(missing_docs)]
#![warn(clippy::unwrap_used)]
#![deny(clippy::panic)]

//! ACVP XOF vector-set and response documents.
//!
//! Field names follow the ACVP JSON (`tgId`, `testType`, `msg`, `len`, ...). Byte
//! strings stay as hex text here; decoding and checking happen in
//! [`validate`](super::validate).

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Parsed request document.
///
/// Envelope fields other than `vsId` (`algorithm`, `revision`, ...) are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestVectorSet {
    /// Vector set id, when the envelope carries one
    #[serde(default)]
    pub vs_id: Option<u64>,
    /// Groups, in document order
    pub test_groups: Vec<TestGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestGroup {
    pub tg_id: u64,
    /// `AFT` or `MCT`; other values are rejected during validation
    pub test_type: String,
    #[serde(default)]
    pub max_out_len: Option<u32>,
    #[serde(default)]
    pub min_out_len: Option<u32>,
    #[serde(default)]
    pub out_len_increment: Option<u32>,
    pub tests: Vec<TestCase>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub tc_id: u64,
    /// Message as hex text
    pub msg: String,
    /// Declared message length in bits
    pub len: u64,
    #[serde(default)]
    pub function_name: String,
    /// Customization string as plain text
    #[serde(default)]
    pub customization: String,
    /// Customization string as hex text
    #[serde(default)]
    pub hex_customization: String,
    /// Requested output length in bits (AFT)
    #[serde(default)]
    pub out_len: Option<u32>,
}

/// Response for one test group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestGroupResponse {
    pub tg_id: u64,
    pub tests: Vec<TestCaseResponse>,
}

/// Response for one test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseResponse {
    pub tc_id: u64,
    #[serde(flatten)]
    pub outcome: TestOutcome,
}

/// What a test case produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TestOutcome {
    /// Monte Carlo chain: one entry per round
    MonteCarlo {
        #[serde(rename = "resultsArray")]
        results_array: Vec<MctResult>,
    },
    /// Single digest from a functional test
    Digest {
        #[serde(default, skip_serializing_if = "String::is_empty")]
        md: String,
        #[serde(rename = "outLen", default, skip_serializing_if = "is_zero")]
        out_len: u32,
    },
}

/// One Monte Carlo round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MctResult {
    pub md: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub out_len: u32,
}

impl TestCaseResponse {
    #[must_use]
    pub fn digest(tc_id: u64, md: String, out_len: u32) -> Self {
        Self { tc_id, outcome: TestOutcome::Digest { md, out_len } }
    }

    #[must_use]
    pub fn monte_carlo(tc_id: u64, results_array: Vec<MctResult>) -> Self {
        Self { tc_id, outcome: TestOutcome::MonteCarlo { results_array } }
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero(value: &u32) -> bool {
    *value == 0
}

/// Deserializes a vector-set document.
///
/// # Errors
/// Returns [`AcvpError::MalformedInput`](crate::error::AcvpError::MalformedInput) if
/// the payload is not JSON of the expected shape (missing required fields, wrong
/// primitive types).
pub fn parse_vector_set(payload: &[u8]) -> Result<TestVectorSet> {
    Ok(serde_json::from_slice(payload)?)
}
