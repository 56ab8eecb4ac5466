#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![deny(clippy::panic)]

//! Cross-field checks on a parsed vector set.
//!
//! The whole set is checked before any subject call. Decoded byte strings are
//! carried forward in [`ValidatedGroup`] so the runners never see hex text.
//!
//! Checks per test case:
//! 1. decoded message length in bits equals `len`
//! 2. `outLen` is a whole number of bytes
//! 3. at most one of `customization` / `hexCustomization` is set, and hex decodes
//!
//! Checks per MCT group: `minOutLen`, `maxOutLen`, `outLenIncrement` present and
//! byte aligned.

use super::types::{TestCase, TestGroup, TestVectorSet};
use crate::codec;
use crate::error::{AcvpError, Result, VectorLocation};
use std::fmt;

/// Execution discipline of a test group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestType {
    /// Algorithm Functional Test: independent one-shot cases.
    Aft,
    /// Monte Carlo Test: 100-round feedback chain per case.
    Mct,
}

impl TestType {
    fn parse(group: &TestGroup) -> Result<Self> {
        match group.test_type.as_str() {
            "AFT" => Ok(Self::Aft),
            "MCT" => Ok(Self::Mct),
            other => Err(AcvpError::invalid(
                VectorLocation::group(group.tg_id),
                format!("unknown test type {other:?}"),
            )),
        }
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aft => f.write_str("AFT"),
            Self::Mct => f.write_str("MCT"),
        }
    }
}

/// Functional test case ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AftCase {
    pub tc_id: u64,
    pub message: Vec<u8>,
    pub out_len_bits: u32,
    pub function_name: Vec<u8>,
    pub customization: Vec<u8>,
}

/// Output-length bounds shared by every chain in an MCT group, in bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MctParams {
    pub min_out_bits: u32,
    pub max_out_bits: u32,
    pub increment_bits: u32,
}

/// Seed of one Monte Carlo chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MctCase {
    pub tc_id: u64,
    pub message: Vec<u8>,
}

/// Test cases of a group, by discipline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupTests {
    Aft(Vec<AftCase>),
    Mct { params: MctParams, cases: Vec<MctCase> },
}

/// A test group whose every case passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedGroup {
    pub tg_id: u64,
    pub tests: GroupTests,
}

impl ValidatedGroup {
    #[must_use]
    pub fn test_type(&self) -> TestType {
        match self.tests {
            GroupTests::Aft(_) => TestType::Aft,
            GroupTests::Mct { .. } => TestType::Mct,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match &self.tests {
            GroupTests::Aft(cases) => cases.len(),
            GroupTests::Mct { cases, .. } => cases.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Validates every group of `set`, preserving group and case order.
///
/// # Errors
/// Returns [`AcvpError::InvalidTestVector`] for the first violation found.
pub fn validate_vector_set(set: &TestVectorSet) -> Result<Vec<ValidatedGroup>> {
    set.test_groups.iter().map(validate_group).collect()
}

/// Validates one group.
///
/// # Errors
/// Returns [`AcvpError::InvalidTestVector`] for the first violation found.
pub fn validate_group(group: &TestGroup) -> Result<ValidatedGroup> {
    let tests = match TestType::parse(group)? {
        TestType::Aft => {
            let cases = group
                .tests
                .iter()
                .map(|case| aft_case(group.tg_id, case))
                .collect::<Result<Vec<_>>>()?;
            GroupTests::Aft(cases)
        }
        TestType::Mct => {
            let params = mct_params(group)?;
            let cases = group
                .tests
                .iter()
                .map(|case| {
                    let common = CommonFields::check(group.tg_id, case)?;
                    Ok(MctCase { tc_id: case.tc_id, message: common.message })
                })
                .collect::<Result<Vec<_>>>()?;
            GroupTests::Mct { params, cases }
        }
    };
    Ok(ValidatedGroup { tg_id: group.tg_id, tests })
}

/// Fields checked the same way for both disciplines.
struct CommonFields {
    message: Vec<u8>,
    customization: Vec<u8>,
}

impl CommonFields {
    fn check(group_id: u64, case: &TestCase) -> Result<Self> {
        let location = VectorLocation::case(group_id, case.tc_id);
        let customization = customization(location, case)?;
        let message = message(location, case)?;
        if let Some(out_len) = case.out_len {
            require_byte_aligned(location, "output length", out_len)?;
        }
        Ok(Self { message, customization })
    }
}

fn aft_case(group_id: u64, case: &TestCase) -> Result<AftCase> {
    let location = VectorLocation::case(group_id, case.tc_id);
    let common = CommonFields::check(group_id, case)?;
    let out_len_bits = case
        .out_len
        .ok_or_else(|| AcvpError::invalid(location, "functional test has no outLen"))?;
    Ok(AftCase {
        tc_id: case.tc_id,
        message: common.message,
        out_len_bits,
        function_name: case.function_name.as_bytes().to_vec(),
        customization: common.customization,
    })
}

fn customization(location: VectorLocation, case: &TestCase) -> Result<Vec<u8>> {
    match (case.customization.is_empty(), case.hex_customization.is_empty()) {
        (false, false) => {
            Err(AcvpError::invalid(location, "has both customization and hex customization"))
        }
        (false, true) => Ok(case.customization.as_bytes().to_vec()),
        (true, false) => codec::decode_hex(&case.hex_customization)
            .map_err(|e| AcvpError::invalid(location, format!("has invalid customization: {e}"))),
        (true, true) => Ok(Vec::new()),
    }
}

fn message(location: VectorLocation, case: &TestCase) -> Result<Vec<u8>> {
    let message = codec::decode_hex(&case.msg)
        .map_err(|e| AcvpError::invalid(location, format!("failed to decode message: {e}")))?;
    let actual = codec::bit_length(&message);
    if actual != case.len {
        return Err(AcvpError::invalid(
            location,
            format!(
                "contains hex message of {actual} bits but specifies a bit length of {}",
                case.len
            ),
        ));
    }
    Ok(message)
}

fn mct_params(group: &TestGroup) -> Result<MctParams> {
    let location = VectorLocation::group(group.tg_id);
    let bound = |value: Option<u32>, what: &str| -> Result<u32> {
        let bits = value.ok_or_else(|| {
            AcvpError::invalid(location, format!("Monte Carlo group has no {what}"))
        })?;
        require_byte_aligned(location, what, bits)?;
        Ok(bits)
    };
    Ok(MctParams {
        min_out_bits: bound(group.min_out_len, "min output length")?,
        max_out_bits: bound(group.max_out_len, "max output length")?,
        increment_bits: bound(group.out_len_increment, "output length increment")?,
    })
}

fn require_byte_aligned(location: VectorLocation, what: &str, bits: u32) -> Result<()> {
    if bits % 8 != 0 {
        return Err(AcvpError::invalid(
            location,
            format!("has {what} {bits} - fractional bytes not supported"),
        ));
    }
    Ok(())
}
