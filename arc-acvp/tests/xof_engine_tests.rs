#![deny(unsafe_code)]
#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_lossless,
    clippy::redundant_clone,
    clippy::needless_borrows_for_generic_args,
    clippy::redundant_closure_for_method_calls,
    clippy::useless_vec
)]

//! End-to-end tests of vector-set processing against a scripted subject.

use arc_acvp::codec;
use arc_acvp::config::EngineConfig;
use arc_acvp::error::{AcvpError, SubjectError, VectorLocation};
use arc_acvp::transact::{ScriptedTransactor, Transactor};
use arc_acvp::xof::mct::MCT_ROUNDS;
use arc_acvp::xof::types::{MctResult, TestCaseResponse, TestGroupResponse, TestOutcome};
use arc_acvp::xof::{XofAlgorithm, XofHandler};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Helpers
// ============================================================================

fn handler() -> XofHandler {
    XofHandler::new(XofAlgorithm::CShake128, EngineConfig::default()).unwrap()
}

fn payload(value: Value) -> Vec<u8> {
    serde_json::to_vec(&value).unwrap()
}

fn aft_test(tc_id: u64, msg: &str, out_len: u32) -> Value {
    json!({
        "tcId": tc_id,
        "msg": msg,
        "len": msg.len() * 4,
        "functionName": "",
        "customization": "",
        "outLen": out_len
    })
}

fn aft_group(tg_id: u64, tests: Vec<Value>) -> Value {
    json!({"tgId": tg_id, "testType": "AFT", "tests": tests})
}

fn mct_group(tg_id: u64, seeds: &[(u64, &str)]) -> Value {
    let tests: Vec<Value> = seeds
        .iter()
        .map(|(tc_id, msg)| json!({"tcId": tc_id, "msg": msg, "len": msg.len() * 4}))
        .collect();
    json!({
        "tgId": tg_id,
        "testType": "MCT",
        "minOutLen": 128,
        "maxOutLen": 256,
        "outLenIncrement": 8,
        "tests": tests
    })
}

fn vector_set(groups: Vec<Value>) -> Vec<u8> {
    payload(json!({"vsId": 1, "algorithm": "cSHAKE-128", "revision": "1.0", "testGroups": groups}))
}

/// Monte Carlo stub: output is the message cycled to the requested length, and
/// the next length counts down from 256 by 8 and wraps below 128.
fn countdown_step(args: &[&[u8]]) -> Vec<Vec<u8>> {
    let out_len = codec::read_uint32_le(args[3]).unwrap();
    let message: Vec<u8> = args[0].iter().copied().cycle().take((out_len / 8) as usize).collect();
    let next = if out_len <= 128 { 256 } else { out_len - 8 };
    vec![message, codec::uint32_le(next), args[5].to_vec()]
}

/// Answers AFT calls with a digest derived from the message and MCT calls with
/// [`countdown_step`].
fn scripted_subject() -> ScriptedTransactor {
    ScriptedTransactor::new(|operation, args| {
        if operation.ends_with("/MCT") {
            Ok(countdown_step(args))
        } else {
            let out_len = codec::read_uint32_le(args[1]).unwrap() as usize;
            let seed = args[0].first().copied().unwrap_or(0);
            Ok(vec![vec![seed; out_len]])
        }
    })
}

fn tc_ids(group: &TestGroupResponse) -> Vec<u64> {
    group.tests.iter().map(|t| t.tc_id).collect()
}

// ============================================================================
// Functional tests (AFT)
// ============================================================================

#[tokio::test]
async fn aft_case_issues_one_async_transaction() {
    let subject =
        Arc::new(ScriptedTransactor::new(|_, _| Ok(vec![vec![0x01, 0x02, 0x03, 0x04]])));
    let set = vector_set(vec![aft_group(1, vec![aft_test(7, "00", 32)])]);

    let groups = handler().process(&set, subject.clone()).await.unwrap();

    assert_eq!(
        groups,
        vec![TestGroupResponse {
            tg_id: 1,
            tests: vec![TestCaseResponse::digest(7, "01020304".to_string(), 32)],
        }]
    );
    let calls = subject.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].operation, "cSHAKE-128");
    assert_eq!(calls[0].expected_results, 1);
    assert!(calls[0].asynchronous);
    assert_eq!(calls[0].args, vec![vec![0x00], vec![4, 0, 0, 0], vec![], vec![]]);
}

#[tokio::test]
async fn aft_passes_function_name_and_hex_customization() {
    let subject = Arc::new(scripted_subject());
    let test = json!({
        "tcId": 1,
        "msg": "",
        "len": 0,
        "functionName": "KMAC",
        "hexCustomization": "0a0b",
        "outLen": 16
    });
    let set = vector_set(vec![aft_group(1, vec![test])]);

    handler().process(&set, subject.clone()).await.unwrap();

    let args = &subject.calls()[0].args;
    assert_eq!(args[2], b"KMAC".to_vec());
    assert_eq!(args[3], vec![0x0a, 0x0b]);
}

#[tokio::test]
async fn cshake256_uses_its_own_operation_names() {
    let subject = Arc::new(scripted_subject());
    let set = vector_set(vec![
        aft_group(1, vec![aft_test(1, "ab", 8)]),
        mct_group(2, &[(1, "ab")]),
    ]);
    let handler = XofHandler::new(XofAlgorithm::CShake256, EngineConfig::default()).unwrap();

    handler.process(&set, subject.clone()).await.unwrap();

    let calls = subject.calls();
    assert_eq!(calls[0].operation, "cSHAKE-256");
    assert!(calls[1..].iter().all(|c| c.operation == "cSHAKE-256/MCT"));
}

#[tokio::test]
async fn aft_subject_failure_is_fatal() {
    let subject = Arc::new(ScriptedTransactor::new(|_, args| {
        if args[0] == [0x02] {
            Err(SubjectError::Rejected {
                operation: "cSHAKE-128".to_string(),
                message: "bad input".to_string(),
            })
        } else {
            Ok(vec![vec![0xff]])
        }
    }));
    let set = vector_set(vec![aft_group(
        4,
        vec![aft_test(1, "01", 8), aft_test(2, "02", 8), aft_test(3, "03", 8)],
    )]);

    let err = handler().process(&set, subject).await.unwrap_err();

    match err {
        AcvpError::SubjectFailure { location, source } => {
            assert_eq!(location, VectorLocation::case(4, 2));
            assert!(matches!(source, SubjectError::Rejected { .. }));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn first_failure_is_reported_whichever_group_it_is_in() {
    // Group 1's only case fails after 30 s; group 2's fails straight away.
    let subject = Arc::new(
        ScriptedTransactor::new(|_, _| Err(SubjectError::Closed)).with_completion_delay(
            |index| if index == 0 { Duration::from_secs(30) } else { Duration::ZERO },
        ),
    );
    let set = vector_set(vec![
        aft_group(1, vec![aft_test(1, "01", 8)]),
        aft_group(2, vec![aft_test(2, "02", 8)]),
    ]);
    let started = tokio::time::Instant::now();

    let err = handler().process(&set, subject.clone()).await.unwrap_err();

    match err {
        AcvpError::SubjectFailure { location, .. } => {
            assert_eq!(location, VectorLocation::case(2, 2));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(started.elapsed() < Duration::from_secs(30));
    assert_eq!(subject.completion_order(), vec![1]);
}

#[tokio::test]
async fn wrong_result_count_is_a_subject_failure() {
    let subject = Arc::new(ScriptedTransactor::new(|_, _| Ok(vec![vec![1], vec![2]])));
    let set = vector_set(vec![aft_group(1, vec![aft_test(1, "00", 8)])]);

    let err = handler().process(&set, subject).await.unwrap_err();

    assert!(matches!(
        err,
        AcvpError::SubjectFailure {
            source: SubjectError::ResultCount { expected: 1, actual: 2, .. },
            ..
        }
    ));
}

#[tokio::test]
async fn small_in_flight_limit_still_completes() {
    let subject = Arc::new(scripted_subject());
    let tests = (1..=20).map(|i| aft_test(i, "aa", 8)).collect();
    let set = vector_set(vec![aft_group(1, tests)]);
    let handler =
        XofHandler::new(XofAlgorithm::CShake128, EngineConfig::new().with_max_in_flight(2))
            .unwrap();

    let groups = handler.process(&set, subject).await.unwrap();

    assert_eq!(tc_ids(&groups[0]), (1..=20).collect::<Vec<_>>());
}

// ============================================================================
// Ordering
// ============================================================================

#[tokio::test(start_paused = true)]
async fn reversed_completions_keep_input_order() {
    // Later submissions finish first.
    let subject = Arc::new(
        scripted_subject()
            .with_completion_delay(|index| Duration::from_millis(10_000 - 10 * index as u64)),
    );
    let set = vector_set(vec![
        aft_group(3, (1..=5).map(|i| aft_test(i, "11", 8)).collect()),
        mct_group(1, &[(1, "22"), (2, "33")]),
        aft_group(2, (10..=14).map(|i| aft_test(i, "44", 8)).collect()),
    ]);

    let groups = handler().process(&set, subject.clone()).await.unwrap();

    assert_eq!(groups.iter().map(|g| g.tg_id).collect::<Vec<_>>(), vec![3, 1, 2]);
    assert_eq!(tc_ids(&groups[0]), vec![1, 2, 3, 4, 5]);
    assert_eq!(tc_ids(&groups[1]), vec![1, 2]);
    assert_eq!(tc_ids(&groups[2]), vec![10, 11, 12, 13, 14]);

    let async_calls: Vec<usize> =
        subject.calls().iter().filter(|c| c.asynchronous).map(|c| c.index).collect();
    let mut completions = subject.completion_order();
    assert_ne!(completions, async_calls, "completions should arrive out of order");
    completions.sort_unstable();
    assert_eq!(completions, async_calls);
}

// ============================================================================
// Monte Carlo (MCT)
// ============================================================================

#[tokio::test]
async fn mct_chain_has_one_hundred_rounds() {
    let subject = Arc::new(scripted_subject());
    let set = vector_set(vec![mct_group(5, &[(1, "0102")])]);

    let groups = handler().process(&set, subject.clone()).await.unwrap();

    let TestOutcome::MonteCarlo { results_array } = &groups[0].tests[0].outcome else {
        panic!("expected a Monte Carlo response");
    };
    assert_eq!(results_array.len(), MCT_ROUNDS);

    // Lengths count down 256, 248, ..., 128 and repeat every 17 rounds.
    let expected: Vec<u32> = (0..MCT_ROUNDS).map(|round| 256 - 8 * (round % 17) as u32).collect();
    let lengths: Vec<u32> = results_array.iter().map(|r| r.out_len).collect();
    assert_eq!(lengths, expected);
    assert_eq!(results_array[99].out_len, 144);
    assert_eq!(results_array[0], MctResult { md: "0102".repeat(16), out_len: 256 });

    let calls = subject.calls();
    assert_eq!(calls.len(), MCT_ROUNDS);
    assert!(calls.iter().all(|c| !c.asynchronous && c.expected_results == 3));
    assert_eq!(
        calls[0].args,
        vec![
            vec![0x01, 0x02],
            codec::uint32_le(128),
            codec::uint32_le(256),
            codec::uint32_le(256),
            codec::uint32_le(8),
            vec![],
        ]
    );
    assert_eq!(calls[1].args[3], codec::uint32_le(248));
}

#[tokio::test]
async fn mct_failure_aborts_without_output() {
    let rounds = Arc::new(parking_lot::Mutex::new(0usize));
    let counter = Arc::clone(&rounds);
    let subject = Arc::new(ScriptedTransactor::new(move |operation, args| {
        if !operation.ends_with("/MCT") {
            return Ok(vec![vec![0x00]]);
        }
        let mut seen = counter.lock();
        *seen += 1;
        if *seen == 50 {
            return Err(SubjectError::Closed);
        }
        Ok(countdown_step(args))
    }));
    let set = vector_set(vec![
        aft_group(1, vec![aft_test(1, "00", 8)]),
        mct_group(2, &[(9, "abcd")]),
    ]);

    let err = handler().process(&set, subject.clone()).await.unwrap_err();

    match err {
        AcvpError::MonteCarloAborted { location, round, .. } => {
            assert_eq!(location, VectorLocation::case(2, 9));
            assert_eq!(round, 49);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(*rounds.lock(), 50);
    assert_eq!(subject.calls().len(), 51);
}

#[tokio::test]
async fn short_length_result_aborts_chain() {
    let subject = Arc::new(ScriptedTransactor::new(|_, args| {
        Ok(vec![args[0].to_vec(), vec![0x80], Vec::new()])
    }));
    let set = vector_set(vec![mct_group(1, &[(1, "00")])]);

    let err = handler().process(&set, subject).await.unwrap_err();

    assert!(matches!(
        err,
        AcvpError::MonteCarloAborted { round: 0, source: SubjectError::MalformedResult(_), .. }
    ));
}

// ============================================================================
// Validation
// ============================================================================

async fn rejected(set: Vec<u8>) -> (AcvpError, usize) {
    let subject = Arc::new(scripted_subject());
    let err = handler().process(&set, subject.clone()).await.unwrap_err();
    (err, subject.calls().len())
}

#[tokio::test]
async fn fractional_out_len_is_rejected_before_dispatch() {
    let set = vector_set(vec![aft_group(1, vec![aft_test(1, "00", 32), aft_test(2, "00", 20)])]);
    let (err, calls) = rejected(set).await;
    assert!(
        matches!(err, AcvpError::InvalidTestVector { location, .. } if location == VectorLocation::case(1, 2))
    );
    assert_eq!(calls, 0);
}

#[tokio::test]
async fn invalid_later_group_prevents_every_call() {
    let mut bad = mct_group(2, &[(1, "00")]);
    bad["outLenIncrement"] = json!(12);
    let set = vector_set(vec![aft_group(1, vec![aft_test(1, "00", 8)]), bad]);
    let (err, calls) = rejected(set).await;
    assert!(matches!(err, AcvpError::InvalidTestVector { .. }));
    assert_eq!(calls, 0);
}

#[tokio::test]
async fn both_customizations_are_rejected() {
    let mut test = aft_test(3, "00", 8);
    test["customization"] = json!("abc");
    test["hexCustomization"] = json!("616263");
    let (err, calls) = rejected(vector_set(vec![aft_group(1, vec![test])])).await;
    assert!(matches!(err, AcvpError::InvalidTestVector { .. }));
    assert_eq!(calls, 0);
}

#[tokio::test]
async fn declared_length_must_match_message() {
    let mut test = aft_test(1, "0000", 8);
    test["len"] = json!(8);
    let (err, calls) = rejected(vector_set(vec![aft_group(1, vec![test])])).await;
    assert!(err.to_string().contains("test case 1/1"), "{err}");
    assert_eq!(calls, 0);
}

#[tokio::test]
async fn unknown_test_type_is_rejected() {
    let group = json!({"tgId": 6, "testType": "LDT", "tests": []});
    let (err, _) = rejected(vector_set(vec![group])).await;
    assert!(
        matches!(err, AcvpError::InvalidTestVector { location, .. } if location == VectorLocation::group(6))
    );
}

#[tokio::test]
async fn malformed_payload_is_rejected() {
    let (err, calls) = rejected(b"{\"testGroups\": 5}".to_vec()).await;
    assert!(matches!(err, AcvpError::MalformedInput(_)));
    assert_eq!(calls, 0);
}

// ============================================================================
// Response encoding
// ============================================================================

#[tokio::test]
async fn json_response_shape() {
    let subject: Arc<dyn Transactor> = Arc::new(scripted_subject());
    let set = vector_set(vec![
        aft_group(1, vec![aft_test(1, "0f", 16)]),
        mct_group(2, &[(1, "ff")]),
    ]);

    let encoded = handler().process_json(&set, subject).await.unwrap();
    let value: Value = serde_json::from_slice(&encoded).unwrap();

    assert_eq!(value[0], json!({"tgId": 1, "tests": [{"tcId": 1, "md": "0f0f", "outLen": 16}]}));
    let rounds = value[1]["tests"][0]["resultsArray"].as_array().unwrap();
    assert_eq!(rounds.len(), MCT_ROUNDS);
    assert_eq!(rounds[1], json!({"md": "ff".repeat(31), "outLen": 248}));
    assert!(value[1]["tests"][0].get("md").is_none());
}

#[tokio::test]
async fn empty_vector_set_yields_empty_response() {
    let subject = Arc::new(scripted_subject());
    let groups = handler().process(&vector_set(vec![]), subject).await.unwrap();
    assert!(groups.is_empty());
}
