#![deny(unsafe_code)]
#![allow(missing_docs)]

//! Reference cSHAKE subject-under-test.
//!
//! Reads request frames on stdin and answers each with a response frame on stdout,
//! one at a time and in order. Logs go to stderr. Exits cleanly when stdin closes
//! and with an error on any request it cannot serve.
//!
//! Operations:
//! - `getConfig`: JSON capability document
//! - `cSHAKE-128`, `cSHAKE-256`: `(msg, outLenBytes, functionName, customization)`
//! - `cSHAKE-128/MCT`, `cSHAKE-256/MCT`: one Monte Carlo step,
//!   `(msg, minBits, maxBits, outLenBits, incrementBits, customization)` to
//!   `(output, nextOutLenBits, nextCustomization)`

use anyhow::{Context, bail, ensure};
use arc_acvp::codec;
use arc_acvp::logging::{TracingConfig, init_tracing};
use arc_acvp::transact::wire;
use arc_acvp::xof::XofAlgorithm;
use arc_acvp::SubjectError;
use serde_json::json;
use sha3::digest::core_api::CoreWrapper;
use sha3::digest::{ExtendableOutput, Update, XofReader};
use sha3::{CShake128Core, CShake256Core};
use tracing::{debug, error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_tracing(&TracingConfig::default()).context("failed to initialize logging")?;

    let mut stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut served = 0usize;

    loop {
        let request = match wire::read_frame(&mut stdin).await {
            Ok(request) => request,
            Err(SubjectError::Closed) => break,
            Err(e) => return Err(e).context("failed to read request"),
        };
        let results = answer(&request).inspect_err(|e| error!("Cannot serve request: {e:#}"))?;
        let parts: Vec<&[u8]> = results.iter().map(Vec::as_slice).collect();
        wire::write_frame(&mut stdout, &parts).await.context("failed to write response")?;
        served += 1;
    }

    info!(served, "Input closed, exiting");
    Ok(())
}

fn answer(request: &[Vec<u8>]) -> anyhow::Result<Vec<Vec<u8>>> {
    let Some((operation, args)) = request.split_first() else {
        bail!("empty request frame");
    };
    let operation = std::str::from_utf8(operation).context("operation name is not UTF-8")?;
    debug!(operation, args = args.len(), "Request");

    if operation == "getConfig" {
        return Ok(vec![capabilities()?]);
    }
    if let Some(name) = operation.strip_suffix("/MCT") {
        let algorithm: XofAlgorithm = name.parse()?;
        return monte_carlo_step(algorithm, args);
    }
    let algorithm: XofAlgorithm = operation.parse()?;
    functional_test(algorithm, args)
}

fn capabilities() -> anyhow::Result<Vec<u8>> {
    let algorithms: Vec<_> = [XofAlgorithm::CShake128, XofAlgorithm::CShake256]
        .into_iter()
        .map(|algorithm| {
            json!({
                "algorithm": algorithm.name(),
                "revision": "1.0",
                "hexCustomization": true,
                "outputLen": [{"min": 16, "max": 65536, "increment": 8}],
                "msgLen": [{"min": 0, "max": 65536, "increment": 8}],
            })
        })
        .collect();
    Ok(serde_json::to_vec(&algorithms)?)
}

fn cshake(
    algorithm: XofAlgorithm,
    message: &[u8],
    out_len: usize,
    function_name: &[u8],
    customization: &[u8],
) -> Vec<u8> {
    let mut output = vec![0u8; out_len];
    match algorithm {
        XofAlgorithm::CShake128 => {
            let mut hasher = CoreWrapper::from_core(CShake128Core::new_with_function_name(
                function_name,
                customization,
            ));
            hasher.update(message);
            hasher.finalize_xof().read(&mut output);
        }
        XofAlgorithm::CShake256 => {
            let mut hasher = CoreWrapper::from_core(CShake256Core::new_with_function_name(
                function_name,
                customization,
            ));
            hasher.update(message);
            hasher.finalize_xof().read(&mut output);
        }
    }
    output
}

fn functional_test(algorithm: XofAlgorithm, args: &[Vec<u8>]) -> anyhow::Result<Vec<Vec<u8>>> {
    let [message, out_len, function_name, customization] = args else {
        bail!("{algorithm} expects 4 arguments, got {}", args.len());
    };
    let out_len = codec::read_uint32_le(out_len).context("output length")?;
    let digest = cshake(algorithm, message, out_len as usize, function_name, customization);
    Ok(vec![digest])
}

fn monte_carlo_step(algorithm: XofAlgorithm, args: &[Vec<u8>]) -> anyhow::Result<Vec<Vec<u8>>> {
    let [message, min, max, out_len, increment, customization] = args else {
        bail!("{algorithm}/MCT expects 6 arguments, got {}", args.len());
    };
    let min = codec::read_uint32_le(min).context("min output length")?;
    let max = codec::read_uint32_le(max).context("max output length")?;
    let out_len = codec::read_uint32_le(out_len).context("output length")?;
    let increment = codec::read_uint32_le(increment).context("output length increment")?;
    ensure!(min <= max, "min output length {min} exceeds max {max}");

    let output = cshake(algorithm, message, (out_len / 8) as usize, b"", customization);

    let tail = match output.as_slice() {
        [.., a, b] => [*a, *b],
        [b] => [0, *b],
        [] => [0, 0],
    };
    let steps = (max - min).checked_div(increment).map_or(1, |n| n + 1);
    let next_out_len = min + (u32::from(u16::from_be_bytes(tail)) % steps) * increment;
    let next_customization = codec::encode_hex(&tail).into_bytes();

    Ok(vec![output, codec::uint32_le(next_out_len), next_customization])
}
