#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![deny(clippy::panic)]

//! Subject wire framing.
//!
//! A frame is a little-endian `u32` part count, one little-endian `u32` length per
//! part, then the parts back to back. Requests carry the operation name as their
//! first part; responses carry only results.

use crate::error::SubjectError;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Most parts accepted in one frame.
pub const MAX_FRAME_PARTS: usize = 64;

/// Largest total payload accepted in one frame.
pub const MAX_FRAME_BYTES: usize = 64 << 20;

/// Serializes `parts` into one frame.
///
/// # Errors
/// Returns [`SubjectError::Protocol`] if the frame would exceed the limits.
pub fn encode_frame(parts: &[&[u8]]) -> Result<Vec<u8>, SubjectError> {
    if parts.len() > MAX_FRAME_PARTS {
        return Err(SubjectError::Protocol(format!(
            "frame has {} parts, limit is {MAX_FRAME_PARTS}",
            parts.len()
        )));
    }
    let payload: usize = parts.iter().map(|p| p.len()).sum();
    if payload > MAX_FRAME_BYTES {
        return Err(SubjectError::Protocol(format!(
            "frame payload of {payload} bytes exceeds {MAX_FRAME_BYTES}"
        )));
    }

    let mut frame = Vec::with_capacity(4 + 4 * parts.len() + payload);
    frame.extend_from_slice(&part_len(parts.len())?.to_le_bytes());
    for part in parts {
        frame.extend_from_slice(&part_len(part.len())?.to_le_bytes());
    }
    for part in parts {
        frame.extend_from_slice(part);
    }
    Ok(frame)
}

/// Serializes a request: `operation` followed by `args`.
///
/// # Errors
/// Returns [`SubjectError::Protocol`] if the frame would exceed the limits.
pub fn encode_request(operation: &str, args: &[&[u8]]) -> Result<Vec<u8>, SubjectError> {
    let mut parts = Vec::with_capacity(args.len() + 1);
    parts.push(operation.as_bytes());
    parts.extend_from_slice(args);
    encode_frame(&parts)
}

/// Reads one frame.
///
/// # Errors
/// Returns [`SubjectError::Closed`] on end of stream before a frame starts,
/// [`SubjectError::Protocol`] for truncated or oversized frames, and
/// [`SubjectError::Io`] for other read failures.
pub async fn read_frame<R>(reader: &mut R) -> Result<Vec<Vec<u8>>, SubjectError>
where
    R: AsyncRead + Unpin,
{
    let count = match reader.read_u32_le().await {
        Ok(count) => count as usize,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(SubjectError::Closed);
        }
        Err(e) => return Err(e.into()),
    };
    if count > MAX_FRAME_PARTS {
        return Err(SubjectError::Protocol(format!(
            "frame declares {count} parts, limit is {MAX_FRAME_PARTS}"
        )));
    }

    let mut lengths = Vec::with_capacity(count);
    let mut total = 0usize;
    for _ in 0..count {
        let len = reader.read_u32_le().await.map_err(truncated)? as usize;
        total = total.saturating_add(len);
        if total > MAX_FRAME_BYTES {
            return Err(SubjectError::Protocol(format!(
                "frame payload exceeds {MAX_FRAME_BYTES} bytes"
            )));
        }
        lengths.push(len);
    }

    let mut parts = Vec::with_capacity(count);
    for len in lengths {
        let mut part = vec![0u8; len];
        reader.read_exact(&mut part).await.map_err(truncated)?;
        parts.push(part);
    }
    Ok(parts)
}

/// Writes `parts` as one frame and flushes.
///
/// # Errors
/// Returns [`SubjectError::Protocol`] for oversized frames and
/// [`SubjectError::Io`] for write failures.
pub async fn write_frame<W>(writer: &mut W, parts: &[&[u8]]) -> Result<(), SubjectError>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_frame(parts)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

fn part_len(len: usize) -> Result<u32, SubjectError> {
    u32::try_from(len).map_err(|_| SubjectError::Protocol(format!("part of {len} bytes")))
}

fn truncated(e: std::io::Error) -> SubjectError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        SubjectError::Protocol("truncated frame".to_string())
    } else {
        SubjectError::Io(e)
    }
}
