//! Run-length codec for canvas pixel buffers.
//!
//! A compressed stream is a sequence of `(run, value)` pairs where `run` is
//! an unsigned LEB128 varint (at least 1) and `value` is the repeated byte.
//! Canvas buffers are dominated by long runs of transparent zeros, which
//! this packs to a few bytes each.

use thiserror::Error;

/// Largest run length a single varint may encode.
const MAX_RUN: u64 = u32::MAX as u64;

/// Decoding errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompressionError {
    #[error("compressed data ends in the middle of a run at byte {0}")]
    Truncated(usize),
    #[error("zero-length run at byte {0}")]
    ZeroRun(usize),
    #[error("run length varint too long at byte {0}")]
    Overflow(usize),
    #[error("uncompressed data would exceed {limit} bytes")]
    LimitExceeded { limit: usize },
}

/// Compress a byte buffer.
pub fn compress(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut iter = data.iter().copied().peekable();

    while let Some(value) = iter.next() {
        let mut run: u64 = 1;
        while run < MAX_RUN && iter.peek() == Some(&value) {
            iter.next();
            run += 1;
        }
        write_varint(&mut out, run);
        out.push(value);
    }

    out
}

/// Uncompress a buffer produced by [`compress`].
pub fn uncompress(data: &[u8]) -> Result<Vec<u8>, CompressionError> {
    uncompress_with_limit(data, usize::MAX)
}

/// Uncompress, refusing to produce more than `limit` bytes.
pub fn uncompress_with_limit(data: &[u8], limit: usize) -> Result<Vec<u8>, CompressionError> {
    let mut out = Vec::new();
    let mut pos = 0;

    while pos < data.len() {
        let start = pos;
        let run = read_varint(data, &mut pos)?;
        if run == 0 {
            return Err(CompressionError::ZeroRun(start));
        }
        let value = *data.get(pos).ok_or(CompressionError::Truncated(start))?;
        pos += 1;

        let run = usize::try_from(run).map_err(|_| CompressionError::LimitExceeded { limit })?;
        if out.len().saturating_add(run) > limit {
            return Err(CompressionError::LimitExceeded { limit });
        }
        out.resize(out.len() + run, value);
    }

    Ok(out)
}

/// Ratio of compressed to original size (lower is better).
pub fn ratio(original: usize, compressed: usize) -> f64 {
    if original == 0 {
        return 1.0;
    }
    compressed as f64 / original as f64
}

fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

fn read_varint(data: &[u8], pos: &mut usize) -> Result<u64, CompressionError> {
    let start = *pos;
    let mut value: u64 = 0;
    let mut shift = 0;

    loop {
        let byte = *data.get(*pos).ok_or(CompressionError::Truncated(start))?;
        *pos += 1;

        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
        if shift > 28 {
            return Err(CompressionError::Overflow(start));
        }
    }

    if value > MAX_RUN {
        return Err(CompressionError::Overflow(start));
    }
    Ok(value)
}
