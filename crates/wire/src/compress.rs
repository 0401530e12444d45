// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Whole-payload DEFLATE (zlib container).
//!
//! The sender decides by the raw payload size, the receiver by the announced
//! count; both use the same negotiated threshold. An oversized compressed
//! form is still sent compressed; there is no fallback.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::ProtocolError;

/// Whether compression applies at all for a payload of `size` bytes.
pub fn eligible(level: u32, size: u64, min: u64) -> bool {
    level > 0 && size >= min
}

pub fn deflate(data: &[u8], level: u32) -> Result<Vec<u8>, ProtocolError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level.min(9)));
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

pub fn inflate(data: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let mut out = Vec::new();
    ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| ProtocolError::Inflate(e.to_string()))?;
    Ok(out)
}

#[cfg(test)]
#[path = "compress_tests.rs"]
mod tests;
