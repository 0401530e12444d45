// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log file size cap.
//!
//! When the file outgrows the configured limit, the front is truncated to
//! the first newline past the overflow point so the tail survives intact.
//! Run from the session finalizer; the appender itself never blocks on it.

use std::fs;
use std::io;
use std::path::Path;

/// Enforce `limit` bytes on the file at `path`. `-1` disables the cap.
pub fn enforce(path: &Path, limit: i64) -> io::Result<()> {
    if limit < 0 {
        return Ok(());
    }
    let limit = limit as u64;
    let size = match fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err),
    };
    if size <= limit {
        return Ok(());
    }

    let data = fs::read(path)?;
    let overflow = data.len().saturating_sub(limit as usize).saturating_sub(1);
    let start = match data[overflow..].iter().position(|b| *b == b'\n') {
        Some(nl) => overflow + nl + 1,
        None => overflow,
    };
    fs::write(path, &data[start..])
}

#[cfg(test)]
#[path = "logcap_tests.rs"]
mod tests;
