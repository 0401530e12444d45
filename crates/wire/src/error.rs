// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transport and protocol errors.

use thiserror::Error;

/// Errors raised by the framed transport.
///
/// `Miscommunication` is the session-fatal framing failure: an unexpected
/// verb, unreadable length, or exhausted retry budget. Timeouts and closed
/// connections are likewise fatal for the session but never for the process.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("miscommunication: {0}")]
    Miscommunication(String),

    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("socket timeout")]
    Timeout,

    #[error("control message exceeds the 1024-byte bound")]
    TooLarge,

    #[error("payload decompression failed: {0}")]
    Inflate(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProtocolError {
    pub fn miscommunication(what: impl Into<String>) -> Self {
        ProtocolError::Miscommunication(what.into())
    }
}
