// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control-message grammar.
//!
//! Every control message is ASCII/UTF-8 text. Paths on the wire are
//! relative keys whose first segment is literally `.`, which keeps the
//! grammar unambiguous even though paths may contain spaces: an `OK`
//! argument starting with `./` is a path, a numeric one is a byte count.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Resend-request sideband, exactly 5 bytes.
pub const RETRY_TOKEN: &[u8] = b"RETRY";
/// Abandon-file sideband, exactly 14 bytes.
pub const SKIP_TOKEN: &[u8] = b"!!SKIP!!SKIP!!";

/// Metadata announcing one file transfer.
///
/// `bytes` is the announced payload count (compressed when compression
/// applies); `size` is the file's size at last scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferInfo {
    pub path: String,
    pub bytes: u64,
    pub last_mod: i64,
    #[serde(default)]
    pub perm: u32,
    #[serde(default)]
    pub size: u64,
}

/// One control message of the session protocol.
#[derive(Debug, Clone, PartialEq)]
pub enum Control {
    RequestStruct,
    Struct { bytes: u64 },
    OkStruct { bytes: u64 },
    Request { path: String },
    /// Bare-JSON reply to `Request`, shaped like the `MKFILE` body.
    FileInfo(TransferInfo),
    Mkdir { path: String, mtime: i64 },
    OkMkdir { path: String, mtime: i64 },
    Mkfile(TransferInfo),
    OkMkfile { path: String, bytes: u64 },
    Delete { path: String },
    ConfirmDelete { path: String },
    /// `OK <n>`: acknowledge an announced byte count.
    OkBytes { bytes: u64 },
    /// `OK <path>`: confirm the path is absent locally.
    OkPath { path: String },
    /// `NO <path>`: veto, the path still exists locally.
    NoPath { path: String },
    /// Bare `OK`.
    Ok,
    Bye,
    Retry,
    Skip,
}

impl Control {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Control::RequestStruct => b"REQUEST STRUCT".to_vec(),
            Control::Struct { bytes } => format!("STRUCT {bytes}").into_bytes(),
            Control::OkStruct { bytes } => format!("OK STRUCT {bytes}").into_bytes(),
            Control::Request { path } => format!("REQUEST {path}").into_bytes(),
            // TransferInfo serialization is infallible: plain fields only
            Control::FileInfo(info) => serde_json::to_vec(info).unwrap_or_default(),
            Control::Mkdir { path, mtime } => format!("MKDIR {path} {mtime}").into_bytes(),
            Control::OkMkdir { path, mtime } => format!("OK MKDIR {path} {mtime}").into_bytes(),
            Control::Mkfile(info) => {
                let mut out = b"MKFILE ".to_vec();
                out.extend(serde_json::to_vec(info).unwrap_or_default());
                out
            }
            Control::OkMkfile { path, bytes } => format!("OK MKFILE {path} {bytes}").into_bytes(),
            Control::Delete { path } => format!("DELETE {path}").into_bytes(),
            Control::ConfirmDelete { path } => format!("CONFIRM DELETE {path}").into_bytes(),
            Control::OkBytes { bytes } => format!("OK {bytes}").into_bytes(),
            Control::OkPath { path } => format!("OK {path}").into_bytes(),
            Control::NoPath { path } => format!("NO {path}").into_bytes(),
            Control::Ok => b"OK".to_vec(),
            Control::Bye => b"BYE".to_vec(),
            Control::Retry => RETRY_TOKEN.to_vec(),
            Control::Skip => SKIP_TOKEN.to_vec(),
        }
    }

    pub fn parse(bytes: &[u8]) -> Result<Control, ProtocolError> {
        if bytes == RETRY_TOKEN {
            return Ok(Control::Retry);
        }
        if bytes == SKIP_TOKEN {
            return Ok(Control::Skip);
        }
        if bytes.first() == Some(&b'{') {
            let info: TransferInfo = serde_json::from_slice(bytes)
                .map_err(|e| ProtocolError::miscommunication(format!("bad file info: {e}")))?;
            return Ok(Control::FileInfo(info));
        }
        let text = std::str::from_utf8(bytes)
            .map_err(|_| ProtocolError::miscommunication("control message is not UTF-8"))?;

        if text == "BYE" {
            return Ok(Control::Bye);
        }
        if text == "OK" {
            return Ok(Control::Ok);
        }
        if text == "REQUEST STRUCT" {
            return Ok(Control::RequestStruct);
        }
        if let Some(rest) = text.strip_prefix("STRUCT ") {
            return Ok(Control::Struct { bytes: parse_count(rest)? });
        }
        if let Some(rest) = text.strip_prefix("OK STRUCT ") {
            return Ok(Control::OkStruct { bytes: parse_count(rest)? });
        }
        if let Some(rest) = text.strip_prefix("OK MKDIR ") {
            let (path, mtime) = split_trailing_int(rest)?;
            return Ok(Control::OkMkdir { path, mtime });
        }
        if let Some(rest) = text.strip_prefix("OK MKFILE ") {
            let (path, bytes) = split_trailing_int(rest)?;
            let bytes = u64::try_from(bytes)
                .map_err(|_| ProtocolError::miscommunication("negative byte count"))?;
            return Ok(Control::OkMkfile { path, bytes });
        }
        if let Some(rest) = text.strip_prefix("MKDIR ") {
            let (path, mtime) = split_trailing_int(rest)?;
            return Ok(Control::Mkdir { path, mtime });
        }
        if let Some(rest) = text.strip_prefix("MKFILE ") {
            let info: TransferInfo = serde_json::from_str(rest)
                .map_err(|e| ProtocolError::miscommunication(format!("bad MKFILE body: {e}")))?;
            return Ok(Control::Mkfile(info));
        }
        if let Some(rest) = text.strip_prefix("CONFIRM DELETE ") {
            return Ok(Control::ConfirmDelete { path: rest.to_string() });
        }
        if let Some(rest) = text.strip_prefix("DELETE ") {
            return Ok(Control::Delete { path: rest.to_string() });
        }
        if let Some(rest) = text.strip_prefix("REQUEST ") {
            return Ok(Control::Request { path: rest.to_string() });
        }
        if let Some(rest) = text.strip_prefix("OK ") {
            if rest.starts_with("./") {
                return Ok(Control::OkPath { path: rest.to_string() });
            }
            return Ok(Control::OkBytes { bytes: parse_count(rest)? });
        }
        if let Some(rest) = text.strip_prefix("NO ") {
            return Ok(Control::NoPath { path: rest.to_string() });
        }
        Err(ProtocolError::miscommunication(format!("unknown verb: {text:?}")))
    }
}

fn parse_count(text: &str) -> Result<u64, ProtocolError> {
    text.parse()
        .map_err(|_| ProtocolError::miscommunication(format!("unreadable byte count: {text:?}")))
}

/// Split `"<path> <int>"` where the path may contain spaces.
fn split_trailing_int(text: &str) -> Result<(String, i64), ProtocolError> {
    let (path, tail) = text
        .rsplit_once(' ')
        .ok_or_else(|| ProtocolError::miscommunication(format!("missing argument: {text:?}")))?;
    let value = tail
        .parse()
        .map_err(|_| ProtocolError::miscommunication(format!("unreadable integer: {tail:?}")))?;
    Ok((path.to_string(), value))
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
