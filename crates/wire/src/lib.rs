// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! dsync-wire: framed transport for sync sessions.
//!
//! Control messages are short UTF-8 texts, one socket read each; bulk
//! payloads are announced with an explicit byte count and streamed in
//! chunks under the negotiated memory budget. Two sideband tokens live
//! outside the verb grammar: `RETRY` (resend the last control message) and
//! the 14-byte skip sentinel (abandon the current file, keep the session).

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod compress;
mod error;
mod frame;
mod message;

pub use compress::{deflate, eligible, inflate};
pub use error::ProtocolError;
pub use frame::{Channel, SkipWindow, StreamOutcome, MAX_CONTROL, MAX_RETRIES};
pub use message::{Control, TransferInfo, RETRY_TOKEN, SKIP_TOKEN};
