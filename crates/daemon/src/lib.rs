// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! dsync-daemon: session protocol, server worker pool, and client driver.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod client;
pub mod locks;
pub mod logcap;
pub mod server;
pub mod session;
pub mod tls;

pub use client::Client;
pub use locks::{LockTimeout, PathLocks};
pub use server::Server;
pub use session::{SessionError, SessionStats};
