// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dsync-core: manifest model, reconciliation, and configuration for dsync.

pub mod clock;
pub mod config;
pub mod manifest;
pub mod path_info;
pub mod reconcile;

pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{
    default_state_dir, parse_size, ConfigError, ConfigView, Role, SyncConfig, DEFAULT_CHUNK,
    DEFAULT_PORT,
};
pub use manifest::{Manifest, ManifestError, REL_ROOT};
pub use path_info::{PathInfo, PathKind};
pub use reconcile::{plan, Buckets, Directions, SyncPlan};
