// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The session protocol, driven symmetrically by both peers.
//!
//! The server leads (`lead`), the client follows (`follow`). Every protocol
//! step resolves to an explicit outcome (done, skipped, or a fatal error)
//! and all failure paths funnel through [`SessionCtx::finalize`], which
//! re-applies directory mtimes, sweeps the backup trash, and enforces the
//! log cap.

pub mod follow;
pub mod lead;
mod transfer;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{info, warn};

use dsync_core::{Manifest, ManifestError, SyncConfig};
use dsync_store::BackupStore;
use dsync_wire::ProtocolError;

use crate::locks::{LockTimeout, PathLocks};
use crate::logcap;

/// Consecutive per-path failures tolerated within one category before the
/// session fails.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 5;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Lock(#[from] LockTimeout),

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("too many consecutive per-file failures")]
    TooManyFailures,
}

/// Counters reported in the end-of-session summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub dirs_pulled: u64,
    pub files_pulled: u64,
    pub dirs_pushed: u64,
    pub files_pushed: u64,
    pub deleted_local: u64,
    pub deleted_remote: u64,
    pub skipped: u64,
}

/// Tolerance for transient per-path failures, reset at each category.
#[derive(Debug, Default)]
pub struct FailureBudget {
    consecutive: u32,
}

impl FailureBudget {
    pub fn reset(&mut self) {
        self.consecutive = 0;
    }

    pub fn success(&mut self) {
        self.consecutive = 0;
    }

    pub fn failure(&mut self) -> Result<(), SessionError> {
        self.consecutive += 1;
        if self.consecutive >= MAX_CONSECUTIVE_FAILURES {
            return Err(SessionError::TooManyFailures);
        }
        Ok(())
    }
}

/// Directory mtimes to re-apply once the session stops mutating the tree.
#[derive(Debug, Default)]
pub struct Timeshift {
    dirs: Vec<(PathBuf, i64)>,
}

impl Timeshift {
    pub fn record(&mut self, abs: PathBuf, mtime: i64) {
        self.dirs.push((abs, mtime));
    }

    /// Creating children bumped every parent mtime; put them back.
    pub fn apply(&mut self) {
        for (abs, mtime) in self.dirs.drain(..) {
            if let Err(err) = transfer::set_mtime(&abs, mtime) {
                warn!(path = %abs.display(), error = %err, "timeshift failed");
            }
        }
    }
}

/// Everything one session needs besides its socket.
pub struct SessionCtx {
    pub conf: SyncConfig,
    /// Immutable snapshot of the local tree, taken when the session starts.
    pub local: Arc<Manifest>,
    pub locks: PathLocks,
    pub backup: Option<BackupStore>,
    pub timeshift: Timeshift,
    pub budget: FailureBudget,
    pub stats: SessionStats,
    started: Instant,
}

impl SessionCtx {
    pub fn new(
        conf: SyncConfig,
        local: Arc<Manifest>,
        locks: PathLocks,
    ) -> Result<Self, SessionError> {
        let backup = if conf.backup {
            Some(BackupStore::create(conf.resolved_backup_path(), conf.backup_limit)?)
        } else {
            None
        };
        Ok(Self {
            conf,
            local,
            locks,
            backup,
            timeshift: Timeshift::default(),
            budget: FailureBudget::default(),
            stats: SessionStats::default(),
            started: Instant::now(),
        })
    }

    pub fn abs(&self, rel: &str) -> PathBuf {
        self.local.rel_to_abs(rel)
    }

    /// The single finalizer: runs on every session outcome.
    pub fn finalize(&mut self) {
        self.timeshift.apply();
        if let Some(backup) = &self.backup {
            let now = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs() as i64;
            if let Err(err) = backup.purge(now) {
                warn!(error = %err, "backup purge failed");
            }
        }
        if let Err(err) = logcap::enforce(&self.conf.log_path(), self.conf.logging_limit) {
            warn!(error = %err, "log cap enforcement failed");
        }
        info!(
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            pulled = self.stats.files_pulled,
            pushed = self.stats.files_pushed,
            deleted = self.stats.deleted_local + self.stats.deleted_remote,
            skipped = self.stats.skipped,
            "session finished"
        );
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
