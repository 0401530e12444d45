// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-path mutual exclusion between concurrent worker sessions.
//!
//! The map is keyed by absolute path and holds a refcount next to each
//! mutex. Workers receive the map as an explicit handle; nothing here
//! depends on the session or server modules. A background reaper drops
//! entries whose count has returned to zero.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::OwnedMutexGuard;

/// How long an acquire may wait on a contended path.
pub const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
#[error("lock timeout on {0}")]
pub struct LockTimeout(pub PathBuf);

#[derive(Debug)]
struct Slot {
    count: usize,
    lock: Arc<tokio::sync::Mutex<()>>,
}

/// Process-wide keyed lock map, cheap to clone.
#[derive(Clone, Default, Debug)]
pub struct PathLocks {
    map: Arc<Mutex<HashMap<PathBuf, Slot>>>,
}

impl PathLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock one absolute path. Held around any open/read/write/delete/move
    /// sequence that must be atomic against another worker.
    pub async fn acquire(&self, path: &Path) -> Result<PathGuard, LockTimeout> {
        let lock = {
            let mut map = self.map.lock();
            let slot = map
                .entry(path.to_path_buf())
                .or_insert_with(|| Slot { count: 0, lock: Arc::new(tokio::sync::Mutex::new(())) });
            slot.count += 1;
            Arc::clone(&slot.lock)
        };
        match tokio::time::timeout(ACQUIRE_TIMEOUT, lock.lock_owned()).await {
            Ok(guard) => Ok(PathGuard {
                locks: self.clone(),
                path: path.to_path_buf(),
                _guard: Some(guard),
            }),
            Err(_) => {
                self.release(path);
                Err(LockTimeout(path.to_path_buf()))
            }
        }
    }

    fn release(&self, path: &Path) {
        let mut map = self.map.lock();
        if let Some(slot) = map.get_mut(path) {
            slot.count = slot.count.saturating_sub(1);
        }
    }

    /// Drop idle entries. Returns how many were removed.
    pub fn reap(&self) -> usize {
        let mut map = self.map.lock();
        let before = map.len();
        map.retain(|_, slot| slot.count > 0);
        before - map.len()
    }

    pub fn len(&self) -> usize {
        self.map.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.lock().is_empty()
    }
}

/// RAII guard for one locked path.
#[derive(Debug)]
pub struct PathGuard {
    locks: PathLocks,
    path: PathBuf,
    _guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for PathGuard {
    fn drop(&mut self) {
        self._guard.take();
        self.locks.release(&self.path);
    }
}

#[cfg(test)]
#[path = "locks_tests.rs"]
mod tests;
