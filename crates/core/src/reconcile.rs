// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pure reconciliation of two manifests into transfer and delete sets.
//!
//! `local` is the side running the comparison, `remote` the peer. Pull means
//! the local side receives; push means it sends. Creates are classified
//! before deletes, and any path consumed by the create pass is excluded from
//! delete consideration: a live entry that out-dates the peer's tombstone
//! is re-created, never deleted.

use std::collections::HashSet;

use crate::manifest::Manifest;
use crate::path_info::PathInfo;

/// Paths of one direction, partitioned so directories can be created before
/// their contents and deleted after them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Buckets {
    pub dirs: Vec<String>,
    pub files: Vec<String>,
}

impl Buckets {
    fn push(&mut self, rel: &str, info: &PathInfo) {
        if info.kind.is_dir() {
            self.dirs.push(rel.to_string());
        } else {
            self.files.push(rel.to_string());
        }
    }

    fn is_empty(&self) -> bool {
        self.dirs.is_empty() && self.files.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directions {
    pub pull: Buckets,
    pub push: Buckets,
}

impl Directions {
    fn is_empty(&self) -> bool {
        self.pull.is_empty() && self.push.is_empty()
    }
}

/// The action sets one session must apply to converge both roots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    pub creates: Directions,
    pub deletes: Directions,
}

/// Compare two manifests. Returns `None` when the trees already agree, the
/// no-op sentinel that lets drivers skip straight to `BYE`.
pub fn plan(local: &Manifest, remote: &Manifest, purge: bool) -> Option<SyncPlan> {
    let mut out = SyncPlan::default();
    let mut claimed: HashSet<&str> = HashSet::new();

    // Newer-or-only live entries flow toward the other side.
    for (rel, info) in local.iter() {
        if info.is_tombstone() {
            continue;
        }
        if remote.get(rel).is_none_or(|peer| info.last_mod > peer.last_mod) {
            out.creates.push.push(rel, info);
            claimed.insert(rel);
        }
    }
    for (rel, info) in remote.iter() {
        if info.is_tombstone() {
            continue;
        }
        if local.get(rel).is_none_or(|ours| info.last_mod > ours.last_mod) {
            out.creates.pull.push(rel, info);
            claimed.insert(rel);
        }
    }

    if purge {
        // A tombstone deletes the peer's copy only when it is strictly newer
        // than the live entry it shadows.
        for (rel, info) in local.iter() {
            if !info.is_tombstone() || claimed.contains(rel.as_str()) {
                continue;
            }
            if let Some(peer) = remote.get(rel) {
                if !peer.is_tombstone() && info.last_mod > peer.last_mod {
                    out.deletes.push.push(rel, peer);
                }
            }
        }
        for (rel, info) in remote.iter() {
            if !info.is_tombstone() || claimed.contains(rel.as_str()) {
                continue;
            }
            if let Some(ours) = local.get(rel) {
                if !ours.is_tombstone() && info.last_mod > ours.last_mod {
                    out.deletes.pull.push(rel, ours);
                }
            }
        }
    }

    if out.creates.is_empty() && out.deletes.is_empty() {
        return None;
    }
    Some(out)
}

#[cfg(test)]
#[path = "reconcile_tests.rs"]
mod tests;
