// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-path metadata records tracked by a manifest.

use serde::{Deserialize, Serialize};

/// Kind of filesystem entry a manifest record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    File,
    Directory,
}

impl PathKind {
    pub fn is_dir(self) -> bool {
        matches!(self, PathKind::Directory)
    }
}

impl serde::Serialize for PathKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PathKind::File => serializer.serialize_str("file"),
            PathKind::Directory => serializer.serialize_str("directory"),
        }
    }
}

impl<'de> serde::Deserialize<'de> for PathKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "file" => Ok(PathKind::File),
            "directory" => Ok(PathKind::Directory),
            other => Err(serde::de::Error::unknown_variant(other, &["file", "directory"])),
        }
    }
}

/// Metadata for one tracked path.
///
/// `last_mod` and `deleted` are whole seconds since the epoch. A set
/// `deleted` marks the record as a tombstone; its `last_mod` is then the
/// deletion-detection time and becomes the ordering token reconciliation
/// compares against the peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathInfo {
    #[serde(rename = "type")]
    pub kind: PathKind,
    /// File-mode bits at last scan. Informational; never restored.
    pub perm: u32,
    pub size: u64,
    pub last_mod: i64,
    pub deleted: Option<i64>,
}

impl PathInfo {
    pub fn file(size: u64, last_mod: i64) -> Self {
        Self { kind: PathKind::File, perm: 0o644, size, last_mod, deleted: None }
    }

    pub fn directory(last_mod: i64) -> Self {
        Self { kind: PathKind::Directory, perm: 0o755, size: 0, last_mod, deleted: None }
    }

    pub fn is_tombstone(&self) -> bool {
        self.deleted.is_some()
    }

    /// Convert a live record into a tombstone detected at `now`.
    pub fn tombstone(&mut self, now: i64) {
        self.deleted = Some(now);
        self.last_mod = now;
    }
}

#[cfg(test)]
#[path = "path_info_tests.rs"]
mod tests;
