// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The tree-state manifest: relative path → [`PathInfo`], anchored at a root.
//!
//! Relative keys are the canonical form on the wire; the on-disk file keys
//! entries by absolute path and carries the root alongside them, so a
//! persisted manifest is self-describing.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use thiserror::Error;

use crate::path_info::PathInfo;

/// Root segment of every relative key.
pub const REL_ROOT: &str = ".";

const SECS_PER_DAY: i64 = 86_400;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("manifest file has no root key")]
    MissingRoot,

    #[error("path {0:?} is outside the manifest root")]
    ForeignPath(PathBuf),
}

/// Recorded state of one root: a map from relative path to metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    root: PathBuf,
    entries: BTreeMap<String, PathInfo>,
}

impl Manifest {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), entries: BTreeMap::new() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, rel: &str) -> Option<&PathInfo> {
        self.entries.get(rel)
    }

    pub fn insert(&mut self, rel: impl Into<String>, info: PathInfo) {
        self.entries.insert(rel.into(), info);
    }

    pub fn remove(&mut self, rel: &str) -> Option<PathInfo> {
        self.entries.remove(rel)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PathInfo)> {
        self.entries.iter()
    }

    /// Resolve a relative key (`./a/b`) against this manifest's root.
    pub fn rel_to_abs(&self, rel: &str) -> PathBuf {
        match rel.strip_prefix("./") {
            Some(rest) => self.root.join(rest),
            None => self.root.clone(),
        }
    }

    /// Relativize an absolute path under this manifest's root.
    pub fn abs_to_rel(&self, abs: &Path) -> Result<String, ManifestError> {
        let rest = abs
            .strip_prefix(&self.root)
            .map_err(|_| ManifestError::ForeignPath(abs.to_path_buf()))?;
        if rest.as_os_str().is_empty() {
            return Ok(REL_ROOT.to_string());
        }
        Ok(format!("{}/{}", REL_ROOT, rest.display()))
    }

    /// Peer-facing byte payload: relative keys only, no root.
    pub fn to_wire(&self) -> Result<Vec<u8>, ManifestError> {
        Ok(serde_json::to_vec(&self.entries)?)
    }

    /// Inverse of [`to_wire`], reanchoring at `root`.
    ///
    /// [`to_wire`]: Manifest::to_wire
    pub fn from_wire(root: impl Into<PathBuf>, bytes: &[u8]) -> Result<Self, ManifestError> {
        let entries: BTreeMap<String, PathInfo> = serde_json::from_slice(bytes)?;
        Ok(Self { root: root.into(), entries })
    }

    /// On-disk form: a JSON object keyed by absolute path plus a `root` key.
    pub fn to_disk_json(&self) -> Value {
        let mut map = Map::new();
        map.insert("root".to_string(), Value::String(self.root.display().to_string()));
        for (rel, info) in &self.entries {
            let abs = self.rel_to_abs(rel);
            // PathInfo serialization is infallible: plain fields, no maps
            let value = serde_json::to_value(info).unwrap_or(Value::Null);
            map.insert(abs.display().to_string(), value);
        }
        Value::Object(map)
    }

    pub fn from_disk_json(value: Value) -> Result<Self, ManifestError> {
        let Value::Object(map) = value else {
            return Err(ManifestError::MissingRoot);
        };
        let root = map
            .get("root")
            .and_then(Value::as_str)
            .map(PathBuf::from)
            .ok_or(ManifestError::MissingRoot)?;
        let mut manifest = Self::new(root);
        for (key, value) in map {
            if key == "root" {
                continue;
            }
            let info: PathInfo = serde_json::from_value(value)?;
            let rel = manifest.abs_to_rel(Path::new(&key))?;
            manifest.entries.insert(rel, info);
        }
        Ok(manifest)
    }

    /// Merge a fresh scan over aged persisted state.
    ///
    /// The persisted pass runs first: live entries missing from the scan are
    /// tombstoned at `now`, and tombstones older than `purge_limit` days are
    /// forgotten. Only then do scan keys overwrite; the ordering is
    /// load-bearing, otherwise a fresh scan could never resurrect a path the
    /// peer re-created.
    pub fn merge_with_persisted(
        scan: Manifest,
        mut persisted: Manifest,
        now: i64,
        purge_limit: Option<i64>,
    ) -> Manifest {
        persisted.age_tombstones(&scan, now, purge_limit);
        let mut merged = persisted;
        merged.root = scan.root;
        for (rel, info) in scan.entries {
            merged.entries.insert(rel, info);
        }
        merged
    }

    fn age_tombstones(&mut self, scan: &Manifest, now: i64, purge_limit: Option<i64>) {
        let mut expired = Vec::new();
        for (rel, info) in &mut self.entries {
            match info.deleted {
                None => {
                    if scan.get(rel).is_none() {
                        info.tombstone(now);
                    }
                }
                Some(deleted) => {
                    if let Some(limit) = purge_limit {
                        if (now - deleted) / SECS_PER_DAY > limit {
                            expired.push(rel.clone());
                        }
                    }
                }
            }
        }
        for rel in expired {
            self.entries.remove(&rel);
        }
    }
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
