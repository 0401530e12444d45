// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The manifest store: scan one root, merge with persisted state, persist
//! atomically, and hand out immutable snapshots.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use dsync_core::{Clock, Manifest, ManifestError, PathInfo, PathKind, SystemClock};

use crate::filter;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("persisted manifest unreadable: {0}")]
    Json(#[from] serde_json::Error),
}

/// Authoritative tree state for one root.
pub struct ManifestStore<C: Clock = SystemClock> {
    root: PathBuf,
    manifest_path: PathBuf,
    gitignore: bool,
    purge_limit: Option<i64>,
    clock: C,
    manifest: Manifest,
}

impl ManifestStore<SystemClock> {
    pub fn open(
        root: impl Into<PathBuf>,
        manifest_path: impl Into<PathBuf>,
        gitignore: bool,
        purge_limit: Option<i64>,
    ) -> Result<Self, StoreError> {
        Self::open_with_clock(root, manifest_path, gitignore, purge_limit, SystemClock)
    }
}

impl<C: Clock> ManifestStore<C> {
    /// Open a store: create the root if absent, scan it, and merge with any
    /// previously persisted manifest (tombstones preserved).
    pub fn open_with_clock(
        root: impl Into<PathBuf>,
        manifest_path: impl Into<PathBuf>,
        gitignore: bool,
        purge_limit: Option<i64>,
        clock: C,
    ) -> Result<Self, StoreError> {
        let root = root.into();
        if !root.exists() {
            fs::create_dir_all(&root)?;
        }
        let mut store = Self {
            manifest: Manifest::new(root.clone()),
            root,
            manifest_path: manifest_path.into(),
            gitignore,
            purge_limit,
            clock,
        };
        store.update()?;
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Immutable copy for handing to a worker session.
    pub fn snapshot(&self) -> Arc<Manifest> {
        Arc::new(self.manifest.clone())
    }

    /// Re-scan the tree and fold the result over current state. Safe to call
    /// repeatedly; each pass tombstones entries that vanished and forgets
    /// tombstones past the purge horizon.
    pub fn update(&mut self) -> Result<(), StoreError> {
        let scan = self.scan()?;
        let persisted = if self.manifest.is_empty() {
            self.load_persisted()?.unwrap_or_else(|| Manifest::new(&self.root))
        } else {
            self.manifest.clone()
        };
        self.manifest = Manifest::merge_with_persisted(
            scan,
            persisted,
            self.clock.epoch_secs(),
            self.purge_limit,
        );
        Ok(())
    }

    /// Persist the manifest: write a sibling temp file, then rename over the
    /// old copy.
    pub fn save(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.manifest_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.manifest_path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(&self.manifest.to_disk_json())?;
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &self.manifest_path)?;
        debug!(path = %self.manifest_path.display(), entries = self.manifest.len(), "manifest saved");
        Ok(())
    }

    fn load_persisted(&self) -> Result<Option<Manifest>, StoreError> {
        if !self.manifest_path.exists() {
            return Ok(None);
        }
        let body = fs::read(&self.manifest_path)?;
        let value: serde_json::Value = serde_json::from_slice(&body)?;
        Ok(Some(Manifest::from_disk_json(value)?))
    }

    /// Walk the tree top-down into a fresh manifest. A stat that fails is
    /// treated as absent; the entry will be tombstoned by the merge and
    /// resurrected by the next successful scan.
    fn scan(&self) -> Result<Manifest, StoreError> {
        let mut manifest = Manifest::new(&self.root);
        self.scan_dir(&self.root, &mut manifest)?;
        Ok(manifest)
    }

    fn scan_dir(&self, dir: &Path, manifest: &mut Manifest) -> Result<(), StoreError> {
        let mut names: Vec<String> = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(dir = %dir.display(), error = %err, "unreadable directory entry");
                    continue;
                }
            };
            names.push(entry.file_name().to_string_lossy().into_owned());
        }

        if self.gitignore && names.iter().any(|n| n == ".gitignore") {
            match fs::read_to_string(dir.join(".gitignore")) {
                Ok(text) => names = filter::filter(names, &filter::compile(&text)),
                Err(err) => warn!(dir = %dir.display(), error = %err, "unreadable .gitignore"),
            }
        }

        for name in names {
            let abs = dir.join(&name);
            let meta = match fs::symlink_metadata(&abs) {
                Ok(meta) => meta,
                Err(err) => {
                    warn!(path = %abs.display(), error = %err, "stat failed, treating as absent");
                    continue;
                }
            };
            let rel = manifest.abs_to_rel(&abs)?;
            manifest.insert(rel, path_info_from(&meta));
            if meta.is_dir() {
                self.scan_dir(&abs, manifest)?;
            }
        }
        Ok(())
    }
}

fn path_info_from(meta: &fs::Metadata) -> PathInfo {
    let kind = if meta.is_dir() { PathKind::Directory } else { PathKind::File };
    let last_mod = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    PathInfo { kind, perm: mode_bits(meta), size: meta.len(), last_mod, deleted: None }
}

#[cfg(unix)]
fn mode_bits(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt as _;
    meta.permissions().mode()
}

#[cfg(not(unix))]
fn mode_bits(_meta: &fs::Metadata) -> u32 {
    0
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
