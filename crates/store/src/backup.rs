// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The backup trash: deletions are moved here instead of unlinked, keeping
//! their relative subpath, and swept by age after each session.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

const SECS_PER_DAY: i64 = 86_400;

/// A trash directory for one root.
pub struct BackupStore {
    path: PathBuf,
    /// Age cap in days; `-1` keeps backups forever.
    limit: i64,
}

impl BackupStore {
    pub fn create(path: impl Into<PathBuf>, limit: i64) -> io::Result<Self> {
        let path = path.into();
        fs::create_dir_all(&path)?;
        Ok(Self { path, limit })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Move an entry into the trash, preserving its relative subpath.
    /// An existing backup at the same subpath is replaced.
    pub fn stash(&self, rel: &str, abs: &Path) -> io::Result<()> {
        let dest = self.path.join(rel.strip_prefix("./").unwrap_or(rel));
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        if dest.exists() {
            remove_any(&dest)?;
        }
        match fs::rename(abs, &dest) {
            Ok(()) => Ok(()),
            // rename cannot cross filesystems; fall back to copy + remove
            Err(_) => {
                copy_any(abs, &dest)?;
                remove_any(abs)
            }
        }
    }

    /// Drop trash entries whose on-disk mtime is older than the age cap.
    /// Returns how many top-level entries were removed.
    pub fn purge(&self, now_secs: i64) -> io::Result<usize> {
        if self.limit < 0 {
            return Ok(0);
        }
        let mut removed = 0;
        self.purge_dir(&self.path, now_secs, &mut removed)?;
        debug!(removed, "backup purge swept");
        Ok(removed)
    }

    fn purge_dir(&self, dir: &Path, now_secs: i64, removed: &mut usize) -> io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(error = %err, "unreadable backup entry");
                    continue;
                }
            };
            let path = entry.path();
            let Ok(meta) = entry.metadata() else { continue };
            let age_days = (now_secs - mtime_secs(&meta)) / SECS_PER_DAY;
            if age_days >= self.limit {
                let result =
                    if meta.is_dir() { fs::remove_dir_all(&path) } else { fs::remove_file(&path) };
                match result {
                    Ok(()) => *removed += 1,
                    Err(err) => warn!(path = %path.display(), error = %err, "backup purge failed"),
                }
            } else if meta.is_dir() {
                self.purge_dir(&path, now_secs, removed)?;
            }
        }
        Ok(())
    }
}

fn mtime_secs(meta: &fs::Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn remove_any(path: &Path) -> io::Result<()> {
    if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

fn copy_any(src: &Path, dest: &Path) -> io::Result<()> {
    if src.is_dir() {
        fs::create_dir_all(dest)?;
        for entry in fs::read_dir(src)? {
            let entry = entry?;
            copy_any(&entry.path(), &dest.join(entry.file_name()))?;
        }
        Ok(())
    } else {
        fs::copy(src, dest).map(|_| ())
    }
}

#[cfg(test)]
#[path = "backup_tests.rs"]
mod tests;
