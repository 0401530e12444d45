// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sync configuration: the full option table, per-session negotiation, and
//! size-literal parsing.
//!
//! A [`SyncConfig`] is the merged result of a JSON config file and CLI
//! overrides. The negotiable subset travels as a [`ConfigView`] during the
//! `CONFIG` phase of every session.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default TCP port.
pub const DEFAULT_PORT: u16 = 1818;
/// Default per-chunk memory budget (1 MB, powers of 1000).
pub const DEFAULT_CHUNK: i64 = 1_000_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required option: {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("unreadable size literal: {0:?}")]
    BadSize(String),

    #[error("config file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config file error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Which end of the session this process is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Server,
    Client,
}

/// The full configuration table. Field names match the config-file keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Local directory anchor.
    #[serde(default)]
    pub root: PathBuf,
    /// `"Server"` or `"Client"`.
    pub host: Role,
    #[serde(default = "default_hostname")]
    pub hostname: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Socket timeout, seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default)]
    pub encryption: bool,
    #[serde(default)]
    pub cert: Option<PathBuf>,
    #[serde(default)]
    pub key: Option<PathBuf>,
    /// Propagate deletions.
    #[serde(default)]
    pub purge: bool,
    /// Tombstone lifetime, days. `None` keeps tombstones forever.
    #[serde(default = "default_purge_limit")]
    pub purge_limit: Option<i64>,
    /// Move deletions to the trash directory instead of unlinking.
    #[serde(default)]
    pub backup: bool,
    /// Trash root; `"DEFAULT"` resolves under the per-root state directory.
    #[serde(default = "default_backup_path")]
    pub backup_path: String,
    /// Trash age cap, days; `-1` keeps backups forever.
    #[serde(default = "default_day_limit")]
    pub backup_limit: i64,
    /// Max per-chunk bytes; `-1` = unbounded.
    #[serde(default = "default_chunk")]
    pub ram: i64,
    /// DEFLATE level 0–9; 0 disables.
    #[serde(default)]
    pub compression: u32,
    /// Minimum payload size before compression applies, bytes.
    #[serde(default = "default_compression_min")]
    pub compression_min: u64,
    /// Log verbosity 0–4.
    #[serde(default)]
    pub logging: u8,
    /// Log file cap, bytes; `-1` = unlimited.
    #[serde(default = "default_logging_limit")]
    pub logging_limit: i64,
    /// Honor child `.gitignore` files while scanning.
    #[serde(default)]
    pub gitignore: bool,
    /// Client idle seconds between sessions; `-1` = single shot.
    #[serde(default = "default_sleep_time")]
    pub sleep_time: i64,
    /// State root for manifests, logs, backups, and named configs.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

fn default_hostname() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_timeout() -> u64 {
    30
}

fn default_purge_limit() -> Option<i64> {
    Some(7)
}

fn default_backup_path() -> String {
    "DEFAULT".to_string()
}

fn default_day_limit() -> i64 {
    7
}

fn default_chunk() -> i64 {
    DEFAULT_CHUNK
}

fn default_compression_min() -> u64 {
    70
}

fn default_logging_limit() -> i64 {
    10_000_000
}

fn default_sleep_time() -> i64 {
    -1
}

/// Default state root: `~/.conf/dsync`.
pub fn default_state_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".conf").join("dsync")
}

impl SyncConfig {
    /// Minimal config for a role and root; everything else defaulted.
    pub fn new(host: Role, root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            host,
            hostname: default_hostname(),
            port: default_port(),
            timeout: default_timeout(),
            encryption: false,
            cert: None,
            key: None,
            purge: false,
            purge_limit: default_purge_limit(),
            backup: false,
            backup_path: default_backup_path(),
            backup_limit: default_day_limit(),
            ram: default_chunk(),
            compression: 0,
            compression_min: default_compression_min(),
            logging: 0,
            logging_limit: default_logging_limit(),
            gitignore: false,
            sleep_time: default_sleep_time(),
            state_dir: default_state_dir(),
        }
    }

    /// Fail fast on values no session could run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.root.as_os_str().is_empty() {
            return Err(ConfigError::Missing("root"));
        }
        if self.hostname.is_empty() {
            return Err(ConfigError::Missing("hostname"));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid { key: "port", reason: "must be non-zero".into() });
        }
        if self.timeout == 0 {
            return Err(ConfigError::Invalid { key: "timeout", reason: "must be non-zero".into() });
        }
        if self.compression > 9 {
            return Err(ConfigError::Invalid {
                key: "compression",
                reason: "DEFLATE level is 0-9".into(),
            });
        }
        if self.logging > 4 {
            return Err(ConfigError::Invalid { key: "logging", reason: "levels are 0-4".into() });
        }
        if self.ram == 0 || self.ram < -1 {
            return Err(ConfigError::Invalid {
                key: "ram",
                reason: "must be positive or -1".into(),
            });
        }
        if self.encryption {
            if self.cert.is_none() {
                return Err(ConfigError::Missing("cert"));
            }
            if self.host == Role::Server && self.key.is_none() {
                return Err(ConfigError::Missing("key"));
            }
        }
        Ok(())
    }

    pub fn socket_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Per-root state directory: `<state>/<root-basename>`.
    pub fn conf_dir(&self) -> PathBuf {
        let base = self.root.file_name().map(|n| n.to_string_lossy().into_owned());
        self.state_dir.join(base.unwrap_or_else(|| "root".to_string()))
    }

    /// Persisted manifest path: `<state>/<basename>/<basename>.json`.
    pub fn manifest_path(&self) -> PathBuf {
        let base = self
            .root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "root".to_string());
        self.conf_dir().join(format!("{base}.json"))
    }

    pub fn log_path(&self) -> PathBuf {
        self.conf_dir().join("logs.txt")
    }

    /// Trash root, resolving the `"DEFAULT"` marker.
    pub fn resolved_backup_path(&self) -> PathBuf {
        if self.backup_path == "DEFAULT" {
            self.conf_dir().join("backups")
        } else {
            PathBuf::from(&self.backup_path)
        }
    }

    /// The negotiable subset this side brings to the `CONFIG` phase.
    pub fn view(&self) -> ConfigView {
        ConfigView {
            purge: self.purge,
            compression: self.compression,
            compression_min: self.compression_min,
            ram: self.ram,
        }
    }

    /// Adopt the negotiated parameters for one session.
    pub fn apply_view(&mut self, view: &ConfigView) {
        self.purge = view.purge;
        self.compression = view.compression;
        self.compression_min = view.compression_min;
        self.ram = view.ram;
    }
}

/// The per-session negotiated parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigView {
    pub purge: bool,
    pub compression: u32,
    pub compression_min: u64,
    pub ram: i64,
}

impl ConfigView {
    /// Intersection of two peers' capabilities.
    ///
    /// Purging and compression require consent from both sides; the
    /// compression threshold takes the lower bid; the chunk budget takes the
    /// literal minimum, so a `-1` (unbounded) preference wins.
    pub fn negotiate(client: &ConfigView, server: &ConfigView) -> ConfigView {
        let compression = if client.compression == 0 || server.compression == 0 {
            0
        } else {
            client.compression.min(server.compression)
        };
        ConfigView {
            purge: client.purge && server.purge,
            compression,
            compression_min: client.compression_min.min(server.compression_min),
            ram: client.ram.min(server.ram),
        }
    }
}

/// Parse a size literal: bare integer or `B`/`KB`/`MB`/`GB` suffix, powers
/// of 1000. `-1` is accepted bare (unbounded / unlimited markers).
pub fn parse_size(input: &str) -> Result<i64, ConfigError> {
    let s = input.trim();
    let upper = s.to_ascii_uppercase();
    let (digits, multiplier) = if let Some(rest) = upper.strip_suffix("GB") {
        (rest, 1_000_000_000)
    } else if let Some(rest) = upper.strip_suffix("MB") {
        (rest, 1_000_000)
    } else if let Some(rest) = upper.strip_suffix("KB") {
        (rest, 1_000)
    } else if let Some(rest) = upper.strip_suffix('B') {
        (rest, 1)
    } else {
        (upper.as_str(), 1)
    };
    let value: i64 = digits.trim().parse().map_err(|_| ConfigError::BadSize(input.to_string()))?;
    if value < 0 && (multiplier != 1 || value != -1) {
        return Err(ConfigError::BadSize(input.to_string()));
    }
    value.checked_mul(multiplier).ok_or_else(|| ConfigError::BadSize(input.to_string()))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
