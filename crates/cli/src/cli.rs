// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command-line surface: one binary, a subcommand (or config-file `host`
//! key) selecting the role, and every configuration key as a long option.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Synchronizes a directory tree between two hosts over TCP.
#[derive(Debug, Parser)]
#[command(name = "dsync", version, about)]
pub struct Cli {
    /// Configuration file: a name under the config directory or a path.
    #[arg(long)]
    pub config: Option<String>,

    /// Directory to synchronize.
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Hostname to connect to or bind as.
    #[arg(long)]
    pub hostname: Option<String>,

    /// Port to connect to or bind to.
    #[arg(long)]
    pub port: Option<u16>,

    /// Socket timeout in seconds.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Wrap the connection in TLS.
    #[arg(long)]
    pub encryption: Option<bool>,

    /// Certificate file for the TLS handshake.
    #[arg(long)]
    pub cert: Option<PathBuf>,

    /// Private key file for the TLS handshake (server only).
    #[arg(long)]
    pub key: Option<PathBuf>,

    /// Propagate deletions between hosts.
    #[arg(long)]
    pub purge: Option<bool>,

    /// Days a deleted item stays monitored before being forgotten.
    #[arg(long, allow_negative_numbers = true)]
    pub purge_limit: Option<i64>,

    /// Move deletions into the backup directory instead of unlinking.
    #[arg(long)]
    pub backup: Option<bool>,

    /// Backup directory; DEFAULT places it under the state directory.
    #[arg(long)]
    pub backup_path: Option<String>,

    /// Days deleted items are kept in the backup directory (-1 = forever).
    #[arg(long, allow_negative_numbers = true)]
    pub backup_limit: Option<i64>,

    /// Per-chunk memory budget (accepts GB/MB/KB/B suffixes; -1 = unbounded).
    #[arg(long, allow_hyphen_values = true)]
    pub ram: Option<String>,

    /// DEFLATE level 0-9; 0 disables compression.
    #[arg(long)]
    pub compression: Option<u32>,

    /// Minimum payload size before compression applies (size literal).
    #[arg(long, allow_hyphen_values = true)]
    pub compression_min: Option<String>,

    /// Log verbosity 0-4.
    #[arg(long)]
    pub logging: Option<u8>,

    /// Log file size cap (size literal; -1 = unlimited).
    #[arg(long, allow_hyphen_values = true)]
    pub logging_limit: Option<String>,

    /// Honor child .gitignore files while scanning.
    #[arg(long)]
    pub gitignore: Option<bool>,

    /// Client idle seconds between sessions (-1 = single shot).
    #[arg(long, allow_negative_numbers = true)]
    pub sleep_time: Option<i64>,

    #[command(subcommand)]
    pub role: Option<RoleCommand>,
}

#[derive(Debug, Clone, Copy, Subcommand)]
pub enum RoleCommand {
    /// Accept connections and lead sync sessions.
    Server,
    /// Dial a server and follow its sync session.
    Client,
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
