// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixture: one live server plus client configs, all anchored in a
//! temp directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub use dsync_core::{Role, SyncConfig};
pub use dsync_daemon::{Client, Server};

pub struct Harness {
    pub tmp: tempfile::TempDir,
    pub server_conf: SyncConfig,
    shutdown: CancellationToken,
    server_task: JoinHandle<()>,
    port: u16,
}

impl Harness {
    /// Boot a server on an ephemeral loopback port. `tune` adjusts the
    /// config and `seed` populates the root, both before the server's
    /// first scan.
    pub async fn start(
        tune: impl FnOnce(&mut SyncConfig),
        seed: impl FnOnce(&SyncConfig),
    ) -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let mut conf = SyncConfig::new(Role::Server, tmp.path().join("server"));
        conf.state_dir = tmp.path().join("server-state");
        conf.hostname = "127.0.0.1".to_string();
        conf.port = 0;
        fs::create_dir_all(&conf.root).unwrap();
        tune(&mut conf);
        seed(&conf);

        let server = Server::bind(conf.clone()).await.unwrap();
        let port = server.local_addr().unwrap().port();
        let shutdown = server.shutdown_token();
        let server_task = tokio::spawn(async move {
            server.run().await.unwrap();
        });

        Self { tmp, server_conf: conf, shutdown, server_task, port }
    }

    pub fn server_root(&self) -> PathBuf {
        self.server_conf.root.clone()
    }

    /// A client config pointed at this server, with its own root and state.
    pub fn client_conf(&self, name: &str, tune: impl FnOnce(&mut SyncConfig)) -> SyncConfig {
        let mut conf = SyncConfig::new(Role::Client, self.tmp.path().join(name));
        conf.state_dir = self.tmp.path().join(format!("{name}-state"));
        conf.hostname = "127.0.0.1".to_string();
        conf.port = self.port;
        fs::create_dir_all(&conf.root).unwrap();
        tune(&mut conf);
        conf
    }

    /// One client session against the live server.
    pub async fn sync_once(&self, conf: &SyncConfig) {
        Client::new(conf.clone()).run_once().await.unwrap();
    }

    pub async fn stop(self) {
        self.shutdown.cancel();
        self.server_task.await.unwrap();
    }
}

pub fn write_with_mtime(root: &Path, rel: &str, body: &str, mtime: i64) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, body).unwrap();
    set_mtime(&path, mtime);
}

pub fn set_mtime(path: &Path, mtime: i64) {
    let stamp = std::time::SystemTime::UNIX_EPOCH + Duration::from_secs(mtime as u64);
    fs::File::open(path).unwrap().set_modified(stamp).unwrap();
}

pub fn mtime_of(path: &Path) -> i64 {
    fs::metadata(path)
        .unwrap()
        .modified()
        .unwrap()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

/// Pre-seed a tombstone: record the file in the persisted manifest, then
/// delete it from disk before the next scan.
pub fn seed_tombstone(conf: &SyncConfig, rel: &str, body: &str, mtime: i64) {
    write_with_mtime(&conf.root, rel, body, mtime);
    let store = dsync_store::ManifestStore::open(
        &conf.root,
        conf.manifest_path(),
        conf.gitignore,
        conf.purge_limit,
    )
    .unwrap();
    store.save().unwrap();
    fs::remove_file(conf.root.join(rel)).unwrap();
}
