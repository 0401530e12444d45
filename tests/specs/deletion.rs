// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deletion specs: tombstone propagation, consent, and backups.

use crate::prelude::*;

#[tokio::test(flavor = "multi_thread")]
async fn purge_propagates_deletion() {
    let harness = Harness::start(
        |conf| conf.purge = true,
        |conf| seed_tombstone(conf, "b.txt", "doomed", 250),
    )
    .await;

    let client = harness.client_conf("client", |conf| conf.purge = true);
    write_with_mtime(&client.root, "b.txt", "doomed", 250);

    harness.sync_once(&client).await;

    assert!(!client.root.join("b.txt").exists());
    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn no_purge_means_no_data_loss() {
    let harness = Harness::start(
        |_| {},
        |conf| seed_tombstone(conf, "b.txt", "kept", 250),
    )
    .await;

    let client = harness.client_conf("client", |_| {});
    write_with_mtime(&client.root, "b.txt", "kept", 250);

    harness.sync_once(&client).await;

    assert!(client.root.join("b.txt").exists());
    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn one_sided_purge_is_vetoed_by_negotiation() {
    let harness = Harness::start(
        |conf| conf.purge = true,
        |conf| seed_tombstone(conf, "b.txt", "kept", 250),
    )
    .await;

    // client never consented to deletions
    let client = harness.client_conf("client", |_| {});
    write_with_mtime(&client.root, "b.txt", "kept", 250);

    harness.sync_once(&client).await;

    assert!(client.root.join("b.txt").exists());
    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn backup_holds_deleted_file_after_session() {
    let harness = Harness::start(
        |conf| conf.purge = true,
        |conf| seed_tombstone(conf, "b.txt", "to trash", 250),
    )
    .await;

    let client = harness.client_conf("client", |conf| {
        conf.purge = true;
        conf.backup = true;
    });
    write_with_mtime(&client.root, "b.txt", "to trash", 250);

    harness.sync_once(&client).await;

    assert!(!client.root.join("b.txt").exists());
    let trash = client.resolved_backup_path().join("b.txt");
    assert_eq!(std::fs::read_to_string(trash).unwrap(), "to trash");
    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn stale_tombstone_loses_to_newer_edit() {
    let harness = Harness::start(
        |conf| conf.purge = true,
        |conf| seed_tombstone(conf, "b.txt", "old", 100),
    )
    .await;

    // the client's copy was edited after the server's deletion was detected,
    // so the live copy must flow back instead of dying
    let now = std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;
    let client = harness.client_conf("client", |conf| conf.purge = true);
    write_with_mtime(&client.root, "b.txt", "edited later", now + 3600);

    harness.sync_once(&client).await;

    assert!(client.root.join("b.txt").exists());
    assert_eq!(
        std::fs::read_to_string(harness.server_root().join("b.txt")).unwrap(),
        "edited later"
    );
    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn client_deletion_propagates_to_server() {
    // the client once had the file, deleted it, and carries the tombstone
    let harness = Harness::start(
        |conf| conf.purge = true,
        |conf| write_with_mtime(&conf.root, "c.txt", "server copy", 250),
    )
    .await;

    let client = harness.client_conf("client", |conf| conf.purge = true);
    seed_tombstone(&client, "c.txt", "server copy", 250);

    harness.sync_once(&client).await;

    assert!(!harness.server_root().join("c.txt").exists());
    harness.stop().await;
}
