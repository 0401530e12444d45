// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Convergence specs: creates, conflicts, and repeated sessions.

use crate::prelude::*;

#[tokio::test(flavor = "multi_thread")]
async fn new_file_flows_down() {
    let harness = Harness::start(
        |_| {},
        |conf| write_with_mtime(&conf.root, "a.txt", "hello", 100),
    )
    .await;

    let client = harness.client_conf("client", |_| {});
    harness.sync_once(&client).await;

    let got = client.root.join("a.txt");
    assert_eq!(std::fs::read_to_string(&got).unwrap(), "hello");
    assert_eq!(std::fs::metadata(&got).unwrap().len(), 5);
    assert_eq!(mtime_of(&got), 100);
    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn new_file_flows_up() {
    let harness = Harness::start(|_| {}, |_| {}).await;
    let client = harness.client_conf("client", |_| {});
    write_with_mtime(&client.root, "up.txt", "rising", 140);

    harness.sync_once(&client).await;

    assert_eq!(
        std::fs::read_to_string(harness.server_root().join("up.txt")).unwrap(),
        "rising"
    );
    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn conflicting_edit_newer_wins() {
    let harness = Harness::start(
        |_| {},
        |conf| write_with_mtime(&conf.root, "a.txt", "AA", 200),
    )
    .await;

    let client = harness.client_conf("client", |_| {});
    write_with_mtime(&client.root, "a.txt", "BBB", 150);

    harness.sync_once(&client).await;

    assert_eq!(std::fs::read_to_string(client.root.join("a.txt")).unwrap(), "AA");
    assert_eq!(
        std::fs::read_to_string(harness.server_root().join("a.txt")).unwrap(),
        "AA"
    );
    assert_eq!(mtime_of(&client.root.join("a.txt")), 200);
    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn directories_nest_and_keep_mtimes() {
    let harness = Harness::start(
        |_| {},
        |conf| {
            write_with_mtime(&conf.root, "d/e/deep.txt", "deep", 400);
            set_mtime(&conf.root.join("d/e"), 300);
            set_mtime(&conf.root.join("d"), 300);
        },
    )
    .await;

    let client = harness.client_conf("client", |_| {});
    harness.sync_once(&client).await;

    assert_eq!(
        std::fs::read_to_string(client.root.join("d/e/deep.txt")).unwrap(),
        "deep"
    );
    assert_eq!(mtime_of(&client.root.join("d")), 300);
    assert_eq!(mtime_of(&client.root.join("d/e")), 300);
    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn zero_byte_file_still_updates_mtime() {
    let harness = Harness::start(
        |_| {},
        |conf| write_with_mtime(&conf.root, "empty.txt", "", 250),
    )
    .await;

    let client = harness.client_conf("client", |_| {});
    harness.sync_once(&client).await;

    let got = client.root.join("empty.txt");
    assert_eq!(std::fs::metadata(&got).unwrap().len(), 0);
    assert_eq!(mtime_of(&got), 250);
    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn compressed_transfers_converge() {
    let body = "squeeze me ".repeat(1000);
    let seeded = body.clone();
    let harness = Harness::start(
        |conf| {
            conf.compression = 6;
            conf.compression_min = 64;
        },
        move |conf| write_with_mtime(&conf.root, "big.txt", &seeded, 600),
    )
    .await;

    let client = harness.client_conf("client", |conf| {
        conf.compression = 9;
        conf.compression_min = 128;
    });
    harness.sync_once(&client).await;

    assert_eq!(std::fs::read_to_string(client.root.join("big.txt")).unwrap(), body);
    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn repeated_sessions_are_idempotent() {
    let harness = Harness::start(
        |_| {},
        |conf| write_with_mtime(&conf.root, "a.txt", "stable", 100),
    )
    .await;

    let client = harness.client_conf("client", |_| {});
    harness.sync_once(&client).await;
    let first_mtime = mtime_of(&client.root.join("a.txt"));
    harness.sync_once(&client).await;

    assert_eq!(std::fs::read_to_string(client.root.join("a.txt")).unwrap(), "stable");
    assert_eq!(mtime_of(&client.root.join("a.txt")), first_mtime);
    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn utf8_and_spaced_names_converge() {
    let harness = Harness::start(
        |_| {},
        |conf| write_with_mtime(&conf.root, "mes images/día de campo.jpg", "pixels", 99),
    )
    .await;

    let client = harness.client_conf("client", |_| {});
    harness.sync_once(&client).await;

    assert_eq!(
        std::fs::read_to_string(client.root.join("mes images/día de campo.jpg")).unwrap(),
        "pixels"
    );
    harness.stop().await;
}
