// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Concurrency specs: several clients against one server.

use crate::prelude::*;

#[tokio::test(flavor = "multi_thread")]
async fn two_clients_pull_the_same_file_concurrently() {
    let body = "shared bytes ".repeat(2048);
    let seeded = body.clone();
    let harness = Harness::start(
        |_| {},
        move |conf| write_with_mtime(&conf.root, "shared.bin", &seeded, 100),
    )
    .await;

    let one = harness.client_conf("one", |_| {});
    let two = harness.client_conf("two", |_| {});

    let client_one = Client::new(one.clone());
    let client_two = Client::new(two.clone());
    let (a, b) = tokio::join!(client_one.run_once(), client_two.run_once());
    a.unwrap();
    b.unwrap();

    assert_eq!(std::fs::read_to_string(one.root.join("shared.bin")).unwrap(), body);
    assert_eq!(std::fs::read_to_string(two.root.join("shared.bin")).unwrap(), body);
    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn a_change_relays_between_clients_across_sessions() {
    let harness = Harness::start(|_| {}, |_| {}).await;

    let one = harness.client_conf("one", |_| {});
    let two = harness.client_conf("two", |_| {});
    write_with_mtime(&one.root, "note.txt", "from one", 500);

    harness.sync_once(&one).await;
    // the shared snapshot only picks up one's push at the next 5 s refresh
    tokio::time::sleep(std::time::Duration::from_secs(6)).await;
    harness.sync_once(&two).await;

    assert_eq!(std::fs::read_to_string(two.root.join("note.txt")).unwrap(), "from one");
    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn several_sessions_back_to_back_stay_stable() {
    let harness = Harness::start(
        |_| {},
        |conf| write_with_mtime(&conf.root, "base.txt", "base", 100),
    )
    .await;

    let client = harness.client_conf("client", |_| {});
    for round in 0u32..3 {
        write_with_mtime(
            &client.root,
            &format!("round-{round}.txt"),
            "fresh",
            1_000 + i64::from(round),
        );
        harness.sync_once(&client).await;
    }

    for round in 0u32..3 {
        assert!(harness.server_root().join(format!("round-{round}.txt")).exists());
    }
    assert!(client.root.join("base.txt").exists());
    harness.stop().await;
}
