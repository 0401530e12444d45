// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn acquire_and_release_tracks_refcount() {
    let locks = PathLocks::new();
    let guard = locks.acquire(Path::new("/tmp/a")).await.unwrap();
    assert_eq!(locks.len(), 1);
    drop(guard);
    // entry lingers at zero until the reaper runs
    assert_eq!(locks.len(), 1);
    assert_eq!(locks.reap(), 1);
    assert!(locks.is_empty());
}

#[tokio::test]
async fn contended_path_serializes() {
    let locks = PathLocks::new();
    let guard = locks.acquire(Path::new("/tmp/a")).await.unwrap();

    let locks2 = locks.clone();
    let waiter = tokio::spawn(async move {
        let _g = locks2.acquire(Path::new("/tmp/a")).await.unwrap();
    });
    // the waiter cannot finish while we hold the guard
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!waiter.is_finished());

    drop(guard);
    waiter.await.unwrap();
}

#[tokio::test]
async fn distinct_paths_do_not_contend() {
    let locks = PathLocks::new();
    let _a = locks.acquire(Path::new("/tmp/a")).await.unwrap();
    let _b = locks.acquire(Path::new("/tmp/b")).await.unwrap();
    assert_eq!(locks.len(), 2);
}

#[tokio::test]
async fn reap_keeps_held_entries() {
    let locks = PathLocks::new();
    let _guard = locks.acquire(Path::new("/tmp/a")).await.unwrap();
    assert_eq!(locks.reap(), 0);
    assert_eq!(locks.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn acquire_times_out_on_deadlock() {
    let locks = PathLocks::new();
    let _guard = locks.acquire(Path::new("/tmp/a")).await.unwrap();
    let err = locks.acquire(Path::new("/tmp/a")).await.unwrap_err();
    assert_eq!(err.0, Path::new("/tmp/a"));
    // the failed waiter must not leak its refcount
    drop(_guard);
    assert_eq!(locks.reap(), 1);
}
