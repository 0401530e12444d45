// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

#[test]
fn stash_preserves_relative_subpath() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("root");
    fs::create_dir_all(root.join("sub")).unwrap();
    fs::write(root.join("sub/b.txt"), "bytes").unwrap();

    let trash = BackupStore::create(dir.path().join("trash"), 7).unwrap();
    trash.stash("./sub/b.txt", &root.join("sub/b.txt")).unwrap();

    assert!(!root.join("sub/b.txt").exists());
    assert_eq!(fs::read_to_string(trash.path().join("sub/b.txt")).unwrap(), "bytes");
}

#[test]
fn stash_moves_whole_directories() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("root");
    fs::create_dir_all(root.join("d/inner")).unwrap();
    fs::write(root.join("d/inner/x.txt"), "x").unwrap();

    let trash = BackupStore::create(dir.path().join("trash"), 7).unwrap();
    trash.stash("./d", &root.join("d")).unwrap();

    assert!(!root.join("d").exists());
    assert!(trash.path().join("d/inner/x.txt").exists());
}

#[test]
fn stash_replaces_previous_backup() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("root");
    fs::create_dir_all(&root).unwrap();
    let trash = BackupStore::create(dir.path().join("trash"), 7).unwrap();

    fs::write(root.join("a.txt"), "old").unwrap();
    trash.stash("./a.txt", &root.join("a.txt")).unwrap();
    fs::write(root.join("a.txt"), "new").unwrap();
    trash.stash("./a.txt", &root.join("a.txt")).unwrap();

    assert_eq!(fs::read_to_string(trash.path().join("a.txt")).unwrap(), "new");
}

#[test]
fn purge_removes_only_aged_entries() {
    let dir = tempfile::tempdir().unwrap();
    let trash = BackupStore::create(dir.path().join("trash"), 7).unwrap();
    fs::write(trash.path().join("fresh.txt"), "f").unwrap();
    fs::write(trash.path().join("old.txt"), "o").unwrap();

    // nothing is 7 days old yet
    assert_eq!(trash.purge(now()).unwrap(), 0);
    assert!(trash.path().join("fresh.txt").exists());

    // pretend a week passed
    let removed = trash.purge(now() + 8 * 86_400).unwrap();
    assert_eq!(removed, 2);
    assert!(!trash.path().join("old.txt").exists());
}

#[test]
fn negative_limit_never_purges() {
    let dir = tempfile::tempdir().unwrap();
    let trash = BackupStore::create(dir.path().join("trash"), -1).unwrap();
    fs::write(trash.path().join("keep.txt"), "k").unwrap();
    assert_eq!(trash.purge(now() + 365 * 86_400).unwrap(), 0);
    assert!(trash.path().join("keep.txt").exists());
}
