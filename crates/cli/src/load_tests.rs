// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::cli::Cli;
use crate::exit_error::EXIT_BAD_CONFIG;
use clap::Parser as _;
use dsync_core::Role;

fn parse(args: &[&str]) -> Cli {
    Cli::parse_from(std::iter::once("dsync").chain(args.iter().copied()))
}

#[test]
fn flags_alone_build_a_config() {
    let dir = tempfile::tempdir().unwrap();
    let cli = parse(&["--root", "/data", "--hostname", "h", "--port", "2020", "server"]);
    let conf = assemble(&cli, dir.path()).unwrap();
    assert_eq!(conf.host, Role::Server);
    assert_eq!(conf.port, 2020);
    assert_eq!(conf.root, std::path::PathBuf::from("/data"));
}

#[test]
fn missing_role_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let cli = parse(&["--root", "/data"]);
    let err = assemble(&cli, dir.path()).unwrap_err();
    assert_eq!(err.code, EXIT_BAD_CONFIG);
}

#[test]
fn named_config_is_found_with_and_without_suffix() {
    let dir = tempfile::tempdir().unwrap();
    let configs = configs_dir(dir.path());
    std::fs::create_dir_all(&configs).unwrap();
    std::fs::write(
        configs.join("homelab.json"),
        r#"{"host": "Client", "root": "/data", "hostname": "h", "port": 1818}"#,
    )
    .unwrap();

    for name in ["homelab", "homelab.json"] {
        let cli = parse(&["--config", name]);
        let conf = assemble(&cli, dir.path()).unwrap();
        assert_eq!(conf.host, Role::Client);
    }
}

#[test]
fn flags_override_file_values() {
    let dir = tempfile::tempdir().unwrap();
    let configs = configs_dir(dir.path());
    std::fs::create_dir_all(&configs).unwrap();
    std::fs::write(
        configs.join("base.json"),
        r#"{"host": "Client", "root": "/data", "hostname": "h", "port": 1818, "compression": 2}"#,
    )
    .unwrap();

    let cli = parse(&["--config", "base", "--port", "9999", "--compression", "8"]);
    let conf = assemble(&cli, dir.path()).unwrap();
    assert_eq!(conf.port, 9999);
    assert_eq!(conf.compression, 8);
    assert_eq!(conf.hostname, "h");
}

#[test]
fn subcommand_overrides_file_host() {
    let dir = tempfile::tempdir().unwrap();
    let configs = configs_dir(dir.path());
    std::fs::create_dir_all(&configs).unwrap();
    std::fs::write(
        configs.join("c.json"),
        r#"{"host": "Client", "root": "/data", "hostname": "h", "port": 1818}"#,
    )
    .unwrap();

    let cli = parse(&["--config", "c", "server"]);
    let conf = assemble(&cli, dir.path()).unwrap();
    assert_eq!(conf.host, Role::Server);
}

#[test]
fn size_literals_reach_the_config_in_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let cli = parse(&[
        "--root", "/data", "--hostname", "h", "--ram", "4MB", "--logging-limit", "-1", "client",
    ]);
    let conf = assemble(&cli, dir.path()).unwrap();
    assert_eq!(conf.ram, 4_000_000);
    assert_eq!(conf.logging_limit, -1);
}

#[test]
fn bad_size_literal_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let cli = parse(&["--root", "/data", "--hostname", "h", "--ram", "lots", "client"]);
    assert_eq!(assemble(&cli, dir.path()).unwrap_err().code, EXIT_BAD_CONFIG);
}

#[test]
fn missing_config_file_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let cli = parse(&["--config", "nope"]);
    assert_eq!(assemble(&cli, dir.path()).unwrap_err().code, EXIT_BAD_CONFIG);
}

#[test]
fn invalid_values_fail_validation() {
    let dir = tempfile::tempdir().unwrap();
    let cli = parse(&["--root", "/data", "--hostname", "h", "--compression", "12", "server"]);
    assert_eq!(assemble(&cli, dir.path()).unwrap_err().code, EXIT_BAD_CONFIG);
}
