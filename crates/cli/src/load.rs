// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration assembly: file values first, CLI flags on top.
//!
//! A `--config` argument may be an absolute path or a bare name searched
//! under `<state>/configs/` (with and without the `.json` suffix).

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use dsync_core::{parse_size, SyncConfig};

use crate::cli::{Cli, RoleCommand};
use crate::exit_error::ExitError;

/// Where named configuration files live.
pub fn configs_dir(state_dir: &Path) -> PathBuf {
    state_dir.join("configs")
}

/// Build the effective [`SyncConfig`] from a parsed command line.
pub fn assemble(cli: &Cli, state_dir: &Path) -> Result<SyncConfig, ExitError> {
    let mut map = match &cli.config {
        Some(name_or_path) => read_config_file(name_or_path, state_dir)?,
        None => Map::new(),
    };

    apply_overrides(cli, &mut map)?;

    if let Some(role) = cli.role {
        let host = match role {
            RoleCommand::Server => "Server",
            RoleCommand::Client => "Client",
        };
        map.insert("host".to_string(), Value::String(host.to_string()));
    }
    if !map.contains_key("host") {
        return Err(ExitError::bad_config(
            "no role: pass the server or client subcommand, or a config file with a host key",
        ));
    }

    let conf: SyncConfig = serde_json::from_value(Value::Object(map))
        .map_err(|e| ExitError::bad_config(format!("unusable configuration: {e}")))?;
    conf.validate().map_err(|e| ExitError::bad_config(e.to_string()))?;
    Ok(conf)
}

fn read_config_file(name_or_path: &str, state_dir: &Path) -> Result<Map<String, Value>, ExitError> {
    let path = resolve_config_path(name_or_path, state_dir).ok_or_else(|| {
        ExitError::bad_config(format!("configuration file {name_or_path:?} does not exist"))
    })?;
    let body = std::fs::read(&path)
        .map_err(|e| ExitError::bad_config(format!("cannot read {}: {e}", path.display())))?;
    match serde_json::from_slice(&body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ExitError::bad_config(format!(
            "{} is not a JSON configuration object",
            path.display()
        ))),
        Err(e) => Err(ExitError::bad_config(format!("cannot parse {}: {e}", path.display()))),
    }
}

fn resolve_config_path(name_or_path: &str, state_dir: &Path) -> Option<PathBuf> {
    let direct = PathBuf::from(name_or_path);
    if direct.exists() {
        return Some(direct);
    }
    let named = configs_dir(state_dir).join(name_or_path);
    if named.exists() {
        return Some(named);
    }
    let with_suffix = named.with_extension("json");
    with_suffix.exists().then_some(with_suffix)
}

fn apply_overrides(cli: &Cli, map: &mut Map<String, Value>) -> Result<(), ExitError> {
    let mut set = |key: &str, value: Option<Value>| {
        if let Some(value) = value {
            map.insert(key.to_string(), value);
        }
    };

    set("root", cli.root.as_ref().map(|p| Value::String(p.display().to_string())));
    set("hostname", cli.hostname.clone().map(Value::String));
    set("port", cli.port.map(|v| Value::Number(v.into())));
    set("timeout", cli.timeout.map(|v| Value::Number(v.into())));
    set("encryption", cli.encryption.map(Value::Bool));
    set("cert", cli.cert.as_ref().map(|p| Value::String(p.display().to_string())));
    set("key", cli.key.as_ref().map(|p| Value::String(p.display().to_string())));
    set("purge", cli.purge.map(Value::Bool));
    set("purge_limit", cli.purge_limit.map(|v| Value::Number(v.into())));
    set("backup", cli.backup.map(Value::Bool));
    set("backup_path", cli.backup_path.clone().map(Value::String));
    set("backup_limit", cli.backup_limit.map(|v| Value::Number(v.into())));
    set("ram", size_value(cli.ram.as_deref(), "ram")?);
    set("compression", cli.compression.map(|v| Value::Number(v.into())));
    set(
        "compression_min",
        match size_value(cli.compression_min.as_deref(), "compression_min")? {
            Some(Value::Number(n)) if n.as_i64().is_some_and(|v| v < 0) => {
                return Err(ExitError::bad_config("compression_min cannot be negative"))
            }
            other => other,
        },
    );
    set("logging", cli.logging.map(|v| Value::Number(v.into())));
    set("logging_limit", size_value(cli.logging_limit.as_deref(), "logging_limit")?);
    set("gitignore", cli.gitignore.map(Value::Bool));
    set("sleep_time", cli.sleep_time.map(|v| Value::Number(v.into())));
    Ok(())
}

fn size_value(input: Option<&str>, key: &str) -> Result<Option<Value>, ExitError> {
    match input {
        None => Ok(None),
        Some(text) => {
            let bytes = parse_size(text)
                .map_err(|e| ExitError::bad_config(format!("bad {key} value: {e}")))?;
            Ok(Some(Value::Number(bytes.into())))
        }
    }
}

#[cfg(test)]
#[path = "load_tests.rs"]
mod tests;
