// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracing setup: a non-blocking appender writing `logs.txt` under the
//! per-root state directory. Verbosity 0-4 maps onto off/error/info/debug/
//! trace; `RUST_LOG` overrides when set.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use dsync_core::SyncConfig;

use crate::exit_error::ExitError;

pub fn init(conf: &SyncConfig) -> Result<Option<WorkerGuard>, ExitError> {
    if conf.logging == 0 {
        return Ok(None);
    }
    let level = match conf.logging {
        1 => "error",
        2 => "info",
        3 => "debug",
        _ => "trace",
    };

    let dir = conf.conf_dir();
    std::fs::create_dir_all(&dir)
        .map_err(|e| ExitError::fatal(format!("cannot create log directory: {e}")))?;
    let appender = tracing_appender::rolling::never(&dir, "logs.txt");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(Some(guard))
}
