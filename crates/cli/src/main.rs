// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! dsync: a directory-tree synchronizer over TCP.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod cli;
mod exit_error;
mod load;
mod logging;

use clap::Parser as _;

use dsync_core::Role;
use dsync_daemon::{Client, Server};

use crate::exit_error::ExitError;

#[tokio::main]
async fn main() {
    let args = cli::Cli::parse();
    let code = match run(args).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("dsync: {err}");
            err.code
        }
    };
    std::process::exit(code);
}

async fn run(args: cli::Cli) -> Result<(), ExitError> {
    let conf = load::assemble(&args, &dsync_core::default_state_dir())?;
    let _log_guard = logging::init(&conf)?;

    match conf.host {
        Role::Server => {
            let server = Server::bind(conf)
                .await
                .map_err(|e| ExitError::fatal(e.to_string()))?;
            server.run().await.map_err(|e| ExitError::fatal(e.to_string()))
        }
        Role::Client => {
            Client::new(conf).run().await.map_err(|e| ExitError::fatal(e.to_string()))
        }
    }
}
