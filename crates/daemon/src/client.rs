// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The client driver: build and save the manifest, dial the server, follow
//! the protocol, then sleep and do it again.

use std::io;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpStream;
use tracing::{debug, error, info, info_span, warn, Instrument as _};

use dsync_core::SyncConfig;
use dsync_store::{ManifestStore, StoreError};
use dsync_wire::{Channel, ProtocolError};

use crate::locks::PathLocks;
use crate::session::{self, SessionCtx, SessionError};
use crate::tls::{self, TlsError};

/// Cap for the refused-connection backoff.
const MAX_BACKOFF: Duration = Duration::from_secs(900);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("TLS error: {0}")]
    Tls(#[from] TlsError),

    #[error("session failed: {0}")]
    Session(#[from] SessionError),
}

/// How one attempt ended, for the retry policy.
enum Attempt {
    Refused,
    Reset,
    Failed(SessionError),
}

pub struct Client {
    conf: SyncConfig,
    locks: PathLocks,
}

impl Client {
    pub fn new(conf: SyncConfig) -> Self {
        Self { conf, locks: PathLocks::new() }
    }

    /// The sync loop. A successful session sleeps `sleep_time` seconds
    /// (`-1` = single shot); a refused connection backs off `30 × tries`
    /// capped at 900 s; a reset retries immediately.
    pub async fn run(&self) -> Result<(), ClientError> {
        let mut tries: u32 = 0;
        loop {
            match self.run_once().await {
                Ok(()) => {
                    tries = 0;
                    if self.conf.sleep_time < 0 {
                        return Ok(());
                    }
                    debug!(secs = self.conf.sleep_time, "sleeping until next session");
                    tokio::time::sleep(Duration::from_secs(self.conf.sleep_time as u64)).await;
                }
                Err(ClientError::Session(err)) => match classify(err) {
                    Attempt::Refused => {
                        tries += 1;
                        let backoff =
                            Duration::from_secs(30 * u64::from(tries)).min(MAX_BACKOFF);
                        warn!(tries, backoff_secs = backoff.as_secs(), "connection refused");
                        tokio::time::sleep(backoff).await;
                    }
                    Attempt::Reset => {
                        warn!("connection reset, retrying immediately");
                    }
                    Attempt::Failed(err) => {
                        if self.conf.sleep_time < 0 {
                            return Err(err.into());
                        }
                        error!(error = %err, "session failed, will retry after sleep");
                        tokio::time::sleep(Duration::from_secs(self.conf.sleep_time as u64))
                            .await;
                    }
                },
                Err(err) => return Err(err),
            }
        }
    }

    /// One complete attempt: scan+save, dial, negotiate, follow, re-scan.
    pub async fn run_once(&self) -> Result<(), ClientError> {
        let mut store = ManifestStore::open(
            &self.conf.root,
            self.conf.manifest_path(),
            self.conf.gitignore,
            self.conf.purge_limit,
        )?;
        store.save()?;

        let addr = (self.conf.hostname.as_str(), self.conf.port);
        let stream =
            match tokio::time::timeout(self.conf.socket_timeout(), TcpStream::connect(addr))
                .await
            {
                Ok(Ok(stream)) => stream,
                Ok(Err(err)) => return Err(ClientError::Session(err.into())),
                Err(_) => {
                    return Err(ClientError::Session(SessionError::Protocol(
                        ProtocolError::Timeout,
                    )))
                }
            };
        let peer = stream.peer_addr().map(|a| a.to_string()).unwrap_or_default();
        let span = info_span!("session", role = "client", peer = %peer);

        async {
            info!("connected");
            let timeout = self.conf.socket_timeout();
            let ctx = SessionCtx::new(self.conf.clone(), store.snapshot(), self.locks.clone())?;

            let result = match &self.conf.cert {
                Some(cert) if self.conf.encryption => {
                    let connector = tls::connector(cert)?;
                    let name = tls::server_name(&self.conf.hostname)?;
                    let tls_stream = connector
                        .connect(name, stream)
                        .await
                        .map_err(|e| ClientError::Session(SessionError::Io(e)))?;
                    follow_session(Channel::new(tls_stream, timeout), ctx).await
                }
                _ => follow_session(Channel::new(stream, timeout), ctx).await,
            };
            result?;

            // fold the session's changes into the persisted manifest now
            // rather than waiting for the next wake-up
            store.update()?;
            store.save()?;
            Ok(())
        }
        .instrument(span)
        .await
    }
}

async fn follow_session<S>(mut chan: Channel<S>, mut ctx: SessionCtx) -> Result<(), ClientError>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let result = session::follow::run(&mut chan, &mut ctx).await;
    ctx.finalize();
    match result {
        Ok(stats) => {
            debug!(?stats, "session complete");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

fn classify(err: SessionError) -> Attempt {
    match io_kind(&err) {
        Some(io::ErrorKind::ConnectionRefused) => Attempt::Refused,
        Some(io::ErrorKind::ConnectionReset) | Some(io::ErrorKind::BrokenPipe) => Attempt::Reset,
        _ => {
            if matches!(err, SessionError::Protocol(ProtocolError::ConnectionClosed)) {
                Attempt::Reset
            } else {
                Attempt::Failed(err)
            }
        }
    }
}

fn io_kind(err: &SessionError) -> Option<io::ErrorKind> {
    match err {
        SessionError::Io(e) => Some(e.kind()),
        SessionError::Protocol(ProtocolError::Io(e)) => Some(e.kind()),
        _ => None,
    }
}
