// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The server driver: accept loop, one worker task per connection, and the
//! background manifest refresher and lock reaper.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument as _};

use dsync_core::{Manifest, SyncConfig};
use dsync_store::{ManifestStore, StoreError};
use dsync_wire::Channel;

use crate::locks::PathLocks;
use crate::session::{self, SessionCtx, SessionError};
use crate::tls::{self, TlsError};

/// Cadence of the shared-manifest refresher.
const REFRESH_INTERVAL: Duration = Duration::from_secs(5);
/// Cadence of the lock-map reaper.
const REAP_INTERVAL: Duration = Duration::from_secs(2);

static SESSION_SEQ: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("bind failed: {0}")]
    Bind(std::io::Error),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("TLS error: {0}")]
    Tls(#[from] TlsError),

    #[error("configuration missing: {0}")]
    MissingConfig(&'static str),
}

/// A bound, ready-to-run server.
pub struct Server {
    conf: SyncConfig,
    listener: TcpListener,
    store: ManifestStore,
    snapshot: Arc<RwLock<Arc<Manifest>>>,
    locks: PathLocks,
    acceptor: Option<TlsAcceptor>,
    shutdown: CancellationToken,
}

impl Server {
    /// Scan the root, bind the listening socket, and prepare TLS if asked.
    /// Bind failures are fatal for the process.
    pub async fn bind(conf: SyncConfig) -> Result<Self, ServerError> {
        let store = ManifestStore::open(
            &conf.root,
            conf.manifest_path(),
            conf.gitignore,
            conf.purge_limit,
        )?;
        store.save()?;
        let snapshot = Arc::new(RwLock::new(store.snapshot()));

        let acceptor = if conf.encryption {
            let cert = conf.cert.as_deref().ok_or(ServerError::MissingConfig("cert"))?;
            let key = conf.key.as_deref().ok_or(ServerError::MissingConfig("key"))?;
            Some(tls::acceptor(cert, key)?)
        } else {
            None
        };

        let listener = TcpListener::bind((conf.hostname.as_str(), conf.port))
            .await
            .map_err(ServerError::Bind)?;
        info!(addr = %listener.local_addr().map_err(ServerError::Bind)?, "server listening");

        Ok(Self {
            conf,
            listener,
            store,
            snapshot,
            locks: PathLocks::new(),
            acceptor,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Token that stops the accept loop and cancels the background tasks.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Accept until shutdown (or Ctrl-C), spawning one worker per
    /// connection. Workers are detached; joining is best-effort via the
    /// cancellation token.
    pub async fn run(self) -> Result<(), ServerError> {
        let Server { conf, listener, store, snapshot, locks, acceptor, shutdown } = self;

        let refresher = tokio::spawn(refresh_loop(
            store,
            Arc::clone(&snapshot),
            shutdown.clone(),
        ));
        let reaper = tokio::spawn(reap_loop(locks.clone(), shutdown.clone()));

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                result = tokio::signal::ctrl_c() => {
                    if result.is_ok() {
                        info!("interrupt received, shutting down");
                    }
                    shutdown.cancel();
                    break;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            spawn_worker(WorkerSeed {
                                conf: conf.clone(),
                                snapshot: Arc::clone(&snapshot.read()),
                                locks: locks.clone(),
                                acceptor: acceptor.clone(),
                                shutdown: shutdown.clone(),
                            }, stream, peer);
                        }
                        Err(err) => error!(error = %err, "accept failed"),
                    }
                }
            }
        }

        let _ = tokio::join!(refresher, reaper);
        Ok(())
    }
}

/// Everything a worker needs, captured at accept time. The manifest
/// snapshot is pinned here: long sessions do not observe refreshes.
struct WorkerSeed {
    conf: SyncConfig,
    snapshot: Arc<Manifest>,
    locks: PathLocks,
    acceptor: Option<TlsAcceptor>,
    shutdown: CancellationToken,
}

fn spawn_worker(seed: WorkerSeed, stream: TcpStream, peer: SocketAddr) {
    let id = SESSION_SEQ.fetch_add(1, Ordering::Relaxed);
    let span = info_span!("session", role = "server", %peer, id);
    tokio::spawn(
        async move {
            info!("client connected");
            let shutdown = seed.shutdown.clone();
            tokio::select! {
                _ = shutdown.cancelled() => debug!("worker cancelled at shutdown"),
                () = serve_connection(seed, stream) => {}
            }
        }
        .instrument(span),
    );
}

async fn serve_connection(seed: WorkerSeed, stream: TcpStream) {
    let timeout = seed.conf.socket_timeout();
    let ctx = match SessionCtx::new(seed.conf, seed.snapshot, seed.locks) {
        Ok(ctx) => ctx,
        Err(err) => {
            error!(error = %err, "session setup failed");
            return;
        }
    };

    match seed.acceptor {
        Some(acceptor) => match acceptor.accept(stream).await {
            Ok(tls_stream) => {
                lead_session(Channel::new(tls_stream, timeout), ctx).await;
            }
            Err(err) => warn!(error = %err, "TLS handshake failed"),
        },
        None => {
            lead_session(Channel::new(stream, timeout), ctx).await;
        }
    }
}

/// Run one leading session and route every outcome through the finalizer.
/// No error escapes a worker.
async fn lead_session<S>(mut chan: Channel<S>, mut ctx: SessionCtx)
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    match session::lead::run(&mut chan, &mut ctx).await {
        Ok(stats) => debug!(?stats, "session complete"),
        Err(err) => {
            log_session_error(&err);
            // best-effort goodbye so the peer is not left mid-read
            let _ = chan.send(&dsync_wire::Control::Bye).await;
        }
    }
    ctx.finalize();
}

fn log_session_error(err: &SessionError) {
    match err {
        SessionError::Protocol(dsync_wire::ProtocolError::ConnectionClosed) => {
            warn!("client disconnected mid-session");
        }
        SessionError::Protocol(dsync_wire::ProtocolError::Timeout) => {
            warn!("session timed out");
        }
        other => error!(error = %other, "session failed"),
    }
}

async fn refresh_loop(
    mut store: ManifestStore,
    snapshot: Arc<RwLock<Arc<Manifest>>>,
    shutdown: CancellationToken,
) {
    let mut tick = tokio::time::interval(REFRESH_INTERVAL);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tick.tick() => {
                if let Err(err) = store.update() {
                    warn!(error = %err, "manifest refresh failed");
                    continue;
                }
                if let Err(err) = store.save() {
                    warn!(error = %err, "manifest save failed");
                }
                *snapshot.write() = store.snapshot();
            }
        }
    }
}

async fn reap_loop(locks: PathLocks, shutdown: CancellationToken) {
    let mut tick = tokio::time::interval(REAP_INTERVAL);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tick.tick() => {
                let reaped = locks.reap();
                if reaped > 0 {
                    debug!(reaped, "idle path locks dropped");
                }
            }
        }
    }
}
