// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The following (client) side of one session.
//!
//! The follow offers its config view, echoes the negotiated answer, then
//! serves the lead's verbs until `BYE`.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use dsync_core::ConfigView;
use dsync_wire::{deflate, eligible, Channel, Control, ProtocolError};

use super::transfer::{self, Step};
use super::{SessionCtx, SessionError, SessionStats};

/// Drive one session from the following side. The caller owns the finalizer.
pub async fn run<S>(
    chan: &mut Channel<S>,
    ctx: &mut SessionCtx,
) -> Result<SessionStats, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    negotiate(chan, ctx).await?;

    loop {
        match chan.recv().await? {
            Control::RequestStruct => send_struct(chan, ctx).await?,
            Control::Request { path } => {
                match respond_file(chan, ctx, &path).await? {
                    Step::Done => {
                        ctx.stats.files_pushed += 1;
                        ctx.budget.success();
                    }
                    Step::Skipped => {
                        ctx.stats.skipped += 1;
                        ctx.budget.failure()?;
                    }
                }
            }
            Control::Mkdir { path, mtime } => {
                match transfer::make_dir_local(ctx, &path, mtime).await {
                    Ok(()) => {
                        ctx.stats.dirs_pulled += 1;
                        chan.send(&Control::OkMkdir { path, mtime }).await?;
                    }
                    Err(SessionError::Io(err)) => {
                        warn!(path = path.as_str(), error = %err, "cannot create directory");
                        ctx.budget.failure()?;
                        chan.send(&Control::Skip).await?;
                    }
                    Err(err) => return Err(err),
                }
            }
            Control::Mkfile(info) => {
                chan.send(&Control::OkMkfile { path: info.path.clone(), bytes: info.bytes })
                    .await?;
                match transfer::receive_file(chan, ctx, &info).await? {
                    Step::Done => {
                        ctx.stats.files_pulled += 1;
                        ctx.budget.success();
                    }
                    Step::Skipped => {
                        ctx.stats.skipped += 1;
                        ctx.budget.failure()?;
                    }
                }
            }
            Control::Delete { path } => {
                transfer::delete_local(ctx, &path).await?;
                chan.send(&Control::Ok).await?;
            }
            Control::ConfirmDelete { path } => {
                let reply = if ctx.abs(&path).exists() {
                    debug!(path = path.as_str(), "vetoing delete, local copy exists");
                    Control::NoPath { path }
                } else {
                    Control::OkPath { path }
                };
                chan.send(&reply).await?;
            }
            Control::Bye => break,
            other => {
                return Err(ProtocolError::miscommunication(format!(
                    "unexpected verb from lead: {other:?}"
                ))
                .into())
            }
        }
    }
    Ok(ctx.stats)
}

/// Config phase: offer our view, echo the negotiated answer byte-for-byte,
/// then adopt it.
async fn negotiate<S>(chan: &mut Channel<S>, ctx: &mut SessionCtx) -> Result<(), SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let offer = serde_json::to_vec(&ctx.conf.view())?;
    chan.send_raw(&offer).await?;

    let negotiated_raw = chan.recv_raw().await?;
    chan.send_raw(&negotiated_raw).await?;
    let negotiated: ConfigView = serde_json::from_slice(&negotiated_raw)
        .map_err(|e| ProtocolError::miscommunication(format!("bad negotiated config: {e}")))?;
    ctx.conf.apply_view(&negotiated);
    chan.set_chunk(negotiated.ram);
    info!(
        purge = negotiated.purge,
        compression = negotiated.compression,
        chunk = negotiated.ram,
        "config negotiated"
    );
    Ok(())
}

async fn send_struct<S>(chan: &mut Channel<S>, ctx: &SessionCtx) -> Result<(), SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let raw = ctx.local.to_wire()?;
    let payload = if eligible(ctx.conf.compression, raw.len() as u64, ctx.conf.compression_min) {
        deflate(&raw, ctx.conf.compression)?
    } else {
        raw
    };
    chan.send(&Control::Struct { bytes: payload.len() as u64 }).await?;
    match chan.recv().await? {
        Control::OkStruct { bytes } if bytes == payload.len() as u64 => {}
        other => {
            return Err(
                ProtocolError::miscommunication(format!("bad STRUCT ack: {other:?}")).into()
            )
        }
    }
    chan.send_payload(&payload).await?;
    debug!(bytes = payload.len(), "manifest sent");
    Ok(())
}

/// Serve one `REQUEST <path>`: announce the file info, wait for the byte
/// acknowledgment, stream, and read the final ack.
async fn respond_file<S>(
    chan: &mut Channel<S>,
    ctx: &mut SessionCtx,
    rel: &str,
) -> Result<Step, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let out = match transfer::prepare_outbound(ctx, rel).await {
        Ok(out) => out,
        Err(SessionError::Io(err)) => {
            warn!(path = rel, error = %err, "cannot serve file, skipping");
            chan.send(&Control::Skip).await?;
            return Ok(Step::Skipped);
        }
        Err(err) => return Err(err),
    };
    chan.send(&Control::FileInfo(out.info.clone())).await?;
    match chan.recv().await? {
        Control::OkBytes { bytes } if bytes == out.info.bytes => {
            transfer::send_prepared(chan, out).await
        }
        Control::Skip => Ok(Step::Skipped),
        other => {
            Err(ProtocolError::miscommunication(format!("bad file-info ack: {other:?}")).into())
        }
    }
}
