// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The leading (server) side of one session.
//!
//! After the config handshake the lead requests the peer's manifest,
//! reconciles it against its own snapshot, and drives every transfer and
//! deletion in the prescribed order before saying `BYE`.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

use dsync_core::{plan, ConfigView, Manifest, SyncPlan};
use dsync_wire::{eligible, inflate, Channel, Control, ProtocolError};

use super::transfer::{self, Step};
use super::{SessionCtx, SessionError, SessionStats};

/// Drive one session from the leading side. The caller owns the finalizer.
pub async fn run<S>(
    chan: &mut Channel<S>,
    ctx: &mut SessionCtx,
) -> Result<SessionStats, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    negotiate(chan, ctx).await?;
    let remote = request_struct(chan, ctx).await?;

    match plan(&ctx.local, &remote, ctx.conf.purge) {
        None => {
            debug!("trees already agree");
        }
        Some(plan) => {
            apply(chan, ctx, &remote, &plan).await?;
        }
    }

    chan.send(&Control::Bye).await?;
    Ok(ctx.stats)
}

/// Config phase: receive the client's view, answer with the intersection,
/// and demand a byte-for-byte echo.
async fn negotiate<S>(chan: &mut Channel<S>, ctx: &mut SessionCtx) -> Result<(), SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let raw = chan.recv_raw().await?;
    let client: ConfigView = serde_json::from_slice(&raw)
        .map_err(|e| ProtocolError::miscommunication(format!("bad config offer: {e}")))?;
    let negotiated = ConfigView::negotiate(&client, &ctx.conf.view());
    let body = serde_json::to_vec(&negotiated)?;
    chan.send_raw(&body).await?;

    let echo = chan.recv_raw().await?;
    if echo != body {
        return Err(ProtocolError::miscommunication("config echo mismatch").into());
    }
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

async fn request_struct<S>(
    chan: &mut Channel<S>,
    ctx: &SessionCtx,
) -> Result<Manifest, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    chan.send(&Control::RequestStruct).await?;
    let bytes = match chan.recv().await? {
        Control::Struct { bytes } => bytes,
        other => {
            return Err(
                ProtocolError::miscommunication(format!("expected STRUCT, got {other:?}")).into()
            )
        }
    };
    chan.send(&Control::OkStruct { bytes }).await?;
    let mut payload = chan.recv_payload(bytes).await?;
    if eligible(ctx.conf.compression, bytes, ctx.conf.compression_min) {
        payload = inflate(&payload)?;
    }
    let remote = Manifest::from_wire(&ctx.conf.root, &payload)?;
    debug!(entries = remote.len(), "peer manifest received");
    Ok(remote)
}

/// Apply one reconciliation plan: pull creates, push creates, then (with
/// purge) pull deletes guarded by `CONFIRM DELETE`, then push deletes.
async fn apply<S>(
    chan: &mut Channel<S>,
    ctx: &mut SessionCtx,
    remote: &Manifest,
    plan: &SyncPlan,
) -> Result<(), SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    for rel in &plan.creates.pull.dirs {
        let mtime = remote.get(rel).map(|e| e.last_mod).unwrap_or(0);
        transfer::make_dir_local(ctx, rel, mtime).await?;
        ctx.stats.dirs_pulled += 1;
    }

    ctx.budget.reset();
    for rel in &plan.creates.pull.files {
        match pull_file(chan, ctx, rel).await? {
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

    ctx.budget.reset();
    for rel in &plan.creates.push.dirs {
        match push_dir(chan, ctx, rel).await? {
            Step::Done => {
                ctx.stats.dirs_pushed += 1;
                ctx.budget.success();
            }
            Step::Skipped => {
                ctx.stats.skipped += 1;
                ctx.budget.failure()?;
            }
        }
    }

    ctx.budget.reset();
    for rel in &plan.creates.push.files {
        match push_file(chan, ctx, rel).await? {
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

    if ctx.conf.purge {
        apply_deletes(chan, ctx, plan).await?;
    }
    Ok(())
}

async fn apply_deletes<S>(
    chan: &mut Channel<S>,
    ctx: &mut SessionCtx,
    plan: &SyncPlan,
) -> Result<(), SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    // Pull side first: files, then directories deepest-first, each gated on
    // the peer confirming the path is gone on its side too.
    let mut pull_dirs = plan.deletes.pull.dirs.clone();
    pull_dirs.sort_unstable_by(|a, b| b.cmp(a));
    for rel in plan.deletes.pull.files.iter().chain(pull_dirs.iter()) {
        if confirm_delete(chan, rel).await? {
            transfer::delete_local(ctx, rel).await?;
        } else {
            debug!(path = rel.as_str(), "peer vetoed delete");
        }
    }

    // Push side: only paths already gone locally are propagated.
    let mut push_dirs = plan.deletes.push.dirs.clone();
    push_dirs.sort_unstable_by(|a, b| b.cmp(a));
    for rel in plan.deletes.push.files.iter().chain(push_dirs.iter()) {
        if ctx.abs(rel).exists() {
            debug!(path = rel.as_str(), "local copy reappeared, not propagating delete");
            continue;
        }
        chan.send(&Control::Delete { path: rel.clone() }).await?;
        match chan.recv().await? {
            Control::Ok => ctx.stats.deleted_remote += 1,
            other => {
                return Err(ProtocolError::miscommunication(format!(
                    "expected OK for DELETE, got {other:?}"
                ))
                .into())
            }
        }
    }
    Ok(())
}

async fn pull_file<S>(
    chan: &mut Channel<S>,
    ctx: &mut SessionCtx,
    rel: &str,
) -> Result<Step, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    chan.send(&Control::Request { path: rel.to_string() }).await?;
    match chan.recv().await? {
        Control::Skip => Ok(Step::Skipped),
        Control::FileInfo(info) => {
            if info.path != rel {
                return Err(ProtocolError::miscommunication(format!(
                    "asked for {rel:?}, peer announced {:?}",
                    info.path
                ))
                .into());
            }
            chan.send(&Control::OkBytes { bytes: info.bytes }).await?;
            transfer::receive_file(chan, ctx, &info).await
        }
        other => {
            Err(ProtocolError::miscommunication(format!("expected file info, got {other:?}"))
                .into())
        }
    }
}

async fn push_dir<S>(
    chan: &mut Channel<S>,
    ctx: &mut SessionCtx,
    rel: &str,
) -> Result<Step, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mtime = ctx.local.get(rel).map(|e| e.last_mod).unwrap_or(0);
    chan.send(&Control::Mkdir { path: rel.to_string(), mtime }).await?;
    match chan.recv().await? {
        Control::OkMkdir { path, mtime: echoed } if path == rel && echoed == mtime => {
            Ok(Step::Done)
        }
        Control::Skip => Ok(Step::Skipped),
        other => {
            Err(ProtocolError::miscommunication(format!("bad MKDIR ack: {other:?}")).into())
        }
    }
}

async fn push_file<S>(
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
            tracing::warn!(path = rel, error = %err, "cannot read file, skipping");
            return Ok(Step::Skipped);
        }
        Err(err) => return Err(err),
    };
    chan.send(&Control::Mkfile(out.info.clone())).await?;
    match chan.recv().await? {
        Control::OkMkfile { path, bytes } if path == rel && bytes == out.info.bytes => {
            transfer::send_prepared(chan, out).await
        }
        Control::Skip => Ok(Step::Skipped),
        other => {
            Err(ProtocolError::miscommunication(format!("bad MKFILE ack: {other:?}")).into())
        }
    }
}

async fn confirm_delete<S>(chan: &mut Channel<S>, rel: &str) -> Result<bool, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    chan.send(&Control::ConfirmDelete { path: rel.to_string() }).await?;
    match chan.recv().await? {
        Control::OkPath { path } if path == rel => Ok(true),
        Control::NoPath { path } if path == rel => Ok(false),
        other => {
            Err(ProtocolError::miscommunication(format!("bad CONFIRM DELETE ack: {other:?}"))
                .into())
        }
    }
}
