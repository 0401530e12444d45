// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-path transfer and deletion primitives shared by both session roles.
//!
//! Every filesystem touch happens under the path's lock. File payloads end
//! with one final acknowledgment from the receiver (`OK` on success, the
//! skip sentinel otherwise), so both sides always agree on whose turn it is.

use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime};

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, trace, warn};

use dsync_wire::{
    deflate, eligible, inflate, Channel, Control, ProtocolError, StreamOutcome, TransferInfo,
};

use super::{SessionCtx, SessionError};
use crate::locks::PathGuard;

/// Outcome of one per-path protocol step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Done,
    Skipped,
}

/// Apply a whole-seconds mtime to a path (works for directories too).
pub(crate) fn set_mtime(abs: &Path, mtime: i64) -> io::Result<()> {
    let stamp = if mtime >= 0 {
        SystemTime::UNIX_EPOCH + Duration::from_secs(mtime as u64)
    } else {
        SystemTime::UNIX_EPOCH
    };
    std::fs::File::open(abs)?.set_modified(stamp)
}

/// A file ready to leave this host: its announce header plus either the
/// compressed payload or an open handle to stream from. The path lock is
/// held until the transfer finishes.
pub(crate) struct OutboundFile {
    pub info: TransferInfo,
    payload: Payload,
    _guard: PathGuard,
}

enum Payload {
    Packed(Vec<u8>),
    Stream(tokio::fs::File),
}

/// Stat and (when eligible) compress one local file for sending.
pub(crate) async fn prepare_outbound(
    ctx: &SessionCtx,
    rel: &str,
) -> Result<OutboundFile, SessionError> {
    let abs = ctx.abs(rel);
    let guard = ctx.locks.acquire(&abs).await?;

    let meta = tokio::fs::metadata(&abs).await?;
    let size = meta.len();
    let manifest_entry = ctx.local.get(rel);
    let last_mod = manifest_entry.map(|e| e.last_mod).unwrap_or_else(|| mtime_of(&meta));
    let perm = manifest_entry.map(|e| e.perm).unwrap_or(0);

    let (bytes, payload) = if eligible(ctx.conf.compression, size, ctx.conf.compression_min) {
        let raw = tokio::fs::read(&abs).await?;
        let packed = deflate(&raw, ctx.conf.compression)?;
        (packed.len() as u64, Payload::Packed(packed))
    } else {
        let file = tokio::fs::File::open(&abs).await?;
        (size, Payload::Stream(file))
    };

    Ok(OutboundFile {
        info: TransferInfo { path: rel.to_string(), bytes, last_mod, perm, size },
        payload,
        _guard: guard,
    })
}

fn mtime_of(meta: &std::fs::Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Stream a prepared file and read the receiver's final acknowledgment.
pub(crate) async fn send_prepared<S>(
    chan: &mut Channel<S>,
    out: OutboundFile,
) -> Result<Step, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let OutboundFile { info, payload, _guard } = out;
    let outcome = if info.bytes == 0 {
        StreamOutcome::Complete
    } else {
        match payload {
            Payload::Packed(data) => {
                chan.send_payload(&data).await?;
                StreamOutcome::Complete
            }
            Payload::Stream(mut file) => chan.send_stream(&mut file, info.bytes).await?,
        }
    };
    drop(_guard);

    match (outcome, chan.recv().await?) {
        (_, Control::Ok) => Ok(Step::Done),
        (_, Control::Skip) => Ok(Step::Skipped),
        (_, other) => Err(ProtocolError::miscommunication(format!(
            "expected final transfer ack, got {other:?}"
        ))
        .into()),
    }
}

/// Receive one announced file payload, write it locally, stamp its mtime,
/// and send the final acknowledgment.
pub(crate) async fn receive_file<S>(
    chan: &mut Channel<S>,
    ctx: &mut SessionCtx,
    info: &TransferInfo,
) -> Result<Step, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let abs = ctx.abs(&info.path);
    let guard = ctx.locks.acquire(&abs).await?;
    let step = receive_file_locked(chan, ctx, info, &abs).await?;
    drop(guard);

    let ack = if step == Step::Done { Control::Ok } else { Control::Skip };
    chan.send(&ack).await?;
    Ok(step)
}

async fn receive_file_locked<S>(
    chan: &mut Channel<S>,
    ctx: &SessionCtx,
    info: &TransferInfo,
    abs: &Path,
) -> Result<Step, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if let Err(err) = clear_collision(abs, false).and_then(|()| ensure_parent(abs)) {
        warn!(path = %abs.display(), error = %err, "cannot clear path for file");
        chan.drain_stream(info.bytes).await?;
        return Ok(Step::Skipped);
    }

    if info.bytes == 0 {
        if let Err(err) = write_empty(abs) {
            warn!(path = %abs.display(), error = %err, "cannot create empty file");
            return Ok(Step::Skipped);
        }
        stamp(abs, info.last_mod);
        return Ok(Step::Done);
    }

    if eligible(ctx.conf.compression, info.bytes, ctx.conf.compression_min) {
        let packed = chan.recv_payload(info.bytes).await?;
        let raw = inflate(&packed)?;
        if let Err(err) = std::fs::write(abs, &raw) {
            warn!(path = %abs.display(), error = %err, "cannot write file");
            return Ok(Step::Skipped);
        }
        stamp(abs, info.last_mod);
        trace!(path = %info.path, bytes = info.bytes, "received compressed file");
        return Ok(Step::Done);
    }

    let mut file = match tokio::fs::File::create(abs).await {
        Ok(file) => file,
        Err(err) => {
            warn!(path = %abs.display(), error = %err, "cannot open file, draining payload");
            chan.drain_stream(info.bytes).await?;
            return Ok(Step::Skipped);
        }
    };
    match chan.recv_stream(&mut file, info.bytes).await? {
        StreamOutcome::Complete => {
            drop(file);
            stamp(abs, info.last_mod);
            trace!(path = %info.path, bytes = info.bytes, "received file");
            Ok(Step::Done)
        }
        StreamOutcome::Skipped | StreamOutcome::Aborted => {
            drop(file);
            if let Err(err) = std::fs::remove_file(abs) {
                warn!(path = %abs.display(), error = %err, "cannot drop partial file");
            }
            Ok(Step::Skipped)
        }
    }
}

/// Create one pulled directory from the peer's manifest entry.
pub(crate) async fn make_dir_local(
    ctx: &mut SessionCtx,
    rel: &str,
    mtime: i64,
) -> Result<(), SessionError> {
    let abs = ctx.abs(rel);
    let _guard = ctx.locks.acquire(&abs).await?;
    clear_collision(&abs, true)?;
    std::fs::create_dir_all(&abs)?;
    stamp(&abs, mtime);
    ctx.timeshift.record(abs, mtime);
    debug!(path = rel, "created directory");
    Ok(())
}

/// Delete (or trash) one local path, tolerating races with other writers.
pub(crate) async fn delete_local(ctx: &mut SessionCtx, rel: &str) -> Result<(), SessionError> {
    let abs = ctx.abs(rel);
    let _guard = ctx.locks.acquire(&abs).await?;
    let result = match &ctx.backup {
        Some(backup) => backup.stash(rel, &abs),
        None => {
            if abs.is_dir() {
                std::fs::remove_dir_all(&abs)
            } else {
                std::fs::remove_file(&abs)
            }
        }
    };
    match result {
        Ok(()) => {
            ctx.stats.deleted_local += 1;
            debug!(path = rel, "deleted locally");
        }
        Err(err)
            if matches!(err.kind(), io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied) =>
        {
            warn!(path = rel, error = %err, "local delete tolerated");
        }
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

/// Newer-wins collision handling: remove an existing entry of the wrong
/// kind before the replacement lands.
fn clear_collision(abs: &Path, want_dir: bool) -> io::Result<()> {
    match std::fs::symlink_metadata(abs) {
        Ok(meta) if meta.is_dir() && !want_dir => std::fs::remove_dir_all(abs),
        Ok(meta) if !meta.is_dir() && want_dir => std::fs::remove_file(abs),
        _ => Ok(()),
    }
}

fn ensure_parent(abs: &Path) -> io::Result<()> {
    match abs.parent() {
        Some(parent) if !parent.exists() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

fn write_empty(abs: &Path) -> io::Result<()> {
    std::fs::write(abs, b"")
}

fn stamp(abs: &Path, mtime: i64) {
    if let Err(err) = set_mtime(abs, mtime) {
        warn!(path = %abs.display(), error = %err, "cannot set mtime");
    }
}
