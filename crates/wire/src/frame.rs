// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The framed channel: control messages and chunked bulk payloads over one
//! byte stream.
//!
//! Generic over the stream type so plain TCP and TLS sessions share every
//! code path. All socket reads and writes are bounded by the session
//! timeout; local file I/O is not.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

use std::time::Duration;

use crate::error::ProtocolError;
use crate::message::{Control, RETRY_TOKEN, SKIP_TOKEN};

/// Upper bound for one control message.
pub const MAX_CONTROL: usize = 1024;
/// Consecutive unparseable control messages tolerated before the session
/// fails with Miscommunication.
pub const MAX_RETRIES: u32 = 5;

/// How a bulk transfer ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    Complete,
    /// The skip sentinel was sent or detected; the file is abandoned but
    /// the session continues.
    Skipped,
    /// The local sink failed mid-receive; the rest of the payload was
    /// drained to keep the stream in frame.
    Aborted,
}

/// Sliding 14-byte detector for the skip sentinel.
///
/// The sentinel may straddle any chunk boundary, so up to 13 trailing bytes
/// of the previous chunk are carried into the next scan.
#[derive(Debug, Default)]
pub struct SkipWindow {
    tail: Vec<u8>,
}

impl SkipWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan the next chunk; true once the sentinel has appeared.
    pub fn feed(&mut self, chunk: &[u8]) -> bool {
        let mut buf = std::mem::take(&mut self.tail);
        buf.extend_from_slice(chunk);
        let found = buf.windows(SKIP_TOKEN.len()).any(|w| w == SKIP_TOKEN);
        let keep = buf.len().min(SKIP_TOKEN.len() - 1);
        self.tail = buf[buf.len() - keep..].to_vec();
        found
    }
}

/// A framed session channel.
pub struct Channel<S> {
    stream: S,
    timeout: Duration,
    chunk: i64,
    last_sent: Vec<u8>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Channel<S> {
    /// New channel with an unbounded chunk budget (renegotiated per session).
    pub fn new(stream: S, timeout: Duration) -> Self {
        Self { stream, timeout, chunk: -1, last_sent: Vec::new() }
    }

    /// Adopt the negotiated per-chunk memory budget (`-1` = unbounded).
    pub fn set_chunk(&mut self, chunk: i64) {
        self.chunk = chunk;
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    async fn write_timed(&mut self, bytes: &[u8]) -> Result<(), ProtocolError> {
        timeout(self.timeout, self.stream.write_all(bytes))
            .await
            .map_err(|_| ProtocolError::Timeout)??;
        timeout(self.timeout, self.stream.flush()).await.map_err(|_| ProtocolError::Timeout)??;
        Ok(())
    }

    async fn read_timed(&mut self, buf: &mut [u8]) -> Result<usize, ProtocolError> {
        let n = timeout(self.timeout, self.stream.read(buf))
            .await
            .map_err(|_| ProtocolError::Timeout)??;
        if n == 0 {
            return Err(ProtocolError::ConnectionClosed);
        }
        Ok(n)
    }

    /// Send raw control bytes, recording them for `RETRY` resends.
    pub async fn send_raw(&mut self, bytes: &[u8]) -> Result<(), ProtocolError> {
        if bytes.len() > MAX_CONTROL {
            return Err(ProtocolError::TooLarge);
        }
        self.last_sent = bytes.to_vec();
        self.write_timed(bytes).await
    }

    pub async fn send(&mut self, msg: &Control) -> Result<(), ProtocolError> {
        self.send_raw(&msg.encode()).await
    }

    /// Receive one raw control message. A `RETRY` from the peer resends our
    /// last control message verbatim; the depth is bounded to prevent
    /// livelock.
    pub async fn recv_raw(&mut self) -> Result<Vec<u8>, ProtocolError> {
        let mut buf = [0u8; MAX_CONTROL];
        for _ in 0..=MAX_RETRIES {
            let n = self.read_timed(&mut buf).await?;
            if &buf[..n] == RETRY_TOKEN {
                tracing::debug!("peer requested a resend");
                let resend = self.last_sent.clone();
                self.write_timed(&resend).await?;
                continue;
            }
            return Ok(buf[..n].to_vec());
        }
        Err(ProtocolError::miscommunication("retry depth exhausted by peer"))
    }

    /// Receive and parse a control message, asking the peer to resend when
    /// the bytes do not parse. The fifth consecutive failure is fatal.
    pub async fn recv(&mut self) -> Result<Control, ProtocolError> {
        let mut failures = 0;
        loop {
            let raw = self.recv_raw().await?;
            match Control::parse(&raw) {
                Ok(msg) => return Ok(msg),
                Err(err) => {
                    failures += 1;
                    if failures >= MAX_RETRIES {
                        return Err(err);
                    }
                    tracing::debug!(failures, "unparseable control message, requesting resend");
                    self.write_timed(RETRY_TOKEN).await?;
                }
            }
        }
    }

    fn chunk_len(&self, remaining: u64) -> usize {
        let cap = if self.chunk < 0 { remaining } else { remaining.min(self.chunk as u64) };
        usize::try_from(cap).unwrap_or(usize::MAX)
    }

    /// Write a whole in-memory payload in chunks.
    pub async fn send_payload(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
        let mut sent = 0;
        while sent < data.len() {
            let end = sent + self.chunk_len((data.len() - sent) as u64);
            self.write_timed(&data[sent..end]).await?;
            sent = end;
        }
        Ok(())
    }

    /// Read exactly `total` payload bytes into memory.
    pub async fn recv_payload(&mut self, total: u64) -> Result<Vec<u8>, ProtocolError> {
        let mut data = vec![0u8; usize::try_from(total).map_err(|_| ProtocolError::TooLarge)?];
        let mut read = 0;
        while read < data.len() {
            let want = self.chunk_len((data.len() - read) as u64);
            let n = self.read_timed(&mut data[read..read + want]).await?;
            read += n;
        }
        Ok(data)
    }

    /// Stream `total` bytes from a local reader. A local read failure emits
    /// the skip sentinel in-band and abandons the file; the peer's sliding
    /// window picks it up mid-transfer.
    pub async fn send_stream<R>(
        &mut self,
        reader: &mut R,
        total: u64,
    ) -> Result<StreamOutcome, ProtocolError>
    where
        R: AsyncRead + Unpin,
    {
        let mut remaining = total;
        let mut buf = vec![0u8; self.chunk_len(total).max(1)];
        while remaining > 0 {
            let want = self.chunk_len(remaining).min(buf.len());
            let failed = match reader.read(&mut buf[..want]).await {
                Ok(0) => Some("source truncated mid-transfer".to_string()),
                Ok(n) => {
                    self.write_timed(&buf[..n]).await?;
                    remaining -= n as u64;
                    None
                }
                Err(err) => Some(err.to_string()),
            };
            if let Some(reason) = failed {
                // The sentinel must fit inside the announced count, or the
                // peer's byte counter completes before the window can see it
                // and the stream falls out of frame.
                if remaining < SKIP_TOKEN.len() as u64 {
                    return Err(ProtocolError::miscommunication(format!(
                        "{reason} too close to end of transfer"
                    )));
                }
                tracing::warn!(reason = %reason, "abandoning file mid-transfer");
                self.write_timed(SKIP_TOKEN).await?;
                return Ok(StreamOutcome::Skipped);
            }
        }
        Ok(StreamOutcome::Complete)
    }

    /// Receive up to `total` bytes into a local writer, scanning every chunk
    /// for the skip sentinel. On skip the partial output is the caller's to
    /// discard. A writer failure drains the rest of the payload so the
    /// stream stays in frame, then reports `Aborted`.
    pub async fn recv_stream<W>(
        &mut self,
        writer: &mut W,
        total: u64,
    ) -> Result<StreamOutcome, ProtocolError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut window = SkipWindow::new();
        let mut remaining = total;
        let mut sink_failed = false;
        let mut buf = vec![0u8; self.chunk_len(total).max(1)];
        while remaining > 0 {
            let want = self.chunk_len(remaining).min(buf.len());
            let n = self.read_timed(&mut buf[..want]).await?;
            remaining -= n as u64;
            if window.feed(&buf[..n]) {
                return Ok(StreamOutcome::Skipped);
            }
            if !sink_failed {
                if let Err(err) = writer.write_all(&buf[..n]).await {
                    tracing::warn!(error = %err, "sink failed mid-receive, draining payload");
                    sink_failed = true;
                }
            }
        }
        if sink_failed {
            return Ok(StreamOutcome::Aborted);
        }
        writer.flush().await?;
        Ok(StreamOutcome::Complete)
    }

    /// Drain and discard the rest of a payload after a local failure,
    /// stopping early if the sender skipped too.
    pub async fn drain_stream(&mut self, total: u64) -> Result<(), ProtocolError> {
        let mut sink = tokio::io::sink();
        self.recv_stream(&mut sink, total).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
