//! Line framing over any tokio byte stream.
//!
//! Serial ports and TCP sockets both end up here: the stream only has to
//! implement `AsyncRead + AsyncWrite`, which also lets tests drive the
//! framing with an in-memory `tokio::io::duplex` pair.

use crate::error::{CoolerError, Result};
use crate::transport::{ReadOutcome, Transport};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;

/// How long the stream must stay quiet before a drain is considered done.
pub const DRAIN_IDLE: Duration = Duration::from_millis(10);

/// Upper bound on a single drain, in case the device keeps talking.
const DRAIN_LIMIT: Duration = Duration::from_millis(250);

const READ_CHUNK: usize = 1024;

/// Stand-in deadline when `now + timeout` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// `timeout` from now, saturating instead of overflowing.
pub(crate) fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout).unwrap_or_else(|| now + FAR_FUTURE)
}

/// Terminator-delimited reader/writer over an async byte stream.
pub struct StreamTransport<S> {
    stream: Option<S>,
    buffer: Vec<u8>,
    label: String,
}

impl<S> std::fmt::Debug for StreamTransport<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamTransport")
            .field("label", &self.label)
            .field("open", &self.stream.is_some())
            .field("buffered", &self.buffer.len())
            .finish_non_exhaustive()
    }
}

impl<S> StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap an already-open stream. `label` names the peer in log output.
    pub fn new(stream: S, label: impl Into<String>) -> Self {
        Self {
            stream: Some(stream),
            buffer: Vec::new(),
            label: label.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    fn take_frame(&mut self, terminator: &[u8]) -> Option<Vec<u8>> {
        let pos = find_subsequence(&self.buffer, terminator)?;
        let frame = self.buffer[..pos].to_vec();
        self.buffer.drain(..pos + terminator.len());
        Some(frame)
    }
}

impl<S> Transport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or_else(CoolerError::not_open)?;
        stream.write_all(bytes).await?;
        stream.flush().await?;
        tracing::trace!("{} <- {:?}", self.label, String::from_utf8_lossy(bytes));
        Ok(())
    }

    async fn read_until(&mut self, terminator: &[u8], timeout: Duration) -> Result<ReadOutcome> {
        if terminator.is_empty() {
            return Err(CoolerError::InvalidArgument(
                "terminator must not be empty".into(),
            ));
        }
        if let Some(frame) = self.take_frame(terminator) {
            return Ok(ReadOutcome::Frame(frame));
        }

        let deadline = deadline_after(timeout);
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            let stream = self.stream.as_mut().ok_or_else(CoolerError::not_open)?;
            let n = match tokio::time::timeout_at(deadline, stream.read(&mut chunk)).await {
                Ok(read) => read?,
                Err(_) => {
                    let partial = std::mem::take(&mut self.buffer);
                    return Ok(ReadOutcome::TimedOut { partial });
                }
            };
            if n == 0 {
                return Err(peer_closed());
            }
            tracing::trace!(
                "{} -> {:?}",
                self.label,
                String::from_utf8_lossy(&chunk[..n])
            );
            self.buffer.extend_from_slice(&chunk[..n]);
            if let Some(frame) = self.take_frame(terminator) {
                return Ok(ReadOutcome::Frame(frame));
            }
        }
    }

    async fn discard_pending(&mut self) -> Result<usize> {
        let mut discarded = std::mem::take(&mut self.buffer).len();
        let stream = self.stream.as_mut().ok_or_else(CoolerError::not_open)?;
        let limit = deadline_after(DRAIN_LIMIT);
        let mut chunk = [0u8; READ_CHUNK];

        while Instant::now() < limit {
            match tokio::time::timeout(DRAIN_IDLE, stream.read(&mut chunk)).await {
                Ok(Ok(0)) => return Err(peer_closed()),
                Ok(Ok(n)) => discarded += n,
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => break,
            }
        }
        Ok(discarded)
    }

    async fn close(&mut self) -> Result<()> {
        self.buffer.clear();
        if let Some(mut stream) = self.stream.take() {
            stream.shutdown().await?;
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}

fn peer_closed() -> CoolerError {
    CoolerError::Io(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        "connection closed by peer",
    ))
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
