use crate::error::Result;
use std::future::Future;
use std::time::Duration;

/// Result of waiting for one terminated frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Bytes up to, but not including, the terminator. May be empty when the
    /// device sent a bare terminator.
    Frame(Vec<u8>),
    /// The timeout elapsed before a terminator arrived. `partial` holds what
    /// was accumulated and is empty when the device stayed silent.
    TimedOut { partial: Vec<u8> },
}

impl ReadOutcome {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ReadOutcome::TimedOut { .. })
    }
}

/// Byte-stream transport shared by the serial and TCP links.
///
/// Implementations handle the physical layer; the codec handles the ASCII
/// framing of commands and replies.
pub trait Transport {
    /// Write the whole byte sequence.
    fn write(&mut self, bytes: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Read until `terminator` is seen or `timeout` elapses.
    ///
    /// Bytes following the terminator are kept for the next call.
    fn read_until(
        &mut self,
        terminator: &[u8],
        timeout: Duration,
    ) -> impl Future<Output = Result<ReadOutcome>> + Send;

    /// Drop any buffered or already-queued input. Returns the number of
    /// bytes thrown away.
    fn discard_pending(&mut self) -> impl Future<Output = Result<usize>> + Send;

    /// Release the underlying handle. Calling it again is a no-op.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;

    fn is_open(&self) -> bool;
}
