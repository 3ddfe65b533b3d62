use std::io;

/// Errors surfaced by the cryocooler driver.
///
/// A reply that simply did not arrive in time is not an error: command
/// methods report it as `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum CoolerError {
    /// Opening the serial port or TCP socket failed.
    #[error("Failed to establish connection to {target}: {source}")]
    Connection {
        target: String,
        #[source]
        source: io::Error,
    },

    /// A command was issued before `connect`/`attach`, or after `close`.
    #[error("Device is not connected")]
    NotConnected,

    /// The underlying stream broke while writing or reading.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A caller-supplied value was rejected before any I/O.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The reply did not match the shape the operation expects.
    #[error("Failed to decode reply: {0}")]
    Decode(String),
}

impl CoolerError {
    /// Whether the caller should close and reopen the connection before retrying.
    pub fn is_reconnect_required(&self) -> bool {
        matches!(self, CoolerError::Io(_) | CoolerError::Connection { .. })
    }

    pub(crate) fn not_open() -> Self {
        CoolerError::Io(io::Error::new(
            io::ErrorKind::NotConnected,
            "transport has been closed",
        ))
    }
}

pub type Result<T> = std::result::Result<T, CoolerError>;
