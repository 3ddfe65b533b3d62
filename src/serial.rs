//! Serial/RS-232 transport for the cryocooler controller.
//!
//! Opens the port with `tokio-serial` and hands the stream to
//! [`StreamTransport`] for line framing.

use crate::error::{CoolerError, Result};
use crate::stream::StreamTransport;
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};

/// Default baud rate of the controller's serial port
pub const DEFAULT_BAUD_RATE: u32 = 4800;

/// Serial transport: 8 data bits, no parity, one stop bit, no flow control.
///
/// # Example
///
/// ```ignore
/// use sunpower_rs::{SerialTransport, Transport};
///
/// let mut transport = sunpower_rs::serial::open("/dev/ttyUSB0", 4800)?;
/// transport.write(b"TC\r").await?;
/// ```
pub type SerialTransport = StreamTransport<SerialStream>;

/// Open a serial transport.
///
/// # Arguments
/// * `path` - Serial port path (e.g., "/dev/ttyUSB0" or "COM3")
/// * `baud_rate` - Baud rate (4800 unless the controller was reconfigured)
pub fn open(path: &str, baud_rate: u32) -> Result<SerialTransport> {
    let port = tokio_serial::new(path, baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .open_native_async()
        .map_err(|e| CoolerError::Connection {
            target: format!("serial://{path}"),
            source: std::io::Error::from(e),
        })?;

    tracing::info!("Serial connection opened: {} at {} baud", path, baud_rate);
    Ok(StreamTransport::new(port, path))
}

/// Open a serial transport at [`DEFAULT_BAUD_RATE`].
pub fn open_default(path: &str) -> Result<SerialTransport> {
    open(path, DEFAULT_BAUD_RATE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_device_is_connection_error() {
        let err = open("/dev/does-not-exist-cryocooler", DEFAULT_BAUD_RATE).unwrap_err();
        match err {
            CoolerError::Connection { target, source } => {
                assert_eq!(target, "serial:///dev/does-not-exist-cryocooler");
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
