//! Command façade for the cryocooler controller.
//!
//! Every operation is one request/response round trip: validate the
//! argument, discard stale input, write the command, read the reply lines
//! within the read timeout, decode. Nothing is retried.
//!
//! A reply that does not arrive in time comes back as `Ok(None)` and leaves
//! the connection open. Errors are reserved for a missing connection, bad
//! arguments, undecodable replies and broken I/O.

use crate::codec::{self, Command, REPLY_TERMINATOR, Scalar};
use crate::config::CoolerOptions;
use crate::connection::{Connection, ConnectionConfig};
use crate::device::{CURRENT_COMMANDED_POWER_LINE, CoolerCommand, Item, ReplyShape};
use crate::error::{CoolerError, Result};
use crate::stream::deadline_after;
use crate::transport::{ReadOutcome, Transport};
use std::time::Duration;
use tokio::time::Instant;

/// A Sunpower cryocooler controller.
///
/// Owns at most one transport. Methods take `&mut self`, so requests never
/// overlap; share a `Cryocooler` between tasks behind a mutex.
///
/// # Example
///
/// ```ignore
/// use sunpower_rs::{ConType, ConnectionConfig, CoolerOptions, Cryocooler};
///
/// let config = ConnectionConfig::new("192.168.1.50", 7000, ConType::Tcp)?;
/// let mut cooler = Cryocooler::open(&config, CoolerOptions::default()).await?;
/// if let Some(kelvin) = cooler.cold_head_temp().await? {
///     println!("Cold head: {kelvin:.2} K");
/// }
/// cooler.close().await?;
/// ```
pub struct Cryocooler<T = Connection> {
    transport: Option<T>,
    options: CoolerOptions,
}

impl<T> std::fmt::Debug for Cryocooler<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cryocooler")
            .field("connected", &self.transport.is_some())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<T> Default for Cryocooler<T> {
    fn default() -> Self {
        Self::new(CoolerOptions::default())
    }
}

impl<T> Cryocooler<T> {
    /// Create a disconnected cryocooler.
    pub fn new(options: CoolerOptions) -> Self {
        Self {
            transport: None,
            options,
        }
    }

    pub fn options(&self) -> &CoolerOptions {
        &self.options
    }

    /// The transport, while connected.
    pub fn transport(&self) -> Option<&T> {
        self.transport.as_ref()
    }
}

impl Cryocooler<Connection> {
    /// Create a cryocooler and connect it in one step.
    pub async fn open(config: &ConnectionConfig, options: CoolerOptions) -> Result<Self> {
        let mut cooler = Self::new(options);
        cooler.connect(config).await?;
        Ok(cooler)
    }

    /// Open the serial or TCP link described by `config`.
    ///
    /// Any previous connection is closed first. On failure the cryocooler is
    /// left disconnected.
    pub async fn connect(&mut self, config: &ConnectionConfig) -> Result<()> {
        if self.transport.is_some() {
            tracing::warn!("Already connected; closing previous connection");
            if let Err(e) = self.close().await {
                tracing::warn!("Error closing previous connection: {}", e);
            }
        }

        match Connection::open(config).await {
            Ok(connection) => {
                self.options.read_timeout = config.read_timeout();
                self.transport = Some(connection);
                tracing::info!("Connected to {}", config);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to establish connection to {}: {}", config, e);
                Err(e)
            }
        }
    }
}

impl<T: Transport> Cryocooler<T> {
    /// Create a cryocooler around an already-open transport.
    pub fn with_transport(transport: T, options: CoolerOptions) -> Self {
        Self {
            transport: Some(transport),
            options,
        }
    }

    /// Adopt an already-open transport, closing any previous one.
    ///
    /// The new transport is installed even when closing the old one fails;
    /// that failure is still returned.
    pub async fn attach(&mut self, transport: T) -> Result<()> {
        let previous = self.transport.replace(transport);
        if let Some(mut previous) = previous {
            previous
                .close()
                .await
                .inspect_err(|e| tracing::warn!("Error closing previous connection: {}", e))?;
        }
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.transport.as_ref().is_some_and(Transport::is_open)
    }

    /// Close the connection. Always leaves the cryocooler disconnected;
    /// closing twice is harmless.
    pub async fn close(&mut self) -> Result<()> {
        let Some(mut transport) = self.transport.take() else {
            tracing::warn!("Already disconnected from device");
            return Ok(());
        };
        transport
            .close()
            .await
            .inspect_err(|e| tracing::warn!("Failed to close connection cleanly: {}", e))?;
        tracing::info!("Disconnected from device");
        Ok(())
    }

    pub async fn disconnect(&mut self) -> Result<()> {
        self.close().await
    }

    /// Multi-line status dump
    pub async fn status(&mut self) -> Result<Option<Vec<String>>> {
        self.exchange(&CoolerCommand::Status).await
    }

    /// Last error reported by the controller
    pub async fn error(&mut self) -> Result<Option<String>> {
        self.text(CoolerCommand::Error).await
    }

    /// Firmware version
    pub async fn version(&mut self) -> Result<Option<String>> {
        self.text(CoolerCommand::Version).await
    }

    /// Cold head temperature in kelvin
    pub async fn cold_head_temp(&mut self) -> Result<Option<f64>> {
        self.number(CoolerCommand::ColdHeadTemp).await
    }

    /// Reject (heat sink) temperature in degrees Celsius
    pub async fn reject_temp(&mut self) -> Result<Option<f64>> {
        self.number(CoolerCommand::RejectTemp).await
    }

    /// Target temperature in kelvin
    pub async fn target_temp(&mut self) -> Result<Option<f64>> {
        self.number(CoolerCommand::TargetTemp).await
    }

    /// Set the target temperature in kelvin. Returns the value the
    /// controller accepted.
    pub async fn set_target_temp(&mut self, kelvin: f64) -> Result<Option<f64>> {
        self.number(CoolerCommand::SetTargetTemp(kelvin)).await
    }

    /// Measured input power in watts
    pub async fn measured_power(&mut self) -> Result<Option<f64>> {
        self.number(CoolerCommand::MeasuredPower).await
    }

    /// Commanded power in watts
    pub async fn commanded_power(&mut self) -> Result<Option<f64>> {
        self.number(CoolerCommand::CommandedPower).await
    }

    /// Set the commanded power in watts. Returns the value the controller
    /// accepted.
    pub async fn set_commanded_power(&mut self, watts: f64) -> Result<Option<f64>> {
        self.number(CoolerCommand::SetCommandedPower(watts)).await
    }

    /// Commanded power currently applied, from the power limits block
    pub async fn current_commanded_power(&mut self) -> Result<Option<f64>> {
        let Some(lines) = self.exchange(&CoolerCommand::PowerLimits).await? else {
            return Ok(None);
        };
        let line = lines.get(CURRENT_COMMANDED_POWER_LINE).ok_or_else(|| {
            CoolerError::Decode(format!(
                "power limits reply has {} lines, expected at least {}",
                lines.len(),
                CURRENT_COMMANDED_POWER_LINE + 1
            ))
        })?;
        expect_number(
            &CoolerCommand::PowerLimits,
            codec::decode_scalar(line.as_bytes())?,
        )
    }

    pub async fn turn_on(&mut self) -> Result<Option<bool>> {
        self.flag(CoolerCommand::CoolerOn).await
    }

    pub async fn turn_off(&mut self) -> Result<Option<bool>> {
        self.flag(CoolerCommand::CoolerOff).await
    }

    /// Read a telemetry item by name
    pub async fn read_item(&mut self, item: Item) -> Result<Option<f64>> {
        match item {
            Item::ColdHeadTemp => self.cold_head_temp().await,
            Item::RejectTemp => self.reject_temp().await,
            Item::TargetTemp => self.target_temp().await,
            Item::MeasuredPower => self.measured_power().await,
            Item::CommandedPower => self.commanded_power().await,
            Item::CurrentCommandedPower => self.current_commanded_power().await,
        }
    }

    async fn text(&mut self, command: CoolerCommand) -> Result<Option<String>> {
        match self.exchange(&command).await? {
            Some(lines) => match lines.first() {
                Some(line) => codec::decode_text(line.as_bytes()),
                None => Ok(None),
            },
            None => Ok(None),
        }
    }

    async fn scalar(&mut self, command: &CoolerCommand) -> Result<Option<Scalar>> {
        match self.exchange(command).await? {
            Some(lines) => match lines.first() {
                Some(line) => codec::decode_scalar(line.as_bytes()),
                None => Ok(None),
            },
            None => Ok(None),
        }
    }

    async fn number(&mut self, command: CoolerCommand) -> Result<Option<f64>> {
        let scalar = self.scalar(&command).await?;
        expect_number(&command, scalar)
    }

    async fn flag(&mut self, command: CoolerCommand) -> Result<Option<bool>> {
        match self.scalar(&command).await? {
            None => Ok(None),
            Some(scalar) => scalar.as_bool().map(Some).ok_or_else(|| {
                CoolerError::Decode(format!(
                    "expected ON/OFF in reply to {}, got '{}'",
                    command.command(),
                    scalar
                ))
            }),
        }
    }

    /// One round trip. `Ok(None)` when the controller did not answer in time.
    async fn exchange(&mut self, command: &CoolerCommand) -> Result<Option<Vec<String>>> {
        let transport = self.transport.as_mut().ok_or_else(|| {
            tracing::error!("Device is not connected");
            CoolerError::NotConnected
        })?;
        self.options.validate()?;
        command.validate(&self.options.limits)?;
        let wire = command.command();

        let discarded = transport.discard_pending().await?;
        if discarded > 0 {
            tracing::warn!("Discarded {} stale bytes before {}", discarded, wire);
        }

        tracing::debug!("Sending command: {}", wire);
        transport.write(&codec::encode(&wire)).await?;

        let reply = read_reply(
            transport,
            &wire,
            command.reply_shape(),
            self.options.read_timeout,
            self.options.line_gap,
        )
        .await?;

        match &reply {
            Some(lines) => tracing::debug!("Reply to {}: {:?}", wire, lines),
            None => tracing::debug!(
                "No reply to {} within {:?}",
                wire,
                self.options.read_timeout
            ),
        }
        Ok(reply)
    }
}

/// Collect the reply lines that follow the command echo.
///
/// Scalar replies stop at the first value line. Multi-line replies keep
/// reading until the stream is quiet for `line_gap` or `timeout` runs out.
async fn read_reply<T: Transport>(
    transport: &mut T,
    command: &Command,
    shape: ReplyShape,
    timeout: Duration,
    line_gap: Duration,
) -> Result<Option<Vec<String>>> {
    let deadline = deadline_after(timeout);
    let mut raw = Vec::new();
    let mut have_line = false;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let wait = if have_line {
            remaining.min(line_gap)
        } else {
            remaining
        };
        if wait.is_zero() {
            break;
        }

        match transport.read_until(REPLY_TERMINATOR, wait).await? {
            ReadOutcome::Frame(frame) => {
                let text = String::from_utf8_lossy(&frame);
                if codec::is_echo(&text, command) || (!have_line && text.trim().is_empty()) {
                    continue;
                }
                raw.extend_from_slice(&frame);
                raw.push(b'\n');
                have_line = true;
                if shape == ReplyShape::Scalar {
                    break;
                }
            }
            ReadOutcome::TimedOut { partial } => {
                if !partial.is_empty() {
                    tracing::debug!(
                        "Dropping {} bytes of unterminated reply to {}",
                        partial.len(),
                        command
                    );
                }
                break;
            }
        }
    }

    if !have_line {
        return Ok(None);
    }
    codec::decode_lines(&raw).map(Some)
}

fn expect_number(command: &CoolerCommand, scalar: Option<Scalar>) -> Result<Option<f64>> {
    match scalar {
        None => Ok(None),
        Some(Scalar::Number(value)) => Ok(Some(value)),
        Some(other) => Err(CoolerError::Decode(format!(
            "expected a number in reply to {}, got '{}'",
            command.command(),
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::StreamTransport;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, duplex};

    fn options() -> CoolerOptions {
        CoolerOptions::builder()
            .read_timeout(Duration::from_millis(300))
            .line_gap(Duration::from_millis(50))
            .build()
            .unwrap()
    }

    fn cooler() -> (Cryocooler<StreamTransport<DuplexStream>>, DuplexStream) {
        let (ours, device) = duplex(1024);
        let transport = StreamTransport::new(ours, "duplex");
        (Cryocooler::with_transport(transport, options()), device)
    }

    /// Answer one command the way the controller does: echo, then `reply`.
    async fn answer(device: &mut DuplexStream, expected: &str, reply: &str) {
        let mut buf = vec![0u8; expected.len() + 1];
        device.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, format!("{expected}\r").into_bytes());
        device
            .write_all(format!("{expected}\r\n{reply}").as_bytes())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_scalar_reply_after_echo() {
        let (mut cooler, mut device) = cooler();
        let device_task = tokio::spawn(async move {
            answer(&mut device, "TC", "77.25\r\n").await;
            device
        });

        assert_eq!(cooler.cold_head_temp().await.unwrap(), Some(77.25));
        device_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_status_collects_all_lines() {
        let (mut cooler, mut device) = cooler();
        let device_task = tokio::spawn(async move {
            answer(&mut device, "STATUS", "MODE = 2.00\r\nTSTATM = 0.00\r\nSSTOPM = 0.00\r\n")
                .await;
            device
        });

        let status = cooler.status().await.unwrap().unwrap();
        assert_eq!(status, vec!["MODE = 2.00", "TSTATM = 0.00", "SSTOPM = 0.00"]);
        device_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_current_commanded_power_is_third_value() {
        let (mut cooler, mut device) = cooler();
        let device_task = tokio::spawn(async move {
            answer(&mut device, "E", "240.00\r\n70.00\r\n150.00\r\n").await;
            device
        });

        assert_eq!(cooler.current_commanded_power().await.unwrap(), Some(150.0));
        device_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_short_power_block_is_decode_error() {
        let (mut cooler, mut device) = cooler();
        let device_task = tokio::spawn(async move {
            answer(&mut device, "E", "240.00\r\n").await;
            device
        });

        assert!(matches!(
            cooler.current_commanded_power().await,
            Err(CoolerError::Decode(_))
        ));
        device_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_turn_on_reports_state() {
        let (mut cooler, mut device) = cooler();
        let device_task = tokio::spawn(async move {
            answer(&mut device, "COOLER=ON", "ON\r\n").await;
            device
        });

        assert_eq!(cooler.turn_on().await.unwrap(), Some(true));
        device_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_version_keeps_text() {
        let (mut cooler, mut device) = cooler();
        let device_task = tokio::spawn(async move {
            answer(&mut device, "VERSION", "2.10\r\n").await;
            device
        });

        assert_eq!(cooler.version().await.unwrap(), Some("2.10".to_string()));
        device_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_text_for_numeric_reading_is_decode_error() {
        let (mut cooler, mut device) = cooler();
        let device_task = tokio::spawn(async move {
            answer(&mut device, "P", "overload\r\n").await;
            device
        });

        assert!(matches!(
            cooler.measured_power().await,
            Err(CoolerError::Decode(_))
        ));
        device_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_stale_bytes_discarded_before_next_command() {
        let (mut cooler, mut device) = cooler();

        // Late tail of an earlier reply is already waiting on the line.
        device.write_all(b"999.00\r\n").await.unwrap();
        let device_task = tokio::spawn(async move {
            answer(&mut device, "TTARGET", "80.00\r\n").await;
            device
        });

        assert_eq!(cooler.target_temp().await.unwrap(), Some(80.0));
        device_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_longest_read_timeout_answers() {
        let (ours, mut device) = duplex(1024);
        let options = CoolerOptions::builder()
            .read_timeout(crate::config::MAX_TIMEOUT)
            .line_gap(Duration::from_millis(50))
            .build()
            .unwrap();
        let mut cooler = Cryocooler::with_transport(StreamTransport::new(ours, "duplex"), options);
        let device_task = tokio::spawn(async move {
            answer(&mut device, "TC", "77.00\r\n").await;
            device
        });

        assert_eq!(cooler.cold_head_temp().await.unwrap(), Some(77.0));
        device_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_unbounded_read_timeout_rejected_without_io() {
        let (ours, mut device) = duplex(1024);
        let mut options = options();
        options.read_timeout = Duration::MAX;
        let mut cooler = Cryocooler::with_transport(StreamTransport::new(ours, "duplex"), options);

        assert!(matches!(
            cooler.cold_head_temp().await,
            Err(CoolerError::InvalidArgument(_))
        ));
        drop(cooler);
        let mut sent = Vec::new();
        device.read_to_end(&mut sent).await.unwrap();
        assert!(sent.is_empty());
    }

    #[tokio::test]
    async fn test_zero_line_gap_rejected_before_status() {
        let (ours, mut device) = duplex(1024);
        let mut options = options();
        options.line_gap = Duration::ZERO;
        let mut cooler = Cryocooler::with_transport(StreamTransport::new(ours, "duplex"), options);
        device.write_all(b"STATUS\r\nOK\r\nREADY\r\n").await.unwrap();

        assert!(matches!(
            cooler.status().await,
            Err(CoolerError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_peer_gone_is_io_error() {
        let (mut cooler, device) = cooler();
        drop(device);
        let err = cooler.reject_temp().await.unwrap_err();
        assert!(err.is_reconnect_required());
    }
}
