use crate::config::check_timeout;
use crate::error::{CoolerError, Result};
use crate::serial::{self, SerialTransport};
use crate::tcp::{self, TcpTransport};
use crate::transport::{ReadOutcome, Transport};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Read timeout used when the caller does not pick one
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Kind of link to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConType {
    Serial,
    Tcp,
}

impl FromStr for ConType {
    type Err = CoolerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "serial" => Ok(ConType::Serial),
            "tcp" => Ok(ConType::Tcp),
            other => Err(CoolerError::InvalidArgument(format!(
                "connection type must be 'serial' or 'tcp', got '{other}'"
            ))),
        }
    }
}

impl fmt::Display for ConType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConType::Serial => write!(f, "serial"),
            ConType::Tcp => write!(f, "tcp"),
        }
    }
}

/// Where and how to reach the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionConfig {
    Serial {
        path: String,
        baud_rate: u32,
        read_timeout: Duration,
    },
    Tcp {
        host: String,
        port: u16,
        read_timeout: Duration,
    },
}

impl ConnectionConfig {
    /// Build a config from the `(address, baud_or_port, con_type)` triple.
    ///
    /// For serial links `address` is the device path and `baud_or_port` the
    /// baud rate; for TCP they are the host and port number.
    pub fn new(address: impl Into<String>, baud_or_port: u32, con_type: ConType) -> Result<Self> {
        let address = address.into();
        match con_type {
            ConType::Serial => Ok(Self::serial(address, baud_or_port)),
            ConType::Tcp => {
                let port = u16::try_from(baud_or_port).map_err(|_| {
                    CoolerError::InvalidArgument(format!("TCP port out of range: {baud_or_port}"))
                })?;
                Ok(Self::tcp(address, port))
            }
        }
    }

    pub fn serial(path: impl Into<String>, baud_rate: u32) -> Self {
        Self::Serial {
            path: path.into(),
            baud_rate,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        match &mut self {
            Self::Serial { read_timeout, .. } | Self::Tcp { read_timeout, .. } => {
                *read_timeout = timeout
            }
        }
        self
    }

    pub fn con_type(&self) -> ConType {
        match self {
            Self::Serial { .. } => ConType::Serial,
            Self::Tcp { .. } => ConType::Tcp,
        }
    }

    pub fn read_timeout(&self) -> Duration {
        match self {
            Self::Serial { read_timeout, .. } | Self::Tcp { read_timeout, .. } => *read_timeout,
        }
    }

    /// Check that the parameters are well formed, without touching any device.
    pub fn validate(&self) -> Result<()> {
        check_timeout("read timeout", self.read_timeout())?;
        match self {
            Self::Serial {
                path, baud_rate, ..
            } => {
                if path.trim().is_empty() {
                    return Err(CoolerError::InvalidArgument(
                        "serial port path is empty".into(),
                    ));
                }
                if *baud_rate == 0 {
                    return Err(CoolerError::InvalidArgument(
                        "baud rate must be greater than zero".into(),
                    ));
                }
            }
            Self::Tcp { host, port, .. } => {
                if host.trim().is_empty() {
                    return Err(CoolerError::InvalidArgument("TCP host is empty".into()));
                }
                if *port == 0 {
                    return Err(CoolerError::InvalidArgument(
                        "TCP port must be greater than zero".into(),
                    ));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial {
                path, baud_rate, ..
            } => write!(f, "serial://{path}@{baud_rate}"),
            Self::Tcp { host, port, .. } => write!(f, "tcp://{host}:{port}"),
        }
    }
}

/// An open link to the controller, serial or TCP.
#[derive(Debug)]
pub enum Connection {
    Serial(SerialTransport),
    Tcp(TcpTransport),
}

impl Connection {
    /// Validate `config` and open the matching transport.
    pub async fn open(config: &ConnectionConfig) -> Result<Self> {
        config.validate()?;
        match config {
            ConnectionConfig::Serial {
                path, baud_rate, ..
            } => serial::open(path, *baud_rate).map(Connection::Serial),
            ConnectionConfig::Tcp { host, port, .. } => {
                tcp::open(host, *port).await.map(Connection::Tcp)
            }
        }
    }

    pub fn con_type(&self) -> ConType {
        match self {
            Connection::Serial(_) => ConType::Serial,
            Connection::Tcp(_) => ConType::Tcp,
        }
    }
}

impl Transport for Connection {
    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        match self {
            Connection::Serial(t) => t.write(bytes).await,
            Connection::Tcp(t) => t.write(bytes).await,
        }
    }

    async fn read_until(&mut self, terminator: &[u8], timeout: Duration) -> Result<ReadOutcome> {
        match self {
            Connection::Serial(t) => t.read_until(terminator, timeout).await,
            Connection::Tcp(t) => t.read_until(terminator, timeout).await,
        }
    }

    async fn discard_pending(&mut self) -> Result<usize> {
        match self {
            Connection::Serial(t) => t.discard_pending().await,
            Connection::Tcp(t) => t.discard_pending().await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            Connection::Serial(t) => t.close().await,
            Connection::Tcp(t) => t.close().await,
        }
    }

    fn is_open(&self) -> bool {
        match self {
            Connection::Serial(t) => t.is_open(),
            Connection::Tcp(t) => t.is_open(),
        }
    }
}

impl From<SerialTransport> for Connection {
    fn from(t: SerialTransport) -> Self {
        Connection::Serial(t)
    }
}

impl From<TcpTransport> for Connection {
    fn from(t: TcpTransport) -> Self {
        Connection::Tcp(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_con_type_parse() {
        assert_eq!("serial".parse::<ConType>().unwrap(), ConType::Serial);
        assert_eq!(" TCP ".parse::<ConType>().unwrap(), ConType::Tcp);
        assert!(matches!(
            "usb".parse::<ConType>(),
            Err(CoolerError::InvalidArgument(_))
        ));
        assert_eq!(ConType::Tcp.to_string(), "tcp");
    }

    #[test]
    fn test_config_from_triple() {
        let config = ConnectionConfig::new("/dev/ttyUSB0", 4800, ConType::Serial).unwrap();
        assert_eq!(config, ConnectionConfig::serial("/dev/ttyUSB0", 4800));
        assert_eq!(config.read_timeout(), DEFAULT_READ_TIMEOUT);

        let config = ConnectionConfig::new("10.0.0.5", 7000, ConType::Tcp).unwrap();
        assert_eq!(config.con_type(), ConType::Tcp);
        assert_eq!(config.to_string(), "tcp://10.0.0.5:7000");

        assert!(matches!(
            ConnectionConfig::new("10.0.0.5", 70_000, ConType::Tcp),
            Err(CoolerError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_validate() {
        assert!(ConnectionConfig::serial("/dev/ttyS0", 4800).validate().is_ok());
        assert!(ConnectionConfig::serial("", 4800).validate().is_err());
        assert!(ConnectionConfig::serial("/dev/ttyS0", 0).validate().is_err());
        assert!(ConnectionConfig::tcp("", 7000).validate().is_err());
        assert!(ConnectionConfig::tcp("10.0.0.5", 0).validate().is_err());
        assert!(
            ConnectionConfig::tcp("10.0.0.5", 7000)
                .with_read_timeout(Duration::ZERO)
                .validate()
                .is_err()
        );
        assert!(matches!(
            ConnectionConfig::tcp("10.0.0.5", 7000)
                .with_read_timeout(Duration::from_secs_f64(1e12))
                .validate(),
            Err(CoolerError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_with_read_timeout() {
        let config =
            ConnectionConfig::tcp("cooler.lab", 7000).with_read_timeout(Duration::from_millis(1500));
        assert_eq!(config.read_timeout(), Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn test_open_rejects_invalid_config_without_io() {
        let err = Connection::open(&ConnectionConfig::tcp("", 7000))
            .await
            .unwrap_err();
        assert!(matches!(err, CoolerError::InvalidArgument(_)));
    }
}
