//! TCP transport, for controllers behind a serial-to-Ethernet bridge.

use crate::error::{CoolerError, Result};
use crate::stream::StreamTransport;
use std::io;
use std::time::Duration;
use tokio::net::TcpStream;

/// Bound on establishing the TCP connection
pub const TCP_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

pub type TcpTransport = StreamTransport<TcpStream>;

/// Connect to `host:port`, giving up after [`TCP_CONNECT_TIMEOUT`].
pub async fn open(host: &str, port: u16) -> Result<TcpTransport> {
    let target = format!("{host}:{port}");
    let connection_error = |source: io::Error| CoolerError::Connection {
        target: format!("tcp://{target}"),
        source,
    };

    let stream = tokio::time::timeout(TCP_CONNECT_TIMEOUT, TcpStream::connect(target.as_str()))
        .await
        .map_err(|_| connection_error(io::Error::from(io::ErrorKind::TimedOut)))?
        .map_err(connection_error)?;
    // On failure the stream is dropped here, closing the socket.
    stream.set_nodelay(true).map_err(connection_error)?;

    tracing::info!("TCP connection opened: {}", target);
    Ok(StreamTransport::new(stream, target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ReadOutcome, Transport};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_open_and_exchange() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let device = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut command = [0u8; 3];
            socket.read_exact(&mut command).await.unwrap();
            assert_eq!(&command, b"TC\r");
            socket.write_all(b"TC\r\n77.25\r\n").await.unwrap();
        });

        let mut transport = open("127.0.0.1", port).await.unwrap();
        assert_eq!(transport.label(), format!("127.0.0.1:{port}"));
        transport.write(b"TC\r").await.unwrap();

        let timeout = Duration::from_secs(1);
        assert_eq!(
            transport.read_until(b"\n", timeout).await.unwrap(),
            ReadOutcome::Frame(b"TC\r".to_vec())
        );
        assert_eq!(
            transport.read_until(b"\n", timeout).await.unwrap(),
            ReadOutcome::Frame(b"77.25\r".to_vec())
        );
        device.await.unwrap();
    }

    #[tokio::test]
    async fn test_refused_is_connection_error() {
        // Grab a free port, then release it so nothing is listening.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let err = open("127.0.0.1", port).await.unwrap_err();
        assert!(matches!(err, CoolerError::Connection { .. }));
    }
}
