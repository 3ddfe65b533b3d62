pub mod codec;
pub mod config;
pub mod connection;
pub mod cooler;
pub mod device;
pub mod error;
pub mod query;
pub mod serial;
pub mod stream;
pub mod tcp;
pub mod transport;

pub use codec::{Command, Scalar};
pub use config::CoolerOptions;
pub use connection::{ConType, Connection, ConnectionConfig, DEFAULT_READ_TIMEOUT};
pub use cooler::Cryocooler;
pub use device::{CoolerCommand, Item, Limits};
pub use error::{CoolerError, Result};
pub use query::{CoolerSnapshot, query_snapshot};
pub use serial::{DEFAULT_BAUD_RATE, SerialTransport};
pub use stream::StreamTransport;
pub use tcp::TcpTransport;
pub use transport::{ReadOutcome, Transport};
