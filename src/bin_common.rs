use clap::Args;
use std::time::Duration;
use sunpower_rs::{ConType, ConnectionConfig, DEFAULT_BAUD_RATE};
use tracing_subscriber::EnvFilter;

/// Connection flags shared by the binaries
#[derive(Args, Debug)]
pub struct ConnectionArgs {
    /// Connection type: serial or tcp
    #[arg(short, long, default_value = "tcp", value_parser = parse_con_type)]
    pub con_type: ConType,

    /// Serial port path (e.g., /dev/ttyUSB0) or TCP host
    #[arg(short, long)]
    pub address: String,

    /// Baud rate for serial, port number for TCP
    #[arg(short, long)]
    pub baud_or_port: Option<u32>,

    /// Read timeout in seconds
    #[arg(short, long, default_value_t = 1.0)]
    pub timeout: f64,
}

impl ConnectionArgs {
    pub fn config(&self) -> Result<ConnectionConfig, Box<dyn std::error::Error>> {
        let baud_or_port = match (self.baud_or_port, self.con_type) {
            (Some(value), _) => value,
            (None, ConType::Serial) => DEFAULT_BAUD_RATE,
            (None, ConType::Tcp) => return Err("--baud-or-port is required for tcp".into()),
        };
        let timeout = Duration::try_from_secs_f64(self.timeout)
            .map_err(|e| format!("invalid --timeout {}: {}", self.timeout, e))?;
        Ok(
            ConnectionConfig::new(self.address.as_str(), baud_or_port, self.con_type)?
                .with_read_timeout(timeout),
        )
    }
}

fn parse_con_type(s: &str) -> Result<ConType, String> {
    s.parse().map_err(|e: sunpower_rs::CoolerError| e.to_string())
}

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();
}

#[allow(dead_code)]
pub fn format_reading(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(v) => format!("{v:.2} {unit}"),
        None => "no reply".to_string(),
    }
}
