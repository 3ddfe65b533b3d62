#[path = "../bin_common.rs"]
mod common;

use clap::Parser;
use common::{ConnectionArgs, format_reading, init_tracing};
use std::time::Duration;
use sunpower_rs::{CoolerOptions, CoolerSnapshot, Cryocooler, Item, query_snapshot};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "sunpower-monitor")]
#[command(about = "Periodically log Sunpower cryocooler temperatures and power")]
struct Args {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Polling interval in seconds (minimum 1)
    #[arg(long, default_value_t = 5)]
    poll_interval: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args = Args::parse();
    let poll_interval = Duration::from_secs(args.poll_interval.max(1));
    let config = args.connection.config()?;

    let cancel = CancellationToken::new();

    let cancel_signal = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Received shutdown signal");
        cancel_signal.cancel();
    });

    tracing::info!("Connecting to {}...", config);
    let mut cooler: Cryocooler = Cryocooler::open(&config, CoolerOptions::default()).await?;

    match cooler.version().await? {
        Some(version) => tracing::info!("Controller firmware: {}", version),
        None => tracing::warn!("Controller did not report a firmware version"),
    }

    let result = run_poller(&mut cooler, poll_interval, cancel).await;
    cooler.close().await?;

    tracing::info!("Shutdown complete");
    result
}

async fn run_poller(
    cooler: &mut Cryocooler,
    poll_interval: Duration,
    cancel: CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut interval = tokio::time::interval(poll_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = cancel.cancelled() => {
                tracing::info!("Poller stopping");
                return Ok(());
            }
        }

        tracing::debug!("Polling cryocooler...");
        match query_snapshot(cooler).await {
            Ok(snapshot) => log_snapshot(&snapshot),
            Err(e) if e.is_reconnect_required() => {
                tracing::error!("Connection lost: {}", e);
                return Err(e.into());
            }
            Err(e) => tracing::warn!("Failed to read cryocooler: {}", e),
        }
    }
}

fn log_snapshot(snapshot: &CoolerSnapshot) {
    if snapshot.answered() == 0 {
        tracing::warn!("Cryocooler did not answer any request");
        return;
    }
    let readings: Vec<String> = Item::ALL
        .iter()
        .map(|item| format!("{}={}", item, format_reading(snapshot.get(*item), item.unit())))
        .collect();
    tracing::info!(
        "{} {}",
        snapshot.timestamp.format("%Y-%m-%dT%H:%M:%SZ"),
        readings.join(" ")
    );
}
