#[path = "../bin_common.rs"]
mod common;

use clap::{Parser, Subcommand};
use common::{ConnectionArgs, format_reading, init_tracing};
use sunpower_rs::{CoolerOptions, Cryocooler, Item};

#[derive(Parser)]
#[command(name = "sunpower-query")]
#[command(about = "Query or command a Sunpower cryocooler over serial or TCP")]
struct Args {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Operation,
}

#[derive(Subcommand)]
enum Operation {
    /// Print the multi-line status dump
    Status,
    /// Print the last controller error
    Error,
    /// Print the firmware version
    Version,
    /// Read one telemetry item (cold_head_temp, reject_temp, target_temp,
    /// measured_power, commanded_power, current_commanded_power)
    Get {
        #[arg(value_parser = parse_item)]
        item: Item,
    },
    /// Set the target temperature in kelvin
    SetTargetTemp { kelvin: f64 },
    /// Set the commanded power in watts
    SetCommandedPower { watts: f64 },
    /// Turn the cooler on
    On,
    /// Turn the cooler off
    Off,
}

fn parse_item(s: &str) -> Result<Item, String> {
    s.parse().map_err(|e: sunpower_rs::CoolerError| e.to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let args = Args::parse();
    let config = args.connection.config()?;

    tracing::info!("Connecting to {}...", config);
    let mut cooler: Cryocooler = Cryocooler::open(&config, CoolerOptions::default()).await?;

    let result = run(&mut cooler, args.command).await;
    cooler.close().await?;
    result
}

async fn run(
    cooler: &mut Cryocooler,
    operation: Operation,
) -> Result<(), Box<dyn std::error::Error>> {
    match operation {
        Operation::Status => match cooler.status().await? {
            Some(lines) => {
                for line in lines {
                    println!("{line}");
                }
            }
            None => println!("no reply"),
        },
        Operation::Error => println!("{}", cooler.error().await?.as_deref().unwrap_or("no reply")),
        Operation::Version => {
            println!("{}", cooler.version().await?.as_deref().unwrap_or("no reply"))
        }
        Operation::Get { item } => {
            let value = cooler.read_item(item).await?;
            println!("{}: {}", item, format_reading(value, item.unit()));
        }
        Operation::SetTargetTemp { kelvin } => {
            let accepted = cooler.set_target_temp(kelvin).await?;
            println!("target_temp: {}", format_reading(accepted, "K"));
        }
        Operation::SetCommandedPower { watts } => {
            let accepted = cooler.set_commanded_power(watts).await?;
            println!("commanded_power: {}", format_reading(accepted, "W"));
        }
        Operation::On => print_cooler_state(cooler.turn_on().await?),
        Operation::Off => print_cooler_state(cooler.turn_off().await?),
    }
    Ok(())
}

fn print_cooler_state(state: Option<bool>) {
    match state {
        Some(true) => println!("cooler: ON"),
        Some(false) => println!("cooler: OFF"),
        None => println!("cooler: no reply"),
    }
}
