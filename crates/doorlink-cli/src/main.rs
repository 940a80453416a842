//! `doorlink` command-line tool.

mod frames;
mod monitor;
mod simulate;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "doorlink", version, about = "Door-controller bus tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a master against emulated nodes on an in-memory bus.
    Simulate(simulate::SimulateArgs),
    /// Talk to text-protocol nodes on a serial port.
    Monitor(monitor::MonitorArgs),
    /// Encode a message given as its text-protocol JSON payload.
    Encode(frames::EncodeArgs),
    /// Decode a binary frame (hex) or a text line.
    Decode(frames::DecodeArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Simulate(args) => simulate::run(args).await,
        Command::Monitor(args) => monitor::run(args).await,
        Command::Encode(args) => frames::encode(&args),
        Command::Decode(args) => frames::decode(&args),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
