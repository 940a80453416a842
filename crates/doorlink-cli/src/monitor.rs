//! `monitor`: operator console for text-protocol nodes on a serial port.
//!
//! Node traffic is printed as it arrives. Commands are read from stdin, one
//! per line:
//!
//! ```text
//! grant <hub> <reader>
//! deny <hub> <reader>
//! identify <hub>
//! addr <hub> <new_addr> [uid]
//! status
//! ```

use anyhow::{Context, Result, bail};
use clap::Args;
use doorlink_core::NodeUid;
use doorlink_master::SerialMonitor;
use std::collections::HashSet;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::time::{MissedTickBehavior, interval};
use tokio_serial::SerialPortBuilderExt;
use tracing::{info, warn};

#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// Serial device, e.g. /dev/ttyUSB0 or COM3.
    port: String,

    #[arg(long, default_value_t = 115_200)]
    baud: u32,

    /// Warn about hubs silent for longer than this many seconds.
    #[arg(long, default_value_t = 45)]
    stale_after: u64,
}

/// A line typed by the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
enum OperatorCommand {
    Grant { hub: u8, reader: u8 },
    Deny { hub: u8, reader: u8 },
    Identify { hub: u8 },
    SetAddress { hub: u8, new_addr: u8, uid: Option<NodeUid> },
    Status,
}

fn number(word: Option<&str>, what: &str) -> Result<u8> {
    let word = word.with_context(|| format!("missing {what}"))?;
    word.parse()
        .with_context(|| format!("{what} must be 0-255, got '{word}'"))
}

fn parse_command(line: &str) -> Result<Option<OperatorCommand>> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "grant" => OperatorCommand::Grant {
            hub: number(words.next(), "hub")?,
            reader: number(words.next(), "reader")?,
        },
        "deny" => OperatorCommand::Deny {
            hub: number(words.next(), "hub")?,
            reader: number(words.next(), "reader")?,
        },
        "identify" => OperatorCommand::Identify {
            hub: number(words.next(), "hub")?,
        },
        "addr" => OperatorCommand::SetAddress {
            hub: number(words.next(), "hub")?,
            new_addr: number(words.next(), "new address")?,
            uid: words.next().map(NodeUid::new).transpose()?,
        },
        "status" => OperatorCommand::Status,
        other => bail!("unknown command '{other}'"),
    };

    if words.next().is_some() {
        bail!("too many arguments");
    }
    Ok(Some(command))
}

async fn execute<T>(monitor: &mut SerialMonitor<T>, command: OperatorCommand) -> Result<()>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    match command {
        OperatorCommand::Grant { hub, reader } => monitor.grant(hub, reader).await?,
        OperatorCommand::Deny { hub, reader } => monitor.deny(hub, reader).await?,
        OperatorCommand::Identify { hub } => monitor.identify(hub).await?,
        OperatorCommand::SetAddress { hub, new_addr, uid } => {
            monitor.set_address(hub, new_addr, uid).await?;
        }
        OperatorCommand::Status => {
            for hub in monitor.hubs() {
                let uid = hub.uid.as_ref().map_or("?", NodeUid::as_str);
                println!(
                    "hub {:>3}  uid {:<16} messages {:<6} last seen {}",
                    hub.hub_addr,
                    uid,
                    hub.messages,
                    hub.last_seen_at.format("%H:%M:%S")
                );
            }
        }
    }
    Ok(())
}

pub async fn run(args: MonitorArgs) -> Result<()> {
    let port = tokio_serial::new(&args.port, args.baud)
        .open_native_async()
        .with_context(|| format!("opening serial port {}", args.port))?;
    info!(port = %args.port, baud = args.baud, "serial link open");

    let mut monitor = SerialMonitor::new(port);
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let stale_after = Duration::from_secs(args.stale_after);
    let mut stale_check = interval(Duration::from_secs(5));
    stale_check.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut reported_stale = HashSet::new();

    loop {
        tokio::select! {
            envelope = monitor.next_envelope() => match envelope? {
                Some(envelope) => println!("{envelope}"),
                None => {
                    info!("serial link closed");
                    break;
                }
            },
            line = stdin.next_line() => {
                let Some(line) = line? else { break };
                match parse_command(&line) {
                    Ok(Some(command)) => {
                        if let Err(e) = execute(&mut monitor, command).await {
                            warn!(error = %e, "command failed");
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!(error = %e, "cannot parse command"),
                }
            }
            _ = stale_check.tick() => {
                let stale: HashSet<u8> = monitor.stale_hubs(stale_after).into_iter().collect();
                for hub in stale.difference(&reported_stale) {
                    warn!(hub = *hub, silent_secs = args.stale_after, "hub went silent");
                }
                reported_stale = stale;
            }
            result = tokio::signal::ctrl_c() => {
                result.context("waiting for Ctrl+C")?;
                break;
            }
        }
    }
    Ok(())
}
