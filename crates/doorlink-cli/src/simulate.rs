//! `simulate`: a master and emulated nodes on an in-memory bus.

use anyhow::{Context, Result, ensure};
use clap::Args;
use doorlink_core::NodeUid;
use doorlink_emulator::{NodeControls, Simulation, simulation::DEFAULT_READERS};
use doorlink_master::{GrantAll, MasterConfig, MasterEvent, SlaveConfig};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{info, warn};

/// First address handed out to generated nodes.
const FIRST_DEMO_ADDRESS: u8 = 0x10;

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Master configuration; without it a demo site is generated.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of nodes in the generated demo site.
    #[arg(long, default_value_t = 2)]
    nodes: u8,

    /// Stop after this many seconds.
    #[arg(long, default_value_t = 60)]
    duration: u64,

    /// Present a card somewhere every this many seconds (0 = never).
    #[arg(long, default_value_t = 10)]
    swipe_every: u64,
}

pub async fn run(args: SimulateArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => MasterConfig::load(path)
            .with_context(|| format!("loading master configuration {}", path.display()))?,
        None => demo_config(args.nodes)?,
    };

    let sim = Simulation::start(config, DEFAULT_READERS);
    let (mut engine, mut events) = sim.master(GrantAll);
    let swiper = (args.swipe_every > 0).then(|| {
        tokio::spawn(swipe_cards(
            sim.nodes().to_vec(),
            Duration::from_secs(args.swipe_every),
        ))
    });

    tokio::select! {
        () = engine.run() => {}
        () = print_events(&mut events) => {}
        () = sleep(Duration::from_secs(args.duration)) => info!("simulation time elapsed"),
        result = tokio::signal::ctrl_c() => {
            result.context("waiting for Ctrl+C")?;
            info!("interrupted");
        }
    }

    if let Some(swiper) = swiper {
        swiper.abort();
    }
    println!("{:<8} {:<12} {:<20} {:<8}", "ADDRESS", "STATUS", "NODE", "LAST SEEN");
    for record in engine.registry().records() {
        let last_seen = record
            .last_seen_at
            .map_or_else(|| "never".to_string(), |at| at.format("%H:%M:%S").to_string());
        println!(
            "0x{:02X}     {:<12} {:<20} {}",
            record.address,
            record.status.to_string(),
            record.config.label(),
            last_seen
        );
    }
    sim.shutdown().await;
    Ok(())
}

fn demo_config(nodes: u8) -> Result<MasterConfig> {
    ensure!(
        (1..=0x60).contains(&nodes),
        "a demo site holds between 1 and 96 nodes"
    );
    let slaves = (0..nodes)
        .map(|i| {
            let uid = NodeUid::new(&format!("SIM{i:04}"))?;
            Ok(SlaveConfig::new(
                uid,
                FIRST_DEMO_ADDRESS + i,
                format!("Door {}", i + 1),
            ))
        })
        .collect::<doorlink_core::Result<Vec<_>>>()?;

    let config = MasterConfig {
        slaves,
        ..MasterConfig::default()
    };
    config.validate()?;
    Ok(config)
}

async fn print_events(events: &mut mpsc::Receiver<MasterEvent>) {
    while let Some(event) = events.recv().await {
        println!("{event}");
    }
}

async fn swipe_cards(nodes: Vec<NodeControls>, every: Duration) {
    let mut card: u16 = 1000;
    loop {
        for node in &nodes {
            sleep(every).await;
            let reader_id = DEFAULT_READERS[usize::from(card) % DEFAULT_READERS.len()];
            info!(node = %node.uid(), reader_id, card, "presenting card");
            if let Err(e) = node.reader(reader_id).present_card_26(1, card).await {
                warn!(error = %e, "card presentation failed");
            }
            card = card.wrapping_add(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_config() {
        let config = demo_config(3).unwrap();
        let addresses: Vec<u8> = config.slaves.iter().map(|s| s.final_address).collect();
        assert_eq!(addresses, vec![0x10, 0x11, 0x12]);
        assert_eq!(config.slaves[0].uid.as_str(), "SIM0000");
    }

    #[test]
    fn test_demo_config_bounds() {
        assert!(demo_config(0).is_err());
        assert!(demo_config(0x60).is_ok());
        assert!(demo_config(0x61).is_err());
    }
}
