//! Liveness behaviour of the engine against buses that misbehave over time.

use bytes::Bytes;
use doorlink_core::NodeUid;
use doorlink_master::{
    AddressedBus, BusError, BusResult, GrantAll, MasterConfig, MasterEngine, MasterEvent,
    NodeStatus, OfflineReason, SlaveConfig,
};
use std::time::Duration;
use tokio::time::Instant;

/// Node at one address that answers with the idle filler, except when told
/// to fail a pattern of reads or to go dark entirely.
struct FlakyBus {
    address: u8,
    reads: usize,
    fail_every: Option<usize>,
    dark_after: Option<usize>,
}

impl FlakyBus {
    fn new(address: u8) -> Self {
        Self {
            address,
            reads: 0,
            fail_every: None,
            dark_after: None,
        }
    }
}

impl AddressedBus for FlakyBus {
    async fn write(&mut self, address: u8, _data: &[u8]) -> BusResult<()> {
        if address == self.address {
            Ok(())
        } else {
            Err(BusError::no_device(address))
        }
    }

    async fn read(&mut self, address: u8, _max_len: usize) -> BusResult<Bytes> {
        if address != self.address {
            return Err(BusError::no_device(address));
        }
        self.reads += 1;
        let dark = self.dark_after.is_some_and(|n| self.reads > n);
        let flaky = self.fail_every.is_some_and(|n| self.reads % n == 0);
        if dark || flaky {
            return Err(BusError::timeout(address));
        }
        Ok(Bytes::from_static(&[0x00, 0x00, 0x00, 0x00]))
    }
}

fn config() -> MasterConfig {
    MasterConfig {
        slaves: vec![SlaveConfig::new(NodeUid::new("AABBCCDD").unwrap(), 5, "Front door")],
        ..MasterConfig::default()
    }
}

fn drain(events: &mut tokio::sync::mpsc::Receiver<MasterEvent>) -> Vec<MasterEvent> {
    std::iter::from_fn(|| events.try_recv().ok()).collect()
}

#[tokio::test(start_paused = true)]
async fn test_transient_errors_do_not_flap() {
    let bus = FlakyBus {
        fail_every: Some(2),
        ..FlakyBus::new(5)
    };
    let (mut engine, mut events) = MasterEngine::new(bus, config(), GrantAll);

    for _ in 0..50 {
        engine.poll_round().await;
    }

    assert_eq!(engine.registry().status(5), Some(NodeStatus::Online));
    assert_eq!(drain(&mut events), vec![MasterEvent::NodeOnline { address: 5 }]);
}

#[tokio::test(start_paused = true)]
async fn test_dead_node_detected_in_bounded_time() {
    let bus = FlakyBus {
        dark_after: Some(1),
        ..FlakyBus::new(5)
    };
    let (mut engine, mut events) = MasterEngine::new(bus, config(), GrantAll);

    let start = Instant::now();
    while engine.registry().status(5) != Some(NodeStatus::Offline) {
        engine.poll_round().await;
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    assert_eq!(
        drain(&mut events),
        vec![
            MasterEvent::NodeOnline { address: 5 },
            MasterEvent::NodeOffline {
                address: 5,
                reason: OfflineReason::PollFailures(3)
            }
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_padded_idle_reads_keep_node_online() {
    let (mut engine, _events) = MasterEngine::new(FlakyBus::new(5), config(), GrantAll);

    engine.poll_round().await;
    tokio::time::advance(Duration::from_secs(30)).await;
    engine.poll_round().await;
    tokio::time::advance(Duration::from_secs(30)).await;
    engine.check_timeouts();

    assert_eq!(engine.registry().status(5), Some(NodeStatus::Online));
}

#[tokio::test(start_paused = true)]
async fn test_empty_table_still_runs_discovery() {
    let (mut engine, _events) =
        MasterEngine::new(FlakyBus::new(0x08), MasterConfig::default(), GrantAll);

    let _ = tokio::time::timeout(Duration::from_secs(17), engine.run()).await;

    assert!(engine.registry().is_empty());
    assert!(engine.bus_mut().reads >= 2);
}
