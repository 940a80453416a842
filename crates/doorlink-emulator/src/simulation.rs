//! A whole site in memory: one master configuration, one emulated node per
//! configured UID, all on the same bus.

use doorlink_core::NodeUid;
use doorlink_master::{AccessPolicy, MasterConfig, MasterEngine, MasterEvent};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::info;

use crate::bus::SimulatedBus;
use crate::node::{NodeControls, SimulatedNode};

/// Readers fitted to every emulated node.
pub const DEFAULT_READERS: &[u8] = &[1, 2, 3, 4];

/// Running emulated nodes plus the bus they share.
#[derive(Debug)]
pub struct Simulation {
    config: MasterConfig,
    bus: SimulatedBus,
    nodes: Vec<NodeControls>,
    tasks: JoinSet<()>,
}

impl Simulation {
    /// Boot one unconfigured node per entry of `config.slaves`.
    pub fn start(config: MasterConfig, reader_ids: &[u8]) -> Self {
        let uids: Vec<NodeUid> = config.slaves.iter().map(|slave| slave.uid.clone()).collect();
        Self::start_with_uids(config, uids, reader_ids)
    }

    /// Boot one unconfigured node per UID in `uids`, which may include nodes
    /// the master does not know.
    pub fn start_with_uids(
        config: MasterConfig,
        uids: impl IntoIterator<Item = NodeUid>,
        reader_ids: &[u8],
    ) -> Self {
        let bus = SimulatedBus::new().with_read_padding(true);
        let mut tasks = JoinSet::new();
        let mut nodes = Vec::new();

        for uid in uids {
            let (node, controls) = SimulatedNode::new(uid, reader_ids);
            tasks.spawn(node.run(bus.clone()));
            nodes.push(controls);
        }
        info!(nodes = nodes.len(), "simulation started");

        Self {
            config,
            bus,
            nodes,
            tasks,
        }
    }

    /// Master engine on the simulated bus.
    pub fn master<P: AccessPolicy>(
        &self,
        policy: P,
    ) -> (MasterEngine<SimulatedBus, P>, mpsc::Receiver<MasterEvent>) {
        MasterEngine::new(self.bus.clone(), self.config.clone(), policy)
    }

    #[must_use]
    pub fn bus(&self) -> &SimulatedBus {
        &self.bus
    }

    #[must_use]
    pub fn nodes(&self) -> &[NodeControls] {
        &self.nodes
    }

    #[must_use]
    pub fn node(&self, uid: &NodeUid) -> Option<&NodeControls> {
        self.nodes.iter().find(|node| node.uid() == uid)
    }

    /// Stop every node.
    pub async fn shutdown(mut self) {
        self.tasks.abort_all();
        while self.tasks.join_next().await.is_some() {}
    }
}
