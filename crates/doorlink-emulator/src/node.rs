//! Emulated binary node with its mock hardware and restart loop.

use doorlink_core::{DeviceKind, NodeUid};
use doorlink_hardware::mock::{MockInputs, MockInputsHandle, MockOutputs, MockOutputsHandle, MockWiegandReader};
use doorlink_hardware::ReaderBank;
use doorlink_node::{BinaryNode, MemoryAddressStore, NodeExit, NodeHardware, NodeSettings};
use std::sync::Arc;
use tracing::info;

use crate::bus::SimulatedBus;

/// Test-side access to an emulated node's hardware and stored address.
#[derive(Debug, Clone)]
pub struct NodeControls {
    uid: NodeUid,
    bank: Arc<ReaderBank>,
    outputs: MockOutputsHandle,
    inputs: MockInputsHandle,
    store: MemoryAddressStore,
}

impl NodeControls {
    #[must_use]
    pub fn uid(&self) -> &NodeUid {
        &self.uid
    }

    /// Address persisted by the node, if it has been assigned one.
    #[must_use]
    pub fn stored_address(&self) -> Option<u8> {
        self.store.get()
    }

    /// Card reader wired to `reader_id`.
    #[must_use]
    pub fn reader(&self, reader_id: u8) -> MockWiegandReader {
        MockWiegandReader::new(Arc::clone(&self.bank), reader_id)
    }

    #[must_use]
    pub fn outputs(&self) -> &MockOutputsHandle {
        &self.outputs
    }

    #[must_use]
    pub fn inputs(&self) -> &MockInputsHandle {
        &self.inputs
    }
}

/// A binary node that reboots itself after every address change.
#[derive(Debug)]
pub struct SimulatedNode {
    kind: DeviceKind,
    hardware: NodeHardware,
    settings: NodeSettings,
    controls: NodeControls,
}

impl SimulatedNode {
    /// Unconfigured node with mock readers `reader_ids`.
    pub fn new(uid: NodeUid, reader_ids: &[u8]) -> (Self, NodeControls) {
        Self::with_store(uid, reader_ids, MemoryAddressStore::new())
    }

    /// Node that boots from `store`.
    pub fn with_store(
        uid: NodeUid,
        reader_ids: &[u8],
        store: MemoryAddressStore,
    ) -> (Self, NodeControls) {
        let bank = Arc::new(ReaderBank::new(reader_ids.iter().copied()));
        let (outputs, outputs_handle) = MockOutputs::new(reader_ids.iter().copied());
        let (inputs, inputs_handle) = MockInputs::new(reader_ids.iter().copied());

        let controls = NodeControls {
            uid,
            bank: Arc::clone(&bank),
            outputs: outputs_handle,
            inputs: inputs_handle,
            store,
        };
        let node = Self {
            kind: DeviceKind::Esp32,
            hardware: NodeHardware::new(bank, outputs, inputs),
            settings: NodeSettings::default(),
            controls: controls.clone(),
        };
        (node, controls)
    }

    #[must_use]
    pub fn with_settings(mut self, settings: NodeSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn with_device_kind(mut self, kind: DeviceKind) -> Self {
        self.kind = kind;
        self
    }

    /// Boot on `bus` and keep rebooting after address changes until the
    /// node is detached.
    pub async fn run(self, bus: SimulatedBus) {
        let uid = self.controls.uid.clone();
        loop {
            let (node, slave) = BinaryNode::boot(
                uid.clone(),
                self.kind,
                self.controls.store.clone(),
                self.hardware.clone(),
                self.settings.clone(),
            );
            bus.attach(slave);

            match node.run().await {
                NodeExit::Restart { address } => {
                    info!(%uid, address, "node rebooting");
                }
                NodeExit::Disconnected => {
                    info!(%uid, "node detached");
                    return;
                }
            }
        }
    }
}
