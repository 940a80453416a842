//! Discovery and polling over the addressed bus.
//!
//! The engine is the only bus initiator. One task runs [`MasterEngine::run`],
//! which interleaves two duties and never runs them concurrently:
//!
//! - **Discovery**: probe the unconfigured address with `Identify`, wait for
//!   the node to prepare its answer, read it back, and move known nodes to
//!   their configured address with `SetAddress`.
//! - **Polling**: read one frame from every known address in turn, update the
//!   [`NodeRegistry`], and answer card reads and exit requests with feedback
//!   commands chosen by the [`AccessPolicy`].
//!
//! Bus errors are never fatal; they only count against the addressed node.

use bytes::Bytes;
use doorlink_core::{FeedbackKind, NodeUid, constants::*};
use doorlink_protocol::{Message, binary};
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, instrument, trace, warn};

use crate::bus::{AddressedBus, trim_response};
use crate::config::MasterConfig;
use crate::error::{BusError, BusResult};
use crate::events::{EventSink, MasterEvent};
use crate::policy::AccessPolicy;
use crate::registry::{NodeRegistry, OfflineReason};

/// Result of one discovery probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryOutcome {
    /// Nobody is waiting on the unconfigured address.
    NoResponse,
    /// A configured node was told to move to `address`.
    Assigned { uid: NodeUid, address: u8 },
    /// A configured node answered, but its address is already online.
    AlreadyOnline { uid: NodeUid, address: u8 },
    /// A node that is not in the configuration answered.
    Unknown { uid: NodeUid },
    /// The answer could not be used.
    Invalid,
}

/// Result of polling one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The transaction failed.
    Failed,
    /// The node had nothing to report.
    Idle,
    /// Something answered, but not with a valid frame.
    Malformed,
    /// The node reported an event.
    Event(Message),
}

/// The bus master.
pub struct MasterEngine<B, P> {
    bus: B,
    policy: P,
    config: MasterConfig,
    registry: NodeRegistry,
    events: EventSink,
    next_discovery: Option<Instant>,
}

impl<B: AddressedBus, P: AccessPolicy> MasterEngine<B, P> {
    /// Create an engine and the receiving end of its event channel.
    ///
    /// The registry is seeded with an `Unknown` record per configured node.
    pub fn new(bus: B, config: MasterConfig, policy: P) -> (Self, mpsc::Receiver<MasterEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let registry = NodeRegistry::seeded(&config.slaves);

        let engine = Self {
            bus,
            policy,
            config,
            registry,
            events: EventSink::new(tx),
            next_discovery: None,
        };
        (engine, rx)
    }

    #[must_use]
    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    #[must_use]
    pub fn config(&self) -> &MasterConfig {
        &self.config
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn policy_mut(&mut self) -> &mut P {
        &mut self.policy
    }

    /// Log which addresses answer on the bus.
    pub async fn scan_bus(&mut self) -> Vec<u8> {
        match self.bus.scan().await {
            Ok(found) => {
                let found_hex: Vec<String> =
                    found.iter().map(|address| format!("0x{address:02X}")).collect();
                info!(devices = ?found_hex, "bus scan complete");
                found
            }
            Err(e) => {
                warn!(error = %e, "bus scan failed");
                Vec::new()
            }
        }
    }

    /// Probe the unconfigured address once.
    #[instrument(skip_all)]
    pub async fn discover_once(&mut self) -> DiscoveryOutcome {
        let probe = Message::Identify;
        if let Err(e) = self.write_message(UNCONFIGURED_BUS_ADDRESS, &probe).await {
            trace!(error = %e, "nothing on the unconfigured address");
            return DiscoveryOutcome::NoResponse;
        }

        sleep(self.config.polling.response_delay()).await;

        let response = match self.bus.read(UNCONFIGURED_BUS_ADDRESS, MAX_RESPONSE_LEN).await {
            Ok(data) => data,
            Err(e) => {
                debug!(error = %e, "identify probe got no answer");
                return DiscoveryOutcome::NoResponse;
            }
        };

        let uid = match binary::decode_bytes(trim_response(&response)) {
            Ok(Some(Message::IdentifyResponse {
                uid,
                device_kind,
                reader_count,
                ..
            })) => {
                debug!(%uid, %device_kind, reader_count, "node waiting for an address");
                uid
            }
            Ok(None) => return DiscoveryOutcome::NoResponse,
            Ok(Some(other)) => {
                debug!(message = other.name(), "unexpected answer to identify");
                return DiscoveryOutcome::Invalid;
            }
            Err(e) => {
                warn!(error = %e, "unreadable identify response");
                return DiscoveryOutcome::Invalid;
            }
        };

        let Some(slave) = self.config.slave_by_uid(&uid).cloned() else {
            warn!(%uid, "unknown node on the bus; add it to SLAVES to assign an address");
            self.events.publish(MasterEvent::UnknownNode { uid: uid.clone() });
            return DiscoveryOutcome::Unknown { uid };
        };

        let address = slave.final_address;
        if self.registry.get(address).is_some_and(|record| record.is_online()) {
            warn!(%uid, address, "node answered discovery but its address is already online");
            return DiscoveryOutcome::AlreadyOnline { uid, address };
        }

        let command = Message::SetAddress {
            new_addr: address,
            target_uid: None,
        };
        if let Err(e) = self.write_message(UNCONFIGURED_BUS_ADDRESS, &command).await {
            warn!(%uid, address, error = %e, "failed to send address assignment");
            return DiscoveryOutcome::Invalid;
        }

        info!(%uid, node = slave.label(), address, "address assigned");
        self.registry.reset(slave);
        self.events.publish(MasterEvent::AddressAssigned {
            uid: uid.clone(),
            address,
        });
        DiscoveryOutcome::Assigned { uid, address }
    }

    /// Read one frame from `address` and act on it.
    pub async fn poll_node(&mut self, address: u8) -> PollOutcome {
        let data = match self.bus.read(address, MAX_RESPONSE_LEN).await {
            Ok(data) => data,
            Err(e) => {
                self.on_poll_failure(address, &e);
                return PollOutcome::Failed;
            }
        };

        let now = Instant::now();
        match binary::decode_bytes(trim_response(&data)) {
            Ok(None) => {
                self.on_alive(address, now);
                PollOutcome::Idle
            }
            Ok(Some(message)) => {
                self.on_alive(address, now);
                self.route(address, &message).await;
                PollOutcome::Event(message)
            }
            Err(e) => {
                debug!(address, error = %e, "malformed poll response");
                self.registry.mark_present(address, now);
                PollOutcome::Malformed
            }
        }
    }

    /// Send a feedback command to one reader of a node.
    ///
    /// # Errors
    /// Returns the bus error if the write failed.
    pub async fn send_feedback(
        &mut self,
        address: u8,
        reader_id: u8,
        kind: FeedbackKind,
    ) -> BusResult<()> {
        let command = Message::FeedbackCommand { reader_id, kind };
        self.write_message(address, &command).await.inspect_err(|e| {
            warn!(address, reader_id, %kind, error = %e, "failed to send feedback");
        })
    }

    /// Poll every known node once, staggered, then expire silent nodes.
    pub async fn poll_round(&mut self) {
        for address in self.registry.addresses() {
            self.poll_node(address).await;
            sleep(self.config.polling.poll_stagger()).await;
        }
        self.check_timeouts();
    }

    /// Mark online nodes that have been silent too long as offline.
    pub fn check_timeouts(&mut self) {
        let timeout = self.config.polling.offline_timeout();
        for address in self.registry.expire(Instant::now(), timeout) {
            warn!(address, timeout_secs = timeout.as_secs(), "node timed out");
            self.events.publish(MasterEvent::NodeOffline {
                address,
                reason: OfflineReason::Timeout,
            });
        }
    }

    /// Run discovery and polling forever.
    ///
    /// The discovery schedule survives a cancelled run, so a run resumed
    /// later picks up where the previous one stopped.
    pub async fn run(&mut self) {
        let polling = self.config.polling.clone();
        if self.next_discovery.is_none() {
            info!(nodes = self.registry.len(), "master started");
            self.scan_bus().await;
            self.next_discovery = Some(Instant::now() + polling.initial_discovery_delay());
        }

        loop {
            if self.next_discovery.is_none_or(|at| Instant::now() >= at) {
                self.discover_once().await;
                self.next_discovery = Some(Instant::now() + polling.discovery_interval());
            }

            if self.registry.is_empty() {
                sleep(polling.empty_backoff()).await;
            } else {
                self.poll_round().await;
            }
        }
    }

    async fn write_message(&mut self, address: u8, message: &Message) -> BusResult<()> {
        let frame: Bytes = binary::encode_to_bytes(message)?;
        self.bus.write(address, &frame).await
    }

    fn on_alive(&mut self, address: u8, now: Instant) {
        if self.registry.mark_alive(address, now) {
            info!(address, "node online");
            self.events.publish(MasterEvent::NodeOnline { address });
        }
    }

    fn on_poll_failure(&mut self, address: u8, error: &BusError) {
        let threshold = self.config.polling.offline_after_failures;
        match self.registry.mark_failed(address, threshold) {
            Some(reason) => {
                warn!(address, %reason, error = %error, "node offline");
                self.events
                    .publish(MasterEvent::NodeOffline { address, reason });
            }
            None => debug!(address, error = %error, "poll failed"),
        }
    }

    async fn route(&mut self, address: u8, message: &Message) {
        match *message {
            Message::CardRead {
                reader_id,
                code,
                bits,
            } => {
                let decision = self.policy.on_card(address, reader_id, code, bits);
                info!(address, reader_id, code, bits, %decision, "card read");
                let _ = self.send_feedback(address, reader_id, decision).await;
                self.events.publish(MasterEvent::CardRead {
                    address,
                    reader_id,
                    code,
                    bits,
                    decision,
                });
            }
            Message::RexEvent { reader_id } => {
                let decision = self.policy.on_rex(address, reader_id);
                info!(address, reader_id, %decision, "exit request");
                let _ = self.send_feedback(address, reader_id, decision).await;
                self.events.publish(MasterEvent::Rex {
                    address,
                    reader_id,
                    decision,
                });
            }
            Message::DoorContact { reader_id, state } => {
                info!(address, reader_id, %state, "door contact");
                self.events.publish(MasterEvent::DoorContact {
                    address,
                    reader_id,
                    state,
                });
            }
            Message::Heartbeat => {
                debug!(address, "heartbeat");
                self.events.publish(MasterEvent::Heartbeat { address });
            }
            ref other => debug!(address, message = other.name(), "ignoring unexpected message"),
        }
    }
}
