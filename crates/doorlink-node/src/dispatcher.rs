//! Routing of inbound commands on a node.
//!
//! The dispatcher is pure decision logic: it inspects a message and returns
//! the [`NodeAction`]s the runtime should carry out. It owns the node
//! identity and the address store because an address change is the only
//! command that mutates persistent state.
//!
//! | Command | Outcome |
//! |---|---|
//! | `Identify` | reply with the identity response |
//! | `SetAddress`, broadcast or targeting this UID | persist, acknowledge, restart |
//! | `SetAddress` for another UID | ignored |
//! | `FeedbackCommand` for a configured reader | run the sequence |
//! | anything else | ignored |
//!
//! On a serial link every node hears every frame, so
//! [`Dispatcher::dispatch_envelope`] also drops commands addressed to another
//! hub or received while unconfigured. `Identify` and `SetAddress` are
//! answered regardless of the destination address.

use doorlink_core::{AckStatus, FeedbackKind, NodeUid};
use doorlink_protocol::{Envelope, Message};
use tracing::{debug, info, trace, warn};

use crate::identity::{AddressStore, NodeIdentity};

/// Something the runtime must do in response to a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeAction {
    /// Queue a message for the master.
    Reply(Message),
    /// Play a feedback sequence on a reader.
    RunFeedback { reader_id: u8, kind: FeedbackKind },
    /// Restart once the restart delay has elapsed so `address` takes effect.
    Restart { address: u8 },
}

/// Command router for one node.
pub struct Dispatcher {
    identity: NodeIdentity,
    store: Box<dyn AddressStore>,
    readers: Vec<u8>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("identity", &self.identity)
            .field("readers", &self.readers)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(
        identity: NodeIdentity,
        store: impl AddressStore + 'static,
        readers: impl IntoIterator<Item = u8>,
    ) -> Self {
        Self {
            identity,
            store: Box::new(store),
            readers: readers.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn identity(&self) -> &NodeIdentity {
        &self.identity
    }

    /// Reader ids this node drives.
    #[must_use]
    pub fn readers(&self) -> &[u8] {
        &self.readers
    }

    /// Handle a command delivered to this node's own address.
    pub fn dispatch(&mut self, message: Message) -> Vec<NodeAction> {
        match message {
            Message::Identify => {
                debug!(address = self.identity.address(), "identify requested");
                vec![NodeAction::Reply(self.identity.identify_response())]
            }
            Message::SetAddress {
                new_addr,
                target_uid,
            } => self.set_address(new_addr, target_uid.as_ref()),
            Message::FeedbackCommand { reader_id, kind } => {
                if self.readers.contains(&reader_id) {
                    vec![NodeAction::RunFeedback { reader_id, kind }]
                } else {
                    debug!(reader_id, %kind, "feedback for unknown reader ignored");
                    Vec::new()
                }
            }
            other => {
                debug!(message = other.name(), "not a node command, ignoring");
                Vec::new()
            }
        }
    }

    /// Handle a command heard on a shared serial link.
    pub fn dispatch_envelope(&mut self, envelope: Envelope) -> Vec<NodeAction> {
        let Envelope { hub_addr, message } = envelope;

        if !matches!(message, Message::Identify | Message::SetAddress { .. }) {
            if !self.identity.is_configured() {
                trace!(message = message.name(), "unconfigured, ignoring");
                return Vec::new();
            }
            if hub_addr != self.identity.address() {
                trace!(hub_addr, message = message.name(), "addressed elsewhere, ignoring");
                return Vec::new();
            }
        }

        self.dispatch(message)
    }

    fn set_address(&mut self, new_addr: u8, target_uid: Option<&NodeUid>) -> Vec<NodeAction> {
        if let Some(target) = target_uid {
            if target != self.identity.uid() {
                debug!(target = %target, "set_address for another node ignored");
                return Vec::new();
            }
        }

        match self.store.store(new_addr) {
            Ok(()) => {
                info!(
                    uid = %self.identity.uid(),
                    old = self.identity.address(),
                    new = new_addr,
                    "address assigned, restart pending"
                );
                vec![
                    NodeAction::Reply(Message::AddressAck {
                        status: AckStatus::Success,
                        address: new_addr,
                    }),
                    NodeAction::Restart { address: new_addr },
                ]
            }
            Err(e) => {
                warn!(new = new_addr, error = %e, "cannot persist new address");
                vec![NodeAction::Reply(Message::AddressAck {
                    status: AckStatus::Failure,
                    address: self.identity.address(),
                })]
            }
        }
    }
}
