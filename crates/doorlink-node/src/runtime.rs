//! The node event loop shared by both transports.
//!
//! One task owns the dispatcher and multiplexes every source of work:
//!
//! ```text
//!  inbound commands ─┐
//!  reader events ────┤                         ┌─► Outbox (replies, events)
//!  input scan tick ──┼──► select! ──► actions ─┼─► FuturesUnordered (feedback)
//!  heartbeat tick ───┤                         └─► restart deadline
//!  feedback done ────┘
//! ```
//!
//! Feedback sequences run concurrently inside the same task. Input scans,
//! heartbeats and card reads are suppressed while the node is unconfigured.

use doorlink_core::FeedbackKind;
use doorlink_core::ReaderEvent;
use doorlink_core::constants::{
    DEFAULT_QUEUE_CAPACITY, HEARTBEAT_INTERVAL_SECS, INPUT_POLL_INTERVAL_MS, RESTART_DELAY_MS,
    SENDER_POLL_INTERVAL_MS,
};
use doorlink_hardware::{
    DoorInputTracker, FeedbackOutputs, InputChange, InputLines, ReaderBank, run_feedback,
};
use doorlink_protocol::{Envelope, Message};
use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::dispatcher::{Dispatcher, NodeAction};
use crate::outbox::{FrameEncoder, Outbox};

/// Completed reads buffered between the finalizer and the event loop.
const READER_EVENT_CAPACITY: usize = 16;

/// Commands buffered between the transport and the event loop.
pub(crate) const INBOUND_CAPACITY: usize = 16;

/// Timing and sizing of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSettings {
    pub queue_capacity: usize,
    pub input_poll_interval: Duration,
    pub heartbeat_interval: Duration,
    pub restart_delay: Duration,
    /// Idle poll period of the serial sender.
    pub sender_poll_interval: Duration,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            input_poll_interval: Duration::from_millis(INPUT_POLL_INTERVAL_MS),
            heartbeat_interval: Duration::from_secs(HEARTBEAT_INTERVAL_SECS),
            restart_delay: Duration::from_millis(RESTART_DELAY_MS),
            sender_poll_interval: Duration::from_millis(SENDER_POLL_INTERVAL_MS),
        }
    }
}

/// Physical collaborators of a node.
#[derive(Clone)]
pub struct NodeHardware {
    pub bank: Arc<ReaderBank>,
    pub outputs: Arc<dyn FeedbackOutputs>,
    pub inputs: Arc<dyn InputLines>,
}

impl NodeHardware {
    pub fn new(
        bank: Arc<ReaderBank>,
        outputs: impl FeedbackOutputs + 'static,
        inputs: impl InputLines + 'static,
    ) -> Self {
        Self {
            bank,
            outputs: Arc::new(outputs),
            inputs: Arc::new(inputs),
        }
    }

    /// Number of readers reported in identity responses.
    #[must_use]
    pub fn reader_count(&self) -> u8 {
        u8::try_from(self.bank.len()).unwrap_or(u8::MAX)
    }
}

impl std::fmt::Debug for NodeHardware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeHardware")
            .field("bank", &self.bank)
            .finish_non_exhaustive()
    }
}

/// Why a node run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeExit {
    /// A new address was stored; the owner restarts the node with it.
    Restart { address: u8 },
    /// The transport went away.
    Disconnected,
}

/// A command as delivered by a transport.
#[derive(Debug)]
pub(crate) enum Inbound {
    /// Already addressed to this node by the bus.
    Bus(Message),
    /// Heard on a shared serial link.
    Link(Envelope),
}

type FeedbackTask = BoxFuture<'static, (u8, FeedbackKind, doorlink_hardware::Result<()>)>;

pub(crate) fn input_message(change: InputChange) -> Message {
    match change {
        InputChange::RexPressed { reader_id } => Message::RexEvent { reader_id },
        InputChange::Contact { reader_id, state } => Message::DoorContact { reader_id, state },
    }
}

pub(crate) struct NodeCore<E: FrameEncoder> {
    pub(crate) dispatcher: Dispatcher,
    pub(crate) outbox: Arc<Outbox<E>>,
    pub(crate) hardware: NodeHardware,
    pub(crate) settings: NodeSettings,
}

impl<E: FrameEncoder> NodeCore<E> {
    pub(crate) fn new(
        dispatcher: Dispatcher,
        encoder: E,
        hardware: NodeHardware,
        settings: NodeSettings,
    ) -> Self {
        let outbox = Arc::new(Outbox::new(encoder, settings.queue_capacity));
        Self {
            dispatcher,
            outbox,
            hardware,
            settings,
        }
    }

    fn publish(&self, message: &Message) {
        // Failures are already logged by the outbox.
        let _ = self.outbox.publish(message);
    }

    fn on_reader_event(&self, event: ReaderEvent, configured: bool) {
        if !configured {
            debug!(reader_id = event.reader_id, "card read while unconfigured, dropping");
            return;
        }
        info!(
            reader_id = event.reader_id,
            code = event.code,
            bits = event.bit_length,
            "card read"
        );
        self.publish(&Message::from(event));
    }

    fn apply(
        &self,
        action: NodeAction,
        feedback: &mut FuturesUnordered<FeedbackTask>,
        restart: &mut Option<(Instant, u8)>,
    ) {
        match action {
            NodeAction::Reply(message) => self.publish(&message),
            NodeAction::RunFeedback { reader_id, kind } => {
                let outputs = Arc::clone(&self.hardware.outputs);
                feedback.push(Box::pin(async move {
                    let result = run_feedback(&*outputs, reader_id, kind).await;
                    (reader_id, kind, result)
                }));
            }
            NodeAction::Restart { address } => {
                if restart.is_none() {
                    *restart = Some((Instant::now() + self.settings.restart_delay, address));
                }
            }
        }
    }

    /// Run until a restart is due or the transport closes `inbound`.
    pub(crate) async fn run(mut self, mut inbound: mpsc::Receiver<Inbound>) -> NodeExit {
        let identity = self.dispatcher.identity().clone();
        let configured = identity.is_configured();
        let readers = self.dispatcher.readers().to_vec();
        info!(
            uid = %identity.uid(),
            address = identity.address(),
            format = %identity.format(),
            readers = readers.len(),
            configured,
            "node started"
        );

        let (event_tx, mut reader_events) = mpsc::channel(READER_EVENT_CAPACITY);
        let bank = Arc::clone(&self.hardware.bank);
        let finalizer = bank.run_finalizer(event_tx);
        tokio::pin!(finalizer);
        let mut finalizer_running = true;

        let mut input_tick = time::interval(self.settings.input_poll_interval);
        input_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let period = self.settings.heartbeat_interval;
        let mut heartbeat = time::interval_at(Instant::now() + period, period);

        let mut tracker = DoorInputTracker::new();
        let mut feedback: FuturesUnordered<FeedbackTask> = FuturesUnordered::new();
        let mut restart: Option<(Instant, u8)> = None;

        loop {
            tokio::select! {
                item = inbound.recv() => {
                    let Some(item) = item else {
                        info!("transport closed, node stopping");
                        return NodeExit::Disconnected;
                    };
                    let actions = match item {
                        Inbound::Bus(message) => self.dispatcher.dispatch(message),
                        Inbound::Link(envelope) => self.dispatcher.dispatch_envelope(envelope),
                    };
                    for action in actions {
                        self.apply(action, &mut feedback, &mut restart);
                    }
                }
                Some(event) = reader_events.recv() => self.on_reader_event(event, configured),
                _ = input_tick.tick(), if configured => {
                    for change in tracker.scan(&*self.hardware.inputs, readers.iter().copied()) {
                        debug!(?change, "door input changed");
                        self.publish(&input_message(change));
                    }
                }
                _ = heartbeat.tick(), if configured => self.publish(&Message::Heartbeat),
                Some((reader_id, kind, result)) = feedback.next(), if !feedback.is_empty() => {
                    if let Err(e) = result {
                        warn!(reader_id, %kind, error = %e, "feedback sequence incomplete");
                    }
                }
                _ = time::sleep_until(restart.map_or_else(Instant::now, |(at, _)| at)), if restart.is_some() => {
                    if let Some((_, address)) = restart {
                        info!(address, "restarting to apply new address");
                        return NodeExit::Restart { address };
                    }
                }
                _ = &mut finalizer, if finalizer_running => {
                    warn!("reader finalizer stopped");
                    finalizer_running = false;
                }
            }
        }
    }
}
