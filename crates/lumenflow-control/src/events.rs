//! Observer event feed
//!
//! Monitors subscribe to a bounded queue of structured [`RouterEvent`]s.
//! Delivery is best-effort: publishing never blocks the hot path, and a
//! full observer queue drops its oldest event to make room for the new
//! one. Events are `Copy` and serializable so external monitor windows
//! can consume the feed as data.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use serde::Serialize;

use crate::ehub::{DecodeErrorKind, EntityConfig, MessageKind};
use lumenflow_core::UniverseAddress;

/// What brought the router down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FatalKind {
    /// The inbound socket failed outside of a timeout.
    Socket,
    /// The emitter timer stopped firing.
    Timer,
}

/// Structured events published to observers.
///
/// The routing-path variants are allocation-free; only `ConfigReceived`
/// carries owned data, and config messages never ride the hot path.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RouterEvent {
    /// The engine started its tasks.
    Started,
    /// The engine stopped.
    Stopped,
    /// An inbound datagram decoded successfully.
    MessageDecoded {
        /// Update or config.
        kind: MessageKind,
        /// The message's universe scope, if present.
        universe: Option<u16>,
        /// Number of entities carried.
        entities: usize,
    },
    /// An inbound datagram was rejected.
    MalformedInput {
        /// Pre-tagged rejection reason.
        kind: DecodeErrorKind,
    },
    /// Entity metadata from a `config` message, forwarded verbatim for
    /// monitor windows; never touches the universe buffers.
    ConfigReceived {
        /// The message's universe scope, if present.
        universe: Option<u16>,
        /// Decoded entity metadata.
        entities: Vec<EntityConfig>,
    },
    /// The ingest queue overflowed and dropped its oldest datagram.
    BackpressureDrop,
    /// An ArtNet packet left the socket.
    PacketSent {
        /// Destination universe buffer.
        address: UniverseAddress,
        /// Sequence byte of the packet.
        sequence: u8,
    },
    /// An outbound send failed; the packet is gone, the next update
    /// re-dirties the universe.
    SendFailed {
        /// Destination universe buffer.
        address: UniverseAddress,
    },
    /// A new mapping snapshot was published.
    MappingSwapped {
        /// Number of ranges in the new snapshot.
        ranges: usize,
    },
    /// A new patch snapshot was published.
    PatchSwapped {
        /// Number of rules in the new snapshot.
        rules: usize,
        /// Whether the snapshot starts enabled.
        enabled: bool,
    },
    /// Patching was toggled without a snapshot swap.
    PatchEnabled {
        /// New state.
        enabled: bool,
    },
    /// The router entered a stopped state on its own.
    Fatal {
        /// What failed.
        kind: FatalKind,
    },
}

/// Fan-out of router events to observer queues.
#[derive(Debug)]
pub struct EventBus {
    capacity: usize,
    subscribers: Mutex<Vec<(Sender<RouterEvent>, Receiver<RouterEvent>)>>,
}

impl EventBus {
    /// Create a bus whose observer queues hold `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Register an observer and return its event queue.
    pub fn subscribe(&self) -> Receiver<RouterEvent> {
        let (tx, rx) = bounded(self.capacity);
        self.subscribers.lock().push((tx, rx.clone()));
        rx
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Publish to every observer without blocking. A full queue loses its
    /// oldest event.
    pub fn publish(&self, event: RouterEvent) {
        let subscribers = self.subscribers.lock();
        for (tx, rx) in subscribers.iter() {
            if let Err(TrySendError::Full(event)) = tx.try_send(event.clone()) {
                let _ = rx.try_recv();
                let _ = tx.try_send(event);
            }
        }
    }
}
