//! LumenFlow Control - The Routing Runtime
//!
//! This crate wires the domain model of `lumenflow-core` into a running
//! pipeline:
//!
//! - [`ehub`] - inbound JSON-over-UDP decoder
//! - [`router`] - applies updates to universe buffers
//! - [`emitter`] - drains dirty universes to ArtNet under a rate budget
//! - [`artnet`] - ArtDmx packet encoding and the outbound socket
//! - [`engine`] - the control plane: lifecycle, snapshot swaps, observers
//! - [`events`] - the structured event feed for external monitors
//!
//! Data flow: UDP socket → decoder → router → universe buffers ⇄ emitter
//! → UDP socket. Three OS threads share the heap state through explicit
//! handles; snapshot pointers publish atomically and the router reads
//! them once per message.

#![allow(missing_docs)]

pub mod artnet;
pub mod ehub;
pub mod emitter;
pub mod engine;
pub mod error;
pub mod events;
pub mod router;
pub mod snapshot;

pub use artnet::{encode_artdmx, ArtNetSocket, ARTDMX_PACKET_SIZE, ARTNET_PORT};
pub use ehub::{
    decode, ConfigMessage, DecodeError, DecodeErrorKind, DecodedMessage, EntityConfig,
    EntityUpdate, MessageKind, UpdateMessage, MAX_DATAGRAM_SIZE,
};
pub use emitter::{Emitter, TokenBucket};
pub use engine::Engine;
pub use error::{ControlError, Result};
pub use events::{EventBus, FatalKind, RouterEvent};
pub use router::{Router, UniverseTable};
pub use snapshot::SnapshotCell;
