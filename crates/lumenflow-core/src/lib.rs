//! LumenFlow Core - Domain Model for the Lighting Router
//!
//! This crate contains the validated state the routing pipeline runs on:
//! - Color samples and output channel layouts
//! - The entity→channel mapping table (immutable snapshots)
//! - The channel patch table (immutable snapshots)
//! - Per-universe DMX frame buffers
//! - Pipeline counters and raw configuration types
//!
//! Everything here is I/O-free; sockets, threads and the wire protocols
//! live in `lumenflow-control`.

#![warn(missing_docs)]

pub mod color;
pub mod config;
pub mod error;
pub mod mapping;
pub mod patch;
pub mod stats;
pub mod universe;

pub use color::{ChannelLayout, ColorComponent, ColorSample, MAX_LAYOUT_SLOTS};
pub use config::{RawMappingEntry, RawPatchConfig, RouterConfig, RouterOptions};
pub use error::{ConfigError, MappingError, PatchError};
pub use mapping::{MappingRange, MappingSnapshot, ResolvedEntity, UniverseAddress};
pub use patch::{PatchRule, PatchSnapshot};
pub use stats::{RouterStats, StatsSnapshot};
pub use universe::{UniverseBuffer, DMX_CHANNELS};
