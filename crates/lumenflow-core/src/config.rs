//! Raw configuration types
//!
//! These are the serde-facing shapes of the mapping list, the patch list
//! and the runtime options. The router core only ever consumes validated
//! snapshots; conversion happens here so a bad config is rejected in one
//! place, before anything is published.

use std::net::{IpAddr, Ipv4Addr};

use serde::{Deserialize, Serialize};

use crate::color::{ChannelLayout, ColorComponent};
use crate::error::ConfigError;
use crate::mapping::{MappingRange, MappingSnapshot};
use crate::patch::{PatchRule, PatchSnapshot};

/// One entry of the mapping configuration list.
///
/// Matches both the native JSON form and tabular exports
/// (`from,to,ip,universe,channel_start,channels`). `channel_start`
/// defaults to 1 and `channels` to `[R, G, B]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMappingEntry {
    /// First entity id of the range.
    pub from: u32,
    /// Last entity id of the range.
    pub to: u32,
    /// Controller IP address.
    #[serde(alias = "controller_ip")]
    pub ip: IpAddr,
    /// DMX universe on the controller.
    pub universe: u16,
    /// 1-based first DMX channel of the range.
    #[serde(default = "default_channel_start")]
    pub channel_start: u16,
    /// Ordered output components per entity.
    #[serde(default = "default_channels")]
    pub channels: Vec<ColorComponent>,
}

fn default_channel_start() -> u16 {
    1
}

fn default_channels() -> Vec<ColorComponent> {
    vec![
        ColorComponent::Red,
        ColorComponent::Green,
        ColorComponent::Blue,
    ]
}

impl RawMappingEntry {
    /// Convert into a mapping range, checking the channel layout.
    pub fn into_range(self) -> Result<MappingRange, ConfigError> {
        let layout = ChannelLayout::from_components(&self.channels)?;
        Ok(MappingRange {
            from: self.from,
            to: self.to,
            controller: self.ip,
            universe: self.universe,
            channel_start: self.channel_start,
            layout,
        })
    }
}

/// The patch section of a configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPatchConfig {
    /// Whether patching starts enabled.
    #[serde(default)]
    pub enabled: bool,
    /// Rewrite rules in declaration order.
    #[serde(default)]
    pub rules: Vec<PatchRule>,
}

/// Runtime tuning options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterOptions {
    /// Address the eHuB socket binds to.
    #[serde(default = "default_listen_address")]
    pub listen_address: IpAddr,
    /// Port the eHuB socket binds to.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    /// Emitter tick interval in milliseconds.
    #[serde(default = "default_emit_interval_ms")]
    pub emit_interval_ms: u64,
    /// Global outbound packet budget per second.
    #[serde(default = "default_max_pps")]
    pub max_pps: u32,
    /// Minimum milliseconds between two packets to the same universe.
    #[serde(default)]
    pub per_universe_min_interval_ms: u64,
    /// Receiver→router queue capacity in datagrams.
    #[serde(default = "default_ingest_queue_capacity")]
    pub ingest_queue_capacity: usize,
    /// Per-observer event queue capacity.
    #[serde(default = "default_observer_queue_capacity")]
    pub observer_queue_capacity: usize,
    /// When set, drop messages whose `universe` field differs.
    #[serde(default)]
    pub filter_universe: Option<u16>,
    /// Destination UDP port for ArtNet packets.
    #[serde(default = "default_artnet_port")]
    pub artnet_port: u16,
}

fn default_listen_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_listen_port() -> u16 {
    5568
}

fn default_emit_interval_ms() -> u64 {
    25
}

fn default_max_pps() -> u32 {
    1000
}

fn default_ingest_queue_capacity() -> usize {
    1024
}

fn default_observer_queue_capacity() -> usize {
    1024
}

fn default_artnet_port() -> u16 {
    6454
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            listen_port: default_listen_port(),
            emit_interval_ms: default_emit_interval_ms(),
            max_pps: default_max_pps(),
            per_universe_min_interval_ms: 0,
            ingest_queue_capacity: default_ingest_queue_capacity(),
            observer_queue_capacity: default_observer_queue_capacity(),
            filter_universe: None,
            artnet_port: default_artnet_port(),
        }
    }
}

/// Top-level configuration file shape consumed by the binary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// The mapping list.
    #[serde(default)]
    pub mapping: Vec<RawMappingEntry>,
    /// The patch list, empty and disabled when omitted.
    #[serde(default)]
    pub patch: RawPatchConfig,
    /// Runtime options, spec defaults when omitted.
    #[serde(default)]
    pub options: RouterOptions,
}

impl RouterConfig {
    /// Validate the mapping list into a snapshot.
    pub fn mapping_snapshot(&self) -> Result<MappingSnapshot, ConfigError> {
        let ranges = self
            .mapping
            .iter()
            .cloned()
            .map(RawMappingEntry::into_range)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(MappingSnapshot::validate(ranges)?)
    }

    /// Validate the patch list into a snapshot.
    pub fn patch_snapshot(&self) -> Result<PatchSnapshot, ConfigError> {
        Ok(PatchSnapshot::validate(
            self.patch.rules.clone(),
            self.patch.enabled,
        )?)
    }
}
