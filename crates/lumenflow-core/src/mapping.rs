//! Entity-to-channel mapping tables
//!
//! A [`MappingSnapshot`] is the immutable routing table of the pipeline:
//! an ordered set of entity-id ranges, each bound to a channel run on one
//! DMX universe of one controller. Snapshots are validated once when they
//! are built and never mutated afterwards, so the router can resolve
//! against them without locks.

use std::collections::HashSet;
use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::color::ChannelLayout;
use crate::error::MappingError;
use crate::universe::DMX_CHANNELS;

/// Identifies one DMX universe on one controller.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct UniverseAddress {
    /// IP address of the ArtNet controller.
    pub controller: IpAddr,
    /// 15-bit ArtNet port-address (net high byte, sub-uni low byte).
    pub universe: u16,
}

impl UniverseAddress {
    /// Create an address from its parts.
    pub fn new(controller: IpAddr, universe: u16) -> Self {
        Self {
            controller,
            universe,
        }
    }
}

impl fmt::Display for UniverseAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.controller, self.universe)
    }
}

/// A contiguous block of entity ids mapped onto a channel run.
///
/// Entity `id` in `[from, to]` starts at DMX channel
/// `channel_start + (id - from) * layout.len()` (channels are 1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRange {
    /// First entity id of the range (inclusive).
    pub from: u32,
    /// Last entity id of the range (inclusive).
    pub to: u32,
    /// Controller the range's universe lives on.
    pub controller: IpAddr,
    /// DMX universe on that controller.
    pub universe: u16,
    /// 1-based DMX channel of the first entity's first component.
    pub channel_start: u16,
    /// Ordered output components per entity.
    pub layout: ChannelLayout,
}

impl MappingRange {
    /// The universe buffer this range writes to.
    pub fn address(&self) -> UniverseAddress {
        UniverseAddress::new(self.controller, self.universe)
    }

    /// Number of entities in the range.
    pub fn entity_count(&self) -> u32 {
        self.to - self.from + 1
    }

    /// Last 1-based channel the range occupies.
    fn channel_end(&self) -> u32 {
        self.channel_start as u32 + self.layout.len() as u32 * self.entity_count() - 1
    }

    fn check(&self) -> Result<(), MappingError> {
        if self.from > self.to {
            return Err(MappingError::EmptyRange {
                from: self.from,
                to: self.to,
            });
        }
        let end = self.channel_end();
        if self.channel_start == 0 || end > DMX_CHANNELS as u32 {
            return Err(MappingError::OutOfRange {
                from: self.from,
                to: self.to,
                start: self.channel_start as u32,
                end,
            });
        }
        Ok(())
    }
}

/// Where a resolved entity writes its color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedEntity {
    /// Universe buffer to write into.
    pub address: UniverseAddress,
    /// Zero-based index of the entity's first byte in the 512-byte frame.
    pub offset: usize,
    /// Output layout of the entity.
    pub layout: ChannelLayout,
}

/// Immutable entity→channel routing table.
///
/// Built with [`MappingSnapshot::validate`]; lookups binary-search the
/// ranges sorted by `from`, so resolving is `O(log R)` in the number of
/// ranges and allocation-free.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MappingSnapshot {
    // Sorted by `from`, pairwise disjoint.
    ranges: Vec<MappingRange>,
}

impl MappingSnapshot {
    /// A snapshot that maps nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Validate a range list into a snapshot.
    ///
    /// Rejects empty ranges, channel runs leaving `1..=512`, and ranges
    /// that overlap in entity ids.
    pub fn validate(mut ranges: Vec<MappingRange>) -> Result<Self, MappingError> {
        for range in &ranges {
            range.check()?;
        }

        ranges.sort_by_key(|range| range.from);
        for pair in ranges.windows(2) {
            if pair[1].from <= pair[0].to {
                return Err(MappingError::Overlap {
                    a_from: pair[0].from,
                    a_to: pair[0].to,
                    b_from: pair[1].from,
                    b_to: pair[1].to,
                });
            }
        }

        Ok(Self { ranges })
    }

    /// Resolve an entity id to its universe buffer, frame offset and layout.
    pub fn resolve(&self, id: u32) -> Option<ResolvedEntity> {
        let idx = self.ranges.partition_point(|range| range.from <= id);
        let range = self.ranges[..idx].last()?;
        if id > range.to {
            return None;
        }

        let offset =
            (range.channel_start as usize - 1) + (id - range.from) as usize * range.layout.len();
        Some(ResolvedEntity {
            address: range.address(),
            offset,
            layout: range.layout,
        })
    }

    /// Every universe buffer the snapshot requires.
    pub fn keys(&self) -> HashSet<UniverseAddress> {
        self.ranges.iter().map(MappingRange::address).collect()
    }

    /// The validated ranges, sorted by `from`.
    pub fn ranges(&self) -> &[MappingRange] {
        &self.ranges
    }

    /// Number of ranges in the snapshot.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Whether the snapshot maps nothing.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}
