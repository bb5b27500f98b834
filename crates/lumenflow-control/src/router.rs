//! Router core
//!
//! The router turns decoded color updates into universe buffer writes:
//! resolve each entity against the current mapping snapshot, group the
//! writes per universe, then take each buffer's lock exactly once per
//! update so the emitter can never observe a half-applied message.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::ehub::UpdateMessage;
use crate::snapshot::SnapshotCell;
use lumenflow_core::{
    ChannelLayout, ColorSample, MappingSnapshot, RouterStats, UniverseAddress, UniverseBuffer,
    MAX_LAYOUT_SLOTS,
};

/// Shared registry of live universe buffers.
///
/// Buffers appear lazily on the first write after a mapping swap and are
/// garbage-collected by the control plane when a new snapshot no longer
/// references them. Each buffer carries its own lock; there is no global
/// lock on the write or emit path.
#[derive(Debug, Default)]
pub struct UniverseTable {
    buffers: RwLock<HashMap<UniverseAddress, Arc<Mutex<UniverseBuffer>>>>,
}

impl UniverseTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The buffer for `address`, created zeroed if absent.
    pub fn get_or_create(&self, address: UniverseAddress) -> Arc<Mutex<UniverseBuffer>> {
        if let Some(buffer) = self.buffers.read().get(&address) {
            return buffer.clone();
        }
        self.buffers
            .write()
            .entry(address)
            .or_insert_with(|| Arc::new(Mutex::new(UniverseBuffer::new(address))))
            .clone()
    }

    /// The buffer for `address`, if it exists.
    pub fn get(&self, address: UniverseAddress) -> Option<Arc<Mutex<UniverseBuffer>>> {
        self.buffers.read().get(&address).cloned()
    }

    /// Collect all live addresses into `out`, sorted for a deterministic
    /// emit order. Reuses the caller's allocation.
    pub fn collect_addresses(&self, out: &mut Vec<UniverseAddress>) {
        out.clear();
        out.extend(self.buffers.read().keys().copied());
        out.sort_unstable();
    }

    /// Drop every buffer the active mapping no longer references.
    pub fn retain(&self, keys: &std::collections::HashSet<UniverseAddress>) {
        self.buffers
            .write()
            .retain(|address, _| keys.contains(address));
    }

    /// Drop all buffers.
    pub fn clear(&self) {
        self.buffers.write().clear();
    }

    /// Number of live buffers.
    pub fn len(&self) -> usize {
        self.buffers.read().len()
    }

    /// Whether the table holds no buffers.
    pub fn is_empty(&self) -> bool {
        self.buffers.read().is_empty()
    }
}

struct PendingWrite {
    offset: usize,
    layout: ChannelLayout,
    color: ColorSample,
}

// Writes of one update grouped by destination buffer; the groups and
// their inner vectors are reused across updates, so steady-state routing
// does not allocate.
struct WriteGroup {
    address: UniverseAddress,
    writes: Vec<PendingWrite>,
}

/// Applies decoded updates to universe buffers.
///
/// Owned by the single router task; the mapping pointer is read once per
/// message, so a snapshot swap lands exactly between two updates.
pub struct Router {
    mapping: Arc<SnapshotCell<MappingSnapshot>>,
    universes: Arc<UniverseTable>,
    stats: Arc<RouterStats>,
    groups: Vec<WriteGroup>,
    active_groups: usize,
}

impl Router {
    /// Create a router over the shared mapping pointer and buffer table.
    pub fn new(
        mapping: Arc<SnapshotCell<MappingSnapshot>>,
        universes: Arc<UniverseTable>,
        stats: Arc<RouterStats>,
    ) -> Self {
        Self {
            mapping,
            universes,
            stats,
            groups: Vec::new(),
            active_groups: 0,
        }
    }

    /// Apply one update message.
    ///
    /// Entities apply in sender order; the last write to any DMX byte
    /// wins. Unmapped ids are counted and skipped.
    pub fn apply_update(&mut self, message: &UpdateMessage) {
        let mapping = self.mapping.load();

        self.active_groups = 0;
        let mut unmapped = 0u64;

        for entity in &message.entities {
            let Some(resolved) = mapping.resolve(entity.id) else {
                unmapped += 1;
                continue;
            };
            self.group_for(resolved.address).writes.push(PendingWrite {
                offset: resolved.offset,
                layout: resolved.layout,
                color: entity.color,
            });
        }

        if unmapped > 0 {
            self.stats.record_unmapped(unmapped);
            tracing::debug!(unmapped, "update referenced unmapped entities");
        }

        let mut scratch = [0u8; MAX_LAYOUT_SLOTS];
        for group in &self.groups[..self.active_groups] {
            let buffer = self.universes.get_or_create(group.address);
            let mut guard = buffer.lock();
            for write in &group.writes {
                let bytes = write.layout.project(write.color, &mut scratch);
                guard.write_slice(write.offset, bytes);
            }
        }
    }

    // The write group for `address`, reusing a spent group's allocation
    // when possible.
    fn group_for(&mut self, address: UniverseAddress) -> &mut WriteGroup {
        let active = self.active_groups;
        if let Some(idx) = self.groups[..active]
            .iter()
            .position(|group| group.address == address)
        {
            return &mut self.groups[idx];
        }

        if active < self.groups.len() {
            self.groups[active].address = address;
            self.groups[active].writes.clear();
        } else {
            self.groups.push(WriteGroup {
                address,
                writes: Vec::new(),
            });
        }
        self.active_groups += 1;
        &mut self.groups[active]
    }
}
