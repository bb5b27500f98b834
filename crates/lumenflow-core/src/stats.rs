//! Pipeline counters
//!
//! Every error kind the router can hit is counted here with relaxed
//! atomics, so the hot path records failures without locks or
//! allocation. [`RouterStats::snapshot`] takes a point-in-time copy for
//! display or the event feed.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Lock-free counters shared by the receiver, router and emitter tasks.
#[derive(Debug, Default)]
pub struct RouterStats {
    messages_decoded: AtomicU64,
    malformed_inputs: AtomicU64,
    unmapped_entities: AtomicU64,
    filtered_messages: AtomicU64,
    backpressure_drops: AtomicU64,
    packets_sent: AtomicU64,
    send_failures: AtomicU64,
}

impl RouterStats {
    /// Fresh, zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// An inbound datagram decoded successfully.
    pub fn record_decoded(&self) {
        self.messages_decoded.fetch_add(1, Ordering::Relaxed);
    }

    /// An inbound datagram was rejected by the decoder.
    pub fn record_malformed(&self) {
        self.malformed_inputs.fetch_add(1, Ordering::Relaxed);
    }

    /// An update referenced entity ids outside the active mapping.
    pub fn record_unmapped(&self, count: u64) {
        self.unmapped_entities.fetch_add(count, Ordering::Relaxed);
    }

    /// A message was dropped by the universe filter.
    pub fn record_filtered(&self) {
        self.filtered_messages.fetch_add(1, Ordering::Relaxed);
    }

    /// The receiver→router queue overflowed and dropped its oldest entry.
    pub fn record_backpressure_drop(&self) {
        self.backpressure_drops.fetch_add(1, Ordering::Relaxed);
    }

    /// An ArtNet packet left the socket.
    pub fn record_packet_sent(&self) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// An outbound send failed.
    pub fn record_send_failure(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            messages_decoded: self.messages_decoded.load(Ordering::Relaxed),
            malformed_inputs: self.malformed_inputs.load(Ordering::Relaxed),
            unmapped_entities: self.unmapped_entities.load(Ordering::Relaxed),
            filtered_messages: self.filtered_messages.load(Ordering::Relaxed),
            backpressure_drops: self.backpressure_drops.load(Ordering::Relaxed),
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`RouterStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Datagrams decoded into typed messages.
    pub messages_decoded: u64,
    /// Datagrams rejected as malformed or oversized.
    pub malformed_inputs: u64,
    /// Entity ids that resolved to no mapping range.
    pub unmapped_entities: u64,
    /// Messages dropped by the universe filter.
    pub filtered_messages: u64,
    /// Messages dropped because the ingest queue was full.
    pub backpressure_drops: u64,
    /// ArtNet packets emitted.
    pub packets_sent: u64,
    /// Outbound sends that errored.
    pub send_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let stats = RouterStats::new();
        stats.record_decoded();
        stats.record_decoded();
        stats.record_unmapped(3);
        stats.record_send_failure();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.messages_decoded, 2);
        assert_eq!(snapshot.unmapped_entities, 3);
        assert_eq!(snapshot.send_failures, 1);
        assert_eq!(snapshot.malformed_inputs, 0);
    }
}
