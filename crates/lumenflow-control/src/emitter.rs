//! Emitter and rate limiter
//!
//! The emitter runs on a fixed cadence and drains dirty universes into
//! ArtDmx packets. Coalescing falls out of the dirty flag: however many
//! updates landed in a tick, a universe is sent at most once per tick.
//! A global packets-per-second bucket and an optional per-universe
//! minimum interval bound the outbound rate; universes deferred by the
//! bucket are picked up first on the next tick (round-robin cursor), so
//! none starves under sustained pressure.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::artnet::{encode_artdmx, ArtNetSocket, ARTDMX_PACKET_SIZE};
use crate::events::{EventBus, RouterEvent};
use crate::router::UniverseTable;
use crate::snapshot::SnapshotCell;
use lumenflow_core::{PatchSnapshot, RouterStats, UniverseAddress};

/// Global packets-per-second budget.
///
/// Tokens replenish in whole-second quanta: when a second has passed
/// since the window opened, the bucket refills completely. An aligned
/// one-second window therefore never carries more sends than the budget.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: u32,
    tokens: u32,
    window_start: Instant,
}

impl TokenBucket {
    /// A bucket allowing `capacity` sends per second.
    pub fn new(capacity: u32, now: Instant) -> Self {
        Self {
            capacity: capacity.max(1),
            tokens: capacity.max(1),
            window_start: now,
        }
    }

    /// Take one token if the budget allows.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        if now.duration_since(self.window_start) >= Duration::from_secs(1) {
            self.tokens = self.capacity;
            self.window_start = now;
        }
        if self.tokens > 0 {
            self.tokens -= 1;
            true
        } else {
            false
        }
    }

    /// Tokens left in the current window.
    pub fn remaining(&self) -> u32 {
        self.tokens
    }
}

/// Drains dirty universes to ArtNet on each tick.
pub struct Emitter {
    universes: Arc<UniverseTable>,
    patch: Arc<SnapshotCell<PatchSnapshot>>,
    patch_enabled: Arc<AtomicBool>,
    socket: ArtNetSocket,
    stats: Arc<RouterStats>,
    events: Arc<EventBus>,
    bucket: TokenBucket,
    min_interval: Duration,
    last_sent: HashMap<UniverseAddress, Instant>,
    // Reused scratch: live addresses in emit order, and the outgoing packet.
    order: Vec<UniverseAddress>,
    cursor: usize,
    packet: [u8; ARTDMX_PACKET_SIZE],
}

impl Emitter {
    /// Create an emitter over the shared buffer table and patch pointer.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        universes: Arc<UniverseTable>,
        patch: Arc<SnapshotCell<PatchSnapshot>>,
        patch_enabled: Arc<AtomicBool>,
        socket: ArtNetSocket,
        stats: Arc<RouterStats>,
        events: Arc<EventBus>,
        max_pps: u32,
        min_interval: Duration,
    ) -> Self {
        Self {
            universes,
            patch,
            patch_enabled,
            socket,
            stats,
            events,
            bucket: TokenBucket::new(max_pps, Instant::now()),
            min_interval,
            last_sent: HashMap::new(),
            order: Vec::new(),
            cursor: 0,
            packet: [0; ARTDMX_PACKET_SIZE],
        }
    }

    /// One emitter tick: walk the live universes round-robin from the
    /// cursor and send every dirty one the budget allows.
    pub fn tick(&mut self, now: Instant) {
        self.universes.collect_addresses(&mut self.order);
        if self.order.is_empty() {
            return;
        }

        let patch = self.patch.load();
        let patch_on = self.patch_enabled.load(Ordering::Relaxed);

        let count = self.order.len();
        let start = self.cursor % count;

        for step in 0..count {
            let idx = (start + step) % count;
            let address = self.order[idx];

            if !self.min_interval.is_zero() {
                if let Some(&last) = self.last_sent.get(&address) {
                    if now.duration_since(last) < self.min_interval {
                        // Stays dirty and coalesces into a later tick.
                        continue;
                    }
                }
            }

            let Some(buffer) = self.universes.get(address) else {
                continue;
            };

            let mut guard = buffer.lock();
            if !guard.is_dirty() {
                continue;
            }
            if !self.bucket.try_acquire(now) {
                // Budget exhausted: everything from here stays dirty and
                // is served first next tick.
                self.cursor = idx;
                return;
            }
            let Some((mut frame, sequence)) = guard.take_frame() else {
                continue;
            };
            drop(guard);

            if patch_on {
                patch.apply(address.universe, &mut frame);
            }

            encode_artdmx(&mut self.packet, address.universe, sequence, &frame);
            match self.socket.send(address.controller, &self.packet) {
                Ok(()) => {
                    self.stats.record_packet_sent();
                    self.events
                        .publish(RouterEvent::PacketSent { address, sequence });
                }
                Err(err) => {
                    // Fire-and-forget: count it, do not re-dirty; the next
                    // update refreshes the frame anyway.
                    self.stats.record_send_failure();
                    self.events.publish(RouterEvent::SendFailed { address });
                    tracing::warn!(%address, error = %err, "ArtNet send failed");
                }
            }
            self.last_sent.insert(address, now);
        }

        self.cursor = start;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::UdpSocket;

    #[test]
    fn test_bucket_grants_up_to_capacity() {
        let start = Instant::now();
        let mut bucket = TokenBucket::new(3, start);

        assert!(bucket.try_acquire(start));
        assert!(bucket.try_acquire(start));
        assert!(bucket.try_acquire(start));
        assert!(!bucket.try_acquire(start));
        assert_eq!(bucket.remaining(), 0);
    }

    #[test]
    fn test_bucket_refills_after_a_second() {
        let start = Instant::now();
        let mut bucket = TokenBucket::new(2, start);

        assert!(bucket.try_acquire(start));
        assert!(bucket.try_acquire(start));
        assert!(!bucket.try_acquire(start + Duration::from_millis(999)));

        assert!(bucket.try_acquire(start + Duration::from_secs(1)));
        assert!(bucket.try_acquire(start + Duration::from_secs(1)));
        assert!(!bucket.try_acquire(start + Duration::from_secs(1)));
    }

    #[test]
    fn test_bucket_never_exceeds_capacity_per_window() {
        let start = Instant::now();
        let mut bucket = TokenBucket::new(5, start);

        // Simulate 40 ticks over one second, all hungry.
        let mut granted = 0;
        for tick in 0..40 {
            let now = start + Duration::from_millis(25 * tick);
            while bucket.try_acquire(now) {
                granted += 1;
            }
        }
        assert_eq!(granted, 5);
    }

    #[test]
    fn test_zero_capacity_is_clamped_to_one() {
        let start = Instant::now();
        let mut bucket = TokenBucket::new(0, start);
        assert!(bucket.try_acquire(start));
        assert!(!bucket.try_acquire(start));
    }

    // Emitter-level behavior is covered end-to-end in tests/pipeline_tests.rs;
    // here we only pin the tick-local coalescing contract.
    #[test]
    fn test_tick_sends_each_dirty_universe_once() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_millis(200)))
            .unwrap();
        let port = receiver.local_addr().unwrap().port();

        let universes = Arc::new(UniverseTable::new());
        let address = UniverseAddress::new("127.0.0.1".parse().unwrap(), 0);
        {
            let buffer = universes.get_or_create(address);
            let mut guard = buffer.lock();
            guard.write_slice(0, &[255, 0, 0]);
            guard.write_slice(0, &[0, 255, 0]);
        }

        let mut emitter = Emitter::new(
            universes,
            Arc::new(SnapshotCell::new(PatchSnapshot::empty())),
            Arc::new(AtomicBool::new(false)),
            ArtNetSocket::new(port).unwrap(),
            Arc::new(RouterStats::new()),
            Arc::new(EventBus::new(8)),
            1000,
            Duration::ZERO,
        );

        let now = Instant::now();
        emitter.tick(now);
        // Clean after the first tick; the second must send nothing.
        emitter.tick(now + Duration::from_millis(25));

        let mut buf = [0u8; 1024];
        let (len, _) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(len, ARTDMX_PACKET_SIZE);
        // Coalesced payload is the last applied write.
        assert_eq!(&buf[18..21], &[0, 255, 0]);
        assert_eq!(buf[12], 1);

        assert!(receiver.recv_from(&mut buf).is_err());
    }

    #[test]
    fn test_per_universe_min_interval_defers_sends() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_millis(200)))
            .unwrap();
        let port = receiver.local_addr().unwrap().port();

        let universes = Arc::new(UniverseTable::new());
        let address = UniverseAddress::new("127.0.0.1".parse().unwrap(), 0);
        universes.get_or_create(address).lock().write_slice(0, &[1]);

        let mut emitter = Emitter::new(
            universes.clone(),
            Arc::new(SnapshotCell::new(PatchSnapshot::empty())),
            Arc::new(AtomicBool::new(false)),
            ArtNetSocket::new(port).unwrap(),
            Arc::new(RouterStats::new()),
            Arc::new(EventBus::new(8)),
            1000,
            Duration::from_millis(500),
        );

        let start = Instant::now();
        emitter.tick(start);

        // Dirty again immediately: inside the minimum interval, deferred.
        universes.get_or_create(address).lock().write_slice(0, &[2]);
        emitter.tick(start + Duration::from_millis(100));
        // Past the interval, the deferred frame goes out.
        emitter.tick(start + Duration::from_millis(600));

        let mut buf = [0u8; 1024];
        let (_, _) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(buf[18], 1);
        let (_, _) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(buf[18], 2);
        assert!(receiver.recv_from(&mut buf).is_err());
    }
}
