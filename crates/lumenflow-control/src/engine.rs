//! Control plane
//!
//! The [`Engine`] is the root of all runtime state: it owns the receiver,
//! router and emitter threads, the universe buffer table, the snapshot
//! pointers and the event bus. Everything else receives explicit handles;
//! there is no global state.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, select, Receiver, Sender, TrySendError};

use crate::artnet::ArtNetSocket;
use crate::ehub::{self, DecodedMessage, MAX_DATAGRAM_SIZE};
use crate::emitter::Emitter;
use crate::error::{ControlError, Result};
use crate::events::{EventBus, FatalKind, RouterEvent};
use crate::router::{Router, UniverseTable};
use crate::snapshot::SnapshotCell;
use lumenflow_core::{MappingSnapshot, PatchSnapshot, RouterOptions, RouterStats, StatsSnapshot};

// How long a blocking socket read may hold the receiver thread before it
// re-checks the shutdown flag; bounds stop() latency.
const SOCKET_POLL_INTERVAL: Duration = Duration::from_millis(100);

struct Workers {
    shutdown: Arc<AtomicBool>,
    stop_tx: Sender<()>,
    handles: Vec<JoinHandle<()>>,
}

/// The routing pipeline's control plane.
///
/// Snapshots handed to [`Engine::start`], [`Engine::swap_mapping`] and
/// [`Engine::swap_patch`] are validated by construction
/// ([`MappingSnapshot::validate`] / [`PatchSnapshot::validate`]); a
/// rejected snapshot never reaches the engine, so the previously
/// published one stays active.
pub struct Engine {
    options: RouterOptions,
    mapping: Arc<SnapshotCell<MappingSnapshot>>,
    patch: Arc<SnapshotCell<PatchSnapshot>>,
    patch_enabled: Arc<AtomicBool>,
    universes: Arc<UniverseTable>,
    stats: Arc<RouterStats>,
    events: Arc<EventBus>,
    workers: Option<Workers>,
    local_addr: Option<SocketAddr>,
}

impl Engine {
    /// Create a stopped engine with the given runtime options.
    pub fn new(options: RouterOptions) -> Self {
        let events = Arc::new(EventBus::new(options.observer_queue_capacity));
        Self {
            options,
            mapping: Arc::new(SnapshotCell::new(MappingSnapshot::empty())),
            patch: Arc::new(SnapshotCell::new(PatchSnapshot::empty())),
            patch_enabled: Arc::new(AtomicBool::new(false)),
            universes: Arc::new(UniverseTable::new()),
            stats: Arc::new(RouterStats::new()),
            events,
            workers: None,
            local_addr: None,
        }
    }

    /// The options the engine runs with.
    pub fn options(&self) -> &RouterOptions {
        &self.options
    }

    /// Whether the worker threads are up.
    pub fn is_running(&self) -> bool {
        self.workers.is_some()
    }

    /// The eHuB socket's bound address while running. Useful when the
    /// configured listen port is 0 and the OS picked one.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Register an observer and return its event queue.
    pub fn subscribe(&self) -> Receiver<RouterEvent> {
        self.events.subscribe()
    }

    /// Point-in-time copy of the pipeline counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Number of live universe buffers.
    pub fn universe_count(&self) -> usize {
        self.universes.len()
    }

    /// Whether the emitter currently applies the patch.
    pub fn patch_enabled(&self) -> bool {
        self.patch_enabled.load(Ordering::Relaxed)
    }

    /// Publish a new mapping snapshot and drop orphaned universe buffers.
    ///
    /// Visible to the router before it picks up its next message; an
    /// update already in flight finishes against the old snapshot.
    pub fn swap_mapping(&self, mapping: MappingSnapshot) {
        let keys = mapping.keys();
        let ranges = mapping.len();
        self.mapping.store(mapping);
        self.universes.retain(&keys);
        self.events.publish(RouterEvent::MappingSwapped { ranges });
        tracing::info!(ranges, universes = keys.len(), "mapping snapshot swapped");
    }

    /// Publish a new patch snapshot; its `enabled` flag re-seeds the
    /// runtime toggle.
    pub fn swap_patch(&self, patch: PatchSnapshot) {
        let rules = patch.rules().len();
        let enabled = patch.enabled();
        self.patch_enabled.store(enabled, Ordering::Relaxed);
        self.patch.store(patch);
        self.events
            .publish(RouterEvent::PatchSwapped { rules, enabled });
        tracing::info!(rules, enabled, "patch snapshot swapped");
    }

    /// Toggle patch application without swapping the snapshot.
    pub fn set_patch_enabled(&self, enabled: bool) {
        self.patch_enabled.store(enabled, Ordering::Relaxed);
        self.events.publish(RouterEvent::PatchEnabled { enabled });
        tracing::info!(enabled, "patch toggled");
    }

    /// Bind the eHuB socket and start the receiver, router and emitter
    /// threads with the given snapshots.
    pub fn start(&mut self, mapping: MappingSnapshot, patch: PatchSnapshot) -> Result<()> {
        if self.workers.is_some() {
            return Err(ControlError::AlreadyRunning);
        }

        self.patch_enabled.store(patch.enabled(), Ordering::Relaxed);
        self.mapping.store(mapping);
        self.patch.store(patch);

        let socket =
            UdpSocket::bind((self.options.listen_address, self.options.listen_port))?;
        socket.set_read_timeout(Some(SOCKET_POLL_INTERVAL))?;
        self.local_addr = Some(socket.local_addr()?);
        let artnet = ArtNetSocket::new(self.options.artnet_port)?;

        let (data_tx, data_rx) = bounded::<Vec<u8>>(self.options.ingest_queue_capacity.max(1));
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut handles = Vec::with_capacity(3);

        {
            let data_rx = data_rx.clone();
            let shutdown = shutdown.clone();
            let stats = self.stats.clone();
            let events = self.events.clone();
            handles.push(
                thread::Builder::new()
                    .name("lumenflow-recv".into())
                    .spawn(move || {
                        receive_loop(socket, data_tx, data_rx, shutdown, stats, events)
                    })?,
            );
        }

        {
            let router = Router::new(
                self.mapping.clone(),
                self.universes.clone(),
                self.stats.clone(),
            );
            let stop_rx = stop_rx.clone();
            let stats = self.stats.clone();
            let events = self.events.clone();
            let filter = self.options.filter_universe;
            handles.push(
                thread::Builder::new()
                    .name("lumenflow-route".into())
                    .spawn(move || route_loop(data_rx, stop_rx, router, stats, events, filter))?,
            );
        }

        {
            let emitter = Emitter::new(
                self.universes.clone(),
                self.patch.clone(),
                self.patch_enabled.clone(),
                artnet,
                self.stats.clone(),
                self.events.clone(),
                self.options.max_pps,
                Duration::from_millis(self.options.per_universe_min_interval_ms),
            );
            let interval = Duration::from_millis(self.options.emit_interval_ms.max(1));
            let shutdown = shutdown.clone();
            let events = self.events.clone();
            handles.push(
                thread::Builder::new()
                    .name("lumenflow-emit".into())
                    .spawn(move || emit_loop(emitter, interval, stop_rx, shutdown, events))?,
            );
        }

        self.workers = Some(Workers {
            shutdown,
            stop_tx,
            handles,
        });
        self.events.publish(RouterEvent::Started);
        tracing::info!(
            listen = %self.options.listen_address,
            port = self.options.listen_port,
            "router started"
        );
        Ok(())
    }

    /// Stop all tasks: drain in-flight work, close the sockets, release
    /// the universe buffers.
    pub fn stop(&mut self) -> Result<()> {
        let Some(workers) = self.workers.take() else {
            return Err(ControlError::NotRunning);
        };

        workers.shutdown.store(true, Ordering::Relaxed);
        // Dropping the stop sender wakes the router and emitter selects.
        drop(workers.stop_tx);
        for handle in workers.handles {
            if handle.join().is_err() {
                tracing::error!("worker thread panicked during shutdown");
            }
        }

        self.universes.clear();
        self.local_addr = None;
        self.events.publish(RouterEvent::Stopped);
        tracing::info!("router stopped");
        Ok(())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if self.workers.is_some() {
            let _ = self.stop();
        }
    }
}

fn receive_loop(
    socket: UdpSocket,
    data_tx: Sender<Vec<u8>>,
    data_rx: Receiver<Vec<u8>>,
    shutdown: Arc<AtomicBool>,
    stats: Arc<RouterStats>,
    events: Arc<EventBus>,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

    while !shutdown.load(Ordering::Relaxed) {
        match socket.recv_from(&mut buf) {
            Ok((len, _source)) => {
                // A fill-length read means the datagram was truncated at
                // the 64 KiB cap; reject it before parsing anything.
                if len >= buf.len() {
                    stats.record_malformed();
                    events.publish(RouterEvent::MalformedInput {
                        kind: crate::ehub::DecodeErrorKind::Oversized,
                    });
                    continue;
                }
                let datagram = buf[..len].to_vec();
                if let Err(TrySendError::Full(datagram)) = data_tx.try_send(datagram) {
                    // Bounded queue: drop the oldest entry, keep the new one.
                    let _ = data_rx.try_recv();
                    stats.record_backpressure_drop();
                    events.publish(RouterEvent::BackpressureDrop);
                    let _ = data_tx.try_send(datagram);
                }
            }
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                ) =>
            {
                continue;
            }
            Err(err) => {
                // Fatal: take the whole pipeline down. Dropping data_tx
                // stops the router; the flag stops the emitter.
                tracing::error!(error = %err, "eHuB socket failed");
                events.publish(RouterEvent::Fatal {
                    kind: FatalKind::Socket,
                });
                shutdown.store(true, Ordering::Relaxed);
                break;
            }
        }
    }
}

fn route_loop(
    data_rx: Receiver<Vec<u8>>,
    stop_rx: Receiver<()>,
    mut router: Router,
    stats: Arc<RouterStats>,
    events: Arc<EventBus>,
    filter: Option<u16>,
) {
    loop {
        select! {
            recv(data_rx) -> datagram => match datagram {
                Ok(datagram) => {
                    handle_datagram(&datagram, &mut router, &stats, &events, filter);
                }
                // Receiver gone; nothing more will arrive.
                Err(_) => break,
            },
            recv(stop_rx) -> _ => {
                // Drain what the receiver already queued before exiting.
                while let Ok(datagram) = data_rx.try_recv() {
                    handle_datagram(&datagram, &mut router, &stats, &events, filter);
                }
                break;
            }
        }
    }
}

fn handle_datagram(
    datagram: &[u8],
    router: &mut Router,
    stats: &RouterStats,
    events: &EventBus,
    filter: Option<u16>,
) {
    match ehub::decode(datagram) {
        Ok(message) => {
            stats.record_decoded();
            events.publish(RouterEvent::MessageDecoded {
                kind: message.kind(),
                universe: message.universe(),
                entities: message.entity_count(),
            });

            // The mapping stays authoritative for routing; the message's
            // universe field only feeds the optional filter.
            if let (Some(filter), Some(universe)) = (filter, message.universe()) {
                if universe != filter {
                    stats.record_filtered();
                    return;
                }
            }

            match message {
                DecodedMessage::Update(update) => router.apply_update(&update),
                // Config messages carry metadata for observers only.
                DecodedMessage::Config(config) => {
                    events.publish(RouterEvent::ConfigReceived {
                        universe: config.universe,
                        entities: config.entities,
                    });
                }
            }
        }
        Err(err) => {
            stats.record_malformed();
            events.publish(RouterEvent::MalformedInput { kind: err.kind() });
            tracing::debug!(error = %err, "dropped malformed datagram");
        }
    }
}

fn emit_loop(
    mut emitter: Emitter,
    interval: Duration,
    stop_rx: Receiver<()>,
    shutdown: Arc<AtomicBool>,
    events: Arc<EventBus>,
) {
    let ticker = crossbeam_channel::tick(interval);
    loop {
        select! {
            recv(ticker) -> tick => match tick {
                Ok(_) => {
                    if shutdown.load(Ordering::Relaxed) {
                        break;
                    }
                    emitter.tick(Instant::now());
                }
                Err(_) => {
                    events.publish(RouterEvent::Fatal { kind: FatalKind::Timer });
                    break;
                }
            },
            recv(stop_rx) -> _ => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn local_options() -> RouterOptions {
        RouterOptions {
            listen_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            // Port 0: let the OS pick, the test does not send anything.
            listen_port: 0,
            ..RouterOptions::default()
        }
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let mut engine = Engine::new(local_options());
        engine
            .start(MappingSnapshot::empty(), PatchSnapshot::empty())
            .unwrap();

        let err = engine
            .start(MappingSnapshot::empty(), PatchSnapshot::empty())
            .unwrap_err();
        assert!(matches!(err, ControlError::AlreadyRunning));

        engine.stop().unwrap();
    }

    #[test]
    fn test_stop_without_start_is_rejected() {
        let mut engine = Engine::new(local_options());
        let err = engine.stop().unwrap_err();
        assert!(matches!(err, ControlError::NotRunning));
    }

    #[test]
    fn test_lifecycle_events_reach_observers() {
        let mut engine = Engine::new(local_options());
        let observer = engine.subscribe();

        engine
            .start(MappingSnapshot::empty(), PatchSnapshot::empty())
            .unwrap();
        engine.stop().unwrap();

        let events: Vec<_> = observer.try_iter().collect();
        assert!(events.contains(&RouterEvent::Started));
        assert!(events.contains(&RouterEvent::Stopped));
    }

    #[test]
    fn test_patch_toggle_without_swap() {
        let engine = Engine::new(local_options());
        assert!(!engine.patch_enabled());

        engine.set_patch_enabled(true);
        assert!(engine.patch_enabled());

        engine.set_patch_enabled(false);
        assert!(!engine.patch_enabled());
    }

    #[test]
    fn test_swap_patch_reseeds_toggle() {
        let engine = Engine::new(local_options());
        engine.set_patch_enabled(true);

        engine.swap_patch(PatchSnapshot::empty());
        // empty() is disabled; the swap re-seeds the toggle.
        assert!(!engine.patch_enabled());
    }
}
