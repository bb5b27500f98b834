//! LumenFlow - Real-time eHuB → ArtNet lighting router
//!
//! Loads a JSON configuration (mapping list, patch list, runtime
//! options), validates it into snapshots and runs the routing engine
//! until interrupted.

mod logging_setup;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error, info, warn};

use lumenflow_control::{Engine, RouterEvent};
use lumenflow_core::RouterConfig;

#[derive(Parser)]
#[command(name = "lumenflow")]
#[command(version)]
#[command(about = "Real-time eHuB to ArtNet lighting router")]
#[command(long_about = "LumenFlow routes per-entity color updates from an \
eHuB show-control feed to ArtNet DMX controllers.

EXAMPLES:
    lumenflow config.json                     Run with a configuration file
    lumenflow config.json --listen-port 9000  Override the eHuB listen port
    RUST_LOG=debug lumenflow config.json      Verbose logging")]
struct Cli {
    /// Path to the JSON configuration file.
    config: PathBuf,

    /// Override the configured eHuB listen port.
    #[arg(long)]
    listen_port: Option<u16>,

    /// Log level when RUST_LOG is unset (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Seconds between counter summaries in the log (0 disables).
    #[arg(long, default_value_t = 30)]
    stats_interval: u64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging_setup::init(&cli.log_level)?;

    info!("=== LumenFlow router starting ===");

    let raw = std::fs::read_to_string(&cli.config)
        .with_context(|| format!("cannot read configuration file {:?}", cli.config))?;
    let mut config: RouterConfig = serde_json::from_str(&raw)
        .with_context(|| format!("cannot parse configuration file {:?}", cli.config))?;

    if let Some(port) = cli.listen_port {
        config.options.listen_port = port;
    }

    let mapping = config
        .mapping_snapshot()
        .context("mapping configuration rejected")?;
    let patch = config
        .patch_snapshot()
        .context("patch configuration rejected")?;

    info!(
        ranges = mapping.len(),
        universes = mapping.keys().len(),
        patch_rules = patch.rules().len(),
        patch_enabled = patch.enabled(),
        "configuration loaded"
    );

    let mut engine = Engine::new(config.options.clone());
    let observer = engine.subscribe();
    engine
        .start(mapping, patch)
        .context("failed to start the router")?;
    if let Some(addr) = engine.local_addr() {
        info!(%addr, "listening for eHuB messages");
    }

    // Log the structured event feed; the counters already aggregate, so
    // per-packet events stay at debug level.
    let feed_handle = thread::spawn(move || {
        for event in observer.iter() {
            match event {
                RouterEvent::Fatal { kind } => {
                    error!(?kind, "router hit a fatal error");
                }
                RouterEvent::SendFailed { address } => {
                    warn!(%address, "ArtNet send failed");
                }
                RouterEvent::BackpressureDrop => {
                    warn!("ingest queue overflowed, oldest message dropped");
                }
                RouterEvent::Stopped => break,
                event => debug!(?event, "router event"),
            }
        }
    });

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || {
            running.store(false, Ordering::Relaxed);
        })
        .context("cannot install the shutdown handler")?;
    }

    let stats_interval = Duration::from_secs(cli.stats_interval);
    let mut last_stats = Instant::now();
    while running.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(200));
        if !stats_interval.is_zero() && last_stats.elapsed() >= stats_interval {
            let stats = engine.stats();
            info!(
                decoded = stats.messages_decoded,
                sent = stats.packets_sent,
                malformed = stats.malformed_inputs,
                unmapped = stats.unmapped_entities,
                dropped = stats.backpressure_drops,
                send_failures = stats.send_failures,
                "pipeline counters"
            );
            last_stats = Instant::now();
        }
    }

    info!("shutting down");
    engine.stop().context("failed to stop the router")?;
    if feed_handle.join().is_err() {
        error!("event feed thread panicked");
    }

    let stats = engine.stats();
    info!(
        decoded = stats.messages_decoded,
        sent = stats.packets_sent,
        malformed = stats.malformed_inputs,
        unmapped = stats.unmapped_entities,
        "final counters"
    );

    Ok(())
}
