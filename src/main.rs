//! Pumphouse — main entry point.
//!
//! Wires the adapters to the control core and runs the poll loop. One
//! controller per process; everything it talks to goes through a port
//! trait, and all state transitions happen on this thread.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                   Adapters (outer ring)                  │
//! │                                                          │
//! │  MQTT feed / sim    Console      SysfsRelays   CSV file  │
//! │  (level channel)    (commands)   (RelayPort)   (sink)    │
//! │                                                          │
//! │  ─────────────── Port Trait Boundary ──────────────      │
//! │                                                          │
//! │  ┌────────────────────────────────────────────────┐      │
//! │  │        ManeuverController (pure logic)         │      │
//! │  │  Interlock · Schedule · History                │      │
//! │  └────────────────────────────────────────────────┘      │
//! └──────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::{info, warn};

use pumphouse::adapters::clock::SystemClock;
use pumphouse::adapters::csv_log::CsvHistorySink;
use pumphouse::adapters::gpio::SysfsRelays;
use pumphouse::adapters::log_sink::LogEventSink;
use pumphouse::adapters::{console, mqtt, sim};
use pumphouse::app::events::AppEvent;
use pumphouse::app::ports::{Clock, EventSink};
use pumphouse::config::SystemConfig;
use pumphouse::controller::ManeuverController;

/// Level updates the main loop may lag behind before the feed drops them.
const LEVEL_QUEUE_DEPTH: usize = 64;

/// Pending operator commands.
const COMMAND_QUEUE_DEPTH: usize = 8;

/// How often the retention policy is applied.
const PRUNE_INTERVAL: Duration = Duration::from_secs(6 * 3600);

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // ── 1. Configuration (fail fast on anything invalid) ──────
    let mut config_path = PathBuf::from("config.json");
    let mut demo = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--demo" => demo = true,
            path => config_path = PathBuf::from(path),
        }
    }
    let config = SystemConfig::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    info!(
        "pumphouse v{} — config {}",
        env!("CARGO_PKG_VERSION"),
        config_path.display()
    );

    // ── 2. Controller and adapters ────────────────────────────
    let clock = SystemClock;
    let mut controller =
        ManeuverController::new(config.clone()).context("constructing controller")?;
    let mut gpio = SysfsRelays::new(&[config.relay3_gpio, config.relay4_gpio]);
    // Fail-safe baseline before the first tick.
    controller.all_relays_off(&mut gpio);

    let mut sink = match CsvHistorySink::open(Path::new(&config.history_path), &config.site_label)
    {
        Ok(s) => Some(s),
        Err(e) => {
            warn!(
                "history file {} unavailable ({e}) — memory-only session",
                config.history_path
            );
            None
        }
    };
    let mut events = LogEventSink;

    // ── 3. Level feed and operator console ────────────────────
    let (level_tx, level_rx) = mpsc::sync_channel(LEVEL_QUEUE_DEPTH);
    let _feed = if demo {
        sim::spawn(level_tx, Duration::from_secs(config.poll_interval_s))
    } else {
        mqtt::spawn(&config, level_tx)
    };
    let (cmd_tx, cmd_rx) = mpsc::sync_channel(COMMAND_QUEUE_DEPTH);
    let _console = console::spawn(cmd_tx);

    // ── 4. Shutdown flag (SIGINT/SIGTERM) ─────────────────────
    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))
            .context("installing signal handler")?;
    }

    events.emit(&AppEvent::Started(controller.state()));

    // ── 5. Poll loop — the single consumer of both channels ───
    let tick_interval = Duration::from_secs(config.poll_interval_s);
    let mut last_prune = Instant::now();
    while running.load(Ordering::SeqCst) {
        while let Ok(update) = level_rx.try_recv() {
            controller.ingest(update.tank, update.raw_value, clock.now());
        }
        while let Ok(cmd) = cmd_rx.try_recv() {
            controller.handle_command(cmd, &clock, &mut gpio, &mut sink, &mut events);
        }
        controller.tick(&clock, &mut gpio, &mut sink, &mut events);

        if last_prune.elapsed() >= PRUNE_INTERVAL {
            let removed = controller.prune_history(clock.now());
            if removed > 0 {
                info!("pruned {removed} history records past retention");
            }
            last_prune = Instant::now();
        }

        thread::sleep(tick_interval);
    }

    // ── 6. Shutdown: relays off regardless of state ───────────
    info!("shutting down — de-energizing relays");
    controller.shutdown(&clock, &mut gpio, &mut sink, &mut events);
    if controller.history().persistence_degraded() {
        warn!("history persistence failed during this session — recent records were memory-only");
    }
    Ok(())
}
