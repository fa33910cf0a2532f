//! Maneuver state machine — the control core.
//!
//! [`ManeuverController`] owns the level cache, the relay pair, the history
//! store and the schedule bookkeeping, and is the only component that moves
//! the system between `Idle` and `Running`. Every transition happens inside
//! one of three entry points — `start_maneuver`, `stop_maneuver`, `tick` —
//! which the poll loop calls as the single consumer of a bounded command
//! queue, so transitions can never interleave.
//!
//! ```text
//!          interlock ok                 deadline / interlock fail
//!   Idle ───────────────▶ Running ───────────────────────────▶ Idle
//!     ▲                                                          │
//!     └───────────── record appended to history ◀────────────────┘
//! ```
//!
//! The auto-stop deadline is a field checked inside `tick()`; there is no
//! timer thread that could race a concurrent manual stop.

use chrono::{DateTime, Duration, Local, NaiveDate};
use log::{debug, info};

use crate::app::commands::Command;
use crate::app::events::AppEvent;
use crate::app::ports::{Clock, EventSink, HistorySink, RelayPort};
use crate::config::SystemConfig;
use crate::error::ConfigError;
use crate::history::{HistoryStore, ManeuverRecord, ManeuverType, StopReason};
use crate::monitor::{LevelMonitor, TankId, TankLevels};
use crate::relay::{RelayActuator, RelayId};
use crate::scheduler::{ScheduleState, Scheduler};

// ---------------------------------------------------------------------------
// State vocabulary
// ---------------------------------------------------------------------------

/// The controller is either idle or running exactly one maneuver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Running,
}

/// Result of a start request. A refusal is an outcome, not an error; the
/// reason string is the human-readable surface for the boundary layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartOutcome {
    pub started: bool,
    pub record_id: Option<u64>,
    pub reason: Option<&'static str>,
}

/// Status surface exposed upward to the dashboard/CLI layer.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub state: ControllerState,
    pub levels: TankLevels,
    pub relay3_active: bool,
    pub relay4_active: bool,
    pub next_scheduled_at: Option<DateTime<Local>>,
    pub last_operation_date: Option<NaiveDate>,
    pub last_maintenance_date: Option<NaiveDate>,
    pub history_count: usize,
    pub last_record: Option<ManeuverRecord>,
}

/// Verdict of one interlock evaluation. Low-threshold violations take
/// precedence over high, which take precedence over staleness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InterlockVerdict {
    Ok,
    LowLevel,
    HighLevel,
    Stale,
}

impl InterlockVerdict {
    fn stop_reason(self) -> Option<StopReason> {
        match self {
            Self::Ok => None,
            Self::LowLevel => Some(StopReason::LowLevel),
            Self::HighLevel => Some(StopReason::HighLevel),
            Self::Stale => Some(StopReason::SensorStale),
        }
    }

    fn refusal(self) -> &'static str {
        match self {
            Self::Ok => "",
            Self::LowLevel => "low tank at or below threshold",
            Self::HighLevel => "high tank at or above threshold",
            Self::Stale => "level data stale or missing",
        }
    }
}

/// The record-in-progress while `Running`.
#[derive(Debug, Clone, Copy)]
struct OpenManeuver {
    id: u64,
    kind: ManeuverType,
    start_time: DateTime<Local>,
    start_levels: TankLevels,
    deadline: DateTime<Local>,
}

// ---------------------------------------------------------------------------
// ManeuverController
// ---------------------------------------------------------------------------

pub struct ManeuverController {
    config: SystemConfig,
    scheduler: Scheduler,
    schedule: ScheduleState,
    monitor: LevelMonitor,
    relays: RelayActuator,
    history: HistoryStore,
    /// Invariant: `Some` iff state is `Running`; at most one open record.
    open: Option<OpenManeuver>,
    next_record_id: u64,
}

impl ManeuverController {
    /// Construct the controller from validated configuration. This is the
    /// only fatal path in the core: an invalid config must stop startup.
    pub fn new(config: SystemConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let scheduler = Scheduler::from_config(&config)?;
        let relays = RelayActuator::from_config(&config);
        Ok(Self {
            config,
            scheduler,
            schedule: ScheduleState::default(),
            monitor: LevelMonitor::new(),
            relays,
            history: HistoryStore::new(),
            open: None,
            next_record_id: 1,
        })
    }

    // ── Ingestion ─────────────────────────────────────────────

    /// Store a level update. Called by the poll loop as it drains the
    /// ingestion channel; the value is the raw 0..1 fraction from the feed.
    pub fn ingest(&mut self, tank: TankId, raw_value: f64, now: DateTime<Local>) {
        self.monitor.ingest(tank, raw_value, now);
    }

    // ── Maneuver lifecycle ────────────────────────────────────

    /// Attempt to start a maneuver.
    ///
    /// Running → `started = false`, no record (idempotent-safe, not an
    /// error). Interlock failure → a closed zero-duration record and
    /// `started = false`; the pump is never actuated. Otherwise the record
    /// opens, the relays are gated per tank, and the auto-stop deadline is
    /// armed.
    pub fn start_maneuver(
        &mut self,
        kind: ManeuverType,
        duration_override: Option<Duration>,
        clock: &impl Clock,
        gpio: &mut impl RelayPort,
        sink: &mut impl HistorySink,
        events: &mut impl EventSink,
    ) -> StartOutcome {
        let now = clock.now();

        if self.open.is_some() {
            debug!("start ignored: a maneuver is already running");
            return StartOutcome {
                started: false,
                record_id: None,
                reason: Some("a maneuver is already running"),
            };
        }

        let verdict = self.evaluate_interlock(kind, now);
        if verdict != InterlockVerdict::Ok {
            let snap = self.monitor.snapshot();
            let id = self.next_id();
            info!("{kind} maneuver #{id} blocked: {}", verdict.refusal());
            self.history.append(
                ManeuverRecord {
                    id,
                    start_time: now,
                    end_time: Some(now),
                    start_levels: snap,
                    end_levels: Some(snap),
                    kind,
                    started: false,
                    stop_reason: Some(StopReason::InterlockBlocked),
                },
                sink,
            );
            events.emit(&AppEvent::ManeuverBlocked {
                id,
                kind,
                reason: verdict.refusal(),
            });
            return StartOutcome {
                started: false,
                record_id: Some(id),
                reason: Some(verdict.refusal()),
            };
        }

        let snap = self.monitor.snapshot();
        let id = self.next_id();
        let duration = duration_override.unwrap_or_else(|| self.config.default_duration(kind));
        self.open = Some(OpenManeuver {
            id,
            kind,
            start_time: now,
            start_levels: snap,
            deadline: now + duration,
        });
        self.apply_gating(gpio, kind, snap);
        info!(
            "{kind} maneuver #{id} started (deadline in {}s)",
            duration.num_seconds()
        );
        events.emit(&AppEvent::ManeuverStarted { id, kind });
        StartOutcome {
            started: true,
            record_id: Some(id),
            reason: None,
        }
    }

    /// Close the running maneuver: relays off, record finalized and
    /// appended, schedule dates stamped. No-op (`false`) when idle.
    pub fn stop_maneuver(
        &mut self,
        reason: StopReason,
        clock: &impl Clock,
        gpio: &mut impl RelayPort,
        sink: &mut impl HistorySink,
        events: &mut impl EventSink,
    ) -> bool {
        let Some(open) = self.open.take() else {
            return false;
        };

        self.relays.all_off(gpio);
        let now = clock.now();
        let record = ManeuverRecord {
            id: open.id,
            start_time: open.start_time,
            end_time: Some(now),
            start_levels: open.start_levels,
            end_levels: Some(self.monitor.snapshot()),
            kind: open.kind,
            started: true,
            stop_reason: Some(reason),
        };
        let duration_min = record.duration_min().unwrap_or(0.0);
        self.history.append(record, sink);

        let today = now.date_naive();
        match open.kind {
            ManeuverType::Maintenance => self.schedule.last_maintenance_date = Some(today),
            _ => self.schedule.last_operation_date = Some(today),
        }

        info!(
            "{} maneuver #{} stopped ({reason}) after {duration_min:.1} min",
            open.kind, open.id
        );
        events.emit(&AppEvent::ManeuverStopped {
            id: open.id,
            kind: open.kind,
            reason,
            duration_min,
        });
        true
    }

    /// One poll cycle. The only place time-based and level-based auto-stop
    /// are evaluated, and the only source of automatic starts.
    pub fn tick(
        &mut self,
        clock: &impl Clock,
        gpio: &mut impl RelayPort,
        sink: &mut impl HistorySink,
        events: &mut impl EventSink,
    ) {
        let now = clock.now();

        if let Some((kind, deadline)) = self.open.as_ref().map(|o| (o.kind, o.deadline)) {
            if let Some(reason) = self.evaluate_interlock(kind, now).stop_reason() {
                self.stop_maneuver(reason, clock, gpio, sink, events);
                return;
            }
            if now >= deadline {
                self.stop_maneuver(StopReason::MaxDurationReached, clock, gpio, sink, events);
                return;
            }
            // Maintenance keeps both relays forced on; the automatic and
            // manual paths re-gate each relay from the current levels.
            if kind != ManeuverType::Maintenance {
                let snap = self.monitor.snapshot();
                self.apply_gating(gpio, kind, snap);
            }
            return;
        }

        // Idle: at most one automatic start per tick, scheduled first.
        let today = now.date_naive();
        let next = self
            .scheduler
            .next_scheduled_at(now, self.schedule.last_operation_date);
        self.schedule.next_scheduled_at = Some(next);

        if self
            .scheduler
            .is_due(now, next, self.schedule.last_operation_date)
            && self.schedule.last_scheduled_attempt != Some(today)
        {
            self.schedule.last_scheduled_attempt = Some(today);
            info!("daily transfer due");
            self.start_maneuver(ManeuverType::Scheduled, None, clock, gpio, sink, events);
        } else if self
            .scheduler
            .maintenance_due(today, self.schedule.last_maintenance_date)
            && self.schedule.last_maintenance_attempt != Some(today)
        {
            self.schedule.last_maintenance_attempt = Some(today);
            info!("maintenance cycle due");
            self.start_maneuver(ManeuverType::Maintenance, None, clock, gpio, sink, events);
        }
    }

    /// Process a boundary command on the control thread.
    pub fn handle_command(
        &mut self,
        cmd: Command,
        clock: &impl Clock,
        gpio: &mut impl RelayPort,
        sink: &mut impl HistorySink,
        events: &mut impl EventSink,
    ) {
        match cmd {
            Command::StartManual { duration_min } => {
                let outcome = self.start_maneuver(
                    ManeuverType::Manual,
                    duration_min.map(|m| Duration::minutes(i64::from(m))),
                    clock,
                    gpio,
                    sink,
                    events,
                );
                if !outcome.started {
                    info!(
                        "manual start rejected: {}",
                        outcome.reason.unwrap_or("unknown")
                    );
                }
            }
            Command::StartMaintenance => {
                let outcome = self.start_maneuver(
                    ManeuverType::Maintenance,
                    None,
                    clock,
                    gpio,
                    sink,
                    events,
                );
                if !outcome.started {
                    info!(
                        "maintenance start rejected: {}",
                        outcome.reason.unwrap_or("unknown")
                    );
                }
            }
            Command::Stop => {
                if !self.stop_maneuver(StopReason::ManualStop, clock, gpio, sink, events) {
                    info!("stop ignored: no maneuver running");
                }
            }
            Command::ShowStatus => self.log_status(),
            Command::ClearHistory => {
                self.history.clear();
                info!("history cleared");
            }
        }
    }

    /// Close any open maneuver and de-energize both relays. Called on
    /// process termination regardless of controller state.
    pub fn shutdown(
        &mut self,
        clock: &impl Clock,
        gpio: &mut impl RelayPort,
        sink: &mut impl HistorySink,
        events: &mut impl EventSink,
    ) {
        if self.open.is_some() {
            self.stop_maneuver(StopReason::Shutdown, clock, gpio, sink, events);
        }
        self.relays.all_off(gpio);
    }

    /// Fail-safe relay reset without touching controller state (used once
    /// at startup before the first tick).
    pub fn all_relays_off(&mut self, gpio: &mut impl RelayPort) {
        self.relays.all_off(gpio);
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> ControllerState {
        if self.open.is_some() {
            ControllerState::Running
        } else {
            ControllerState::Idle
        }
    }

    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            state: self.state(),
            levels: self.monitor.snapshot(),
            relay3_active: self.relays.state(RelayId::Relay3),
            relay4_active: self.relays.state(RelayId::Relay4),
            next_scheduled_at: self.schedule.next_scheduled_at,
            last_operation_date: self.schedule.last_operation_date,
            last_maintenance_date: self.schedule.last_maintenance_date,
            history_count: self.history.len(),
            last_record: self.history.last().cloned(),
        }
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Apply the retention policy. Returns how many records were removed.
    pub fn prune_history(&mut self, now: DateTime<Local>) -> usize {
        self.history.prune(now, self.config.retention())
    }

    // ── Internal ──────────────────────────────────────────────

    fn next_id(&mut self) -> u64 {
        let id = self.next_record_id;
        self.next_record_id += 1;
        id
    }

    /// Evaluate the interlock appropriate to the maneuver type.
    ///
    /// Maintenance uses the relaxed low bound and skips the freshness check
    /// unless `maintenance_requires_fresh` is set.
    fn evaluate_interlock(&mut self, kind: ManeuverType, now: DateTime<Local>) -> InterlockVerdict {
        let snap = self.monitor.snapshot();
        let low_bound = if kind == ManeuverType::Maintenance {
            self.config.maintenance_low_threshold_pct
        } else {
            self.config.low_threshold_pct
        };
        let need_fresh =
            kind != ManeuverType::Maintenance || self.config.maintenance_requires_fresh;

        match (snap.low_percent, snap.high_percent) {
            (Some(low), Some(high)) => {
                if low <= low_bound {
                    InterlockVerdict::LowLevel
                } else if high >= self.config.high_threshold_pct {
                    InterlockVerdict::HighLevel
                } else if need_fresh
                    && !self.monitor.check_fresh(now, self.config.stale_window())
                {
                    InterlockVerdict::Stale
                } else {
                    InterlockVerdict::Ok
                }
            }
            _ => InterlockVerdict::Stale,
        }
    }

    /// Command the relay pair for the given maneuver type: maintenance
    /// forces both on, the other types gate each relay by its own tank.
    fn apply_gating(&mut self, gpio: &mut impl RelayPort, kind: ManeuverType, snap: TankLevels) {
        if kind == ManeuverType::Maintenance {
            self.relays.set(gpio, RelayId::Relay3, true);
            self.relays.set(gpio, RelayId::Relay4, true);
        } else {
            let low_on = snap
                .low_percent
                .is_some_and(|l| l > self.config.low_threshold_pct);
            let high_on = snap
                .high_percent
                .is_some_and(|h| h < self.config.high_threshold_pct);
            self.relays.set(gpio, RelayId::Relay3, low_on);
            self.relays.set(gpio, RelayId::Relay4, high_on);
        }
    }

    fn log_status(&self) {
        let s = self.status();
        info!(
            "status: {:?} | low {} | high {} | relays {}/{} | next transfer {} | maneuvers {}",
            s.state,
            fmt_pct(s.levels.low_percent),
            fmt_pct(s.levels.high_percent),
            on_off(s.relay3_active),
            on_off(s.relay4_active),
            s.next_scheduled_at
                .map_or_else(|| "-".to_string(), |t| t.format("%d/%m/%Y %H:%M").to_string()),
            s.history_count
        );
    }
}

fn fmt_pct(v: Option<f64>) -> String {
    v.map_or_else(|| "-".to_string(), |p| format!("{p:.1}%"))
}

fn on_off(active: bool) -> &'static str {
    if active { "on" } else { "off" }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════


#[cfg(test)]
mod proptests {
    use super::tests::{EventLog, MockGpio, NullSink, SimClock};
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn test_config() -> SystemConfig {
        let mut c = SystemConfig::default();
        c.relay3_active_high = true;
        c.relay4_active_high = true;
        c
    }

    proptest! {
        /// For any fresh level pair, an automatic/manual start succeeds iff
        /// the interlock holds, and a refused start never energizes a relay.
        #[test]
        fn interlock_safety(low in 0.0f64..100.0, high in 0.0f64..100.0) {
            let mut ctl = ManeuverController::new(test_config()).unwrap();
            let clock = SimClock::starting_at(Local.with_ymd_and_hms(2026, 5, 20, 9, 0, 0).unwrap());
            let mut gpio = MockGpio::default();
            let mut sink = NullSink;
            let mut events = EventLog::default();

            ctl.ingest(TankId::Low, low / 100.0, clock.now());
            ctl.ingest(TankId::High, high / 100.0, clock.now());
            let outcome = ctl.start_maneuver(
                ManeuverType::Manual, None, &clock, &mut gpio, &mut sink, &mut events,
            );

            let interlock_ok = low > 15.0 && high < 99.0;
            prop_assert_eq!(outcome.started, interlock_ok);
            if !outcome.started {
                prop_assert!(!gpio.writes.iter().any(|&(_, level)| level));
            }
        }

        /// Arbitrary op sequences: a start while running is always refused,
        /// stop succeeds exactly when running, and no closed record ever
        /// has a negative duration.
        #[test]
        fn durations_non_negative_and_single_flight(
            steps in proptest::collection::vec((0u8..4, 0.0f64..100.0, 0.0f64..100.0, 0i64..600), 1..60)
        ) {
            let mut ctl = ManeuverController::new(test_config()).unwrap();
            let clock = SimClock::starting_at(Local.with_ymd_and_hms(2026, 5, 20, 0, 0, 0).unwrap());
            let mut gpio = MockGpio::default();
            let mut sink = NullSink;
            let mut events = EventLog::default();

            for (op, low, high, advance_s) in steps {
                clock.advance(Duration::seconds(advance_s));
                ctl.ingest(TankId::Low, low / 100.0, clock.now());
                ctl.ingest(TankId::High, high / 100.0, clock.now());
                let was_running = ctl.state() == ControllerState::Running;
                match op {
                    0 | 1 => {
                        let kind = if op == 0 { ManeuverType::Manual } else { ManeuverType::Maintenance };
                        let outcome = ctl.start_maneuver(kind, None, &clock, &mut gpio, &mut sink, &mut events);
                        if was_running {
                            prop_assert!(!outcome.started);
                            prop_assert_eq!(outcome.record_id, None);
                        }
                    }
                    2 => {
                        let stopped = ctl.stop_maneuver(StopReason::ManualStop, &clock, &mut gpio, &mut sink, &mut events);
                        prop_assert_eq!(stopped, was_running);
                    }
                    _ => ctl.tick(&clock, &mut gpio, &mut sink, &mut events),
                }

                for r in ctl.history().query(
                    Local.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap(),
                    clock.now() + Duration::days(1),
                ) {
                    if let Some(d) = r.duration_min() {
                        prop_assert!(d >= 0.0);
                    }
                }
            }
        }
    }
}
