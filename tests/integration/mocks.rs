//! Mock adapters for integration tests.
//!
//! Record every port call so tests can assert on the full command history
//! without touching real GPIO, disks or clocks.

use std::cell::Cell;

use chrono::{DateTime, Duration, Local};

use pumphouse::app::events::AppEvent;
use pumphouse::app::ports::{Clock, EventSink, HistorySink, RelayPort};
use pumphouse::error::{HistoryFault, RelayFault};
use pumphouse::history::ManeuverRecord;

// ── Controllable clock ────────────────────────────────────────

pub struct SimClock(Cell<DateTime<Local>>);

#[allow(dead_code)]
impl SimClock {
    pub fn starting_at(t: DateTime<Local>) -> Self {
        Self(Cell::new(t))
    }

    pub fn advance(&self, d: Duration) {
        self.0.set(self.0.get() + d);
    }

    pub fn set(&self, t: DateTime<Local>) {
        self.0.set(t);
    }
}

impl Clock for SimClock {
    fn now(&self) -> DateTime<Local> {
        self.0.get()
    }
}

// ── Recording relay port ──────────────────────────────────────

#[derive(Default)]
pub struct MockRelays {
    /// Every physical write, in order: (pin, level).
    pub writes: Vec<(u8, bool)>,
    /// When set, every write fails after being recorded.
    pub fail: bool,
}

#[allow(dead_code)]
impl MockRelays {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last physical level written to a pin, if any.
    pub fn level(&self, pin: u8) -> Option<bool> {
        self.writes
            .iter()
            .rev()
            .find_map(|&(p, level)| (p == pin).then_some(level))
    }
}

impl RelayPort for MockRelays {
    fn write(&mut self, pin: u8, level: bool) -> Result<(), RelayFault> {
        self.writes.push((pin, level));
        if self.fail {
            Err(RelayFault::WriteFailed)
        } else {
            Ok(())
        }
    }
}

// ── Recording history sink ────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub records: Vec<ManeuverRecord>,
    pub fail: bool,
}

impl HistorySink for RecordingSink {
    fn append(&mut self, record: &ManeuverRecord) -> Result<(), HistoryFault> {
        if self.fail {
            return Err(HistoryFault::Io);
        }
        self.records.push(record.clone());
        Ok(())
    }
}

// ── Recording event sink ──────────────────────────────────────

#[derive(Default)]
pub struct EventLog(pub Vec<AppEvent>);

impl EventSink for EventLog {
    fn emit(&mut self, event: &AppEvent) {
        self.0.push(*event);
    }
}
