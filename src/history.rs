//! Maneuver history.
//!
//! Every attempt to run the pump — whether or not it actually actuated —
//! produces exactly one [`ManeuverRecord`], appended to the [`HistoryStore`]
//! when the maneuver closes. Records are immutable after append. The store
//! is the in-process source of truth; each append is mirrored to a
//! [`HistorySink`] for durability, and a sink fault degrades the session to
//! memory-only with a single warning rather than touching the poll loop.

use chrono::{DateTime, Duration, Local};
use core::fmt;
use log::{debug, warn};

use crate::app::ports::HistorySink;
use crate::monitor::TankLevels;

// ---------------------------------------------------------------------------
// Record vocabulary
// ---------------------------------------------------------------------------

/// What triggered the maneuver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManeuverType {
    Scheduled,
    Manual,
    Maintenance,
}

impl fmt::Display for ManeuverType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scheduled => write!(f, "scheduled"),
            Self::Manual => write!(f, "manual"),
            Self::Maintenance => write!(f, "maintenance"),
        }
    }
}

/// Why the maneuver closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The interlock blocked activation; the pump never ran.
    InterlockBlocked,
    /// Low tank fell to its threshold mid-run.
    LowLevel,
    /// High tank reached its threshold mid-run.
    HighLevel,
    /// Level data went stale mid-run with neither threshold violated.
    SensorStale,
    /// The per-type deadline elapsed.
    MaxDurationReached,
    /// An operator stopped the maneuver.
    ManualStop,
    /// The process is terminating.
    Shutdown,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InterlockBlocked => write!(f, "interlock blocked"),
            Self::LowLevel => write!(f, "low level"),
            Self::HighLevel => write!(f, "high level"),
            Self::SensorStale => write!(f, "sensor stale"),
            Self::MaxDurationReached => write!(f, "max duration"),
            Self::ManualStop => write!(f, "manual stop"),
            Self::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// One completed (or blocked) pump maneuver. Immutable once appended.
#[derive(Debug, Clone, PartialEq)]
pub struct ManeuverRecord {
    pub id: u64,
    pub start_time: DateTime<Local>,
    pub end_time: Option<DateTime<Local>>,
    pub start_levels: TankLevels,
    pub end_levels: Option<TankLevels>,
    pub kind: ManeuverType,
    /// False iff the interlock blocked activation.
    pub started: bool,
    pub stop_reason: Option<StopReason>,
}

impl ManeuverRecord {
    /// Duration in minutes, derived from the closing timestamps.
    pub fn duration_min(&self) -> Option<f64> {
        self.end_time
            .map(|end| end.signed_duration_since(self.start_time).num_seconds() as f64 / 60.0)
    }
}

// ---------------------------------------------------------------------------
// HistoryStore
// ---------------------------------------------------------------------------

/// Append-only in-memory log of maneuvers with retention pruning.
#[derive(Default)]
pub struct HistoryStore {
    records: Vec<ManeuverRecord>,
    persistence_degraded: bool,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a closed record and mirror it to the sink.
    ///
    /// The in-memory view reflects the append immediately; a sink fault is
    /// warned about once per session and the record stays visible in memory.
    pub fn append(&mut self, record: ManeuverRecord, sink: &mut impl HistorySink) {
        if let Err(e) = sink.append(&record) {
            if !self.persistence_degraded {
                warn!("history persistence failed ({e}) — continuing memory-only");
                self.persistence_degraded = true;
            } else {
                debug!("history persistence still failing ({e})");
            }
        }
        self.records.push(record);
    }

    /// Records whose start time falls in `[since, until]`, chronological.
    pub fn query(
        &self,
        since: DateTime<Local>,
        until: DateTime<Local>,
    ) -> Vec<&ManeuverRecord> {
        self.records
            .iter()
            .filter(|r| r.start_time >= since && r.start_time <= until)
            .collect()
    }

    /// Drop records older than `now - retention`. Returns how many were
    /// removed; surviving records keep their original order.
    pub fn prune(&mut self, now: DateTime<Local>, retention: Duration) -> usize {
        let cutoff = now - retention;
        let before = self.records.len();
        self.records.retain(|r| r.start_time >= cutoff);
        before - self.records.len()
    }

    /// Erase the in-memory history (operator function; the sink file is
    /// untouched).
    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&ManeuverRecord> {
        self.records.last()
    }

    /// Whether any append failed to persist this session.
    pub fn persistence_degraded(&self) -> bool {
        self.persistence_degraded
    }
}
