//! Tank level cache.
//!
//! [`LevelMonitor`] holds the latest reading for each of the two tanks and
//! its observation time. Readings are replaced wholesale (last-writer-wins
//! per tank); no compound invariant spans an update, so the ingestion path
//! stays trivially small. The composite snapshot exposes the *older* of the
//! two observation times as its freshness bound.

use chrono::{DateTime, Duration, Local};
use log::{info, warn};

// ---------------------------------------------------------------------------
// Tank identity
// ---------------------------------------------------------------------------

/// The two tanks of the transfer pair. `Low` is the supply (Venus OS tank 3),
/// `High` the destination (tank 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TankId {
    Low,
    High,
}

// ---------------------------------------------------------------------------
// Composite snapshot
// ---------------------------------------------------------------------------

/// A point-in-time view of both tank levels, in percent.
///
/// `None` means the tank has never reported; a never-seen tank is treated
/// exactly like a stale one for safety decisions.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TankLevels {
    pub low_percent: Option<f64>,
    pub high_percent: Option<f64>,
    /// Older of the two per-tank observation times.
    pub observed_at: Option<DateTime<Local>>,
}

impl TankLevels {
    /// True iff both tanks reported within `max_age` of `now`.
    pub fn is_fresh(&self, now: DateTime<Local>, max_age: Duration) -> bool {
        match self.observed_at {
            Some(t) => now.signed_duration_since(t) <= max_age,
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// LevelMonitor
// ---------------------------------------------------------------------------

/// Latest readings for the two tanks plus a stale-transition latch so the
/// staleness fault is logged once per stale period, not once per tick.
#[derive(Debug, Default)]
pub struct LevelMonitor {
    low: Option<(f64, DateTime<Local>)>,
    high: Option<(f64, DateTime<Local>)>,
    stale_logged: bool,
}

impl LevelMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a raw sensor value (a 0..1 fraction from the feed) as a
    /// percentage, stamped with `now`.
    pub fn ingest(&mut self, tank: TankId, raw_value: f64, now: DateTime<Local>) {
        let percent = raw_value * 100.0;
        match tank {
            TankId::Low => self.low = Some((percent, now)),
            TankId::High => self.high = Some((percent, now)),
        }
    }

    /// Latest composite reading.
    pub fn snapshot(&self) -> TankLevels {
        let observed_at = match (self.low, self.high) {
            (Some((_, a)), Some((_, b))) => Some(a.min(b)),
            _ => None,
        };
        TankLevels {
            low_percent: self.low.map(|(p, _)| p),
            high_percent: self.high.map(|(p, _)| p),
            observed_at,
        }
    }

    /// True iff both tanks were updated within `max_age` of `now`.
    pub fn is_fresh(&self, now: DateTime<Local>, max_age: Duration) -> bool {
        self.snapshot().is_fresh(now, max_age)
    }

    /// Freshness check with the log latch: logs `SensorStale` on the
    /// fresh→stale transition and an all-clear on stale→fresh.
    pub fn check_fresh(&mut self, now: DateTime<Local>, max_age: Duration) -> bool {
        let fresh = self.is_fresh(now, max_age);
        if !fresh && !self.stale_logged {
            warn!(
                "level data stale (older than {}s) — blocking pump operation",
                max_age.num_seconds()
            );
            self.stale_logged = true;
        } else if fresh && self.stale_logged {
            info!("level data fresh again");
            self.stale_logged = false;
        }
        fresh
    }
}
