//! Daily schedule and maintenance-cycle arithmetic.
//!
//! Pure time computation, no I/O: the controller asks "when is the next
//! scheduled transfer?" and "is anything due right now?" each tick and acts
//! on the answers. This keeps the scheduler independently testable and the
//! firing decision inside the single-flight control path (no timer thread
//! racing the poll loop).
//!
//! ```text
//! ┌───────────┐  ┌─────────────┐  ┌──────────────┐
//! │ Daily time│  │ Maintenance │  │ Manual       │
//! │ of day    │  │ period      │  │ (dashboard)  │
//! └─────┬─────┘  └──────┬──────┘  └──────┬───────┘
//!       ▼               ▼                ▼
//!            ManeuverController::tick()
//! ```

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone, Timelike};

use crate::config::SystemConfig;
use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Mutable schedule bookkeeping (owned by the controller)
// ---------------------------------------------------------------------------

/// Dates the controller stamps as maneuvers close, plus attempt markers that
/// stop a blocked automatic trigger from re-firing every tick all day.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScheduleState {
    pub next_scheduled_at: Option<DateTime<Local>>,
    /// Date of the last completed scheduled/manual transfer.
    pub last_operation_date: Option<NaiveDate>,
    /// Date of the last completed maintenance cycle.
    pub last_maintenance_date: Option<NaiveDate>,
    /// Date a scheduled start was last attempted (even if blocked).
    pub last_scheduled_attempt: Option<NaiveDate>,
    /// Date a maintenance start was last attempted (even if blocked).
    pub last_maintenance_attempt: Option<NaiveDate>,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fixed schedule parameters: the daily time of day, the firing window, and
/// the maintenance period.
#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    time_of_day: NaiveTime,
    window: Duration,
    period_days: u32,
}

impl Scheduler {
    pub fn new(time_of_day: NaiveTime, window: Duration, period_days: u32) -> Self {
        Self {
            time_of_day,
            window,
            period_days,
        }
    }

    pub fn from_config(config: &SystemConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(
            config.scheduled_time()?,
            config.schedule_window(),
            config.maintenance_period_days,
        ))
    }

    /// Next occurrence of the daily transfer time.
    ///
    /// Today's occurrence counts until its window has fully passed and only
    /// if no transfer completed today; otherwise tomorrow's.
    pub fn next_scheduled_at(
        &self,
        now: DateTime<Local>,
        last_operation_date: Option<NaiveDate>,
    ) -> DateTime<Local> {
        let today = now.date_naive();
        let today_at = local_at(today, self.time_of_day);
        let ran_today = last_operation_date == Some(today);
        if !ran_today && now.signed_duration_since(today_at) <= self.window {
            today_at
        } else {
            local_at(today + Duration::days(1), self.time_of_day)
        }
    }

    /// Whether the scheduled transfer should fire now.
    ///
    /// With a zero window the match is exact-to-the-minute (the legacy
    /// behavior); otherwise `|now - next| <= window`. Never true on a day
    /// that already saw a completed transfer.
    pub fn is_due(
        &self,
        now: DateTime<Local>,
        next_at: DateTime<Local>,
        last_operation_date: Option<NaiveDate>,
    ) -> bool {
        if last_operation_date == Some(now.date_naive()) {
            return false;
        }
        if self.window == Duration::zero() {
            now.date_naive() == next_at.date_naive()
                && now.hour() == next_at.hour()
                && now.minute() == next_at.minute()
        } else {
            (now.signed_duration_since(next_at)).abs() <= self.window
        }
    }

    /// Whether a maintenance exercise cycle is due.
    ///
    /// Due when no cycle has ever completed, or the period has elapsed.
    /// Mutual exclusion with a running maneuver is the controller's job
    /// (maintenance is only considered from the Idle branch of its tick).
    pub fn maintenance_due(
        &self,
        today: NaiveDate,
        last_maintenance_date: Option<NaiveDate>,
    ) -> bool {
        match last_maintenance_date {
            None => true,
            Some(last) => (today - last).num_days() >= i64::from(self.period_days),
        }
    }
}

/// Resolve a local wall-clock instant. On a DST spring-forward gap the
/// nonexistent time is shifted one hour later.
fn local_at(date: NaiveDate, time: NaiveTime) -> DateTime<Local> {
    let naive = date.and_time(time);
    Local
        .from_local_datetime(&naive)
        .earliest()
        .or_else(|| Local.from_local_datetime(&(naive + Duration::hours(1))).earliest())
        .unwrap_or_else(Local::now)
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
