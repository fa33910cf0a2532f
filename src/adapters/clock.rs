//! Wall-clock adapter.

use chrono::{DateTime, Local};

use crate::app::ports::Clock;

/// The real system clock, in the deployment's local timezone (the schedule
/// is a local time of day).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}
