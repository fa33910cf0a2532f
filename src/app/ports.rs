//! Port traits — the boundary between the control core and the outside
//! world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ManeuverController (domain)
//! ```
//!
//! Driven adapters (GPIO, history file, wall clock, event consumers)
//! implement these traits. The controller consumes them via generics, so the
//! core never touches hardware directly and tests substitute recording
//! mocks.

use chrono::{DateTime, Local};

use crate::app::events::AppEvent;
use crate::error::{HistoryFault, RelayFault};
use crate::history::ManeuverRecord;

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Wall-clock source. Injected so tests can drive the schedule and the
/// auto-stop deadline deterministically.
pub trait Clock {
    fn now(&self) -> DateTime<Local>;
}

// ───────────────────────────────────────────────────────────────
// Relay port (domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port: drive one physical output to the given level.
///
/// `level` is the *physical* line level; polarity translation has already
/// happened in [`RelayActuator`](crate::relay::RelayActuator).
/// Implementations must be idempotent and must not block the control loop.
pub trait RelayPort {
    fn write(&mut self, pin: u8, level: bool) -> Result<(), RelayFault>;
}

// ───────────────────────────────────────────────────────────────
// History sink port (domain → persistence)
// ───────────────────────────────────────────────────────────────

/// Durability side of the history log. The in-memory store is authoritative
/// within the process; this port mirrors each closed record outward.
/// Implementations must return promptly — buffer or fail, never block.
pub trait HistorySink {
    fn append(&mut self, record: &ManeuverRecord) -> Result<(), HistoryFault>;
}

/// Persistence is optional at the boundary: a missing sink accepts and
/// discards (the store already warned that the session is memory-only).
impl<S: HistorySink> HistorySink for Option<S> {
    fn append(&mut self, record: &ManeuverRecord) -> Result<(), HistoryFault> {
        match self {
            Some(sink) => sink.append(record),
            None => Ok(()),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Event sink port (domain → dashboard / logging)
// ───────────────────────────────────────────────────────────────

/// The controller emits structured [`AppEvent`]s through this port.
/// Adapters decide where they go (service log, dashboard feed, etc.).
pub trait EventSink {
    fn emit(&mut self, event: &AppEvent);
}
