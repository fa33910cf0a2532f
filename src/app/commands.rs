//! Inbound commands to the control core.
//!
//! Actions requested by the outside world (dashboard, console) that the
//! [`ManeuverController`](crate::controller::ManeuverController) interprets
//! on its own thread. Boundary threads send these over a bounded channel;
//! the poll loop is the single consumer, so a command can never interleave
//! with a tick.

/// Commands that boundary adapters can send into the control core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Start a manual transfer, optionally overriding the duration.
    StartManual { duration_min: Option<u32> },

    /// Run a maintenance exercise cycle now.
    StartMaintenance,

    /// Stop the current maneuver, if any.
    Stop,

    /// Log a status snapshot.
    ShowStatus,

    /// Erase the in-memory history.
    ClearHistory,
}
