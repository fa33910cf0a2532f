//! Outbound application events.
//!
//! The controller emits these through the [`EventSink`](super::ports::EventSink)
//! port. Adapters on the other side decide what to do with them — write to
//! the service log, push to a dashboard feed, etc.

use crate::controller::ControllerState;
use crate::history::{ManeuverType, StopReason};

/// Structured events emitted by the control core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppEvent {
    /// The service started (carries the initial state).
    Started(ControllerState),

    /// A maneuver opened and the relays were commanded.
    ManeuverStarted { id: u64, kind: ManeuverType },

    /// The interlock blocked a start; a zero-duration record was appended.
    ManeuverBlocked {
        id: u64,
        kind: ManeuverType,
        reason: &'static str,
    },

    /// A running maneuver closed.
    ManeuverStopped {
        id: u64,
        kind: ManeuverType,
        reason: StopReason,
        duration_min: f64,
    },
}
