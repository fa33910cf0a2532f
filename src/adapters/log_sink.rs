//! Event sink that writes structured events to the service log.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Default [`EventSink`]: every event becomes one log line. A dashboard
/// adapter would fan the same events out elsewhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started(state) => info!("service started in {state:?}"),
            AppEvent::ManeuverStarted { id, kind } => {
                info!("event: {kind} maneuver #{id} started");
            }
            AppEvent::ManeuverBlocked { id, kind, reason } => {
                warn!("event: {kind} maneuver #{id} blocked ({reason})");
            }
            AppEvent::ManeuverStopped {
                id,
                kind,
                reason,
                duration_min,
            } => {
                info!("event: {kind} maneuver #{id} stopped ({reason}) after {duration_min:.1} min");
            }
        }
    }
}
