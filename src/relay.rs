//! Relay pair abstraction.
//!
//! Two physical outputs drive the transfer pump contactors. Each output has
//! a fixed pin and polarity; [`RelayActuator`] translates *logical* state
//! (active = pump energized) through the polarity before handing the
//! physical level to the [`RelayPort`]. The last logical state is tracked
//! for status reporting — it is what was commanded, not a hardware
//! read-back.
//!
//! ## Fault contract
//!
//! A failed write is logged and the logical state still transitions; the
//! relay hardware de-energizes on fault and writes are never retried.
//! `all_off` attempts both channels even when the first write fails.

use log::{debug, warn};

use crate::app::ports::RelayPort;
use crate::config::SystemConfig;

/// The two relay outputs. Relay 3 is gated by the low tank, relay 4 by the
/// high tank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayId {
    Relay3,
    Relay4,
}

impl RelayId {
    const ALL: [Self; 2] = [Self::Relay3, Self::Relay4];

    fn index(self) -> usize {
        match self {
            Self::Relay3 => 0,
            Self::Relay4 => 1,
        }
    }
}

/// One output's fixed wiring: pin and polarity.
#[derive(Debug, Clone, Copy)]
pub struct RelayChannel {
    pub pin: u8,
    pub active_high: bool,
}

/// Polarity-aware driver for the relay pair.
pub struct RelayActuator {
    channels: [RelayChannel; 2],
    logical: [bool; 2],
}

impl RelayActuator {
    pub fn new(relay3: RelayChannel, relay4: RelayChannel) -> Self {
        Self {
            channels: [relay3, relay4],
            logical: [false, false],
        }
    }

    pub fn from_config(config: &SystemConfig) -> Self {
        Self::new(
            RelayChannel {
                pin: config.relay3_gpio,
                active_high: config.relay3_active_high,
            },
            RelayChannel {
                pin: config.relay4_gpio,
                active_high: config.relay4_active_high,
            },
        )
    }

    /// Command a relay. Safe to call redundantly; the physical write is
    /// idempotent and only state *changes* are logged.
    pub fn set(&mut self, gpio: &mut impl RelayPort, relay: RelayId, active: bool) {
        let i = relay.index();
        let ch = self.channels[i];
        let level = if ch.active_high { active } else { !active };
        if self.logical[i] != active {
            debug!(
                "{relay:?} -> {} (pin {} level {})",
                if active { "on" } else { "off" },
                ch.pin,
                u8::from(level)
            );
        }
        if let Err(e) = gpio.write(ch.pin, level) {
            warn!("{relay:?} command failed ({e}) — assuming de-energized default");
        }
        self.logical[i] = active;
    }

    /// Last logical state commanded for a relay.
    pub fn state(&self, relay: RelayId) -> bool {
        self.logical[relay.index()]
    }

    /// De-energize both relays. Called on every maneuver close and on
    /// process termination; both writes are attempted regardless of
    /// individual failures.
    pub fn all_off(&mut self, gpio: &mut impl RelayPort) {
        for relay in RelayId::ALL {
            self.set(gpio, relay, false);
        }
    }
}
