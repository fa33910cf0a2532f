//! Sysfs GPIO relay outputs.
//!
//! Claims each relay pin through `/sys/class/gpio` at startup and drives it
//! via its `value` file. A pin that cannot be claimed (no permission, not a
//! Pi, already exported elsewhere) falls back to an in-memory stand-in so
//! the rest of the service keeps working without hardware.

use std::fs;
use std::io;
use std::path::PathBuf;

use log::{error, warn};

use crate::app::ports::RelayPort;
use crate::error::RelayFault;

const GPIO_ROOT: &str = "/sys/class/gpio";

struct PinHandle {
    pin: u8,
    /// `None` = simulated (claim failed at startup).
    value_path: Option<PathBuf>,
}

/// Relay outputs over the sysfs GPIO interface.
pub struct SysfsRelays {
    pins: Vec<PinHandle>,
}

impl SysfsRelays {
    /// Claim the given pins as outputs. Claim failures degrade that pin to
    /// an in-memory stand-in with a warning; they are not fatal.
    pub fn new(pins: &[u8]) -> Self {
        let pins = pins
            .iter()
            .map(|&pin| {
                let value_path = match claim_output(pin) {
                    Ok(path) => Some(path),
                    Err(e) => {
                        warn!("GPIO {pin} unavailable ({e}) — running with simulated output");
                        None
                    }
                };
                PinHandle { pin, value_path }
            })
            .collect();
        Self { pins }
    }
}

impl RelayPort for SysfsRelays {
    fn write(&mut self, pin: u8, level: bool) -> Result<(), RelayFault> {
        let Some(handle) = self.pins.iter().find(|h| h.pin == pin) else {
            return Err(RelayFault::Unavailable);
        };
        match &handle.value_path {
            Some(path) => fs::write(path, if level { b"1" } else { b"0" }).map_err(|e| {
                error!("GPIO {pin} write failed: {e}");
                RelayFault::WriteFailed
            }),
            None => Ok(()), // simulated pin
        }
    }
}

/// Export a pin and configure it as an output.
fn claim_output(pin: u8) -> io::Result<PathBuf> {
    let gpio_dir = PathBuf::from(format!("{GPIO_ROOT}/gpio{pin}"));
    if !gpio_dir.exists() {
        // EBUSY from export means someone already exported it; the
        // directory check above handles the common case.
        fs::write(format!("{GPIO_ROOT}/export"), pin.to_string())?;
    }
    fs::write(gpio_dir.join("direction"), "out")?;
    Ok(gpio_dir.join("value"))
}
