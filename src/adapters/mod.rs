//! Concrete adapters behind the port traits.
//!
//! Everything in here is a thin, replaceable I/O wrapper: the wall clock,
//! the GPIO relay outputs, the MQTT level feed, the history file and the
//! operator console. None of it contains control logic.

pub mod clock;
pub mod console;
pub mod csv_log;
pub mod gpio;
pub mod log_sink;
pub mod mqtt;
pub mod sim;
