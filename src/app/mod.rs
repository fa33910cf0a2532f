//! Application boundary — commands in, events out, ports in between.
//!
//! The control core never touches a GPIO pin, a broker socket, or a disk
//! directly: everything flows through the **port traits** defined in
//! [`ports`], keeping the maneuver logic fully testable with mock adapters.

pub mod commands;
pub mod events;
pub mod ports;
