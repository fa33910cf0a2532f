//! Unified error types for the pumphouse service.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! poll loop's error handling uniform. All variants are `Copy` so they can be
//! cheaply passed through the controller without allocation. Nothing in the
//! control core is allowed to terminate the poll loop: faults are logged at
//! their origin and converted into typed results consumed by the caller.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level service error
// ---------------------------------------------------------------------------

/// Every fallible operation in the control core funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Configuration is invalid or could not be loaded. Fatal at startup.
    Config(ConfigError),
    /// A relay command failed at the physical layer.
    Relay(RelayFault),
    /// History persistence failed (the in-memory view is unaffected).
    History(HistoryFault),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Relay(e) => write!(f, "relay: {e}"),
            Self::History(e) => write!(f, "history: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Configuration errors — the only fatal category
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Config file does not exist at the given path.
    NotFound,
    /// Config file exists but could not be read.
    Unreadable,
    /// Config file is not valid JSON or has unknown/missing keys.
    Malformed,
    /// A field failed range validation; the message names the field.
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "config file not found"),
            Self::Unreadable => write!(f, "config file unreadable"),
            Self::Malformed => write!(f, "config file malformed"),
            Self::Invalid(msg) => write!(f, "invalid setting: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Relay faults — logged, never retried, never fatal
// ---------------------------------------------------------------------------

/// A physical relay command failed. The controller proceeds as though the
/// command was issued (the hardware's de-energized default is assumed) and
/// the fault is logged once at its origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayFault {
    /// The GPIO value write failed.
    WriteFailed,
    /// The output was never successfully claimed at startup.
    Unavailable,
}

impl fmt::Display for RelayFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WriteFailed => write!(f, "GPIO write failed"),
            Self::Unavailable => write!(f, "output unavailable"),
        }
    }
}

impl From<RelayFault> for Error {
    fn from(e: RelayFault) -> Self {
        Self::Relay(e)
    }
}

// ---------------------------------------------------------------------------
// History persistence faults — degrade to memory-only
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryFault {
    /// The writer's bounded queue is full (slow or hung disk).
    QueueFull,
    /// The writer thread is gone; no further rows will persist.
    SinkClosed,
    /// The underlying file could not be opened or written.
    Io,
}

impl fmt::Display for HistoryFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueFull => write!(f, "writer queue full"),
            Self::SinkClosed => write!(f, "writer gone"),
            Self::Io => write!(f, "I/O error"),
        }
    }
}

impl From<HistoryFault> for Error {
    fn from(e: HistoryFault) -> Self {
        Self::History(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Service-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
