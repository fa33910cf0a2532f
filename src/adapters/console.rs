//! Operator console.
//!
//! Reads commands from stdin and forwards them to the control thread over
//! the command channel. This is the whole manual-control surface of the
//! service; a dashboard would talk to the same channel.
//!
//! Commands: `start [minutes]`, `stop`, `maintenance`, `status`,
//! `clear-history`.

use std::io::{self, BufRead};
use std::sync::mpsc::SyncSender;
use std::thread::{self, JoinHandle};

use log::warn;

use crate::app::commands::Command;

pub fn spawn(tx: SyncSender<Command>) -> JoinHandle<()> {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { return };
            match parse_command(&line) {
                Some(cmd) => {
                    if tx.send(cmd).is_err() {
                        return;
                    }
                }
                None => {
                    if !line.trim().is_empty() {
                        warn!("unknown command: {}", line.trim());
                    }
                }
            }
        }
    })
}

pub fn parse_command(line: &str) -> Option<Command> {
    let mut parts = line.split_whitespace();
    match parts.next()? {
        "start" => Some(Command::StartManual {
            duration_min: parts.next().and_then(|s| s.parse().ok()),
        }),
        "stop" => Some(Command::Stop),
        "maintenance" | "maint" => Some(Command::StartMaintenance),
        "status" => Some(Command::ShowStatus),
        "clear-history" => Some(Command::ClearHistory),
        _ => None,
    }
}
