//! Delimited history file sink.
//!
//! Mirrors each closed [`ManeuverRecord`] to an append-only `;`-delimited
//! file, one row per maneuver. Field order and delimiter are stable across
//! appends so historical rows stay parseable by whatever reads them later.
//!
//! Writes happen on a dedicated thread fed by a bounded channel: a slow or
//! hung disk turns into a `HistoryFault` on `append`, never into a stalled
//! control loop.

use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::thread::JoinHandle;

use log::error;

use crate::app::ports::HistorySink;
use crate::error::HistoryFault;
use crate::history::ManeuverRecord;

const HEADER: &str = "start_date;start_time;end_date;end_time;duration_min;\
low_start_pct;high_start_pct;low_end_pct;high_end_pct;type;stop_reason;site";

/// Pending rows the writer may lag behind before appends start failing.
const QUEUE_DEPTH: usize = 32;

pub struct CsvHistorySink {
    tx: Option<SyncSender<String>>,
    writer: Option<JoinHandle<()>>,
    site_label: String,
}

impl CsvHistorySink {
    /// Open (or create) the history file and start the writer thread.
    /// A header row is written once when the file is empty.
    pub fn open(path: &Path, site_label: &str) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let needs_header = file.metadata()?.len() == 0;
        let mut out = BufWriter::new(file);
        if needs_header {
            writeln!(out, "{HEADER}")?;
            out.flush()?;
        }

        let (tx, rx) = mpsc::sync_channel::<String>(QUEUE_DEPTH);
        let writer = std::thread::spawn(move || {
            for row in rx {
                if let Err(e) = writeln!(out, "{row}").and_then(|()| out.flush()) {
                    error!("history row write failed: {e}");
                }
            }
        });

        Ok(Self {
            tx: Some(tx),
            writer: Some(writer),
            site_label: site_label.to_string(),
        })
    }
}

impl HistorySink for CsvHistorySink {
    fn append(&mut self, record: &ManeuverRecord) -> Result<(), HistoryFault> {
        let row = format_row(record, &self.site_label);
        match self.tx.as_ref() {
            Some(tx) => match tx.try_send(row) {
                Ok(()) => Ok(()),
                Err(TrySendError::Full(_)) => Err(HistoryFault::QueueFull),
                Err(TrySendError::Disconnected(_)) => Err(HistoryFault::SinkClosed),
            },
            None => Err(HistoryFault::SinkClosed),
        }
    }
}

impl Drop for CsvHistorySink {
    fn drop(&mut self) {
        // Close the channel, then wait for the writer to drain.
        self.tx.take();
        if let Some(handle) = self.writer.take() {
            let _ = handle.join();
        }
    }
}

fn format_row(record: &ManeuverRecord, site: &str) -> String {
    let (end_date, end_time) = match record.end_time {
        Some(t) => (
            t.format("%d/%m/%Y").to_string(),
            t.format("%H:%M:%S").to_string(),
        ),
        None => ("-".to_string(), "-".to_string()),
    };
    format!(
        "{};{};{};{};{:.1};{};{};{};{};{};{};{}",
        record.start_time.format("%d/%m/%Y"),
        record.start_time.format("%H:%M:%S"),
        end_date,
        end_time,
        record.duration_min().unwrap_or(0.0),
        fmt_level(record.start_levels.low_percent),
        fmt_level(record.start_levels.high_percent),
        fmt_level(record.end_levels.and_then(|l| l.low_percent)),
        fmt_level(record.end_levels.and_then(|l| l.high_percent)),
        record.kind,
        record
            .stop_reason
            .map_or_else(|| "-".to_string(), |r| r.to_string()),
        site
    )
}

fn fmt_level(v: Option<f64>) -> String {
    v.map_or_else(|| "-".to_string(), |p| format!("{p:.1}"))
}
