//! Demo-mode level simulator.
//!
//! Stands in for the MQTT feed so the whole service can run without a
//! broker or tanks: both levels drift slowly (the low tank trending down,
//! the high tank trending up) and are pushed onto the same bounded channel
//! the real feed uses, as raw 0..1 fractions.

use std::sync::mpsc::{SyncSender, TrySendError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info};
use rand::Rng;

use crate::adapters::mqtt::LevelUpdate;
use crate::monitor::TankId;

pub fn spawn(tx: SyncSender<LevelUpdate>, interval: Duration) -> JoinHandle<()> {
    info!("demo mode: simulating tank levels");
    thread::spawn(move || {
        let mut rng = rand::thread_rng();
        let mut low: f64 = 45.0;
        let mut high: f64 = 75.0;
        loop {
            low = (low + rng.gen_range(-0.5..0.3)).clamp(0.0, 100.0);
            high = (high + rng.gen_range(-0.2..0.4)).clamp(0.0, 100.0);
            debug!("sim levels: low {low:.1}%, high {high:.1}%");
            for update in [
                LevelUpdate {
                    tank: TankId::Low,
                    raw_value: low / 100.0,
                },
                LevelUpdate {
                    tank: TankId::High,
                    raw_value: high / 100.0,
                },
            ] {
                match tx.try_send(update) {
                    Ok(()) | Err(TrySendError::Full(_)) => {}
                    Err(TrySendError::Disconnected(_)) => return,
                }
            }
            thread::sleep(interval);
        }
    })
}
