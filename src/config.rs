//! System configuration parameters.
//!
//! All tunable parameters for the pumphouse service, loaded from a JSON file
//! at startup. The file is validated before the controller is constructed;
//! an out-of-bounds or unknown setting is fatal (the service must not run
//! with undefined thresholds).

use std::path::Path;

use chrono::{Duration, NaiveTime};
use log::error;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::history::ManeuverType;

/// Core system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SystemConfig {
    // --- Level feed ---
    /// MQTT broker host serving the Venus OS tank topics.
    pub mqtt_broker: String,
    #[serde(default = "defaults::mqtt_port")]
    pub mqtt_port: u16,
    #[serde(default = "defaults::mqtt_keepalive_s")]
    pub mqtt_keepalive_s: u16,
    /// Venus OS device id in the topic path `N/<id>/tank/{3|4}/Level`.
    pub victron_device_id: String,

    // --- Relays ---
    /// BCM pin for relay 3 (gated by the low tank).
    pub relay3_gpio: u8,
    #[serde(default)]
    pub relay3_active_high: bool,
    /// BCM pin for relay 4 (gated by the high tank).
    pub relay4_gpio: u8,
    #[serde(default)]
    pub relay4_active_high: bool,

    // --- Interlock thresholds ---
    /// Low tank must be above this percentage for the pump to run.
    #[serde(default = "defaults::low_threshold_pct")]
    pub low_threshold_pct: f64,
    /// High tank must be below this percentage for the pump to run.
    #[serde(default = "defaults::high_threshold_pct")]
    pub high_threshold_pct: f64,
    /// Relaxed low bound applied to maintenance cycles only.
    #[serde(default = "defaults::maintenance_low_threshold_pct")]
    pub maintenance_low_threshold_pct: f64,
    /// Level readings older than this are unusable for safety decisions.
    #[serde(default = "defaults::stale_window_s")]
    pub stale_window_s: u64,
    /// Whether maintenance cycles also require fresh level data.
    #[serde(default)]
    pub maintenance_requires_fresh: bool,

    // --- Schedule ---
    /// Daily transfer time, "HH:MM" local.
    #[serde(default = "defaults::scheduled_time_of_day")]
    pub scheduled_time_of_day: String,
    /// Scheduled transfer duration in minutes (2-5).
    #[serde(default = "defaults::scheduled_duration_min")]
    pub scheduled_duration_min: u32,
    /// Manual transfer duration in minutes (5-30).
    #[serde(default = "defaults::manual_duration_min")]
    pub manual_duration_min: u32,
    /// Maintenance exercise duration in seconds (5-15).
    #[serde(default = "defaults::maintenance_duration_s")]
    pub maintenance_duration_s: u32,
    /// Days without a maintenance cycle before one is due (7-15).
    #[serde(default = "defaults::maintenance_period_days")]
    pub maintenance_period_days: u32,
    /// Half-width of the window around the scheduled time in which the
    /// daily transfer fires. `0` restores exact-minute matching.
    #[serde(default = "defaults::schedule_window_min")]
    pub schedule_window_min: u32,

    // --- History ---
    /// Years of maneuver history to retain.
    #[serde(default = "defaults::retention_years")]
    pub retention_years: u32,
    /// Append-only history file.
    #[serde(default = "defaults::history_path")]
    pub history_path: String,
    /// Optional site label stamped on every history row.
    #[serde(default)]
    pub site_label: String,

    // --- Timing ---
    /// Poll loop interval in seconds.
    #[serde(default = "defaults::poll_interval_s")]
    pub poll_interval_s: u64,
}

mod defaults {
    pub fn mqtt_port() -> u16 {
        1883
    }
    pub fn mqtt_keepalive_s() -> u16 {
        60
    }
    pub fn low_threshold_pct() -> f64 {
        15.0
    }
    pub fn high_threshold_pct() -> f64 {
        99.0
    }
    pub fn maintenance_low_threshold_pct() -> f64 {
        10.0
    }
    pub fn stale_window_s() -> u64 {
        300
    }
    pub fn scheduled_time_of_day() -> String {
        "12:00".to_string()
    }
    pub fn scheduled_duration_min() -> u32 {
        3
    }
    pub fn manual_duration_min() -> u32 {
        10
    }
    pub fn maintenance_duration_s() -> u32 {
        10
    }
    pub fn maintenance_period_days() -> u32 {
        10
    }
    pub fn schedule_window_min() -> u32 {
        5
    }
    pub fn retention_years() -> u32 {
        5
    }
    pub fn history_path() -> String {
        "history.csv".to_string()
    }
    pub fn poll_interval_s() -> u64 {
        5
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            mqtt_broker: "localhost".to_string(),
            mqtt_port: defaults::mqtt_port(),
            mqtt_keepalive_s: defaults::mqtt_keepalive_s(),
            victron_device_id: "demo_device".to_string(),
            relay3_gpio: 6,
            relay3_active_high: false,
            relay4_gpio: 5,
            relay4_active_high: false,
            low_threshold_pct: defaults::low_threshold_pct(),
            high_threshold_pct: defaults::high_threshold_pct(),
            maintenance_low_threshold_pct: defaults::maintenance_low_threshold_pct(),
            stale_window_s: defaults::stale_window_s(),
            maintenance_requires_fresh: false,
            scheduled_time_of_day: defaults::scheduled_time_of_day(),
            scheduled_duration_min: defaults::scheduled_duration_min(),
            manual_duration_min: defaults::manual_duration_min(),
            maintenance_duration_s: defaults::maintenance_duration_s(),
            maintenance_period_days: defaults::maintenance_period_days(),
            schedule_window_min: defaults::schedule_window_min(),
            retention_years: defaults::retention_years(),
            history_path: defaults::history_path(),
            site_label: String::new(),
            poll_interval_s: defaults::poll_interval_s(),
        }
    }
}

impl SystemConfig {
    /// Load and validate configuration from a JSON file.
    ///
    /// Underlying parse errors are logged here with full detail before being
    /// mapped to the flat [`ConfigError`] the caller acts on.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound);
        }
        let text = std::fs::read_to_string(path).map_err(|e| {
            error!("cannot read {}: {e}", path.display());
            ConfigError::Unreadable
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|e| {
            error!("cannot parse {}: {e}", path.display());
            ConfigError::Malformed
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Range-check every setting. Invalid values are rejected, not clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mqtt_broker.is_empty() {
            return Err(ConfigError::Invalid("mqtt_broker must not be empty"));
        }
        if self.victron_device_id.is_empty() {
            return Err(ConfigError::Invalid("victron_device_id must not be empty"));
        }
        if self.relay3_gpio == self.relay4_gpio {
            return Err(ConfigError::Invalid("relay3_gpio and relay4_gpio must differ"));
        }
        if !(0.0..100.0).contains(&self.low_threshold_pct) {
            return Err(ConfigError::Invalid("low_threshold_pct out of range (0-100)"));
        }
        if self.high_threshold_pct <= self.low_threshold_pct || self.high_threshold_pct > 100.0 {
            return Err(ConfigError::Invalid(
                "high_threshold_pct must be above low_threshold_pct and at most 100",
            ));
        }
        if self.maintenance_low_threshold_pct < 0.0
            || self.maintenance_low_threshold_pct > self.low_threshold_pct
        {
            return Err(ConfigError::Invalid(
                "maintenance_low_threshold_pct must be between 0 and low_threshold_pct",
            ));
        }
        if self.stale_window_s == 0 {
            return Err(ConfigError::Invalid("stale_window_s must be positive"));
        }
        self.scheduled_time()?;
        if !(2..=5).contains(&self.scheduled_duration_min) {
            return Err(ConfigError::Invalid("scheduled_duration_min out of bounds (2-5)"));
        }
        if !(5..=30).contains(&self.manual_duration_min) {
            return Err(ConfigError::Invalid("manual_duration_min out of bounds (5-30)"));
        }
        if !(5..=15).contains(&self.maintenance_duration_s) {
            return Err(ConfigError::Invalid("maintenance_duration_s out of bounds (5-15)"));
        }
        if !(7..=15).contains(&self.maintenance_period_days) {
            return Err(ConfigError::Invalid("maintenance_period_days out of bounds (7-15)"));
        }
        if self.retention_years == 0 {
            return Err(ConfigError::Invalid("retention_years must be positive"));
        }
        if self.poll_interval_s == 0 {
            return Err(ConfigError::Invalid("poll_interval_s must be positive"));
        }
        Ok(())
    }

    /// Parsed daily transfer time.
    pub fn scheduled_time(&self) -> Result<NaiveTime, ConfigError> {
        NaiveTime::parse_from_str(&self.scheduled_time_of_day, "%H:%M")
            .map_err(|_| ConfigError::Invalid("scheduled_time_of_day must be HH:MM"))
    }

    /// Freshness window for level readings.
    pub fn stale_window(&self) -> Duration {
        Duration::seconds(self.stale_window_s as i64)
    }

    /// Window around the scheduled time in which the daily transfer fires.
    pub fn schedule_window(&self) -> Duration {
        Duration::minutes(i64::from(self.schedule_window_min))
    }

    /// History retention period.
    pub fn retention(&self) -> Duration {
        Duration::days(i64::from(self.retention_years) * 365)
    }

    /// Default maneuver duration for the given type.
    pub fn default_duration(&self, kind: ManeuverType) -> Duration {
        match kind {
            ManeuverType::Scheduled => Duration::minutes(i64::from(self.scheduled_duration_min)),
            ManeuverType::Manual => Duration::minutes(i64::from(self.manual_duration_min)),
            ManeuverType::Maintenance => Duration::seconds(i64::from(self.maintenance_duration_s)),
        }
    }
}
