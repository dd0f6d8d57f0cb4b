use crate::error::ConfigError;
use chrono_tz::Tz;
use serde_derive::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_INTERVAL_MINUTES: i64 = 15;
pub const MAX_INTERVAL_MINUTES: i64 = 360;
pub const DEFAULT_MAX_BATTERY_VOLTAGE: i64 = 12;
pub const MAX_BATTERY_VOLTAGE: i64 = 36;

/// Data logger configuration as entered by the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataLoggerConfig {
    pub name: String,
    #[serde(rename = "type", default)]
    pub device_type: String,
    /// Mail server the attachments are fetched from
    #[serde(default)]
    pub server: String,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    /// Subject of the messages carrying the telemetry
    #[serde(default)]
    pub subject: String,
    /// Only attachments whose file name contains this id are read
    #[serde(rename = "locationID", default)]
    pub location_id: String,
    #[serde(default)]
    pub time_zone: String,
    #[serde(default = "default_max_battery_voltage")]
    pub max_battery_voltage: i64,
    /// Poll period in minutes
    #[serde(default = "default_interval")]
    pub interval: i64,
    #[serde(default)]
    pub simulated: bool,
    /// Sub-device channels to register a meter for
    #[serde(default)]
    pub channels: Vec<String>,
    /// Directory the mail fetcher saves attachments into
    #[serde(default)]
    pub mail_drop: PathBuf,
}

fn default_max_battery_voltage() -> i64 {
    DEFAULT_MAX_BATTERY_VOLTAGE
}

fn default_interval() -> i64 {
    DEFAULT_INTERVAL_MINUTES
}

impl Default for DataLoggerConfig {
    fn default() -> Self {
        Self {
            name: "Data Logger".to_string(),
            device_type: String::new(),
            server: String::new(),
            username: String::new(),
            password: String::new(),
            subject: String::new(),
            location_id: String::new(),
            time_zone: String::new(),
            max_battery_voltage: DEFAULT_MAX_BATTERY_VOLTAGE,
            interval: DEFAULT_INTERVAL_MINUTES,
            simulated: false,
            channels: Vec::new(),
            mail_drop: PathBuf::from("."),
        }
    }
}

impl DataLoggerConfig {
    /// Reads the JSON file named by `DATALOGGER_CONFIG` if set, otherwise the environment
    pub fn load() -> Result<Self, ConfigError> {
        match env::var("DATALOGGER_CONFIG") {
            Ok(path) if !path.is_empty() => Self::from_file(path),
            _ => Self::from_env(),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let name =
            env::var("DATALOGGER_NAME").map_err(|_| ConfigError::Missing("DATALOGGER_NAME"))?;
        let defaults = Self::default();

        Ok(Self {
            name,
            device_type: env::var("DATALOGGER_TYPE").unwrap_or_default(),
            server: env::var("DATALOGGER_SERVER").unwrap_or_default(),
            username: env::var("DATALOGGER_USERNAME").unwrap_or_default(),
            password: env::var("DATALOGGER_PASSWORD").unwrap_or_default(),
            subject: env::var("DATALOGGER_SUBJECT").unwrap_or_default(),
            location_id: env::var("DATALOGGER_LOCATION_ID").unwrap_or_default(),
            time_zone: env::var("DATALOGGER_TIME_ZONE").unwrap_or_default(),
            max_battery_voltage: parse_int_or(
                env::var("DATALOGGER_MAX_BATTERY_VOLTAGE").ok(),
                defaults.max_battery_voltage,
            ),
            interval: parse_int_or(env::var("DATALOGGER_INTERVAL").ok(), defaults.interval),
            simulated: parse_bool_safe(env::var("DATALOGGER_SIMULATED").ok()),
            channels: parse_list(env::var("DATALOGGER_CHANNELS").ok()),
            mail_drop: env::var("DATALOGGER_MAIL_DROP")
                .map(PathBuf::from)
                .unwrap_or(defaults.mail_drop),
        })
    }
}

/// Validated settings the data logger runs with
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub interval: Duration,
    pub max_battery_voltage: f64,
    pub time_zone: Tz,
}

impl Settings {
    /// Corrects out-of-range values to their defaults. Only an unknown time zone is fatal.
    pub fn from_config(config: &DataLoggerConfig) -> Result<Self, ConfigError> {
        let interval = effective_interval(config.interval);
        let max_battery_voltage = effective_max_battery_voltage(config.max_battery_voltage);
        let time_zone = parse_time_zone(&config.time_zone)?;

        Ok(Self {
            interval: Duration::from_secs(interval as u64 * 60),
            max_battery_voltage: max_battery_voltage as f64,
            time_zone,
        })
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_INTERVAL_MINUTES as u64 * 60),
            max_battery_voltage: DEFAULT_MAX_BATTERY_VOLTAGE as f64,
            time_zone: Tz::UTC,
        }
    }
}

/// Poll interval in minutes, 15 unless strictly between 0 and 360
pub fn effective_interval(minutes: i64) -> i64 {
    if minutes > 0 && minutes < MAX_INTERVAL_MINUTES {
        debug!("Applying interval of {minutes} minutes as configured.");
        minutes
    } else {
        info!(
            "Configured interval of {minutes} minutes is out of range; changing to {DEFAULT_INTERVAL_MINUTES} minutes."
        );
        DEFAULT_INTERVAL_MINUTES
    }
}

/// Reference battery voltage, 12 unless strictly between 0 and 36
pub fn effective_max_battery_voltage(volts: i64) -> i64 {
    if volts > 0 && volts < MAX_BATTERY_VOLTAGE {
        debug!("Applying max battery level of {volts} volt as configured.");
        volts
    } else {
        info!(
            "Max configured battery voltage of {volts} is out of range; changing to {DEFAULT_MAX_BATTERY_VOLTAGE} volt."
        );
        DEFAULT_MAX_BATTERY_VOLTAGE
    }
}

/// IANA zone name, UTC when empty
pub fn parse_time_zone(name: &str) -> Result<Tz, ConfigError> {
    let name = name.trim();
    if name.is_empty() {
        return Ok(Tz::UTC);
    }
    name.parse::<Tz>()
        .map_err(|_| ConfigError::UnknownTimeZone(name.to_string()))
}

/// Safely parses a boolean from an optional string, defaulting to false
pub fn parse_bool_safe(val: Option<String>) -> bool {
    val.unwrap_or_default()
        .to_ascii_lowercase()
        .parse()
        .unwrap_or_default()
}

fn parse_int_or(val: Option<String>, default: i64) -> i64 {
    val.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

fn parse_list(val: Option<String>) -> Vec<String> {
    val.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
