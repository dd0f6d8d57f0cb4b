use crate::error::RowError;
use chrono::{DateTime, Utc};
use serde_derive::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The telemetry attributes native to the data logger itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    ExternalPowerVoltage,
    BatteryOneVoltage,
    BatteryOneLevel,
    BatteryTwoVoltage,
    BatteryTwoLevel,
    Temperature,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::ExternalPowerVoltage,
        Field::BatteryOneVoltage,
        Field::BatteryOneLevel,
        Field::BatteryTwoVoltage,
        Field::BatteryTwoLevel,
        Field::Temperature,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Field::ExternalPowerVoltage => "externalPowerVoltage",
            Field::BatteryOneVoltage => "batteryOneVoltage",
            Field::BatteryOneLevel => "batteryOneLevel",
            Field::BatteryTwoVoltage => "batteryTwoVoltage",
            Field::BatteryTwoLevel => "batteryTwoLevel",
            Field::Temperature => "temperature",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Field {
    type Err = RowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .into_iter()
            .find(|field| field.name() == s)
            .ok_or_else(|| RowError::UnknownField(s.to_string()))
    }
}

/// Values of every own-device field at one instant. Unreported fields stay at zero.
#[derive(Default, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceState {
    pub external_power_voltage: f64,
    pub battery_one_voltage: f64,
    pub battery_one_level: f64,
    pub battery_two_voltage: f64,
    pub battery_two_level: f64,
    pub temperature: f64,
}

impl DeviceState {
    pub fn get(&self, field: Field) -> f64 {
        match field {
            Field::ExternalPowerVoltage => self.external_power_voltage,
            Field::BatteryOneVoltage => self.battery_one_voltage,
            Field::BatteryOneLevel => self.battery_one_level,
            Field::BatteryTwoVoltage => self.battery_two_voltage,
            Field::BatteryTwoLevel => self.battery_two_level,
            Field::Temperature => self.temperature,
        }
    }

    pub fn set(&mut self, field: Field, value: f64) {
        let slot = match field {
            Field::ExternalPowerVoltage => &mut self.external_power_voltage,
            Field::BatteryOneVoltage => &mut self.battery_one_voltage,
            Field::BatteryOneLevel => &mut self.battery_one_level,
            Field::BatteryTwoVoltage => &mut self.battery_two_voltage,
            Field::BatteryTwoLevel => &mut self.battery_two_level,
            Field::Temperature => &mut self.temperature,
        };
        *slot = value;
    }
}

/// The device's own-channel state at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    pub state: DeviceState,
}

impl Snapshot {
    /// Opens a snapshot with every field seeded at zero
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            state: DeviceState::default(),
        }
    }
}

/// Groups field writes into snapshots, one per run of identical timestamps.
///
/// Only one snapshot is open at a time. A write with a different timestamp seals the open
/// snapshot and starts a fresh, zero-seeded one, so rows must arrive grouped by timestamp to
/// end up in the same snapshot.
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    open: Option<Snapshot>,
    sealed: Vec<Snapshot>,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes `value` into `field` of the snapshot covering `timestamp`, opening or sealing
    /// snapshots as needed.
    pub fn observe(&mut self, timestamp: DateTime<Utc>, field: Field, value: f64) {
        let snapshot = match self.open.take() {
            Some(open) if open.timestamp == timestamp => open,
            Some(open) => {
                self.sealed.push(open);
                Snapshot::new(timestamp)
            }
            None => Snapshot::new(timestamp),
        };
        self.open.insert(snapshot).state.set(field, value);
    }

    /// Seals the open snapshot, if any
    pub fn seal(&mut self) {
        if let Some(open) = self.open.take() {
            self.sealed.push(open);
        }
    }

    /// Seals the open snapshot and returns every snapshot in discovery order
    pub fn finish(mut self) -> Vec<Snapshot> {
        self.seal();
        self.sealed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    #[test]
    fn test_empty_builder_yields_nothing() {
        assert!(SnapshotBuilder::new().finish().is_empty());
    }

    #[test]
    fn test_same_timestamp_merges() {
        let mut builder = SnapshotBuilder::new();
        builder.observe(t(0), Field::BatteryOneVoltage, 6.0);
        builder.observe(t(0), Field::BatteryTwoVoltage, 9.0);
        builder.observe(t(0), Field::Temperature, 24.5);

        let snapshots = builder.finish();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].timestamp, t(0));
        assert_eq!(snapshots[0].state.battery_one_voltage, 6.0);
        assert_eq!(snapshots[0].state.battery_two_voltage, 9.0);
        assert_eq!(snapshots[0].state.temperature, 24.5);
        assert_eq!(snapshots[0].state.external_power_voltage, 0.0);
    }

    #[test]
    fn test_one_snapshot_per_distinct_timestamp() {
        let mut builder = SnapshotBuilder::new();
        for minute in 0..5 {
            builder.observe(t(minute * 5), Field::ExternalPowerVoltage, 12.0);
            builder.observe(t(minute * 5), Field::Temperature, minute as f64);
        }

        let snapshots = builder.finish();
        assert_eq!(snapshots.len(), 5);
        for (i, snapshot) in snapshots.iter().enumerate() {
            assert_eq!(snapshot.timestamp, t(i as i64 * 5));
            assert_eq!(snapshot.state.temperature, i as f64);
        }
    }

    #[test]
    fn test_last_write_wins_within_group() {
        let mut builder = SnapshotBuilder::new();
        builder.observe(t(0), Field::Temperature, 20.0);
        builder.observe(t(0), Field::Temperature, 21.0);

        let snapshots = builder.finish();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].state.temperature, 21.0);
    }

    #[test]
    fn test_new_snapshot_is_zero_seeded() {
        let mut builder = SnapshotBuilder::new();
        builder.observe(t(0), Field::BatteryOneVoltage, 6.0);
        builder.observe(t(5), Field::ExternalPowerVoltage, 0.5);

        let snapshots = builder.finish();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[1].state.battery_one_voltage, 0.0);
        assert_eq!(snapshots[1].state.external_power_voltage, 0.5);
    }

    #[test]
    fn test_returning_timestamp_opens_new_snapshot() {
        // Blocks sorted by field type rather than time revisit earlier timestamps
        let mut builder = SnapshotBuilder::new();
        builder.observe(t(0), Field::BatteryOneVoltage, 6.0);
        builder.observe(t(5), Field::BatteryOneVoltage, 7.0);
        builder.observe(t(0), Field::BatteryTwoVoltage, 9.0);

        let snapshots = builder.finish();
        let timestamps: Vec<_> = snapshots.iter().map(|s| s.timestamp).collect();
        assert_eq!(timestamps, vec![t(0), t(5), t(0)]);
    }

    #[test]
    fn test_field_names_round_trip() {
        for field in Field::ALL {
            assert_eq!(field.name().parse::<Field>(), Ok(field));
        }
        assert_eq!(
            "voltage".parse::<Field>(),
            Err(RowError::UnknownField("voltage".to_string()))
        );
    }

    #[test]
    fn test_device_state_get_set() {
        let mut state = DeviceState::default();
        for (i, field) in Field::ALL.into_iter().enumerate() {
            state.set(field, i as f64 + 1.0);
        }
        for (i, field) in Field::ALL.into_iter().enumerate() {
            assert_eq!(state.get(field), i as f64 + 1.0);
        }
    }

    #[test]
    fn test_device_state_serializes_camel_case() {
        let state = DeviceState {
            battery_one_level: 50.0,
            ..Default::default()
        };
        let json = serde_json::to_value(state).unwrap();
        assert_eq!(json["batteryOneLevel"], 50.0);
        assert_eq!(json["externalPowerVoltage"], 0.0);
    }
}
