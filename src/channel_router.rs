use crate::snapshot::Field;
use chrono::{DateTime, Utc};
use serde_derive::Serialize;

/// Marker appended to channel labels carrying meter-style accumulated totals
pub const CUMULATIVE_SUFFIX: &str = "_reading";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReadingKind {
    Instantaneous,
    Cumulative,
}

/// A single value for an attached sub-device channel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub channel_id: String,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub kind: ReadingKind,
}

/// Channels reported by the data logger about itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnChannel {
    ExternalPower,
    BatteryOne,
    BatteryTwo,
    SystemTemperature,
}

impl OwnChannel {
    const LABELS: [(&'static str, OwnChannel); 4] = [
        ("External Power Vol_reading", OwnChannel::ExternalPower),
        ("Battery 1 Voltage_reading", OwnChannel::BatteryOne),
        ("Battery 2 Voltage_reading", OwnChannel::BatteryTwo),
        ("System Temp_reading", OwnChannel::SystemTemperature),
    ];

    pub fn from_label(label: &str) -> Option<Self> {
        Self::LABELS
            .iter()
            .find(|(known, _)| *known == label)
            .map(|(_, channel)| *channel)
    }

    /// Field receiving the raw reading
    pub fn field(self) -> Field {
        match self {
            OwnChannel::ExternalPower => Field::ExternalPowerVoltage,
            OwnChannel::BatteryOne => Field::BatteryOneVoltage,
            OwnChannel::BatteryTwo => Field::BatteryTwoVoltage,
            OwnChannel::SystemTemperature => Field::Temperature,
        }
    }

    /// Field receiving the charge level derived from the raw reading
    pub fn level_field(self) -> Option<Field> {
        match self {
            OwnChannel::BatteryOne => Some(Field::BatteryOneLevel),
            OwnChannel::BatteryTwo => Some(Field::BatteryTwoLevel),
            OwnChannel::ExternalPower | OwnChannel::SystemTemperature => None,
        }
    }
}

/// Where a CSV row belongs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Own(OwnChannel),
    External { channel_id: String, kind: ReadingKind },
}

/// Classifies a row label. Own-device labels are matched exactly, everything else is treated as
/// an external channel whose id is the label up to the first cumulative marker.
pub fn route(label: &str) -> Route {
    if let Some(channel) = OwnChannel::from_label(label) {
        return Route::Own(channel);
    }

    match label.find(CUMULATIVE_SUFFIX) {
        Some(pos) => Route::External {
            channel_id: label[..pos].to_string(),
            kind: ReadingKind::Cumulative,
        },
        None => Route::External {
            channel_id: label.to_string(),
            kind: ReadingKind::Instantaneous,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_own_labels() {
        assert_eq!(
            route("External Power Vol_reading"),
            Route::Own(OwnChannel::ExternalPower)
        );
        assert_eq!(
            route("Battery 1 Voltage_reading"),
            Route::Own(OwnChannel::BatteryOne)
        );
        assert_eq!(
            route("Battery 2 Voltage_reading"),
            Route::Own(OwnChannel::BatteryTwo)
        );
        assert_eq!(
            route("System Temp_reading"),
            Route::Own(OwnChannel::SystemTemperature)
        );
    }

    #[test]
    fn test_own_labels_match_exactly() {
        assert_eq!(
            route("battery 1 voltage_reading"),
            Route::External {
                channel_id: "battery 1 voltage".to_string(),
                kind: ReadingKind::Cumulative,
            }
        );
    }

    #[test]
    fn test_cumulative_channel() {
        assert_eq!(
            route("Flow Meter 3_reading"),
            Route::External {
                channel_id: "Flow Meter 3".to_string(),
                kind: ReadingKind::Cumulative,
            }
        );
    }

    #[test]
    fn test_cumulative_marker_first_occurrence() {
        assert_eq!(
            route("Rain_reading_reading"),
            Route::External {
                channel_id: "Rain".to_string(),
                kind: ReadingKind::Cumulative,
            }
        );
    }

    #[test]
    fn test_instantaneous_channel() {
        assert_eq!(
            route("Level Sensor"),
            Route::External {
                channel_id: "Level Sensor".to_string(),
                kind: ReadingKind::Instantaneous,
            }
        );
    }

    #[test]
    fn test_battery_channels_have_level_fields() {
        assert_eq!(OwnChannel::BatteryOne.field(), Field::BatteryOneVoltage);
        assert_eq!(
            OwnChannel::BatteryOne.level_field(),
            Some(Field::BatteryOneLevel)
        );
        assert_eq!(
            OwnChannel::BatteryTwo.level_field(),
            Some(Field::BatteryTwoLevel)
        );
        assert_eq!(OwnChannel::ExternalPower.level_field(), None);
        assert_eq!(OwnChannel::SystemTemperature.field(), Field::Temperature);
    }
}
