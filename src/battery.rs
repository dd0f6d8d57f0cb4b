use tracing::debug;

/// Converts a battery voltage into a charge level percentage relative to `max_voltage`.
///
/// The result is not clamped, so a voltage above the reference maximum reports more than 100.
/// A zero or otherwise unusable reference maximum yields 0 instead of an error.
pub fn battery_level(voltage: f64, max_voltage: f64) -> f64 {
    if !(max_voltage > 0.0) || !max_voltage.is_finite() {
        debug!("Cannot derive battery level from {voltage} V with a maximum of {max_voltage} V");
        return 0.0;
    }

    // Halves round up, also for negative levels
    let level = (voltage / max_voltage * 100.0 + 0.5).floor();
    if !level.is_finite() {
        debug!("Battery level for {voltage} V is not a number, using 0");
        return 0.0;
    }
    level
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_half_charge() {
        assert_eq!(battery_level(6.0, 12.0), 50.0);
        assert_eq!(battery_level(9.0, 12.0), 75.0);
    }

    #[test]
    fn test_empty_battery() {
        assert_eq!(battery_level(0.0, 12.0), 0.0);
    }

    #[test]
    fn test_zero_max_voltage_degrades_to_zero() {
        assert_eq!(battery_level(6.0, 0.0), 0.0);
        assert_eq!(battery_level(0.0, 0.0), 0.0);
        assert_eq!(battery_level(6.0, -12.0), 0.0);
        assert_eq!(battery_level(6.0, f64::NAN), 0.0);
    }

    #[test]
    fn test_not_clamped_above_max() {
        assert_eq!(battery_level(13.2, 12.0), 110.0);
    }

    #[test]
    fn test_rounding() {
        // 12.5 / 24 * 100 = 52.083..
        assert_eq!(battery_level(12.5, 24.0), 52.0);
        assert_eq!(battery_level(10.5, 12.0), 88.0);
    }

    #[test]
    fn test_negative_halves_round_up() {
        // -0.5 / 4 * 100 = -12.5
        assert_eq!(battery_level(-0.5, 4.0), -12.0);
        assert_eq!(battery_level(-0.75, 12.0), -6.0);
    }

    #[test]
    fn test_non_finite_voltage() {
        assert_eq!(battery_level(f64::NAN, 12.0), 0.0);
        assert_eq!(battery_level(f64::INFINITY, 12.0), 0.0);
    }
}
