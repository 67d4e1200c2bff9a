//! Irrigation control policy applied on top of the cached sensor snapshot.

use crate::config::ControlConfig;
use crate::session::{SensorSnapshot, WaterSource};

/// Decides actuator states from sensor readings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlPolicy {
    /// Below this temperature the rainwater line may freeze.
    pub frost_threshold_celsius: f64,
    /// Water volume represented by one meter pulse.
    pub litres_per_pulse: f64,
}

impl Default for ControlPolicy {
    fn default() -> Self {
        Self {
            frost_threshold_celsius: 1.0,
            litres_per_pulse: 1.0,
        }
    }
}

impl From<&ControlConfig> for ControlPolicy {
    fn from(config: &ControlConfig) -> Self {
        Self {
            frost_threshold_celsius: config.frost_threshold_celsius,
            litres_per_pulse: config.litres_per_pulse,
        }
    }
}

impl ControlPolicy {
    fn rainwater_usable(&self, snapshot: &SensorSnapshot) -> bool {
        snapshot.tank_full && snapshot.temperature_celsius >= self.frost_threshold_celsius
    }

    /// Rainwater when the tank is full and there is no frost, municipal otherwise.
    pub fn water_source(&self, snapshot: &SensorSnapshot) -> WaterSource {
        WaterSource::from_use_rain(self.rainwater_usable(snapshot))
    }

    /// Pump runs only on demand, with a full tank and no frost.
    pub fn pump_on(&self, snapshot: &SensorSnapshot, water_demand: bool) -> bool {
        water_demand && self.rainwater_usable(snapshot)
    }

    /// Total water measured by the pulse counter, in litres.
    pub fn consumption_litres(&self, snapshot: &SensorSnapshot) -> f64 {
        snapshot.pulse_count as f64 * self.litres_per_pulse
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(temperature_celsius: f64, tank_full: bool) -> SensorSnapshot {
        SensorSnapshot {
            temperature_celsius,
            tank_full,
            pulse_count: 0,
        }
    }

    #[test]
    fn test_rainwater_needs_full_tank_and_no_frost() {
        let policy = ControlPolicy::default();

        assert_eq!(
            policy.water_source(&snapshot(15.0, true)),
            WaterSource::Rainwater
        );
        assert_eq!(
            policy.water_source(&snapshot(15.0, false)),
            WaterSource::Municipal
        );
        assert_eq!(
            policy.water_source(&snapshot(0.5, true)),
            WaterSource::Municipal
        );
        // Threshold itself counts as frost-free.
        assert_eq!(
            policy.water_source(&snapshot(1.0, true)),
            WaterSource::Rainwater
        );
    }

    #[test]
    fn test_pump_requires_demand() {
        let policy = ControlPolicy::default();

        assert!(policy.pump_on(&snapshot(20.0, true), true));
        assert!(!policy.pump_on(&snapshot(20.0, true), false));
        assert!(!policy.pump_on(&snapshot(20.0, false), true));
        assert!(!policy.pump_on(&snapshot(-3.0, true), true));
    }

    #[test]
    fn test_consumption() {
        let policy = ControlPolicy {
            litres_per_pulse: 0.5,
            ..ControlPolicy::default()
        };
        let snapshot = SensorSnapshot {
            pulse_count: 100_000,
            ..SensorSnapshot::default()
        };

        assert_eq!(policy.consumption_litres(&snapshot), 50_000.0);
    }

    #[test]
    fn test_from_config() {
        let config = ControlConfig {
            enabled: true,
            frost_threshold_celsius: 3.0,
            litres_per_pulse: 2.5,
            irrigation_demand: false,
        };
        let policy = ControlPolicy::from(&config);

        assert_eq!(policy.frost_threshold_celsius, 3.0);
        assert_eq!(policy.litres_per_pulse, 2.5);
    }
}
