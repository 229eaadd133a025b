//! Sensor health monitoring
//!
//! Tracks the latest readings and read failures of each sensor and turns
//! them into one binary health signal. The focus engine uses it to weight
//! heart rate evidence; diagnostics show the full report.

use crate::config::HealthConfig;
use crate::error::{DeviceError, SensorKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Health of a single sensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorHealth {
    pub sensor: SensorKind,
    pub healthy: bool,
    pub consecutive_failures: u32,
    pub last_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub problem: Option<String>,
}

/// Diagnostics view over all sensors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub sensors: Vec<SensorHealth>,
}

/// Plausibility and failure tracking for the sensor set
#[derive(Debug, Clone)]
pub struct HealthMonitor {
    config: HealthConfig,
    consecutive_failures: HashMap<SensorKind, u32>,
    last_heart_rate: Option<f64>,
    last_temperature: Option<f64>,
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new(HealthConfig::default())
    }
}

impl HealthMonitor {
    pub fn new(config: HealthConfig) -> Self {
        Self {
            config,
            consecutive_failures: HashMap::new(),
            last_heart_rate: None,
            last_temperature: None,
        }
    }

    /// Validate a heart rate reading against [0, max_heart_rate]
    pub fn check_heart_rate(&self, bpm: f64) -> Result<f64, DeviceError> {
        if bpm.is_finite() && (0.0..=self.config.max_heart_rate).contains(&bpm) {
            Ok(bpm)
        } else {
            Err(DeviceError::ImplausibleReading {
                sensor: SensorKind::HeartRate,
                value: bpm,
            })
        }
    }

    /// Validate a temperature reading against the configured range
    pub fn check_temperature(&self, celsius: f64) -> Result<f64, DeviceError> {
        if celsius.is_finite()
            && (self.config.min_temperature_c..=self.config.max_temperature_c).contains(&celsius)
        {
            Ok(celsius)
        } else {
            Err(DeviceError::ImplausibleReading {
                sensor: SensorKind::Temperature,
                value: celsius,
            })
        }
    }

    /// Record a successful read of `sensor`
    pub fn record_success(&mut self, sensor: SensorKind) {
        self.consecutive_failures.insert(sensor, 0);
    }

    /// Record a failed read of `sensor`
    pub fn record_failure(&mut self, sensor: SensorKind) {
        let count = self.consecutive_failures.entry(sensor).or_insert(0);
        *count = count.saturating_add(1);
    }

    pub fn record_heart_rate(&mut self, bpm: f64) {
        self.record_success(SensorKind::HeartRate);
        self.last_heart_rate = Some(bpm);
    }

    pub fn record_temperature(&mut self, celsius: f64) {
        self.record_success(SensorKind::Temperature);
        self.last_temperature = Some(celsius);
    }

    pub fn consecutive_failures(&self, sensor: SensorKind) -> u32 {
        self.consecutive_failures.get(&sensor).copied().unwrap_or(0)
    }

    /// True when every tracked reading is plausible and no sensor is over its failure budget
    pub fn is_sensor_healthy(&self) -> bool {
        self.report().healthy
    }

    pub fn report(&self) -> HealthReport {
        let sensors = vec![
            self.sensor_health(SensorKind::HeartRate, self.last_heart_rate, |v| {
                self.check_heart_rate(v).err()
            }),
            self.sensor_health(SensorKind::Accelerometer, None, |_| None),
            self.sensor_health(SensorKind::Temperature, self.last_temperature, |v| {
                self.check_temperature(v).err()
            }),
        ];
        HealthReport {
            healthy: sensors.iter().all(|s| s.healthy),
            sensors,
        }
    }

    fn sensor_health(
        &self,
        sensor: SensorKind,
        last_value: Option<f64>,
        check: impl Fn(f64) -> Option<DeviceError>,
    ) -> SensorHealth {
        let failures = self.consecutive_failures(sensor);
        let problem = if failures > self.config.max_consecutive_failures {
            Some(format!("{} consecutive read failures", failures))
        } else {
            last_value.and_then(check).map(|e| e.to_string())
        };

        SensorHealth {
            sensor,
            healthy: problem.is_none(),
            consecutive_failures: failures,
            last_value,
            problem,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_monitor_is_healthy() {
        assert!(HealthMonitor::default().is_sensor_healthy());
    }

    #[test]
    fn test_heart_rate_range() {
        let monitor = HealthMonitor::default();
        assert!(monitor.check_heart_rate(0.0).is_ok());
        assert!(monitor.check_heart_rate(220.0).is_ok());
        assert!(monitor.check_heart_rate(220.5).is_err());
        assert!(monitor.check_heart_rate(-1.0).is_err());
        assert!(monitor.check_heart_rate(f64::NAN).is_err());
    }

    #[test]
    fn test_implausible_temperature_downgrades_health() {
        let mut monitor = HealthMonitor::default();
        monitor.record_temperature(33.0);
        assert!(monitor.is_sensor_healthy());

        monitor.record_temperature(80.0);
        assert!(!monitor.is_sensor_healthy());
        let report = monitor.report();
        let temp = report
            .sensors
            .iter()
            .find(|s| s.sensor == SensorKind::Temperature)
            .unwrap();
        assert!(!temp.healthy);
        assert!(temp.problem.is_some());
    }

    #[test]
    fn test_failure_budget() {
        let mut monitor = HealthMonitor::new(HealthConfig {
            max_consecutive_failures: 2,
            ..Default::default()
        });

        monitor.record_failure(SensorKind::Accelerometer);
        monitor.record_failure(SensorKind::Accelerometer);
        assert!(monitor.is_sensor_healthy());

        monitor.record_failure(SensorKind::Accelerometer);
        assert!(!monitor.is_sensor_healthy());

        monitor.record_success(SensorKind::Accelerometer);
        assert!(monitor.is_sensor_healthy());
        assert_eq!(monitor.consecutive_failures(SensorKind::Accelerometer), 0);
    }
}
