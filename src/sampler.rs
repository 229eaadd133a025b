//! Sensor sampling
//!
//! Wraps the sensor driver, feeds the motion analyzer and health monitor, and
//! packs everything into one [`SensorData`] snapshot per call. Read failures
//! never escape: the sampler falls back to the last good value and lets the
//! health monitor downgrade.

use crate::config::{HealthConfig, MotionConfig};
use crate::error::{DeviceError, SensorKind};
use crate::health::HealthMonitor;
use crate::motion::MotionAnalyzer;
use crate::platform::SensorDriver;
use crate::types::SensorData;
use tracing::{debug, warn};

/// Snapshot producer over a sensor driver
#[derive(Debug)]
pub struct SensorSampler<D> {
    driver: D,
    motion: MotionAnalyzer,
    health: HealthMonitor,
    /// Last plausible heart rate
    heart_rate: f64,
    temperature: Option<f64>,
    /// Cumulative movements already reported in earlier snapshots
    movements_reported: u32,
    interactions: u32,
    last_timestamp: u64,
}

impl<D: SensorDriver> SensorSampler<D> {
    pub fn new(driver: D, motion: MotionConfig, health: HealthConfig) -> Self {
        Self {
            driver,
            motion: MotionAnalyzer::new(motion),
            health: HealthMonitor::new(health),
            heart_rate: 0.0,
            temperature: None,
            movements_reported: 0,
            interactions: 0,
            last_timestamp: 0,
        }
    }

    pub fn health(&self) -> &HealthMonitor {
        &self.health
    }

    pub fn motion(&self) -> &MotionAnalyzer {
        &self.motion
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Last plausible temperature, if any
    pub fn temperature(&self) -> Option<f64> {
        self.temperature
    }

    /// Count one user interaction (button press, touch) toward the next snapshot
    pub fn record_interaction(&mut self) {
        self.interactions = self.interactions.saturating_add(1);
    }

    /// Read the accelerometer once and feed the analyzer
    pub fn sample_motion(&mut self, timestamp_ms: u64) {
        match self.driver.read_accelerometer() {
            Ok(sample) => {
                self.health.record_success(SensorKind::Accelerometer);
                self.motion.ingest(sample, timestamp_ms);
            }
            Err(e) => self.read_failed(SensorKind::Accelerometer, e),
        }
    }

    /// Produce a snapshot. `timestamp_ms` is nudged forward if needed so snapshots stay strictly increasing.
    pub fn collect(&mut self, timestamp_ms: u64) -> SensorData {
        let timestamp = timestamp_ms.max(self.last_timestamp + 1);
        self.last_timestamp = timestamp;

        self.sample_motion(timestamp);
        self.refresh_heart_rate();
        self.refresh_temperature();

        let movements = self.motion.detect_movement();
        let movement_count = movements.saturating_sub(self.movements_reported);
        self.movements_reported = movements;

        SensorData {
            heart_rate: self.heart_rate,
            steps: self.motion.calculate_steps(),
            movement_count,
            interaction_count: std::mem::take(&mut self.interactions),
            timestamp,
        }
    }

    fn refresh_heart_rate(&mut self) {
        match self.driver.read_heart_rate() {
            Ok(bpm) => {
                self.health.record_heart_rate(bpm);
                match self.health.check_heart_rate(bpm) {
                    Ok(bpm) => self.heart_rate = bpm,
                    Err(e) => debug!(error = %e, "discarding heart rate reading"),
                }
            }
            Err(e) => self.read_failed(SensorKind::HeartRate, e),
        }
    }

    fn refresh_temperature(&mut self) {
        match self.driver.read_temperature() {
            Ok(celsius) => {
                self.health.record_temperature(celsius);
                match self.health.check_temperature(celsius) {
                    Ok(celsius) => self.temperature = Some(celsius),
                    Err(e) => debug!(error = %e, "discarding temperature reading"),
                }
            }
            Err(e) => self.read_failed(SensorKind::Temperature, e),
        }
    }

    fn read_failed(&mut self, sensor: SensorKind, error: DeviceError) {
        self.health.record_failure(sensor);
        warn!(
            %sensor,
            failures = self.health.consecutive_failures(sensor),
            error = %error,
            "sensor read failed, keeping last value"
        );
    }
}
