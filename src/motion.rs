//! Motion analysis
//!
//! Turns a stream of accelerometer samples into a step count and a count of
//! discrete movement events. Both counters are cumulative since boot (or the
//! last [`MotionAnalyzer::reset`]) and never decrease.

use crate::config::MotionConfig;
use crate::types::{Acceleration, GRAVITY};
use tracing::trace;

/// Step and movement detector
#[derive(Debug, Clone)]
pub struct MotionAnalyzer {
    config: MotionConfig,
    steps: u32,
    movements: u32,
    /// Start of the current excursion away from gravity
    excursion_start: Option<u64>,
    /// Whether the current excursion has been counted
    excursion_counted: bool,
    /// Magnitude currently above the step threshold
    in_step_peak: bool,
    last_step_at: Option<u64>,
    last_sample_at: Option<u64>,
}

impl Default for MotionAnalyzer {
    fn default() -> Self {
        Self::new(MotionConfig::default())
    }
}

impl MotionAnalyzer {
    pub fn new(config: MotionConfig) -> Self {
        Self {
            config,
            steps: 0,
            movements: 0,
            excursion_start: None,
            excursion_counted: false,
            in_step_peak: false,
            last_step_at: None,
            last_sample_at: None,
        }
    }

    /// Feed one accelerometer sample taken at `timestamp_ms`
    pub fn ingest(&mut self, sample: Acceleration, timestamp_ms: u64) {
        if let Some(last) = self.last_sample_at {
            if timestamp_ms < last {
                trace!(timestamp_ms, last, "dropping out-of-order accelerometer sample");
                return;
            }
        }
        self.last_sample_at = Some(timestamp_ms);

        let magnitude = sample.magnitude();
        if !magnitude.is_finite() {
            return;
        }

        self.track_movement(magnitude, timestamp_ms);
        self.track_step(magnitude, timestamp_ms);
    }

    fn track_movement(&mut self, magnitude: f64, timestamp_ms: u64) {
        let deviation = (magnitude - GRAVITY).abs();
        if deviation <= self.config.movement_threshold {
            self.excursion_start = None;
            self.excursion_counted = false;
            return;
        }

        let start = *self.excursion_start.get_or_insert(timestamp_ms);
        if !self.excursion_counted
            && timestamp_ms.saturating_sub(start) >= self.config.min_movement_duration_ms
        {
            self.movements = self.movements.saturating_add(1);
            self.excursion_counted = true;
        }
    }

    fn track_step(&mut self, magnitude: f64, timestamp_ms: u64) {
        if magnitude <= GRAVITY + self.config.step_threshold {
            self.in_step_peak = false;
            return;
        }
        if self.in_step_peak {
            return;
        }
        self.in_step_peak = true;

        let spaced = self
            .last_step_at
            .map_or(true, |last| {
                timestamp_ms.saturating_sub(last) >= self.config.min_step_interval_ms
            });
        if spaced {
            self.steps = self.steps.saturating_add(1);
            self.last_step_at = Some(timestamp_ms);
        }
    }

    /// Steps since boot or reset
    pub fn calculate_steps(&self) -> u32 {
        self.steps
    }

    /// Movement events since boot or reset
    pub fn detect_movement(&self) -> u32 {
        self.movements
    }

    /// Start a new session
    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shake(strength: f64) -> Acceleration {
        Acceleration::new(strength, 0.0, GRAVITY)
    }

    #[test]
    fn test_still_device_counts_nothing() {
        let mut analyzer = MotionAnalyzer::default();
        for i in 0..100 {
            analyzer.ingest(Acceleration::at_rest(), i * 20);
        }
        assert_eq!(analyzer.calculate_steps(), 0);
        assert_eq!(analyzer.detect_movement(), 0);
    }

    #[test]
    fn test_short_jitter_is_not_movement() {
        let mut analyzer = MotionAnalyzer::default();
        // 100 ms spike, below the 200 ms minimum
        analyzer.ingest(shake(8.0), 0);
        analyzer.ingest(shake(8.0), 100);
        analyzer.ingest(Acceleration::at_rest(), 150);
        assert_eq!(analyzer.detect_movement(), 0);
    }

    #[test]
    fn test_sustained_excursion_counts_once() {
        let mut analyzer = MotionAnalyzer::default();
        for t in (0..=1000).step_by(50) {
            analyzer.ingest(shake(8.0), t);
        }
        assert_eq!(analyzer.detect_movement(), 1);

        analyzer.ingest(Acceleration::at_rest(), 1050);
        for t in (1100..=1400).step_by(50) {
            analyzer.ingest(shake(8.0), t);
        }
        assert_eq!(analyzer.detect_movement(), 2);
    }

    #[test]
    fn test_steps_respect_min_interval() {
        let mut analyzer = MotionAnalyzer::default();
        let peak = Acceleration::new(0.0, 0.0, GRAVITY + 3.0);
        // Peaks every 100 ms: only every third one is spaced 250 ms+ apart
        for i in 0..10u64 {
            analyzer.ingest(peak, i * 100);
            analyzer.ingest(Acceleration::at_rest(), i * 100 + 50);
        }
        assert_eq!(analyzer.calculate_steps(), 4);
    }

    #[test]
    fn test_counters_never_decrease() {
        let mut analyzer = MotionAnalyzer::default();
        let mut last_steps = 0;
        let mut last_movements = 0;
        for i in 0..200u64 {
            let sample = if i % 7 < 4 { shake(6.0) } else { Acceleration::at_rest() };
            analyzer.ingest(sample, i * 60);
            assert!(analyzer.calculate_steps() >= last_steps);
            assert!(analyzer.detect_movement() >= last_movements);
            last_steps = analyzer.calculate_steps();
            last_movements = analyzer.detect_movement();
        }
        assert!(last_steps > 0);
    }

    #[test]
    fn test_out_of_order_samples_ignored() {
        let mut analyzer = MotionAnalyzer::default();
        analyzer.ingest(Acceleration::at_rest(), 1000);
        analyzer.ingest(shake(8.0), 500);
        analyzer.ingest(shake(8.0), 600);
        assert_eq!(analyzer.detect_movement(), 0);
    }

    #[test]
    fn test_reset_clears_counters() {
        let mut analyzer = MotionAnalyzer::default();
        for t in (0..=500).step_by(50) {
            analyzer.ingest(shake(8.0), t);
        }
        assert!(analyzer.detect_movement() > 0);
        analyzer.reset();
        assert_eq!(analyzer.detect_movement(), 0);
        assert_eq!(analyzer.calculate_steps(), 0);
    }
}
