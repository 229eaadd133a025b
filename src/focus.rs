//! Focus score fusion
//!
//! Fuses one [`SensorData`] snapshot into a [`FocusData`] score. Scoring
//! starts at 100 and subtracts independent penalties:
//!
//! - heart rate outside the resting band (proportional to the deviation, capped)
//! - movements beyond the per-snapshot threshold (fixed cost per excess movement)
//! - too few interactions (a smaller, separate disengagement cost)
//!
//! Thresholds compare strictly, so a reading exactly on a boundary never
//! counts as a distraction. The result saturates into [0, 100].

use crate::config::FocusConfig;
use crate::types::{FocusData, SensorData};

/// Score ceiling and starting point
pub const MAX_FOCUS_SCORE: f64 = 100.0;

/// Above this a heart rate reading is physically implausible and is ignored
const MAX_PLAUSIBLE_HEART_RATE: f64 = 220.0;

/// Focus score calculator
#[derive(Debug, Clone, Default)]
pub struct FocusEngine {
    config: FocusConfig,
}

/// Penalties applied to one snapshot, kept separate for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FocusBreakdown {
    pub heart_rate_penalty: f64,
    pub movement_penalty: f64,
    pub disengagement_penalty: f64,
    pub distractions: u32,
}

impl FocusBreakdown {
    pub fn total_penalty(&self) -> f64 {
        self.heart_rate_penalty + self.movement_penalty + self.disengagement_penalty
    }
}

impl FocusEngine {
    pub fn new(config: FocusConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FocusConfig {
        &self.config
    }

    /// Score a snapshot assuming healthy sensors
    pub fn calculate_focus_score(&self, data: &SensorData) -> FocusData {
        self.calculate_with_health(data, true)
    }

    /// Score a snapshot, discounting heart rate evidence when sensors are unhealthy
    pub fn calculate_with_health(&self, data: &SensorData, healthy: bool) -> FocusData {
        let breakdown = self.breakdown(data, healthy);
        let score = (MAX_FOCUS_SCORE - breakdown.total_penalty())
            .round()
            .clamp(0.0, MAX_FOCUS_SCORE);

        FocusData {
            focus_score: score as u8,
            distraction_count: breakdown.distractions,
            timestamp: data.timestamp,
        }
    }

    /// Per-signal penalties for a snapshot
    pub fn breakdown(&self, data: &SensorData, healthy: bool) -> FocusBreakdown {
        let config = &self.config;
        let mut breakdown = FocusBreakdown::default();

        let confidence = if healthy {
            1.0
        } else {
            config.degraded_confidence
        };
        let deviation = self.heart_rate_deviation(data.heart_rate);
        if deviation > 0.0 {
            breakdown.heart_rate_penalty =
                (deviation * config.hr_penalty_per_bpm).min(config.hr_penalty_cap) * confidence;
            breakdown.distractions += 1;
        }

        let excess_movements = data.movement_count.saturating_sub(config.movement_threshold);
        if excess_movements > 0 {
            breakdown.movement_penalty = f64::from(excess_movements) * config.movement_penalty;
            breakdown.distractions = breakdown.distractions.saturating_add(excess_movements);
        }

        if data.interaction_count < config.min_interactions {
            breakdown.disengagement_penalty = config.disengagement_penalty;
        }

        breakdown
    }

    /// Distance (bpm) of a heart rate outside the resting band; 0 inside it or when the reading is unusable
    fn heart_rate_deviation(&self, bpm: f64) -> f64 {
        // 0 bpm is "no skin contact", not bradycardia
        if !bpm.is_finite() || bpm <= 0.0 || bpm > MAX_PLAUSIBLE_HEART_RATE {
            return 0.0;
        }
        if bpm > self.config.resting_hr_max {
            bpm - self.config.resting_hr_max
        } else if bpm < self.config.resting_hr_min {
            self.config.resting_hr_min - bpm
        } else {
            0.0
        }
    }
}
