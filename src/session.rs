//! Focus session tracking
//!
//! Keeps a rolling window of recent focus scores so the display can show a
//! stable value instead of per-snapshot noise, and accumulates the totals the
//! analytics backend receives at the end of a session.

use crate::types::{FocusData, SensorData};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default rolling window in snapshots
pub const DEFAULT_SESSION_WINDOW: usize = 12;

/// Session totals uploaded for analytics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub heart_rate_avg: Option<f64>,
    pub movement_count: u64,
    pub interaction_count: u64,
    pub duration_minutes: f64,
    /// Timestamp of the first snapshot (ms)
    pub start_time: Option<u64>,
    /// Timestamp of the last snapshot (ms)
    pub end_time: Option<u64>,
    pub average_focus_score: Option<f64>,
    pub smoothed_focus_score: Option<u8>,
    pub distraction_count: u64,
    pub samples: u64,
}

/// Rolling focus window plus session accumulators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FocusSession {
    /// Most recent focus scores
    recent_scores: VecDeque<u8>,
    /// Maximum window size
    window_size: usize,
    heart_rate_sum: f64,
    heart_rate_samples: u64,
    focus_sum: u64,
    movement_count: u64,
    interaction_count: u64,
    distraction_count: u64,
    samples: u64,
    start_time: Option<u64>,
    end_time: Option<u64>,
}

impl Default for FocusSession {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_WINDOW)
    }
}

impl FocusSession {
    pub fn new(window_size: usize) -> Self {
        let window_size = window_size.max(1);
        Self {
            recent_scores: VecDeque::with_capacity(window_size),
            window_size,
            heart_rate_sum: 0.0,
            heart_rate_samples: 0,
            focus_sum: 0,
            movement_count: 0,
            interaction_count: 0,
            distraction_count: 0,
            samples: 0,
            start_time: None,
            end_time: None,
        }
    }

    /// Add one snapshot and its score; returns the smoothed score
    pub fn record(&mut self, data: &SensorData, focus: &FocusData) -> u8 {
        self.recent_scores.push_back(focus.focus_score);
        while self.recent_scores.len() > self.window_size {
            self.recent_scores.pop_front();
        }

        // 0 bpm means no contact; keep it out of the average
        if data.heart_rate > 0.0 && data.heart_rate.is_finite() {
            self.heart_rate_sum += data.heart_rate;
            self.heart_rate_samples += 1;
        }
        self.focus_sum += u64::from(focus.focus_score);
        self.movement_count += u64::from(data.movement_count);
        self.interaction_count += u64::from(data.interaction_count);
        self.distraction_count += u64::from(focus.distraction_count);
        self.samples += 1;
        self.start_time.get_or_insert(data.timestamp);
        self.end_time = Some(data.timestamp);

        self.smoothed_score().unwrap_or(focus.focus_score)
    }

    /// Rolling average of the window, rounded
    pub fn smoothed_score(&self) -> Option<u8> {
        if self.recent_scores.is_empty() {
            return None;
        }
        let sum: u32 = self.recent_scores.iter().map(|&s| u32::from(s)).sum();
        let avg = f64::from(sum) / self.recent_scores.len() as f64;
        Some(avg.round().clamp(0.0, 100.0) as u8)
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    pub fn summary(&self) -> SessionSummary {
        let duration_minutes = match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => end.saturating_sub(start) as f64 / 60_000.0,
            _ => 0.0,
        };

        SessionSummary {
            heart_rate_avg: (self.heart_rate_samples > 0)
                .then(|| self.heart_rate_sum / self.heart_rate_samples as f64),
            movement_count: self.movement_count,
            interaction_count: self.interaction_count,
            duration_minutes,
            start_time: self.start_time,
            end_time: self.end_time,
            average_focus_score: (self.samples > 0)
                .then(|| self.focus_sum as f64 / self.samples as f64),
            smoothed_focus_score: self.smoothed_score(),
            distraction_count: self.distraction_count,
            samples: self.samples,
        }
    }

    /// Start over, keeping the window size
    pub fn clear(&mut self) {
        *self = Self::new(self.window_size);
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
