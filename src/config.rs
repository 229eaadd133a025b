//! Device configuration
//!
//! Every threshold and weight the device uses lives here so it can be tuned
//! per deployment without touching the scoring or attendance logic.

use crate::error::DeviceError;
use serde::{Deserialize, Serialize};

/// Full device configuration, loaded from JSON at boot
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub identity: DeviceIdentity,
    pub focus: FocusConfig,
    pub motion: MotionConfig,
    pub health: HealthConfig,
    pub attendance: AttendanceConfig,
    pub session: SessionConfig,
}

impl DeviceConfig {
    /// Load configuration from JSON; missing sections fall back to defaults
    pub fn from_json(json: &str) -> Result<Self, DeviceError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to pretty JSON
    pub fn to_json(&self) -> Result<String, DeviceError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject configurations the device cannot run with
    pub fn validate(&self) -> Result<(), DeviceError> {
        self.focus.validate()?;
        if self.health.min_temperature_c >= self.health.max_temperature_c {
            return Err(DeviceError::InvalidConfig(
                "temperature range is empty".to_string(),
            ));
        }
        if self.attendance.max_attempts == 0 {
            return Err(DeviceError::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.session.window_size == 0 {
            return Err(DeviceError::InvalidConfig(
                "session window_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Who the device reports attendance for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceIdentity {
    pub student_id: String,
    pub class_id: String,
    pub device_mac: String,
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self {
            student_id: "unassigned".to_string(),
            class_id: "unassigned".to_string(),
            device_mac: "00:00:00:00:00:00".to_string(),
        }
    }
}

impl DeviceIdentity {
    pub fn new(
        student_id: impl Into<String>,
        class_id: impl Into<String>,
        device_mac: impl Into<String>,
    ) -> Self {
        Self {
            student_id: student_id.into(),
            class_id: class_id.into(),
            device_mac: device_mac.into(),
        }
    }
}

/// Focus score penalties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FocusConfig {
    /// Lower edge of the resting heart rate band (bpm)
    pub resting_hr_min: f64,
    /// Upper edge of the resting heart rate band (bpm)
    pub resting_hr_max: f64,
    /// Points lost per bpm outside the band
    pub hr_penalty_per_bpm: f64,
    /// Largest heart rate penalty
    pub hr_penalty_cap: f64,
    /// Movements tolerated per snapshot before they count as distractions
    pub movement_threshold: u32,
    /// Points lost per movement beyond the threshold
    pub movement_penalty: f64,
    /// Interactions expected per snapshot before the wearer counts as disengaged
    pub min_interactions: u32,
    /// Points lost when disengaged
    pub disengagement_penalty: f64,
    /// Weight applied to heart rate penalties while sensors are unhealthy
    pub degraded_confidence: f64,
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            resting_hr_min: 50.0,
            resting_hr_max: 90.0,
            hr_penalty_per_bpm: 1.0,
            hr_penalty_cap: 40.0,
            movement_threshold: 5,
            movement_penalty: 5.0,
            min_interactions: 1,
            disengagement_penalty: 5.0,
            degraded_confidence: 0.5,
        }
    }
}

impl FocusConfig {
    /// Weights must be finite and non-negative so more evidence never raises the score
    pub fn validate(&self) -> Result<(), DeviceError> {
        if !self.resting_hr_min.is_finite() || !self.resting_hr_max.is_finite() {
            return Err(DeviceError::InvalidConfig(
                "resting heart rate band must be finite".to_string(),
            ));
        }
        if self.resting_hr_min > self.resting_hr_max {
            return Err(DeviceError::InvalidConfig(format!(
                "resting heart rate band is inverted ({} > {})",
                self.resting_hr_min, self.resting_hr_max
            )));
        }
        for (name, weight) in [
            ("hr_penalty_per_bpm", self.hr_penalty_per_bpm),
            ("hr_penalty_cap", self.hr_penalty_cap),
            ("movement_penalty", self.movement_penalty),
            ("disengagement_penalty", self.disengagement_penalty),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(DeviceError::InvalidConfig(format!(
                    "{name} must be a finite, non-negative number (got {weight})"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.degraded_confidence) {
            return Err(DeviceError::InvalidConfig(
                "degraded_confidence must be within 0-1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_resting_band(mut self, min: f64, max: f64) -> Self {
        self.resting_hr_min = min;
        self.resting_hr_max = max;
        self
    }

    pub fn with_movement_threshold(mut self, threshold: u32) -> Self {
        self.movement_threshold = threshold;
        self
    }
}

/// Motion detection sensitivity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Deviation from gravity (m/s²) that counts as movement
    pub movement_threshold: f64,
    /// How long the deviation must last to count (ms)
    pub min_movement_duration_ms: u64,
    /// Peak above gravity (m/s²) that counts as a step
    pub step_threshold: f64,
    /// Minimum spacing between two steps (ms)
    pub min_step_interval_ms: u64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            movement_threshold: 2.0,
            min_movement_duration_ms: 200,
            step_threshold: 1.5,
            min_step_interval_ms: 250,
        }
    }
}

/// Plausible sensor operating ranges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub max_heart_rate: f64,
    pub min_temperature_c: f64,
    pub max_temperature_c: f64,
    /// Consecutive failed reads tolerated per sensor
    pub max_consecutive_failures: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            max_heart_rate: 220.0,
            min_temperature_c: 15.0,
            max_temperature_c: 45.0,
            max_consecutive_failures: 3,
        }
    }
}

/// Attendance submission policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttendanceConfig {
    /// When set, only this tag marks attendance for the configured class
    pub class_tag_id: Option<String>,
    /// Longest accepted tag id
    pub max_tag_len: usize,
    /// Total send attempts per tap, first try included
    pub max_attempts: u32,
    /// Delay before the first retry (ms), doubled per retry
    pub initial_backoff_ms: u64,
    /// Upper bound for a single backoff delay (ms)
    pub max_backoff_ms: u64,
    /// Network send timeout (ms)
    pub send_timeout_ms: u64,
    /// Tag reader poll timeout (ms)
    pub tag_read_timeout_ms: u64,
    /// Local offset from UTC used to bucket timestamps into calendar days
    pub utc_offset_minutes: i32,
}

impl Default for AttendanceConfig {
    fn default() -> Self {
        Self {
            class_tag_id: None,
            max_tag_len: 64,
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 4_000,
            send_timeout_ms: 5_000,
            tag_read_timeout_ms: 100,
            utc_offset_minutes: 0,
        }
    }
}

impl AttendanceConfig {
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_class_tag(mut self, tag: impl Into<String>) -> Self {
        self.class_tag_id = Some(tag.into());
        self
    }

    pub fn with_utc_offset_minutes(mut self, offset: i32) -> Self {
        self.utc_offset_minutes = offset;
        self
    }
}

/// Focus session smoothing and pending-queue housekeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Number of recent scores in the smoothed focus score
    pub window_size: usize,
    /// Control loop ticks between pending-record flushes (0 disables)
    pub flush_every_ticks: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            window_size: 12,
            flush_every_ticks: 600,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = DeviceConfig::from_json(
            r#"{"identity": {"student_id": "S42", "class_id": "CLASS_001"}, "attendance": {"max_attempts": 5}}"#,
        )
        .unwrap();

        assert_eq!(config.identity.student_id, "S42");
        assert_eq!(config.identity.device_mac, "00:00:00:00:00:00");
        assert_eq!(config.attendance.max_attempts, 5);
        assert_eq!(config.attendance.send_timeout_ms, 5_000);
        assert_eq!(config.focus, FocusConfig::default());
    }

    #[test]
    fn test_round_trip() {
        let config = DeviceConfig {
            attendance: AttendanceConfig::default().with_class_tag("A1"),
            ..Default::default()
        };
        let loaded = DeviceConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_rejects_inverted_band() {
        let mut config = DeviceConfig::default();
        config.focus = config.focus.with_resting_band(100.0, 60.0);
        assert!(matches!(
            config.validate(),
            Err(DeviceError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_negative_or_nan_focus_weights() {
        let mut focus = FocusConfig::default();
        focus.movement_penalty = -5.0;
        assert!(matches!(focus.validate(), Err(DeviceError::InvalidConfig(_))));

        let mut focus = FocusConfig::default();
        focus.hr_penalty_cap = f64::NAN;
        assert!(focus.validate().is_err());

        let focus = FocusConfig::default().with_resting_band(f64::NAN, f64::NAN);
        assert!(focus.validate().is_err());

        let result = DeviceConfig::from_json(r#"{"focus": {"disengagement_penalty": -1.0}}"#);
        assert!(result.is_err());
        assert!(FocusConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_attempts() {
        let result = DeviceConfig::from_json(r#"{"attendance": {"max_attempts": 0}}"#);
        assert!(result.is_err());
    }
}
