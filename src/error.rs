//! Error types for focuswatch

use thiserror::Error;

/// Sensor a fault or reading originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    HeartRate,
    Accelerometer,
    Temperature,
}

impl SensorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorKind::HeartRate => "heart_rate",
            SensorKind::Accelerometer => "accelerometer",
            SensorKind::Temperature => "temperature",
        }
    }
}

impl std::fmt::Display for SensorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur on the device
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Sensor read failed ({sensor}): {reason}")]
    SensorReadFailure { sensor: SensorKind, reason: String },

    #[error("Implausible {sensor} reading: {value}")]
    ImplausibleReading { sensor: SensorKind, value: f64 },

    #[error("Attendance already marked for {0}")]
    DuplicateAttendance(String),

    #[error("Transport failure: {0}")]
    TransportFailure(String),

    #[error("Operation timed out after {0} ms")]
    Timeout(u64),

    #[error("Invalid tag id: {0:?}")]
    InvalidTag(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl DeviceError {
    /// Whether a submission that failed with this error may be retried
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DeviceError::TransportFailure(_) | DeviceError::Timeout(_)
        )
    }
}
