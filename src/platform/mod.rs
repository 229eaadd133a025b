//! Platform collaborators
//!
//! The core never touches hardware, the network or flash directly. Drivers
//! and platform code implement these traits; the crate ships in-memory
//! doubles and a JSON file store.

pub mod json_store;
pub mod memory;

pub use json_store::JsonFileStore;

use crate::attendance::AttendanceDayState;
use crate::error::DeviceError;
use crate::types::{Acceleration, AttendanceData, PendingRecord, SubmitResponse};
use std::time::Duration;

/// Biometric and motion sensor hardware
pub trait SensorDriver {
    /// Heart rate in bpm
    fn read_heart_rate(&mut self) -> Result<f64, DeviceError>;

    /// Accelerometer vector in m/s²
    fn read_accelerometer(&mut self) -> Result<Acceleration, DeviceError>;

    /// Temperature in °C
    fn read_temperature(&mut self) -> Result<f64, DeviceError>;
}

/// Proximity tag reader
pub trait TagReader {
    /// Poll for a tag, giving up after `timeout`. `Ok(None)` means no tag was presented.
    fn read_tag_id(&mut self, timeout: Duration) -> Result<Option<String>, DeviceError>;
}

/// Location source for attendance records
pub trait LocationProvider {
    /// Current location, empty when unavailable
    fn current_location(&self) -> String;
}

/// Time source
pub trait Clock {
    /// Milliseconds since the Unix epoch
    fn now_millis(&self) -> i64;

    /// Block the control loop for `duration` (retry backoff)
    fn delay(&self, duration: Duration);
}

/// Network transport to the attendance server
pub trait NetworkSender {
    /// Submit a record. Transport problems and timeouts are errors; answers from the server are responses.
    fn send(
        &mut self,
        record: &AttendanceData,
        timeout: Duration,
    ) -> Result<SubmitResponse, DeviceError>;
}

/// Persistent storage for attendance state
pub trait AttendanceStore {
    fn load_day_state(&self) -> Result<Option<AttendanceDayState>, DeviceError>;

    fn save_day_state(&mut self, state: &AttendanceDayState) -> Result<(), DeviceError>;

    fn save_pending_record(&mut self, record: &PendingRecord) -> Result<(), DeviceError>;

    fn load_pending_records(&self) -> Result<Vec<PendingRecord>, DeviceError>;

    /// Swap the whole queue for `records` in one write; on error the old queue is intact
    fn replace_pending_records(&mut self, records: &[PendingRecord]) -> Result<(), DeviceError>;
}

/// One-way status sink (LED, buzzer, screen)
pub trait StatusDisplay {
    fn show(&mut self, success: bool);
}

/// Wall clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    fn delay(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Location provider for devices without positioning
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocation;

impl LocationProvider for NoLocation {
    fn current_location(&self) -> String {
        String::new()
    }
}

/// Display that only logs
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDisplay;

impl StatusDisplay for LogDisplay {
    fn show(&mut self, success: bool) {
        tracing::info!(success, "attendance status");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_wall_time() {
        let clock = SystemClock;
        let before = clock.now_millis();
        clock.delay(Duration::from_millis(5));
        let after = clock.now_millis();

        // 2020-01-01T00:00:00Z
        assert!(before > 1_577_836_800_000);
        assert!(after >= before + 5);
    }

    #[test]
    fn test_no_location_is_empty() {
        assert_eq!(NoLocation.current_location(), "");
    }

    #[test]
    fn test_log_display_accepts_both_outcomes() {
        let mut display = LogDisplay;
        display.show(true);
        display.show(false);
    }
}
