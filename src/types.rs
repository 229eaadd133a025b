//! Core types shared by the sensing and attendance halves of the device
//!
//! Field names serialize in camelCase; that naming is the contract with the
//! attendance and analytics backends.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Standard gravity (m/s²), the resting magnitude of the accelerometer vector
pub const GRAVITY: f64 = 9.80665;

/// One snapshot of every sensor stream, produced by the sampler
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorData {
    /// Heart rate (beats per minute)
    pub heart_rate: f64,
    /// Steps since boot
    pub steps: u32,
    /// Movement events since the previous snapshot
    pub movement_count: u32,
    /// User interaction events since the previous snapshot
    pub interaction_count: u32,
    /// Monotonic milliseconds
    pub timestamp: u64,
}

impl SensorData {
    /// Resting snapshot with no motion or interaction
    pub fn resting(heart_rate: f64, timestamp: u64) -> Self {
        Self {
            heart_rate,
            steps: 0,
            movement_count: 0,
            interaction_count: 0,
            timestamp,
        }
    }
}

/// Focus score derived from one snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusData {
    /// Attentiveness in [0, 100]
    pub focus_score: u8,
    /// Distraction conditions detected in the snapshot
    pub distraction_count: u32,
    /// Timestamp of the source snapshot
    pub timestamp: u64,
}

/// Raw accelerometer vector (m/s²)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Acceleration {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Acceleration {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Device lying still, gravity along z
    pub fn at_rest() -> Self {
        Self::new(0.0, 0.0, GRAVITY)
    }

    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Attendance event relayed to the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceData {
    pub student_id: String,
    pub class_id: String,
    pub nfc_tag_id: String,
    /// Empty when no location fix was available
    pub location: String,
    /// Epoch milliseconds
    pub timestamp: i64,
    pub device_mac: String,
}

/// Attendance record waiting for a later resend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRecord {
    pub id: Uuid,
    pub record: AttendanceData,
    /// Sends attempted so far
    pub attempts: u32,
    /// Epoch milliseconds when the record was queued
    pub queued_at: i64,
}

impl PendingRecord {
    pub fn new(record: AttendanceData, attempts: u32, queued_at: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            record,
            attempts,
            queued_at,
        }
    }
}

/// Server answer to an attendance submission that reached it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "reason")]
pub enum SubmitResponse {
    /// Record stored
    Accepted,
    /// Server already holds a record for this student, class and day
    AlreadyMarked,
    /// Server refused the record (e.g. tag does not belong to the class)
    Refused(String),
}
