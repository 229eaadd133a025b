//! Per-day attendance state and calendar-day bucketing

use chrono::{FixedOffset, NaiveDate, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Calendar day a timestamp falls on, in the device's local offset.
///
/// Timestamps chrono cannot represent fall back to the epoch day.
pub fn day_bucket(timestamp_ms: i64, utc_offset_minutes: i32) -> NaiveDate {
    let offset = FixedOffset::east_opt(utc_offset_minutes.saturating_mul(60))
        .unwrap_or_else(|| Utc.fix());
    Utc.timestamp_millis_opt(timestamp_ms)
        .single()
        .unwrap_or_default()
        .with_timezone(&offset)
        .date_naive()
}

/// Last day attendance was marked on this device
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceDayState {
    last_marked_day: Option<NaiveDate>,
    /// Epoch milliseconds of the commit
    last_marked_at: Option<i64>,
}

impl AttendanceDayState {
    /// Nothing marked yet
    pub fn not_marked() -> Self {
        Self::default()
    }

    pub fn marked_on(day: NaiveDate) -> Self {
        Self {
            last_marked_day: Some(day),
            last_marked_at: None,
        }
    }

    pub fn last_marked_day(&self) -> Option<NaiveDate> {
        self.last_marked_day
    }

    pub fn last_marked_at(&self) -> Option<i64> {
        self.last_marked_at
    }

    pub fn is_marked_on(&self, day: NaiveDate) -> bool {
        self.last_marked_day == Some(day)
    }

    /// Record a mark for `day`. The state never moves back to an earlier day;
    /// returns whether it changed.
    pub(crate) fn commit(&mut self, day: NaiveDate, at_ms: i64) -> bool {
        match self.last_marked_day {
            Some(current) if current >= day => false,
            _ => {
                self.last_marked_day = Some(day);
                self.last_marked_at = Some(at_ms);
                true
            }
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
