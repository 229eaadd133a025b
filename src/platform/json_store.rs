//! JSON file attendance store
//!
//! Keeps the day state and the pending queue as two JSON documents in one
//! directory. Writes go through a temporary file and a rename so a power cut
//! leaves either the old or the new document.

use super::AttendanceStore;
use crate::attendance::AttendanceDayState;
use crate::error::DeviceError;
use crate::types::PendingRecord;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const DAY_STATE_FILE: &str = "day_state.json";
const PENDING_FILE: &str = "pending.json";

/// Attendance store rooted at a directory
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Open (and create if needed) a store directory
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, DeviceError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| storage_error(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn day_state_path(&self) -> PathBuf {
        self.dir.join(DAY_STATE_FILE)
    }

    pub fn pending_path(&self) -> PathBuf {
        self.dir.join(PENDING_FILE)
    }

    fn read_optional(path: &Path) -> Result<Option<String>, DeviceError> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_error(path, e)),
        }
    }

    fn write_atomic(path: &Path, content: &str) -> Result<(), DeviceError> {
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content).map_err(|e| storage_error(&tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| storage_error(path, e))
    }

    fn write_pending(&self, records: &[PendingRecord]) -> Result<(), DeviceError> {
        let json = serde_json::to_string_pretty(records)?;
        Self::write_atomic(&self.pending_path(), &json)
    }
}

fn storage_error(path: &Path, err: io::Error) -> DeviceError {
    DeviceError::Storage(format!("{}: {}", path.display(), err))
}

impl AttendanceStore for JsonFileStore {
    fn load_day_state(&self) -> Result<Option<AttendanceDayState>, DeviceError> {
        match Self::read_optional(&self.day_state_path())? {
            Some(json) => Ok(Some(AttendanceDayState::from_json(&json)?)),
            None => Ok(None),
        }
    }

    fn save_day_state(&mut self, state: &AttendanceDayState) -> Result<(), DeviceError> {
        Self::write_atomic(&self.day_state_path(), &state.to_json()?)
    }

    fn save_pending_record(&mut self, record: &PendingRecord) -> Result<(), DeviceError> {
        let mut records = self.load_pending_records()?;
        records.push(record.clone());
        self.write_pending(&records)
    }

    fn load_pending_records(&self) -> Result<Vec<PendingRecord>, DeviceError> {
        match Self::read_optional(&self.pending_path())? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    fn replace_pending_records(&mut self, records: &[PendingRecord]) -> Result<(), DeviceError> {
        if !records.is_empty() {
            return self.write_pending(records);
        }
        match fs::remove_file(self.pending_path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error(&self.pending_path(), e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AttendanceData;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn temp_store(name: &str) -> JsonFileStore {
        let dir = std::env::temp_dir().join(format!(
            "focuswatch-store-{}-{}",
            name,
            uuid::Uuid::new_v4()
        ));
        JsonFileStore::open(dir).unwrap()
    }

    fn record(tag: &str) -> AttendanceData {
        AttendanceData {
            student_id: "S1".to_string(),
            class_id: "CLASS_001".to_string(),
            nfc_tag_id: tag.to_string(),
            location: "Room 4".to_string(),
            timestamp: 1_705_312_800_000,
            device_mac: "AA:BB:CC:DD:EE:FF".to_string(),
        }
    }

    #[test]
    fn test_fresh_store_is_empty() {
        let store = temp_store("fresh");
        assert!(store.load_day_state().unwrap().is_none());
        assert!(store.load_pending_records().unwrap().is_empty());
    }

    #[test]
    fn test_day_state_persists_across_reopen() {
        let mut store = temp_store("day");
        let day = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        store
            .save_day_state(&AttendanceDayState::marked_on(day))
            .unwrap();

        let reopened = JsonFileStore::open(store.dir.clone()).unwrap();
        let state = reopened.load_day_state().unwrap().unwrap();
        assert!(state.is_marked_on(day));
    }

    #[test]
    fn test_pending_queue_appends_and_replaces() {
        let mut store = temp_store("pending");
        store
            .save_pending_record(&PendingRecord::new(record("A1"), 3, 10))
            .unwrap();
        store
            .save_pending_record(&PendingRecord::new(record("A2"), 3, 20))
            .unwrap();

        let tags: Vec<String> = store
            .load_pending_records()
            .unwrap()
            .into_iter()
            .map(|p| p.record.nfc_tag_id)
            .collect();
        assert_eq!(tags, vec!["A1".to_string(), "A2".to_string()]);

        let kept = store.load_pending_records().unwrap().split_off(1);
        store.replace_pending_records(&kept).unwrap();
        let tags: Vec<String> = store
            .load_pending_records()
            .unwrap()
            .into_iter()
            .map(|p| p.record.nfc_tag_id)
            .collect();
        assert_eq!(tags, vec!["A2".to_string()]);

        store.replace_pending_records(&[]).unwrap();
        assert!(store.load_pending_records().unwrap().is_empty());
        // Clearing twice is fine
        store.replace_pending_records(&[]).unwrap();
    }

    #[test]
    fn test_failed_replace_keeps_old_queue() {
        let mut store = temp_store("replace-fail");
        store
            .save_pending_record(&PendingRecord::new(record("A1"), 3, 10))
            .unwrap();

        // A directory where the temp file should go makes the write fail
        fs::create_dir_all(store.pending_path().with_extension("json.tmp")).unwrap();
        let replacement = [PendingRecord::new(record("B1"), 1, 30)];
        assert!(matches!(
            store.replace_pending_records(&replacement),
            Err(DeviceError::Storage(_))
        ));

        let pending = store.load_pending_records().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].record.nfc_tag_id, "A1");
    }

    #[test]
    fn test_corrupt_day_state_is_an_error() {
        let store = temp_store("corrupt");
        fs::write(store.day_state_path(), "not json").unwrap();
        assert!(matches!(store.load_day_state(), Err(DeviceError::Json(_))));
    }
}
