//! In-memory collaborators
//!
//! Used by the tests and bench setups. Each double is a cheap clonable
//! handle over shared state so a test can keep one clone to inspect what the
//! device did with the other.

use super::{
    AttendanceStore, Clock, LocationProvider, NetworkSender, SensorDriver, StatusDisplay,
    TagReader,
};
use crate::attendance::AttendanceDayState;
use crate::error::{DeviceError, SensorKind};
use crate::types::{Acceleration, AttendanceData, PendingRecord, SubmitResponse};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

/// Manually advanced clock that records requested delays instead of sleeping
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<i64>>,
    delays: Rc<RefCell<Vec<Duration>>>,
}

impl ManualClock {
    pub fn new(now_millis: i64) -> Self {
        Self {
            now: Rc::new(Cell::new(now_millis)),
            delays: Rc::default(),
        }
    }

    pub fn set(&self, now_millis: i64) {
        self.now.set(now_millis);
    }

    pub fn advance(&self, millis: i64) {
        self.now.set(self.now.get() + millis);
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays.borrow().clone()
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.get()
    }

    fn delay(&self, duration: Duration) {
        self.delays.borrow_mut().push(duration);
        self.advance(duration.as_millis() as i64);
    }
}

/// Fixed location string
#[derive(Debug, Clone, Default)]
pub struct StaticLocation(pub String);

impl LocationProvider for StaticLocation {
    fn current_location(&self) -> String {
        self.0.clone()
    }
}

/// Scripted network: replays queued results, then falls back to a default
#[derive(Debug, Clone)]
pub struct ScriptedNetwork {
    script: Rc<RefCell<VecDeque<Result<SubmitResponse, String>>>>,
    fallback: Rc<RefCell<Result<SubmitResponse, String>>>,
    sent: Rc<RefCell<Vec<AttendanceData>>>,
}

impl Default for ScriptedNetwork {
    fn default() -> Self {
        Self::online()
    }
}

impl ScriptedNetwork {
    /// Network that accepts everything
    pub fn online() -> Self {
        Self::with_fallback(Ok(SubmitResponse::Accepted))
    }

    /// Network whose every send fails at the transport level
    pub fn offline() -> Self {
        Self::with_fallback(Err("network unreachable".to_string()))
    }

    fn with_fallback(fallback: Result<SubmitResponse, String>) -> Self {
        Self {
            script: Rc::default(),
            fallback: Rc::new(RefCell::new(fallback)),
            sent: Rc::default(),
        }
    }

    /// Queue the result of the next send
    pub fn push(&self, result: Result<SubmitResponse, String>) {
        self.script.borrow_mut().push_back(result);
    }

    pub fn set_online(&self, online: bool) {
        *self.fallback.borrow_mut() = if online {
            Ok(SubmitResponse::Accepted)
        } else {
            Err("network unreachable".to_string())
        };
    }

    /// Every record handed to `send`, successful or not
    pub fn sent(&self) -> Vec<AttendanceData> {
        self.sent.borrow().clone()
    }

    pub fn send_count(&self) -> usize {
        self.sent.borrow().len()
    }
}

impl NetworkSender for ScriptedNetwork {
    fn send(
        &mut self,
        record: &AttendanceData,
        _timeout: Duration,
    ) -> Result<SubmitResponse, DeviceError> {
        self.sent.borrow_mut().push(record.clone());
        let next = self
            .script
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| self.fallback.borrow().clone());
        next.map_err(DeviceError::TransportFailure)
    }
}

#[derive(Debug, Default)]
struct StoreState {
    day_state: Option<AttendanceDayState>,
    pending: Vec<PendingRecord>,
    fail_writes: bool,
}

/// Volatile attendance store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Rc<RefCell<StoreState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_day_state(state: AttendanceDayState) -> Self {
        let store = Self::default();
        store.state.borrow_mut().day_state = Some(state);
        store
    }

    pub fn day_state(&self) -> Option<AttendanceDayState> {
        self.state.borrow().day_state.clone()
    }

    pub fn pending(&self) -> Vec<PendingRecord> {
        self.state.borrow().pending.clone()
    }

    /// Make every write fail, as a worn-out flash would
    pub fn set_fail_writes(&self, fail: bool) {
        self.state.borrow_mut().fail_writes = fail;
    }

    fn check_writable(&self) -> Result<(), DeviceError> {
        if self.state.borrow().fail_writes {
            return Err(DeviceError::Storage("write rejected".to_string()));
        }
        Ok(())
    }
}

impl AttendanceStore for MemoryStore {
    fn load_day_state(&self) -> Result<Option<AttendanceDayState>, DeviceError> {
        Ok(self.state.borrow().day_state.clone())
    }

    fn save_day_state(&mut self, state: &AttendanceDayState) -> Result<(), DeviceError> {
        self.check_writable()?;
        self.state.borrow_mut().day_state = Some(state.clone());
        Ok(())
    }

    fn save_pending_record(&mut self, record: &PendingRecord) -> Result<(), DeviceError> {
        self.check_writable()?;
        self.state.borrow_mut().pending.push(record.clone());
        Ok(())
    }

    fn load_pending_records(&self) -> Result<Vec<PendingRecord>, DeviceError> {
        Ok(self.state.borrow().pending.clone())
    }

    fn replace_pending_records(&mut self, records: &[PendingRecord]) -> Result<(), DeviceError> {
        self.check_writable()?;
        self.state.borrow_mut().pending = records.to_vec();
        Ok(())
    }
}

/// Display that remembers what it was told
#[derive(Debug, Clone, Default)]
pub struct RecordingDisplay {
    shown: Rc<RefCell<Vec<bool>>>,
}

impl RecordingDisplay {
    pub fn shown(&self) -> Vec<bool> {
        self.shown.borrow().clone()
    }
}

impl StatusDisplay for RecordingDisplay {
    fn show(&mut self, success: bool) {
        self.shown.borrow_mut().push(success);
    }
}

/// Tag reader fed from a queue of presented tags
#[derive(Debug, Clone, Default)]
pub struct QueuedTagReader {
    tags: Rc<RefCell<VecDeque<Result<Option<String>, String>>>>,
}

impl QueuedTagReader {
    pub fn present(&self, tag: impl Into<String>) {
        self.tags.borrow_mut().push_back(Ok(Some(tag.into())));
    }

    pub fn fail_next(&self, reason: impl Into<String>) {
        self.tags.borrow_mut().push_back(Err(reason.into()));
    }
}

impl TagReader for QueuedTagReader {
    fn read_tag_id(&mut self, timeout: Duration) -> Result<Option<String>, DeviceError> {
        match self.tags.borrow_mut().pop_front() {
            Some(Ok(tag)) => Ok(tag),
            Some(Err(_)) => Err(DeviceError::Timeout(timeout.as_millis() as u64)),
            None => Ok(None),
        }
    }
}

/// Sensor readings scripted per call; an exhausted script repeats the last value
#[derive(Debug, Clone)]
pub struct ScriptedSensors {
    heart_rate: Rc<RefCell<VecDeque<Option<f64>>>>,
    acceleration: Rc<RefCell<VecDeque<Option<Acceleration>>>>,
    temperature: Rc<RefCell<VecDeque<Option<f64>>>>,
    last: Rc<RefCell<(f64, Acceleration, f64)>>,
}

impl Default for ScriptedSensors {
    fn default() -> Self {
        Self::resting()
    }
}

impl ScriptedSensors {
    /// Wearer at rest: 70 bpm, still, 33 °C skin
    pub fn resting() -> Self {
        Self {
            heart_rate: Rc::default(),
            acceleration: Rc::default(),
            temperature: Rc::default(),
            last: Rc::new(RefCell::new((70.0, Acceleration::at_rest(), 33.0))),
        }
    }

    /// Queue a heart rate reading; `None` makes that read fail
    pub fn push_heart_rate(&self, bpm: Option<f64>) {
        self.heart_rate.borrow_mut().push_back(bpm);
    }

    pub fn push_acceleration(&self, sample: Option<Acceleration>) {
        self.acceleration.borrow_mut().push_back(sample);
    }

    pub fn push_temperature(&self, celsius: Option<f64>) {
        self.temperature.borrow_mut().push_back(celsius);
    }

    fn failure(sensor: SensorKind) -> DeviceError {
        DeviceError::SensorReadFailure {
            sensor,
            reason: "scripted failure".to_string(),
        }
    }
}

impl SensorDriver for ScriptedSensors {
    fn read_heart_rate(&mut self) -> Result<f64, DeviceError> {
        match self.heart_rate.borrow_mut().pop_front() {
            Some(Some(bpm)) => {
                self.last.borrow_mut().0 = bpm;
                Ok(bpm)
            }
            Some(None) => Err(Self::failure(SensorKind::HeartRate)),
            None => Ok(self.last.borrow().0),
        }
    }

    fn read_accelerometer(&mut self) -> Result<Acceleration, DeviceError> {
        match self.acceleration.borrow_mut().pop_front() {
            Some(Some(sample)) => {
                self.last.borrow_mut().1 = sample;
                Ok(sample)
            }
            Some(None) => Err(Self::failure(SensorKind::Accelerometer)),
            None => Ok(self.last.borrow().1),
        }
    }

    fn read_temperature(&mut self) -> Result<f64, DeviceError> {
        match self.temperature.borrow_mut().pop_front() {
            Some(Some(celsius)) => {
                self.last.borrow_mut().2 = celsius;
                Ok(celsius)
            }
            Some(None) => Err(Self::failure(SensorKind::Temperature)),
            None => Ok(self.last.borrow().2),
        }
    }
}
