//! Device control loop
//!
//! One cooperative loop drives everything: each [`DeviceLoop::tick`] takes a
//! sensor snapshot, scores it, polls the tag reader with a bounded timeout
//! and, every few ticks, flushes queued attendance records. Nothing in a tick
//! can block longer than the configured timeouts.

use crate::attendance::{AttendanceManager, AttendanceOutcome, Collaborators, FlushReport};
use crate::config::DeviceConfig;
use crate::error::DeviceError;
use crate::focus::FocusEngine;
use crate::platform::{SensorDriver, TagReader};
use crate::sampler::SensorSampler;
use crate::session::FocusSession;
use crate::types::{FocusData, SensorData};
use serde::Serialize;
use tracing::{debug, warn};

/// What happened during one loop iteration
#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub sensor: SensorData,
    pub focus: FocusData,
    pub smoothed_focus: u8,
    pub healthy: bool,
    #[serde(skip)]
    pub attendance: Option<AttendanceOutcome>,
    pub flush: Option<FlushReport>,
}

/// The device: sampler, focus engine, session and attendance manager
pub struct DeviceLoop<D, T> {
    sampler: SensorSampler<D>,
    focus: FocusEngine,
    session: FocusSession,
    attendance: AttendanceManager,
    tag_reader: T,
    flush_every_ticks: u64,
    ticks: u64,
}

impl<D: SensorDriver, T: TagReader> DeviceLoop<D, T> {
    pub fn new(
        config: DeviceConfig,
        driver: D,
        tag_reader: T,
        io: Collaborators,
    ) -> Result<Self, DeviceError> {
        config.validate()?;
        let DeviceConfig {
            identity,
            focus,
            motion,
            health,
            attendance,
            session,
        } = config;

        Ok(Self {
            sampler: SensorSampler::new(driver, motion, health),
            focus: FocusEngine::new(focus),
            session: FocusSession::new(session.window_size),
            attendance: AttendanceManager::new(identity, attendance, io)?,
            tag_reader,
            flush_every_ticks: session.flush_every_ticks,
            ticks: 0,
        })
    }

    pub fn sampler(&self) -> &SensorSampler<D> {
        &self.sampler
    }

    pub fn session(&self) -> &FocusSession {
        &self.session
    }

    pub fn attendance(&self) -> &AttendanceManager {
        &self.attendance
    }

    pub fn attendance_mut(&mut self) -> &mut AttendanceManager {
        &mut self.attendance
    }

    fn now(&self) -> u64 {
        self.attendance.clock().now_millis().max(0) as u64
    }

    /// Feed one accelerometer sample; call at the motion sampling rate between ticks
    pub fn sample_motion(&mut self) {
        let now = self.now();
        self.sampler.sample_motion(now);
    }

    /// Count a user interaction toward the next snapshot
    pub fn record_interaction(&mut self) {
        self.sampler.record_interaction();
    }

    /// Run one loop iteration
    pub fn tick(&mut self) -> TickReport {
        self.ticks += 1;

        let sensor = self.sampler.collect(self.now());
        let healthy = self.sampler.health().is_sensor_healthy();
        let focus = self.focus.calculate_with_health(&sensor, healthy);
        let smoothed_focus = self.session.record(&sensor, &focus);
        debug!(
            score = focus.focus_score,
            smoothed = smoothed_focus,
            distractions = focus.distraction_count,
            healthy,
            "focus updated"
        );

        let attendance = self.poll_tag_reader();
        let flush = self.maybe_flush();

        TickReport {
            sensor,
            focus,
            smoothed_focus,
            healthy,
            attendance,
            flush,
        }
    }

    fn poll_tag_reader(&mut self) -> Option<AttendanceOutcome> {
        let timeout = self.attendance.tag_read_timeout();
        match self.tag_reader.read_tag_id(timeout) {
            Ok(Some(tag)) => Some(self.attendance.process_tag(&tag)),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "tag reader poll failed");
                None
            }
        }
    }

    fn maybe_flush(&mut self) -> Option<FlushReport> {
        if self.flush_every_ticks == 0 || self.ticks % self.flush_every_ticks != 0 {
            return None;
        }
        match self.attendance.flush_pending() {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(error = %e, "pending flush failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::RejectReason;
    use crate::config::{DeviceIdentity, SessionConfig};
    use crate::platform::memory::{
        ManualClock, MemoryStore, QueuedTagReader, RecordingDisplay, ScriptedNetwork,
        ScriptedSensors, StaticLocation,
    };
    use crate::types::{Acceleration, GRAVITY};

    // 2024-01-15T09:00:00Z
    const MONDAY_9AM: i64 = 1_705_309_200_000;

    struct Rig {
        clock: ManualClock,
        sensors: ScriptedSensors,
        tags: QueuedTagReader,
        network: ScriptedNetwork,
        store: MemoryStore,
        display: RecordingDisplay,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                clock: ManualClock::new(MONDAY_9AM),
                sensors: ScriptedSensors::resting(),
                tags: QueuedTagReader::default(),
                network: ScriptedNetwork::online(),
                store: MemoryStore::new(),
                display: RecordingDisplay::default(),
            }
        }

        fn device(&self, config: DeviceConfig) -> DeviceLoop<ScriptedSensors, QueuedTagReader> {
            DeviceLoop::new(
                config,
                self.sensors.clone(),
                self.tags.clone(),
                Collaborators::new(
                    self.clock.clone(),
                    StaticLocation("Room 4".to_string()),
                    self.network.clone(),
                    self.store.clone(),
                    self.display.clone(),
                ),
            )
            .unwrap()
        }
    }

    fn config() -> DeviceConfig {
        DeviceConfig {
            identity: DeviceIdentity::new("S1001", "CLASS_001", "AA:BB:CC:DD:EE:FF"),
            ..Default::default()
        }
    }

    #[test]
    fn test_quiet_tick_is_focused() {
        let rig = Rig::new();
        let mut device = rig.device(config());
        device.record_interaction();

        let report = device.tick();
        assert_eq!(report.focus.focus_score, 100);
        assert_eq!(report.focus.distraction_count, 0);
        assert!(report.healthy);
        assert!(report.attendance.is_none());
        assert!(report.flush.is_none());
    }

    #[test]
    fn test_restless_wearer_loses_focus() {
        let rig = Rig::new();
        let mut device = rig.device(config());
        rig.sensors.push_heart_rate(Some(150.0));

        let shake = Acceleration::new(8.0, 0.0, GRAVITY);
        for _ in 0..10 {
            // Ten separate excursions of 300 ms
            for _ in 0..7 {
                rig.sensors.push_acceleration(Some(shake));
                device.sample_motion();
                rig.clock.advance(50);
            }
            rig.sensors.push_acceleration(Some(Acceleration::at_rest()));
            device.sample_motion();
            rig.clock.advance(50);
        }

        let report = device.tick();
        assert_eq!(report.sensor.movement_count, 10);
        assert!(report.focus.focus_score <= 30);
        assert!(report.focus.distraction_count > 0);
    }

    #[test]
    fn test_tag_tap_marks_attendance_once() {
        let rig = Rig::new();
        let mut device = rig.device(config());

        rig.tags.present("A1");
        let first = device.tick();
        assert!(first.attendance.unwrap().is_confirmed());

        rig.clock.advance(1_000);
        rig.tags.present("A1");
        let second = device.tick();
        assert_eq!(
            second.attendance.unwrap().reject_reason(),
            Some(&RejectReason::Duplicate)
        );
        assert_eq!(rig.network.send_count(), 1);
        assert_eq!(rig.display.shown(), vec![true, false]);
    }

    #[test]
    fn test_tag_reader_failure_keeps_loop_running() {
        let rig = Rig::new();
        let mut device = rig.device(config());
        rig.tags.fail_next("reader stalled");

        let report = device.tick();
        assert!(report.attendance.is_none());
        assert_eq!(rig.network.send_count(), 0);
    }

    #[test]
    fn test_periodic_flush_delivers_pending() {
        let rig = Rig::new();
        rig.network.set_online(false);
        let mut cfg = config();
        cfg.attendance.max_attempts = 1;
        cfg.session = SessionConfig {
            flush_every_ticks: 3,
            ..Default::default()
        };
        let mut device = rig.device(cfg);

        rig.tags.present("A1");
        let first = device.tick();
        assert_eq!(
            first.attendance.unwrap().reject_reason(),
            Some(&RejectReason::PendingResend)
        );

        rig.network.set_online(true);
        assert!(device.tick().flush.is_none());
        let third = device.tick();
        assert_eq!(third.flush.unwrap().delivered, 1);
        assert!(device.attendance().is_attendance_marked_today());
    }

    #[test]
    fn test_session_accumulates_ticks() {
        let rig = Rig::new();
        let mut device = rig.device(config());
        for _ in 0..5 {
            device.tick();
            rig.clock.advance(60_000);
        }
        let summary = device.session().summary();
        assert_eq!(summary.samples, 5);
        assert_eq!(summary.heart_rate_avg, Some(70.0));
        assert_eq!(summary.duration_minutes, 4.0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let rig = Rig::new();
        let mut cfg = config();
        cfg.health.min_temperature_c = 50.0;
        let result = DeviceLoop::new(
            cfg,
            rig.sensors.clone(),
            rig.tags.clone(),
            Collaborators::new(
                rig.clock.clone(),
                StaticLocation::default(),
                rig.network.clone(),
                rig.store.clone(),
                rig.display.clone(),
            ),
        );
        assert!(result.is_err());
    }
}
