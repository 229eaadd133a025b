//! Attendance state machine
//!
//! ```text
//! Idle
//!   ↓ (tag read)
//! TagDetected → Validating ──(already marked today)──→ Rejected(Duplicate)
//!                   ↓
//!                Marking
//!                   ↓
//!              Submitting ⇄ Retry ──(budget spent)──→ Rejected(PendingResend)
//!                   ↓
//!               Confirmed
//! ```
//!
//! Every terminal state returns the machine to `Idle`. The day state is
//! written in exactly one place, `AttendanceManager::commit`, and only after
//! the server confirmed the record.

use super::day_state::{day_bucket, AttendanceDayState};
use super::retry::RetryPolicy;
use crate::config::{AttendanceConfig, DeviceIdentity};
use crate::error::DeviceError;
use crate::platform::{AttendanceStore, Clock, LocationProvider, NetworkSender, StatusDisplay};
use crate::types::{AttendanceData, PendingRecord, SubmitResponse};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Transitions kept for the most recent tap
const MAX_HISTORY_SIZE: usize = 32;

/// Why a tap did not produce a confirmed mark
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Tag id empty, malformed, or not the class tag
    InvalidTag,
    /// Attendance already marked today
    Duplicate,
    /// Submission failed; the record waits in the pending queue
    PendingResend,
    /// The server refused the record
    ServerRefused(String),
}

/// Attendance state machine states
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceState {
    Idle,
    TagDetected,
    Validating,
    Marking,
    Submitting { attempt: u32 },
    Retry { attempt: u32 },
    Confirmed,
    Rejected(RejectReason),
}

impl AttendanceState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AttendanceState::Confirmed | AttendanceState::Rejected(_))
    }
}

/// Result of one tap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceOutcome {
    /// Terminal state the tap ended in
    pub state: AttendanceState,
    /// Record built for the tap, if it got that far
    pub record: Option<AttendanceData>,
    /// Network sends made
    pub attempts: u32,
}

impl AttendanceOutcome {
    pub fn is_confirmed(&self) -> bool {
        self.state == AttendanceState::Confirmed
    }

    pub fn reject_reason(&self) -> Option<&RejectReason> {
        match &self.state {
            AttendanceState::Rejected(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Summary of a pending-queue flush
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushReport {
    pub delivered: usize,
    pub dropped_duplicates: usize,
    pub refused: usize,
    pub still_pending: usize,
}

/// Platform collaborators the attendance flow talks to
pub struct Collaborators {
    pub clock: Box<dyn Clock>,
    pub location: Box<dyn LocationProvider>,
    pub network: Box<dyn NetworkSender>,
    pub store: Box<dyn AttendanceStore>,
    pub display: Box<dyn StatusDisplay>,
}

impl Collaborators {
    pub fn new(
        clock: impl Clock + 'static,
        location: impl LocationProvider + 'static,
        network: impl NetworkSender + 'static,
        store: impl AttendanceStore + 'static,
        display: impl StatusDisplay + 'static,
    ) -> Self {
        Self {
            clock: Box::new(clock),
            location: Box::new(location),
            network: Box::new(network),
            store: Box::new(store),
            display: Box::new(display),
        }
    }
}

/// Tap-to-mark attendance orchestrator; sole owner of the day state
pub struct AttendanceManager {
    identity: DeviceIdentity,
    config: AttendanceConfig,
    retry: RetryPolicy,
    day_state: AttendanceDayState,
    state: AttendanceState,
    history: VecDeque<AttendanceState>,
    io: Collaborators,
}

impl AttendanceManager {
    /// Create the manager and load the persisted day state.
    ///
    /// An unreadable day state is treated as "not marked"; a later successful
    /// mark overwrites it.
    pub fn new(
        identity: DeviceIdentity,
        config: AttendanceConfig,
        io: Collaborators,
    ) -> Result<Self, DeviceError> {
        for (field, value) in [
            ("student_id", &identity.student_id),
            ("class_id", &identity.class_id),
            ("device_mac", &identity.device_mac),
        ] {
            if value.trim().is_empty() {
                return Err(DeviceError::InvalidConfig(format!("{field} is empty")));
            }
        }

        let day_state = match io.store.load_day_state() {
            Ok(state) => state.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "could not load attendance day state, starting unmarked");
                AttendanceDayState::not_marked()
            }
        };

        Ok(Self {
            identity,
            retry: RetryPolicy::from_config(&config),
            config,
            day_state,
            state: AttendanceState::Idle,
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
            io,
        })
    }

    pub fn state(&self) -> &AttendanceState {
        &self.state
    }

    pub fn day_state(&self) -> &AttendanceDayState {
        &self.day_state
    }

    /// States visited by the most recent tap, terminal state last
    pub fn history(&self) -> &VecDeque<AttendanceState> {
        &self.history
    }

    pub(crate) fn clock(&self) -> &dyn Clock {
        self.io.clock.as_ref()
    }

    pub fn tag_read_timeout(&self) -> Duration {
        Duration::from_millis(self.config.tag_read_timeout_ms)
    }

    fn today(&self) -> NaiveDate {
        day_bucket(self.io.clock.now_millis(), self.config.utc_offset_minutes)
    }

    pub fn is_attendance_marked_today(&self) -> bool {
        self.day_state.is_marked_on(self.today())
    }

    /// Run a tap through the state machine; true only when the mark was confirmed
    pub fn mark_attendance(&mut self, nfc_tag_id: &str) -> bool {
        self.process_tag(nfc_tag_id).is_confirmed()
    }

    /// Run a tap through the state machine and report how it ended
    pub fn process_tag(&mut self, nfc_tag_id: &str) -> AttendanceOutcome {
        self.history.clear();
        let outcome = self.run(nfc_tag_id.trim());

        self.io.display.show(outcome.is_confirmed());
        self.state = AttendanceState::Idle;
        outcome
    }

    fn run(&mut self, tag: &str) -> AttendanceOutcome {
        if let Err(e) = self.validate_tag(tag) {
            warn!(error = %e, "rejecting tag");
            return self.finish(AttendanceState::Rejected(RejectReason::InvalidTag), None, 0);
        }
        self.transition(AttendanceState::TagDetected);

        self.transition(AttendanceState::Validating);
        let now = self.io.clock.now_millis();
        let today = day_bucket(now, self.config.utc_offset_minutes);
        if self.day_state.is_marked_on(today) {
            let e = DeviceError::DuplicateAttendance(today.to_string());
            info!(error = %e, "rejecting tap");
            return self.finish(AttendanceState::Rejected(RejectReason::Duplicate), None, 0);
        }

        self.transition(AttendanceState::Marking);
        let record = AttendanceData {
            student_id: self.identity.student_id.clone(),
            class_id: self.identity.class_id.clone(),
            nfc_tag_id: tag.to_string(),
            location: self.io.location.current_location(),
            timestamp: now,
            device_mac: self.identity.device_mac.clone(),
        };

        self.submit(record, today)
    }

    fn validate_tag(&self, tag: &str) -> Result<(), DeviceError> {
        let well_formed = !tag.is_empty()
            && tag.len() <= self.config.max_tag_len
            && tag
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, ':' | '-' | '_'));
        if !well_formed {
            return Err(DeviceError::InvalidTag(tag.to_string()));
        }

        match &self.config.class_tag_id {
            Some(expected) if !expected.eq_ignore_ascii_case(tag) => {
                Err(DeviceError::InvalidTag(tag.to_string()))
            }
            _ => Ok(()),
        }
    }

    fn submit(&mut self, record: AttendanceData, today: NaiveDate) -> AttendanceOutcome {
        let timeout = Duration::from_millis(self.config.send_timeout_ms);
        let mut attempt = 0;

        while attempt < self.retry.max_attempts {
            attempt += 1;
            self.transition(AttendanceState::Submitting { attempt });

            match self.io.network.send(&record, timeout) {
                Ok(SubmitResponse::Accepted) => {
                    self.commit(today, record.timestamp, true);
                    info!(tag = %record.nfc_tag_id, attempt, "attendance confirmed");
                    return self.finish(AttendanceState::Confirmed, Some(record), attempt);
                }
                Ok(SubmitResponse::AlreadyMarked) => {
                    // The server holds today's record already; accept it locally
                    self.commit(today, record.timestamp, true);
                    info!("server reports attendance already marked");
                    return self.finish(
                        AttendanceState::Rejected(RejectReason::Duplicate),
                        Some(record),
                        attempt,
                    );
                }
                Ok(SubmitResponse::Refused(reason)) => {
                    warn!(%reason, "server refused attendance record");
                    return self.finish(
                        AttendanceState::Rejected(RejectReason::ServerRefused(reason)),
                        Some(record),
                        attempt,
                    );
                }
                Err(e) => {
                    warn!(attempt, max = self.retry.max_attempts, error = %e, "attendance send failed");
                    if !e.is_transient() {
                        break;
                    }
                    if let Some(delay) = self.retry.backoff_after(attempt) {
                        self.transition(AttendanceState::Retry { attempt });
                        self.io.clock.delay(delay);
                    }
                }
            }
        }

        let pending = PendingRecord::new(record, attempt, self.io.clock.now_millis());
        match self.queue_pending(&pending, today) {
            Ok(true) => info!(id = %pending.id, "attendance record queued for resend"),
            Ok(false) => debug!(%today, "a record for today is already queued"),
            Err(e) => error!(error = %e, id = %pending.id, "could not queue attendance record"),
        }
        self.finish(
            AttendanceState::Rejected(RejectReason::PendingResend),
            Some(pending.record),
            attempt,
        )
    }

    /// Queue a record unless one for the same day is already waiting
    fn queue_pending(&mut self, pending: &PendingRecord, day: NaiveDate) -> Result<bool, DeviceError> {
        let offset = self.config.utc_offset_minutes;
        let queued = self
            .io
            .store
            .load_pending_records()?
            .iter()
            .any(|p| day_bucket(p.record.timestamp, offset) == day);
        if queued {
            return Ok(false);
        }
        self.io.store.save_pending_record(pending)?;
        Ok(true)
    }

    /// Resend queued records, oldest first. Stops at the first transport
    /// failure; whatever was not delivered stays queued.
    pub fn flush_pending(&mut self) -> Result<FlushReport, DeviceError> {
        let mut records = self.io.store.load_pending_records()?;
        if records.is_empty() {
            return Ok(FlushReport::default());
        }
        records.sort_by_key(|p| p.record.timestamp);

        let timeout = Duration::from_millis(self.config.send_timeout_ms);
        let mut report = FlushReport::default();
        let mut remaining = Vec::new();
        // Days the server holds a record for, including older days the day state no longer shows
        let mut settled: HashSet<NaiveDate> = HashSet::new();
        let mut queue = records.into_iter();

        while let Some(mut pending) = queue.next() {
            let day = day_bucket(pending.record.timestamp, self.config.utc_offset_minutes);
            if self.day_state.is_marked_on(day) || settled.contains(&day) {
                debug!(id = %pending.id, %day, "dropping pending record for a marked day");
                report.dropped_duplicates += 1;
                continue;
            }

            pending.attempts = pending.attempts.saturating_add(1);
            match self.io.network.send(&pending.record, timeout) {
                Ok(SubmitResponse::Accepted) => {
                    self.commit(day, pending.record.timestamp, false);
                    settled.insert(day);
                    report.delivered += 1;
                }
                Ok(SubmitResponse::AlreadyMarked) => {
                    self.commit(day, pending.record.timestamp, false);
                    settled.insert(day);
                    report.dropped_duplicates += 1;
                }
                Ok(SubmitResponse::Refused(reason)) => {
                    warn!(id = %pending.id, %reason, "server refused pending record, dropping");
                    report.refused += 1;
                }
                Err(e) => {
                    warn!(error = %e, "pending flush interrupted");
                    remaining.push(pending);
                    remaining.extend(queue.by_ref());
                }
            }
        }

        self.io.store.replace_pending_records(&remaining)?;
        report.still_pending = remaining.len();

        info!(
            delivered = report.delivered,
            dropped = report.dropped_duplicates,
            refused = report.refused,
            pending = report.still_pending,
            "pending attendance flushed"
        );
        Ok(report)
    }

    /// The single place the day state changes
    fn commit(&mut self, day: NaiveDate, at_ms: i64, prune_pending: bool) {
        if !self.day_state.commit(day, at_ms) {
            return;
        }
        if let Err(e) = self.io.store.save_day_state(&self.day_state) {
            error!(error = %e, "could not persist attendance day state");
        }
        if prune_pending {
            if let Err(e) = self.prune_pending(day) {
                warn!(error = %e, "could not prune pending records");
            }
        }
    }

    /// Drop queued records that a confirmed mark made redundant
    fn prune_pending(&mut self, day: NaiveDate) -> Result<(), DeviceError> {
        let offset = self.config.utc_offset_minutes;
        let records = self.io.store.load_pending_records()?;
        let (stale, keep): (Vec<_>, Vec<_>) = records
            .into_iter()
            .partition(|p| day_bucket(p.record.timestamp, offset) == day);
        if stale.is_empty() {
            return Ok(());
        }

        self.io.store.replace_pending_records(&keep)?;
        debug!(dropped = stale.len(), "pruned pending records");
        Ok(())
    }

    fn transition(&mut self, next: AttendanceState) {
        debug!(from = ?self.state, to = ?next, "attendance transition");
        if self.history.len() == MAX_HISTORY_SIZE {
            self.history.pop_front();
        }
        self.history.push_back(next.clone());
        self.state = next;
    }

    fn finish(
        &mut self,
        state: AttendanceState,
        record: Option<AttendanceData>,
        attempts: u32,
    ) -> AttendanceOutcome {
        self.transition(state.clone());
        AttendanceOutcome {
            state,
            record,
            attempts,
        }
    }
}
