//! focuswatch - focus scoring and attendance for classroom wearables
//!
//! A wrist-worn device samples heart rate, motion and user interactions and
//! fuses each snapshot into a 0-100 focus score. Tapping an NFC tag marks the
//! wearer present, at most once per calendar day, with bounded retries and a
//! persisted resend queue for when the network is down.
//!
//! ## Modules
//!
//! - **Scoring**: [`sampler`] → [`motion`] / [`health`] → [`focus`] → [`session`]
//! - **Attendance**: [`attendance`] state machine over the [`platform`] traits
//! - **Device**: [`device::DeviceLoop`] ties both together into one cooperative loop

pub mod attendance;
pub mod config;
pub mod device;
pub mod error;
pub mod focus;
pub mod health;
pub mod motion;
pub mod platform;
pub mod sampler;
pub mod session;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use attendance::{AttendanceManager, AttendanceOutcome, AttendanceState, RejectReason};
pub use config::DeviceConfig;
pub use device::{DeviceLoop, TickReport};
pub use error::{DeviceError, SensorKind};
pub use focus::FocusEngine;
pub use health::{HealthMonitor, HealthReport};
pub use motion::MotionAnalyzer;
pub use session::{FocusSession, SessionSummary};
pub use types::{AttendanceData, FocusData, SensorData};

/// Library version
pub const FOCUSWATCH_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI and in diagnostics
pub const PRODUCER_NAME: &str = "focuswatch";
