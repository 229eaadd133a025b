//! Tap-to-mark attendance
//!
//! A tag read becomes at most one confirmed attendance mark per calendar day.
//! Marks that cannot be delivered are queued for a later resend and never
//! count as attended until the server confirms them.

mod day_state;
mod manager;
mod retry;

pub use day_state::{day_bucket, AttendanceDayState};
pub use manager::{
    AttendanceManager, AttendanceOutcome, AttendanceState, Collaborators, FlushReport,
    RejectReason,
};
pub use retry::RetryPolicy;
