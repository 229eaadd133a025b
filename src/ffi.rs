//! FFI bindings for focuswatch
//!
//! C-compatible entry points for the watch firmware and companion apps.
//! Plain-struct calls never allocate. JSON calls take null-terminated C
//! strings and return allocated memory that must be freed by the caller
//! using `focuswatch_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::FocusConfig;
use crate::focus::FocusEngine;
use crate::session::FocusSession;
use crate::types::{FocusData, SensorData};

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Caller must free
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Sensor snapshot as laid out for C callers
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct FfiSensorData {
    pub heart_rate: f64,
    pub steps: u32,
    pub movement_count: u32,
    pub interaction_count: u32,
    pub timestamp: u64,
}

impl From<FfiSensorData> for SensorData {
    fn from(raw: FfiSensorData) -> Self {
        SensorData {
            heart_rate: raw.heart_rate,
            steps: raw.steps,
            movement_count: raw.movement_count,
            interaction_count: raw.interaction_count,
            timestamp: raw.timestamp,
        }
    }
}

/// Focus result as laid out for C callers
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FfiFocusData {
    pub focus_score: u8,
    pub distraction_count: u32,
    pub timestamp: u64,
}

impl From<FocusData> for FfiFocusData {
    fn from(focus: FocusData) -> Self {
        FfiFocusData {
            focus_score: focus.focus_score,
            distraction_count: focus.distraction_count,
            timestamp: focus.timestamp,
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Score one snapshot with the default thresholds.
#[no_mangle]
pub extern "C" fn focuswatch_calculate_focus_score(data: FfiSensorData) -> FfiFocusData {
    clear_last_error();
    FocusEngine::default()
        .calculate_focus_score(&data.into())
        .into()
}

/// Score a JSON `SensorData` snapshot with a JSON `FocusConfig`.
///
/// # Safety
/// - `config_json` may be NULL (defaults are used); otherwise both arguments
///   must be valid null-terminated C strings.
/// - Returns a newly allocated JSON `FocusData` string that must be freed with
///   `focuswatch_free_string`.
/// - Returns NULL on error; call `focuswatch_last_error` to get the message.
#[no_mangle]
pub unsafe extern "C" fn focuswatch_score_json(
    config_json: *const c_char,
    sensor_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let config = if config_json.is_null() {
        FocusConfig::default()
    } else {
        let Some(raw) = cstr_to_string(config_json) else {
            set_last_error("Invalid config string pointer");
            return ptr::null_mut();
        };
        match serde_json::from_str::<FocusConfig>(&raw) {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&format!("Invalid focus config: {e}"));
                return ptr::null_mut();
            }
        }
    };
    if let Err(e) = config.validate() {
        set_last_error(&e.to_string());
        return ptr::null_mut();
    }

    let Some(raw) = cstr_to_string(sensor_json) else {
        set_last_error("Invalid sensor data string pointer");
        return ptr::null_mut();
    };
    let data: SensorData = match serde_json::from_str(&raw) {
        Ok(data) => data,
        Err(e) => {
            set_last_error(&format!("Invalid sensor data: {e}"));
            return ptr::null_mut();
        }
    };

    let focus = FocusEngine::new(config).calculate_focus_score(&data);
    match serde_json::to_string(&focus) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateful Session API
// ============================================================================

/// Opaque handle to a scoring session
pub struct FocusSessionHandle {
    engine: FocusEngine,
    session: FocusSession,
}

/// Create a scoring session with the given smoothing window.
///
/// A non-positive window selects the default. Free with `focuswatch_session_free`.
#[no_mangle]
pub extern "C" fn focuswatch_session_new(window_size: i32) -> *mut FocusSessionHandle {
    clear_last_error();

    let session = if window_size <= 0 {
        FocusSession::default()
    } else {
        FocusSession::new(window_size as usize)
    };
    Box::into_raw(Box::new(FocusSessionHandle {
        engine: FocusEngine::default(),
        session,
    }))
}

/// Free a session.
///
/// # Safety
/// - `session` must be a pointer returned by `focuswatch_session_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn focuswatch_session_free(session: *mut FocusSessionHandle) {
    if !session.is_null() {
        drop(Box::from_raw(session));
    }
}

/// Score a snapshot and add it to the session; writes the raw result to
/// `out` and returns the smoothed score, or -1 on error.
///
/// # Safety
/// - `session` must be a valid pointer returned by `focuswatch_session_new`.
/// - `out` may be NULL; otherwise it must point to writable `FfiFocusData`.
#[no_mangle]
pub unsafe extern "C" fn focuswatch_session_record(
    session: *mut FocusSessionHandle,
    data: FfiSensorData,
    out: *mut FfiFocusData,
) -> i32 {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return -1;
    }
    let handle = &mut *session;

    let data: SensorData = data.into();
    let focus = handle.engine.calculate_focus_score(&data);
    let smoothed = handle.session.record(&data, &focus);
    if !out.is_null() {
        *out = focus.into();
    }
    i32::from(smoothed)
}

/// Session totals as JSON.
///
/// # Safety
/// - `session` must be a valid pointer returned by `focuswatch_session_new`.
/// - Returns a newly allocated string that must be freed with `focuswatch_free_string`.
/// - Returns NULL on error; call `focuswatch_last_error` to get the message.
#[no_mangle]
pub unsafe extern "C" fn focuswatch_session_summary(
    session: *const FocusSessionHandle,
) -> *mut c_char {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }

    match serde_json::to_string(&(*session).session.summary()) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by focuswatch functions.
///
/// # Safety
/// - `ptr` must be a pointer returned by a focuswatch function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn focuswatch_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - The returned pointer is valid until the next focuswatch call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn focuswatch_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Library version. Static string, do NOT free.
#[no_mangle]
pub extern "C" fn focuswatch_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::ffi::CString;

    fn resting() -> FfiSensorData {
        FfiSensorData {
            heart_rate: 70.0,
            steps: 12,
            movement_count: 0,
            interaction_count: 2,
            timestamp: 42,
        }
    }

    #[test]
    fn test_ffi_calculate_focus_score() {
        let focus = focuswatch_calculate_focus_score(resting());
        assert_eq!(
            focus,
            FfiFocusData {
                focus_score: 100,
                distraction_count: 0,
                timestamp: 42,
            }
        );

        let restless = FfiSensorData {
            heart_rate: 120.0,
            movement_count: 9,
            ..resting()
        };
        let focus = focuswatch_calculate_focus_score(restless);
        // 30 for heart rate, 20 for four excess movements
        assert_eq!(focus.focus_score, 50);
        assert_eq!(focus.distraction_count, 5);
    }

    #[test]
    fn test_ffi_score_json_with_config() {
        let config = CString::new(r#"{"resting_hr_max": 130.0}"#).unwrap();
        let data = CString::new(
            r#"{"heartRate":120.0,"steps":0,"movementCount":0,"interactionCount":1,"timestamp":7}"#,
        )
        .unwrap();

        unsafe {
            let result = focuswatch_score_json(config.as_ptr(), data.as_ptr());
            assert!(!result.is_null());

            let json = CStr::from_ptr(result).to_str().unwrap();
            let focus: FocusData = serde_json::from_str(json).unwrap();
            assert_eq!(focus.focus_score, 100);
            assert_eq!(focus.timestamp, 7);

            focuswatch_free_string(result);
        }
    }

    #[test]
    fn test_ffi_score_json_rejects_negative_penalty() {
        let config = CString::new(r#"{"movement_penalty": -5.0}"#).unwrap();
        let data = CString::new(
            r#"{"heartRate":70.0,"steps":0,"movementCount":20,"interactionCount":1,"timestamp":7}"#,
        )
        .unwrap();

        unsafe {
            let result = focuswatch_score_json(config.as_ptr(), data.as_ptr());
            assert!(result.is_null());

            let message = CStr::from_ptr(focuswatch_last_error()).to_str().unwrap();
            assert!(message.contains("movement_penalty"));
        }
    }

    #[test]
    fn test_ffi_session_lifecycle() {
        unsafe {
            let session = focuswatch_session_new(3);
            assert!(!session.is_null());

            let mut out = FfiFocusData::default();
            for t in 1..=3 {
                let data = FfiSensorData {
                    timestamp: t * 60_000,
                    ..resting()
                };
                assert_eq!(focuswatch_session_record(session, data, &mut out), 100);
            }
            assert_eq!(out.timestamp, 180_000);

            let summary = focuswatch_session_summary(session);
            assert!(!summary.is_null());
            let json = CStr::from_ptr(summary).to_str().unwrap();
            assert!(json.contains("\"samples\":3"));
            assert!(json.contains("\"durationMinutes\":2.0"));

            focuswatch_free_string(summary);
            focuswatch_session_free(session);
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        unsafe {
            let bad = CString::new("not json").unwrap();
            let result = focuswatch_score_json(ptr::null(), bad.as_ptr());
            assert!(result.is_null());

            let error = focuswatch_last_error();
            assert!(!error.is_null());
            let message = CStr::from_ptr(error).to_str().unwrap();
            assert!(message.starts_with("Invalid sensor data"));

            assert_eq!(
                focuswatch_session_record(ptr::null_mut(), resting(), ptr::null_mut()),
                -1
            );
        }
    }

    #[test]
    fn test_ffi_version() {
        let version = focuswatch_version();
        assert!(!version.is_null());
        let version_str = unsafe { CStr::from_ptr(version) }.to_str().unwrap();
        assert_eq!(version_str, env!("CARGO_PKG_VERSION"));
    }
}
