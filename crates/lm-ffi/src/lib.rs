//! C FFI bindings for lm-core
//!
//! This crate exposes a merge session as an opaque handle for use from C/C++
//! UIs. Functions returning `c_int` use 0 for success and -1 for failure;
//! the failure message is available from `lm_session_last_error`.

use lm_core::{MergeSession, OutputSelection};
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::ptr;

/// Opaque handle to a merge session
pub struct FfiSession {
    inner: MergeSession,
    last_error: Option<String>,
}

impl FfiSession {
    fn record<T>(&mut self, result: lm_core::Result<T>) -> c_int {
        match result {
            Ok(_) => {
                self.last_error = None;
                0
            }
            Err(e) => {
                self.last_error = Some(e.to_string());
                -1
            }
        }
    }
}

unsafe fn str_arg<'a>(s: *const c_char) -> Option<&'a str> {
    if s.is_null() {
        None
    } else {
        CStr::from_ptr(s).to_str().ok()
    }
}

fn into_c_string(s: impl Into<Vec<u8>>) -> *mut c_char {
    CString::new(s)
        .map(CString::into_raw)
        .unwrap_or(ptr::null_mut())
}

/// Create a new empty session
///
/// The returned handle must be freed with `lm_session_free`.
#[no_mangle]
pub extern "C" fn lm_session_new() -> *mut FfiSession {
    Box::into_raw(Box::new(FfiSession {
        inner: MergeSession::new(),
        last_error: None,
    }))
}

/// Free a session
///
/// # Safety
/// - `session` must be a valid pointer returned by `lm_session_new` or null
#[no_mangle]
pub unsafe extern "C" fn lm_session_free(session: *mut FfiSession) {
    if !session.is_null() {
        drop(Box::from_raw(session));
    }
}

/// Parse a CSV or Excel file and load it into a slot (0-based)
///
/// # Safety
/// - `session` must be a valid pointer returned by `lm_session_new`
/// - `path` must be a valid C string
#[no_mangle]
pub unsafe extern "C" fn lm_session_load_file(
    session: *mut FfiSession,
    slot: usize,
    path: *const c_char,
) -> c_int {
    let Some(session) = session.as_mut() else {
        return -1;
    };
    let Some(path) = str_arg(path) else {
        session.last_error = Some("path is not a valid string".to_string());
        return -1;
    };

    let result = session.inner.load_file(slot, path);
    session.record(result)
}

/// Empty a slot
///
/// # Safety
/// - `session` must be a valid pointer returned by `lm_session_new`
#[no_mangle]
pub unsafe extern "C" fn lm_session_clear_slot(session: *mut FfiSession, slot: usize) -> c_int {
    let Some(session) = session.as_mut() else {
        return -1;
    };
    let result = session.inner.clear_slot(slot);
    session.record(result)
}

/// Choose the key column
///
/// # Safety
/// - `session` must be a valid pointer returned by `lm_session_new`
/// - `key` must be a valid C string
#[no_mangle]
pub unsafe extern "C" fn lm_session_set_key(session: *mut FfiSession, key: *const c_char) -> c_int {
    let Some(session) = session.as_mut() else {
        return -1;
    };
    let Some(key) = str_arg(key) else {
        session.last_error = Some("key is not a valid string".to_string());
        return -1;
    };

    session.inner.set_key(key);
    session.last_error = None;
    0
}

/// Choose the measure column for a slot (0-based)
///
/// # Safety
/// - `session` must be a valid pointer returned by `lm_session_new`
/// - `header` must be a valid C string
#[no_mangle]
pub unsafe extern "C" fn lm_session_set_measure(
    session: *mut FfiSession,
    slot: usize,
    header: *const c_char,
) -> c_int {
    let Some(session) = session.as_mut() else {
        return -1;
    };
    let Some(header) = str_arg(header) else {
        session.last_error = Some("header is not a valid string".to_string());
        return -1;
    };

    let result = session.inner.set_measure(slot, header);
    session.record(result)
}

/// Include (non-zero) or exclude (zero) an output column
///
/// # Safety
/// - `session` must be a valid pointer returned by `lm_session_new`
/// - `name` must be a valid C string
#[no_mangle]
pub unsafe extern "C" fn lm_session_set_output(
    session: *mut FfiSession,
    name: *const c_char,
    include: c_int,
) -> c_int {
    let Some(session) = session.as_mut() else {
        return -1;
    };
    let Some(name) = str_arg(name) else {
        session.last_error = Some("column name is not a valid string".to_string());
        return -1;
    };

    session.inner.set_output(name, include != 0);
    session.last_error = None;
    0
}

/// Replace the output selection from a JSON object of `{"column": bool}`
///
/// # Safety
/// - `session` must be a valid pointer returned by `lm_session_new`
/// - `json` must be a valid C string
#[no_mangle]
pub unsafe extern "C" fn lm_session_set_output_json(
    session: *mut FfiSession,
    json: *const c_char,
) -> c_int {
    let Some(session) = session.as_mut() else {
        return -1;
    };
    let Some(json) = str_arg(json) else {
        session.last_error = Some("selection is not a valid string".to_string());
        return -1;
    };

    let parsed = serde_json::from_str::<OutputSelection>(json).map_err(lm_core::Error::from);
    let result = parsed.map(|selection| session.inner.replace_output(selection));
    session.record(result)
}

/// Get the headers common to all loaded files as a JSON array
///
/// # Safety
/// - `session` must be a valid pointer returned by `lm_session_new`
/// - Caller must free the returned string with `lm_free_string`
#[no_mangle]
pub unsafe extern "C" fn lm_session_common_headers(session: *const FfiSession) -> *mut c_char {
    let Some(session) = session.as_ref() else {
        return ptr::null_mut();
    };
    serde_json::to_string(&session.inner.common_headers())
        .map(into_c_string)
        .unwrap_or(ptr::null_mut())
}

/// Get the union of all loaded headers as a JSON array
///
/// # Safety
/// - `session` must be a valid pointer returned by `lm_session_new`
/// - Caller must free the returned string with `lm_free_string`
#[no_mangle]
pub unsafe extern "C" fn lm_session_all_headers(session: *const FfiSession) -> *mut c_char {
    let Some(session) = session.as_ref() else {
        return ptr::null_mut();
    };
    serde_json::to_string(&session.inner.all_headers())
        .map(into_c_string)
        .unwrap_or(ptr::null_mut())
}

/// Run the merge with the current configuration
///
/// On failure the previous result is kept.
///
/// # Safety
/// - `session` must be a valid pointer returned by `lm_session_new`
#[no_mangle]
pub unsafe extern "C" fn lm_session_merge(session: *mut FfiSession) -> c_int {
    let Some(session) = session.as_mut() else {
        return -1;
    };
    let result = session.inner.merge().map(|_| ());
    session.record(result)
}

/// Get the number of rows in the last merge result
///
/// # Safety
/// - `session` must be a valid pointer returned by `lm_session_new`
#[no_mangle]
pub unsafe extern "C" fn lm_session_result_row_count(session: *const FfiSession) -> usize {
    session
        .as_ref()
        .and_then(|s| s.inner.result())
        .map_or(0, |t| t.row_count())
}

/// Get the last merge result as a JSON array of row objects
///
/// # Safety
/// - `session` must be a valid pointer returned by `lm_session_new`
/// - Returns null if no merge has succeeded yet
/// - Caller must free the returned string with `lm_free_string`
#[no_mangle]
pub unsafe extern "C" fn lm_session_result_json(session: *const FfiSession) -> *mut c_char {
    let Some(table) = session.as_ref().and_then(|s| s.inner.result()) else {
        return ptr::null_mut();
    };
    serde_json::to_string(&table.rows)
        .map(into_c_string)
        .unwrap_or(ptr::null_mut())
}

/// Get the message of the last failed call
///
/// # Safety
/// - `session` must be a valid pointer returned by `lm_session_new`
/// - Returns null if the last call succeeded
/// - Caller must free the returned string with `lm_free_string`
#[no_mangle]
pub unsafe extern "C" fn lm_session_last_error(session: *const FfiSession) -> *mut c_char {
    session
        .as_ref()
        .and_then(|s| s.last_error.clone())
        .map(into_c_string)
        .unwrap_or(ptr::null_mut())
}

/// Clear all slots, selections and results
///
/// # Safety
/// - `session` must be a valid pointer returned by `lm_session_new`
#[no_mangle]
pub unsafe extern "C" fn lm_session_reset(session: *mut FfiSession) {
    if let Some(session) = session.as_mut() {
        session.inner.reset();
        session.last_error = None;
    }
}

/// Free a string returned by other FFI functions
///
/// # Safety
/// - `s` must be a valid pointer returned by a lm_* function or null
#[no_mangle]
pub unsafe extern "C" fn lm_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}
