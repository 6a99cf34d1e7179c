//! FFI bindings for the visitor archetype classifier
//!
//! This module provides C-compatible functions for driving the classifier from
//! a hosting layer written in another language. All functions use C strings
//! (null-terminated) and return allocated memory that must be freed by the
//! caller using `archetype_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::classifier::ArchetypeClassifier;
use crate::config::ClassifierConfig;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

// ============================================================================
// Classifier API
// ============================================================================

/// Opaque handle to an ArchetypeClassifier
pub struct ClassifierHandle {
    classifier: ArchetypeClassifier,
}

/// Create a new classifier.
///
/// # Safety
/// - `config_json` must be NULL (default configuration) or a valid
///   null-terminated C string holding a configuration document.
/// - Returns a pointer that must be freed with `archetype_classifier_free`.
/// - Returns NULL on error; call `archetype_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn archetype_classifier_new(config_json: *const c_char) -> *mut ClassifierHandle {
    clear_last_error();

    let classifier = if config_json.is_null() {
        ArchetypeClassifier::new()
    } else {
        let json_str = match cstr_to_string(config_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid configuration string pointer");
                return ptr::null_mut();
            }
        };

        match ClassifierConfig::from_json(&json_str).and_then(ArchetypeClassifier::with_config) {
            Ok(classifier) => classifier,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    Box::into_raw(Box::new(ClassifierHandle { classifier }))
}

/// Free a classifier.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `archetype_classifier_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn archetype_classifier_free(handle: *mut ClassifierHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// Ingest one JSON-encoded visitor event.
///
/// Returns the classification outcome JSON, or the string `null` when the
/// event was recorded without re-evaluation (departures, interactions).
///
/// # Safety
/// - `handle` must be a valid pointer returned by `archetype_classifier_new`.
/// - `event_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `archetype_free_string`.
/// - Returns NULL on error; call `archetype_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn archetype_classifier_ingest(
    handle: *mut ClassifierHandle,
    event_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null classifier pointer");
        return ptr::null_mut();
    }

    let handle = &*handle;

    let json_str = match cstr_to_string(event_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid event string pointer");
            return ptr::null_mut();
        }
    };

    let result = handle
        .classifier
        .ingest_json(&json_str)
        .and_then(|outcome| Ok(serde_json::to_string(&outcome)?));

    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Get a JSON snapshot of one session.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `archetype_classifier_new`.
/// - `session_id` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `archetype_free_string`.
/// - Returns NULL on error; call `archetype_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn archetype_classifier_session(
    handle: *mut ClassifierHandle,
    session_id: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null classifier pointer");
        return ptr::null_mut();
    }

    let handle = &*handle;

    let id = match cstr_to_string(session_id) {
        Some(s) => s,
        None => {
            set_last_error("Invalid session id pointer");
            return ptr::null_mut();
        }
    };

    let result = handle
        .classifier
        .get_session(&id)
        .and_then(|session| Ok(serde_json::to_string(&session)?));

    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Drop a session when the host decides it has expired.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `archetype_classifier_new`.
/// - `session_id` must be a valid null-terminated C string.
/// - Returns 0 on success, non-zero on error.
/// - On error, call `archetype_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn archetype_classifier_remove_session(
    handle: *mut ClassifierHandle,
    session_id: *const c_char,
) -> i32 {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null classifier pointer");
        return -1;
    }

    let handle = &*handle;

    let id = match cstr_to_string(session_id) {
        Some(s) => s,
        None => {
            set_last_error("Invalid session id pointer");
            return -1;
        }
    };

    match handle.classifier.remove_session(&id) {
        Ok(_) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by classifier functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a classifier function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn archetype_free_string(ptr: *mut c_char) {
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
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next classifier call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn archetype_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn archetype_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    fn page_visit(session_id: &str, path: &str, timestamp_ms: f64) -> CString {
        CString::new(format!(
            r#"{{"type": "page_visit", "session_id": "{}", "path": "{}", "timestamp_ms": {}}}"#,
            session_id, path, timestamp_ms
        ))
        .unwrap()
    }

    #[test]
    fn test_ffi_classifier_lifecycle() {
        unsafe {
            let handle = archetype_classifier_new(ptr::null());
            assert!(!handle.is_null());

            let first = archetype_classifier_ingest(handle, page_visit("s1", "/", 0.0).as_ptr());
            assert!(!first.is_null());
            archetype_free_string(first);

            let second = archetype_classifier_ingest(handle, page_visit("s1", "/pricing", 300.0).as_ptr());
            assert!(!second.is_null());
            let outcome: serde_json::Value =
                serde_json::from_str(CStr::from_ptr(second).to_str().unwrap()).unwrap();
            assert_eq!(outcome["session_id"], "s1");
            assert_eq!(outcome["verdict"], "unknown");
            assert_eq!(outcome["scores"]["programmatic"], 0.3);
            archetype_free_string(second);

            let id = CString::new("s1").unwrap();
            let session = archetype_classifier_session(handle, id.as_ptr());
            assert!(!session.is_null());
            let session_str = CStr::from_ptr(session).to_str().unwrap();
            assert!(session_str.contains("/pricing"));
            archetype_free_string(session);

            assert_eq!(archetype_classifier_remove_session(handle, id.as_ptr()), 0);
            assert_eq!(archetype_classifier_remove_session(handle, id.as_ptr()), -1);

            archetype_classifier_free(handle);
        }
    }

    #[test]
    fn test_ffi_unscored_event_returns_null_json() {
        unsafe {
            let handle = archetype_classifier_new(ptr::null());
            let event = CString::new(
                r#"{"type": "interaction", "session_id": "s", "kind": "focus", "timestamp_ms": 1}"#,
            )
            .unwrap();

            let result = archetype_classifier_ingest(handle, event.as_ptr());
            assert!(!result.is_null());
            assert_eq!(CStr::from_ptr(result).to_str().unwrap(), "null");

            archetype_free_string(result);
            archetype_classifier_free(handle);
        }
    }

    #[test]
    fn test_ffi_custom_config() {
        unsafe {
            let config = CString::new(r#"{"confidence_threshold": 0.3}"#).unwrap();
            let handle = archetype_classifier_new(config.as_ptr());
            assert!(!handle.is_null());

            archetype_free_string(archetype_classifier_ingest(handle, page_visit("s", "/", 0.0).as_ptr()));
            let result = archetype_classifier_ingest(handle, page_visit("s", "/pricing", 300.0).as_ptr());
            let outcome: serde_json::Value =
                serde_json::from_str(CStr::from_ptr(result).to_str().unwrap()).unwrap();
            assert_eq!(outcome["verdict"], "programmatic");

            archetype_free_string(result);
            archetype_classifier_free(handle);

            let bad = CString::new(r#"{"confidence_threshold": -2}"#).unwrap();
            assert!(archetype_classifier_new(bad.as_ptr()).is_null());
            assert!(!archetype_last_error().is_null());
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        unsafe {
            let handle = archetype_classifier_new(ptr::null());
            let invalid_json = CString::new("not json").unwrap();

            let result = archetype_classifier_ingest(handle, invalid_json.as_ptr());
            assert!(result.is_null());

            let error = archetype_last_error();
            assert!(!error.is_null());
            let error_str = CStr::from_ptr(error).to_str().unwrap();
            assert!(!error_str.is_empty());

            let null_result = archetype_classifier_ingest(ptr::null_mut(), invalid_json.as_ptr());
            assert!(null_result.is_null());

            archetype_classifier_free(handle);
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = archetype_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert!(!version_str.is_empty());
        }
    }
}
