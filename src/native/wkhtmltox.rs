//! Bindings to the native `libwkhtmltox` PDF API.
//!
//! Callbacks are registered once per converter as `extern "C"` trampolines.
//! During [`NativeEngine::convert`] the active [`CallbackRoute`] is stored in
//! a thread-local slot; the trampolines read it and forward the event, so
//! the native side never holds a pointer into Rust memory.

use std::cell::RefCell;
use std::ffi::{c_char, c_int, c_long, c_uchar, c_void, CStr, CString};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

use super::{CallbackRoute, NativeEngine, NativeEvent, RawHandle};

type StrCallback = extern "C" fn(converter: *mut c_void, message: *const c_char);
type IntCallback = extern "C" fn(converter: *mut c_void, value: c_int);
type VoidCallback = extern "C" fn(converter: *mut c_void);

#[link(name = "wkhtmltox")]
extern "C" {
    fn wkhtmltopdf_init(use_graphics: c_int) -> c_int;
    fn wkhtmltopdf_deinit() -> c_int;
    fn wkhtmltopdf_extended_qt() -> c_int;
    fn wkhtmltopdf_version() -> *const c_char;

    fn wkhtmltopdf_create_global_settings() -> *mut c_void;
    fn wkhtmltopdf_destroy_global_settings(settings: *mut c_void);
    fn wkhtmltopdf_set_global_setting(
        settings: *mut c_void,
        name: *const c_char,
        value: *const c_char,
    ) -> c_int;

    fn wkhtmltopdf_create_object_settings() -> *mut c_void;
    fn wkhtmltopdf_destroy_object_settings(settings: *mut c_void);
    fn wkhtmltopdf_set_object_setting(
        settings: *mut c_void,
        name: *const c_char,
        value: *const c_char,
    ) -> c_int;

    fn wkhtmltopdf_create_converter(settings: *mut c_void) -> *mut c_void;
    fn wkhtmltopdf_destroy_converter(converter: *mut c_void);
    fn wkhtmltopdf_add_object(converter: *mut c_void, settings: *mut c_void, data: *const c_char);

    fn wkhtmltopdf_set_warning_callback(converter: *mut c_void, cb: StrCallback);
    fn wkhtmltopdf_set_error_callback(converter: *mut c_void, cb: StrCallback);
    fn wkhtmltopdf_set_phase_changed_callback(converter: *mut c_void, cb: VoidCallback);
    fn wkhtmltopdf_set_progress_changed_callback(converter: *mut c_void, cb: IntCallback);
    fn wkhtmltopdf_set_finished_callback(converter: *mut c_void, cb: IntCallback);

    fn wkhtmltopdf_convert(converter: *mut c_void) -> c_int;
    fn wkhtmltopdf_current_phase(converter: *mut c_void) -> c_int;
    fn wkhtmltopdf_phase_count(converter: *mut c_void) -> c_int;
    fn wkhtmltopdf_phase_description(converter: *mut c_void, phase: c_int) -> *const c_char;
    fn wkhtmltopdf_http_error_code(converter: *mut c_void) -> c_int;
    fn wkhtmltopdf_get_output(converter: *mut c_void, data: *mut *const c_uchar) -> c_long;
}

thread_local! {
    static ACTIVE_ROUTE: RefCell<Option<CallbackRoute>> = const { RefCell::new(None) };
}

/// Forward an event to the active route, if any.
///
/// Panics from observers are caught here; unwinding into C is undefined.
fn dispatch(event: NativeEvent) {
    let route = ACTIVE_ROUTE.with(|slot| slot.borrow().clone());
    let Some(route) = route else {
        log::trace!("wkhtmltox: dropped {:?} outside convert", event);
        return;
    };

    if panic::catch_unwind(AssertUnwindSafe(|| route.deliver(event))).is_err() {
        log::error!("wkhtmltox: observer for {} panicked", route.id());
    }
}

/// Copy a borrowed C string.
///
/// # Safety
///
/// `ptr` must be null or point to a valid null-terminated string.
unsafe fn c_string(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    CStr::from_ptr(ptr).to_string_lossy().into_owned()
}

extern "C" fn on_warning(_converter: *mut c_void, message: *const c_char) {
    // SAFETY: the engine passes a valid string for the duration of the call.
    dispatch(NativeEvent::Warning(unsafe { c_string(message) }));
}

extern "C" fn on_error(_converter: *mut c_void, message: *const c_char) {
    // SAFETY: the engine passes a valid string for the duration of the call.
    dispatch(NativeEvent::Error(unsafe { c_string(message) }));
}

extern "C" fn on_phase_changed(converter: *mut c_void) {
    // SAFETY: the engine passes the live converter that raised the event.
    let (index, description) = unsafe {
        let phase = wkhtmltopdf_current_phase(converter);
        (phase, c_string(wkhtmltopdf_phase_description(converter, phase)))
    };
    dispatch(NativeEvent::PhaseChanged {
        index: index.max(0) as usize,
        description,
    });
}

extern "C" fn on_progress_changed(_converter: *mut c_void, percent: c_int) {
    dispatch(NativeEvent::ProgressChanged(percent));
}

extern "C" fn on_finished(_converter: *mut c_void, success: c_int) {
    dispatch(NativeEvent::Finished(success != 0));
}

/// Engine backed by the linked `libwkhtmltox`.
///
/// The library keeps process-global state: at most one engine may be
/// initialized at a time, and every call must come from the thread that
/// initialized it.
#[derive(Debug, Default)]
pub struct WkhtmltoxEngine {
    use_graphics: bool,
}

impl WkhtmltoxEngine {
    /// Create an engine running without a graphical environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Let the engine use the graphical environment (X11 on Linux).
    pub fn with_graphics(mut self, use_graphics: bool) -> Self {
        self.use_graphics = use_graphics;
        self
    }
}

/// Encode a name/value pair for the C API. Interior NUL bytes are rejected.
fn c_pair(name: &str, value: &str) -> Option<(CString, CString)> {
    Some((CString::new(name).ok()?, CString::new(value).ok()?))
}

impl NativeEngine for WkhtmltoxEngine {
    fn name(&self) -> &'static str {
        "wkhtmltox"
    }

    fn is_process_global(&self) -> bool {
        true
    }

    fn init(&self) -> bool {
        // SAFETY: no preconditions; the caller serializes init and deinit.
        unsafe { wkhtmltopdf_init(c_int::from(self.use_graphics)) == 1 }
    }

    fn deinit(&self) {
        // SAFETY: called once, on the initializing thread.
        unsafe {
            wkhtmltopdf_deinit();
        }
    }

    fn version(&self) -> String {
        // SAFETY: returns a static string.
        unsafe { c_string(wkhtmltopdf_version()) }
    }

    fn has_patched_qt(&self) -> bool {
        // SAFETY: no preconditions.
        unsafe { wkhtmltopdf_extended_qt() != 0 }
    }

    fn create_global_settings(&self) -> Option<RawHandle> {
        // SAFETY: no preconditions.
        RawHandle::from_ptr(unsafe { wkhtmltopdf_create_global_settings() })
    }

    fn destroy_global_settings(&self, settings: RawHandle) {
        // SAFETY: the handle is live and not adopted by a converter.
        unsafe { wkhtmltopdf_destroy_global_settings(settings.as_ptr()) }
    }

    fn set_global_setting(&self, settings: RawHandle, name: &str, value: &str) -> bool {
        let Some((name, value)) = c_pair(name, value) else {
            return false;
        };
        // SAFETY: the handle is live; the strings outlive the call.
        unsafe {
            wkhtmltopdf_set_global_setting(settings.as_ptr(), name.as_ptr(), value.as_ptr()) == 1
        }
    }

    fn create_object_settings(&self) -> Option<RawHandle> {
        // SAFETY: no preconditions.
        RawHandle::from_ptr(unsafe { wkhtmltopdf_create_object_settings() })
    }

    fn destroy_object_settings(&self, settings: RawHandle) {
        // SAFETY: the handle is live and not adopted by a converter.
        unsafe { wkhtmltopdf_destroy_object_settings(settings.as_ptr()) }
    }

    fn set_object_setting(&self, settings: RawHandle, name: &str, value: &str) -> bool {
        let Some((name, value)) = c_pair(name, value) else {
            return false;
        };
        // SAFETY: the handle is live; the strings outlive the call.
        unsafe {
            wkhtmltopdf_set_object_setting(settings.as_ptr(), name.as_ptr(), value.as_ptr()) == 1
        }
    }

    fn create_converter(&self, settings: RawHandle) -> Option<RawHandle> {
        // SAFETY: the settings handle is live and handed over to the converter.
        let converter = unsafe { wkhtmltopdf_create_converter(settings.as_ptr()) };
        let handle = RawHandle::from_ptr(converter)?;

        // SAFETY: the converter was just created and is non-null.
        unsafe {
            wkhtmltopdf_set_warning_callback(converter, on_warning);
            wkhtmltopdf_set_error_callback(converter, on_error);
            wkhtmltopdf_set_phase_changed_callback(converter, on_phase_changed);
            wkhtmltopdf_set_progress_changed_callback(converter, on_progress_changed);
            wkhtmltopdf_set_finished_callback(converter, on_finished);
        }
        Some(handle)
    }

    fn destroy_converter(&self, converter: RawHandle) {
        // SAFETY: the handle is live; adopted settings are freed with it.
        unsafe { wkhtmltopdf_destroy_converter(converter.as_ptr()) }
    }

    fn add_object(&self, converter: RawHandle, settings: RawHandle) {
        // SAFETY: both handles are live; a null data pointer loads `page`.
        unsafe { wkhtmltopdf_add_object(converter.as_ptr(), settings.as_ptr(), ptr::null()) }
    }

    fn phase_count(&self, converter: RawHandle) -> usize {
        // SAFETY: the handle is live.
        let count = unsafe { wkhtmltopdf_phase_count(converter.as_ptr()) };
        count.max(0) as usize
    }

    fn phase_description(&self, converter: RawHandle, phase: usize) -> String {
        let Ok(phase) = c_int::try_from(phase) else {
            return String::new();
        };
        // SAFETY: the handle is live; out-of-range phases return null.
        unsafe { c_string(wkhtmltopdf_phase_description(converter.as_ptr(), phase)) }
    }

    fn convert(&self, converter: RawHandle, route: &CallbackRoute) -> bool {
        let previous = ACTIVE_ROUTE.with(|slot| slot.replace(Some(route.clone())));
        // SAFETY: the handle is live and all objects were added on this thread.
        let result = unsafe { wkhtmltopdf_convert(converter.as_ptr()) };
        ACTIVE_ROUTE.with(|slot| *slot.borrow_mut() = previous);
        result == 1
    }

    fn http_error_code(&self, converter: RawHandle) -> i32 {
        // SAFETY: the handle is live.
        unsafe { wkhtmltopdf_http_error_code(converter.as_ptr()) }
    }

    fn output(&self, converter: RawHandle) -> Vec<u8> {
        let mut data: *const c_uchar = ptr::null();
        // SAFETY: the handle is live; the buffer stays valid until the
        // converter is destroyed and is copied out immediately.
        unsafe {
            let len = wkhtmltopdf_get_output(converter.as_ptr(), &mut data);
            if data.is_null() || len <= 0 {
                return Vec::new();
            }
            std::slice::from_raw_parts(data, len as usize).to_vec()
        }
    }
}
