//! Native engine abstraction layer.
//!
//! Provides a trait-based interface mirroring the wkhtmltox C API, isolating
//! the linked library from the lifecycle and conversion logic. All handles
//! are opaque [`RawHandle`]s; nothing outside an engine implementation
//! dereferences them.

mod null;
#[cfg(feature = "wkhtmltox")]
mod wkhtmltox;

pub use null::{Journal, NullEngine, NullEngineBuilder, SettingCall, SettingScope};
#[cfg(feature = "wkhtmltox")]
pub use wkhtmltox::WkhtmltoxEngine;

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::registry::HandleId;

/// Opaque, non-null native handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHandle(NonZeroUsize);

impl RawHandle {
    /// Wrap a raw address. Returns `None` for zero.
    pub fn new(addr: usize) -> Option<Self> {
        NonZeroUsize::new(addr).map(Self)
    }

    /// Wrap a pointer. Returns `None` for null.
    pub fn from_ptr<T>(ptr: *mut T) -> Option<Self> {
        Self::new(ptr as usize)
    }

    /// The handle as a pointer.
    pub fn as_ptr<T>(self) -> *mut T {
        self.0.get() as *mut T
    }

    /// The handle as an address.
    pub fn addr(self) -> usize {
        self.0.get()
    }
}

impl fmt::Display for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0.get())
    }
}

/// Event raised by the engine while converting.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeEvent {
    /// Non-fatal problem, such as a failed resource load.
    Warning(String),
    /// Fatal problem for the current conversion.
    Error(String),
    /// A new conversion phase started.
    PhaseChanged { index: usize, description: String },
    /// Progress of the current phase, in percent.
    ProgressChanged(i32),
    /// The conversion ended, with its outcome.
    Finished(bool),
}

/// Receives native events for a registered handle id.
pub trait EventRouter: Send + Sync {
    /// Deliver `event` to the owner of `id`. Unknown ids are ignored.
    fn route(&self, id: HandleId, event: NativeEvent);
}

/// Where callbacks raised during a single `convert` call are delivered.
#[derive(Clone)]
pub struct CallbackRoute {
    id: HandleId,
    router: Arc<dyn EventRouter>,
}

impl CallbackRoute {
    /// Create a route delivering to the owner of `id`.
    pub fn new(id: HandleId, router: Arc<dyn EventRouter>) -> Self {
        Self { id, router }
    }

    /// Registry id of the converter being run.
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Deliver an event.
    pub fn deliver(&self, event: NativeEvent) {
        self.router.route(self.id, event);
    }
}

impl fmt::Debug for CallbackRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackRoute").field("id", &self.id).finish()
    }
}

/// Abstract interface for the native HTML-to-PDF engine.
///
/// Implementations are single-thread-affine: every method must be called
/// from the thread that called [`init`](NativeEngine::init). The crate
/// guarantees this by only exposing engines through a `Context`, which
/// never leaves that thread.
///
/// Ownership follows wkhtmltox: settings passed to
/// [`create_converter`](NativeEngine::create_converter) or
/// [`add_object`](NativeEngine::add_object) are freed by
/// [`destroy_converter`](NativeEngine::destroy_converter) and must not be
/// destroyed separately.
pub trait NativeEngine {
    /// Short engine name for logs.
    fn name(&self) -> &'static str;

    /// Whether at most one instance may be initialized per process.
    fn is_process_global(&self) -> bool {
        false
    }

    /// Initialize the engine. Returns `false` on failure.
    fn init(&self) -> bool;

    /// Release all engine resources.
    fn deinit(&self);

    /// Engine version string.
    fn version(&self) -> String;

    /// Whether the engine is built against its patched Qt.
    fn has_patched_qt(&self) -> bool;

    /// Allocate a converter-level settings block.
    fn create_global_settings(&self) -> Option<RawHandle>;

    /// Free a converter-level settings block that was never adopted.
    fn destroy_global_settings(&self, settings: RawHandle);

    /// Set one converter-level option. Returns `false` if rejected.
    fn set_global_setting(&self, settings: RawHandle, name: &str, value: &str) -> bool;

    /// Allocate a per-document settings block.
    fn create_object_settings(&self) -> Option<RawHandle>;

    /// Free a per-document settings block that was never adopted.
    fn destroy_object_settings(&self, settings: RawHandle);

    /// Set one per-document option. Returns `false` if rejected.
    fn set_object_setting(&self, settings: RawHandle, name: &str, value: &str) -> bool;

    /// Create a converter adopting `settings`.
    fn create_converter(&self, settings: RawHandle) -> Option<RawHandle>;

    /// Free a converter and every settings block it adopted.
    fn destroy_converter(&self, converter: RawHandle);

    /// Append a document, adopting its settings.
    fn add_object(&self, converter: RawHandle, settings: RawHandle);

    /// Number of conversion phases.
    fn phase_count(&self, converter: RawHandle) -> usize;

    /// Description of a conversion phase.
    fn phase_description(&self, converter: RawHandle, phase: usize) -> String;

    /// Run the conversion, delivering callbacks to `route`.
    fn convert(&self, converter: RawHandle, route: &CallbackRoute) -> bool;

    /// HTTP error code of the last failed load, `0` if none.
    fn http_error_code(&self, converter: RawHandle) -> i32;

    /// Copy of the in-memory output buffer.
    fn output(&self, converter: RawHandle) -> Vec<u8>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(HandleId, NativeEvent)>>);

    impl EventRouter for Recorder {
        fn route(&self, id: HandleId, event: NativeEvent) {
            self.0.lock().unwrap().push((id, event));
        }
    }

    #[test]
    fn test_raw_handle_rejects_null() {
        assert!(RawHandle::new(0).is_none());
        assert!(RawHandle::from_ptr(std::ptr::null_mut::<u8>()).is_none());

        let handle = RawHandle::new(0x10).unwrap();
        assert_eq!(handle.addr(), 0x10);
        assert_eq!(handle.as_ptr::<u8>() as usize, 0x10);
        assert_eq!(handle.to_string(), "0x10");
    }

    #[test]
    fn test_route_delivers_with_id() {
        let recorder = Arc::new(Recorder::default());
        let id = crate::registry::HandleRegistry::<()>::new().issue();
        let route = CallbackRoute::new(id, recorder.clone());

        route.deliver(NativeEvent::ProgressChanged(40));
        route.deliver(NativeEvent::Finished(true));

        let events = recorder.0.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], (id, NativeEvent::ProgressChanged(40)));
        assert_eq!(route.id(), id);
    }
}
