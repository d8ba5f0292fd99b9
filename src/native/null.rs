//! In-process engine that renders nothing.
//!
//! `NullEngine` follows the wkhtmltox handle and ownership rules exactly and
//! records every call in a shared [`Journal`], so lifecycle and ordering
//! guarantees can be checked without the native library. Failures can be
//! injected through [`NullEngineBuilder`].

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{CallbackRoute, NativeEngine, NativeEvent, RawHandle};
use crate::options::OUTPUT_KEY;

const PHASES: [&str; 6] = [
    "Loading pages",
    "Counting pages",
    "Resolving links",
    "Loading headers and footers",
    "Printing pages",
    "Done",
];

const FIRST_HANDLE: usize = 0x1000;

/// Which settings block a recorded call targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingScope {
    /// Converter-level settings.
    Global,
    /// Per-document settings.
    Object,
}

/// One recorded `set_*_setting` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingCall {
    pub scope: SettingScope,
    pub name: String,
    pub value: String,
    pub accepted: bool,
}

#[derive(Debug)]
enum Entry {
    GlobalSettings {
        values: HashMap<String, String>,
        adopted: bool,
    },
    ObjectSettings {
        values: HashMap<String, String>,
        adopted: bool,
    },
    Converter {
        settings: usize,
        objects: Vec<usize>,
        output: Vec<u8>,
        http_error_code: i32,
    },
}

#[derive(Debug, Default)]
struct JournalState {
    initialized: bool,
    init_calls: usize,
    deinit_calls: usize,
    next_handle: usize,
    entries: HashMap<usize, Entry>,
    settings: Vec<SettingCall>,
    convert_calls: usize,
    invalid_frees: usize,
}

impl JournalState {
    fn allocate(&mut self, entry: Entry) -> Option<RawHandle> {
        let addr = self.next_handle.max(FIRST_HANDLE);
        self.next_handle = addr + 0x10;
        let handle = RawHandle::new(addr)?;
        self.entries.insert(addr, entry);
        Some(handle)
    }

    fn invalid_free(&mut self, what: &str, handle: RawHandle) {
        log::error!("null engine: invalid free of {} {}", what, handle);
        self.invalid_frees += 1;
    }

    fn values(&self, addr: usize) -> Option<&HashMap<String, String>> {
        match self.entries.get(&addr)? {
            Entry::GlobalSettings { values, .. } | Entry::ObjectSettings { values, .. } => {
                Some(values)
            }
            Entry::Converter { .. } => None,
        }
    }
}

/// Shared record of every call made to a [`NullEngine`].
///
/// Cloning a journal shares it, so a test can keep one half while the engine
/// moves to the dispatcher thread.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<JournalState>>);

impl Journal {
    fn lock(&self) -> MutexGuard<'_, JournalState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the engine is currently initialized.
    pub fn is_initialized(&self) -> bool {
        self.lock().initialized
    }

    /// Number of `init` calls.
    pub fn init_calls(&self) -> usize {
        self.lock().init_calls
    }

    /// Number of `deinit` calls.
    pub fn deinit_calls(&self) -> usize {
        self.lock().deinit_calls
    }

    /// Number of `convert` calls.
    pub fn convert_calls(&self) -> usize {
        self.lock().convert_calls
    }

    /// Number of native handles allocated and not yet freed.
    pub fn live_handles(&self) -> usize {
        self.lock().entries.len()
    }

    /// Number of frees of unknown or adopted handles.
    pub fn invalid_frees(&self) -> usize {
        self.lock().invalid_frees
    }

    /// Every settings call, in order.
    pub fn settings(&self) -> Vec<SettingCall> {
        self.lock().settings.clone()
    }

    /// Settings calls of one scope, in order, as `(name, value)` pairs.
    pub fn settings_for(&self, scope: SettingScope) -> Vec<(String, String)> {
        self.lock()
            .settings
            .iter()
            .filter(|call| call.scope == scope && call.accepted)
            .map(|call| (call.name.clone(), call.value.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
struct Faults {
    init: bool,
    global_settings: bool,
    object_settings: bool,
    converter: bool,
    rejected: Vec<String>,
    conversion: Option<i32>,
    empty_output: bool,
    warnings: Vec<String>,
}

/// Builder for a [`NullEngine`] with injected failures.
#[derive(Debug, Default)]
pub struct NullEngineBuilder {
    faults: Faults,
    journal: Journal,
}

impl NullEngineBuilder {
    /// Make `init` fail.
    pub fn fail_init(mut self) -> Self {
        self.faults.init = true;
        self
    }

    /// Make global settings allocation return null.
    pub fn fail_global_settings(mut self) -> Self {
        self.faults.global_settings = true;
        self
    }

    /// Make object settings allocation return null.
    pub fn fail_object_settings(mut self) -> Self {
        self.faults.object_settings = true;
        self
    }

    /// Make converter creation return null.
    pub fn fail_converter(mut self) -> Self {
        self.faults.converter = true;
        self
    }

    /// Reject every setting named `name`.
    pub fn reject_setting(mut self, name: impl Into<String>) -> Self {
        self.faults.rejected.push(name.into());
        self
    }

    /// Make every conversion fail with the given HTTP error code.
    pub fn fail_conversion(mut self, http_error_code: i32) -> Self {
        self.faults.conversion = Some(http_error_code);
        self
    }

    /// Make successful conversions leave the output buffer empty.
    pub fn empty_output(mut self) -> Self {
        self.faults.empty_output = true;
        self
    }

    /// Raise a warning during every conversion.
    pub fn warn(mut self, message: impl Into<String>) -> Self {
        self.faults.warnings.push(message.into());
        self
    }

    /// Record into an existing journal.
    pub fn journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }

    /// Build the engine.
    pub fn build(self) -> NullEngine {
        NullEngine {
            faults: self.faults,
            journal: self.journal,
        }
    }
}

/// Engine that follows the native handle rules without rendering.
#[derive(Debug, Default)]
pub struct NullEngine {
    faults: Faults,
    journal: Journal,
}

impl NullEngine {
    /// Create an engine with no injected failures.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start building an engine with injected failures.
    pub fn builder() -> NullEngineBuilder {
        NullEngineBuilder::default()
    }

    /// Shared journal of this engine.
    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    fn set(&self, scope: SettingScope, settings: RawHandle, name: &str, value: &str) -> bool {
        let mut state = self.journal.lock();
        let accepted = !self.faults.rejected.iter().any(|r| r == name)
            && match (scope, state.entries.get_mut(&settings.addr())) {
                (SettingScope::Global, Some(Entry::GlobalSettings { values, adopted }))
                | (SettingScope::Object, Some(Entry::ObjectSettings { values, adopted })) => {
                    if *adopted {
                        log::trace!("null engine: setting `{}` on adopted block", name);
                    }
                    values.insert(name.to_string(), value.to_string());
                    true
                }
                _ => false,
            };

        state.settings.push(SettingCall {
            scope,
            name: name.to_string(),
            value: value.to_string(),
            accepted,
        });
        accepted
    }

    /// Work out the events, success flag and output of one conversion.
    fn render(&self, state: &mut JournalState, converter: usize) -> (Vec<NativeEvent>, bool) {
        let mut events = Vec::new();

        let (settings, objects) = match state.entries.get(&converter) {
            Some(Entry::Converter {
                settings, objects, ..
            }) => (*settings, objects.clone()),
            _ => return (events, false),
        };

        phase(&mut events, 0);
        for warning in &self.faults.warnings {
            events.push(NativeEvent::Warning(warning.clone()));
        }

        let mut http_error_code = 0;
        let mut pages = 0usize;
        let mut success = !objects.is_empty();
        if objects.is_empty() {
            events.push(NativeEvent::Error("No objects to convert".to_string()));
        }

        for (index, object) in objects.iter().enumerate() {
            let values = state.values(*object).cloned().unwrap_or_default();
            let page = values.get("page").map(String::as_str).unwrap_or("");
            let action = values
                .get("load.loadErrorHandling")
                .map(String::as_str)
                .unwrap_or("abort");

            if is_loadable(page) {
                pages += 1;
            } else {
                let message = format!(
                    "Failed loading page {} (sometimes it will work just to ignore this error with --load-error-handling ignore)",
                    page
                );
                match action {
                    "ignore" => {
                        events.push(NativeEvent::Warning(message));
                        pages += 1;
                    }
                    "skip" => events.push(NativeEvent::Warning(message)),
                    _ => {
                        events.push(NativeEvent::Error(message));
                        success = false;
                    }
                }
            }

            let percent = ((index + 1) * 100 / objects.len()) as i32;
            events.push(NativeEvent::ProgressChanged(percent));
            if !success {
                break;
            }
        }

        if success {
            if let Some(code) = self.faults.conversion {
                http_error_code = code;
                events.push(NativeEvent::Error(format!(
                    "Exit with code 1 due to http error: {}",
                    code
                )));
                success = false;
            }
        }

        let mut output = Vec::new();
        if success {
            for index in 1..PHASES.len() {
                phase(&mut events, index);
            }
            let global = state.values(settings).cloned().unwrap_or_default();
            let in_memory = global.get(OUTPUT_KEY).is_some_and(|out| out.is_empty());
            if in_memory && !self.faults.empty_output {
                let copies = global
                    .get("copies")
                    .and_then(|c| c.parse::<usize>().ok())
                    .unwrap_or(1)
                    .max(1);
                let title = global.get("documentTitle").map(String::as_str).unwrap_or("");
                output = minimal_pdf(pages * copies, title);
            }
        }
        events.push(NativeEvent::Finished(success));

        if let Some(Entry::Converter {
            output: slot,
            http_error_code: code,
            ..
        }) = state.entries.get_mut(&converter)
        {
            *slot = output;
            *code = http_error_code;
        }

        (events, success)
    }
}

impl NativeEngine for NullEngine {
    fn name(&self) -> &'static str {
        "null"
    }

    fn init(&self) -> bool {
        let mut state = self.journal.lock();
        state.init_calls += 1;
        if self.faults.init {
            return false;
        }
        state.initialized = true;
        true
    }

    fn deinit(&self) {
        let mut state = self.journal.lock();
        state.deinit_calls += 1;
        state.initialized = false;
    }

    fn version(&self) -> String {
        "0.12.6 (null)".to_string()
    }

    fn has_patched_qt(&self) -> bool {
        false
    }

    fn create_global_settings(&self) -> Option<RawHandle> {
        if self.faults.global_settings {
            return None;
        }
        self.journal.lock().allocate(Entry::GlobalSettings {
            values: HashMap::new(),
            adopted: false,
        })
    }

    fn destroy_global_settings(&self, settings: RawHandle) {
        let mut state = self.journal.lock();
        match state.entries.get(&settings.addr()) {
            Some(Entry::GlobalSettings { adopted: false, .. }) => {
                state.entries.remove(&settings.addr());
            }
            _ => state.invalid_free("global settings", settings),
        }
    }

    fn set_global_setting(&self, settings: RawHandle, name: &str, value: &str) -> bool {
        self.set(SettingScope::Global, settings, name, value)
    }

    fn create_object_settings(&self) -> Option<RawHandle> {
        if self.faults.object_settings {
            return None;
        }
        self.journal.lock().allocate(Entry::ObjectSettings {
            values: HashMap::new(),
            adopted: false,
        })
    }

    fn destroy_object_settings(&self, settings: RawHandle) {
        let mut state = self.journal.lock();
        match state.entries.get(&settings.addr()) {
            Some(Entry::ObjectSettings { adopted: false, .. }) => {
                state.entries.remove(&settings.addr());
            }
            _ => state.invalid_free("object settings", settings),
        }
    }

    fn set_object_setting(&self, settings: RawHandle, name: &str, value: &str) -> bool {
        self.set(SettingScope::Object, settings, name, value)
    }

    fn create_converter(&self, settings: RawHandle) -> Option<RawHandle> {
        if self.faults.converter {
            return None;
        }
        let mut state = self.journal.lock();
        match state.entries.get_mut(&settings.addr()) {
            Some(Entry::GlobalSettings { adopted, .. }) if !*adopted => *adopted = true,
            _ => return None,
        }
        state.allocate(Entry::Converter {
            settings: settings.addr(),
            objects: Vec::new(),
            output: Vec::new(),
            http_error_code: 0,
        })
    }

    fn destroy_converter(&self, converter: RawHandle) {
        let mut state = self.journal.lock();
        let owned = match state.entries.remove(&converter.addr()) {
            Some(Entry::Converter {
                settings, objects, ..
            }) => std::iter::once(settings).chain(objects).collect::<Vec<_>>(),
            Some(other) => {
                state.entries.insert(converter.addr(), other);
                state.invalid_free("converter", converter);
                return;
            }
            None => {
                state.invalid_free("converter", converter);
                return;
            }
        };

        for addr in owned {
            if state.entries.remove(&addr).is_none() {
                state.invalid_frees += 1;
            }
        }
    }

    fn add_object(&self, converter: RawHandle, settings: RawHandle) {
        let mut state = self.journal.lock();
        match state.entries.get_mut(&settings.addr()) {
            Some(Entry::ObjectSettings { adopted, .. }) if !*adopted => *adopted = true,
            _ => {
                log::error!("null engine: cannot add object settings {}", settings);
                return;
            }
        }
        if let Some(Entry::Converter { objects, .. }) = state.entries.get_mut(&converter.addr()) {
            objects.push(settings.addr());
        }
    }

    fn phase_count(&self, _converter: RawHandle) -> usize {
        PHASES.len()
    }

    fn phase_description(&self, _converter: RawHandle, phase: usize) -> String {
        PHASES.get(phase).map(|p| p.to_string()).unwrap_or_default()
    }

    fn convert(&self, converter: RawHandle, route: &CallbackRoute) -> bool {
        let (events, success) = {
            let mut state = self.journal.lock();
            state.convert_calls += 1;
            self.render(&mut state, converter.addr())
        };

        for event in events {
            route.deliver(event);
        }
        success
    }

    fn http_error_code(&self, converter: RawHandle) -> i32 {
        match self.journal.lock().entries.get(&converter.addr()) {
            Some(Entry::Converter {
                http_error_code, ..
            }) => *http_error_code,
            _ => 0,
        }
    }

    fn output(&self, converter: RawHandle) -> Vec<u8> {
        match self.journal.lock().entries.get(&converter.addr()) {
            Some(Entry::Converter { output, .. }) => output.clone(),
            _ => Vec::new(),
        }
    }
}

/// Whether a page location can be loaded without a network.
fn is_loadable(page: &str) -> bool {
    if page.is_empty() {
        return false;
    }
    if let Some(path) = page.strip_prefix("file://") {
        return Path::new(path).is_file();
    }
    if page.contains("://") {
        return true;
    }
    Path::new(page).is_file()
}

fn phase(events: &mut Vec<NativeEvent>, index: usize) {
    events.push(NativeEvent::PhaseChanged {
        index,
        description: PHASES[index].to_string(),
    });
}

fn minimal_pdf(pages: usize, title: &str) -> Vec<u8> {
    let mut pdf = String::from("%PDF-1.4\n");
    pdf.push_str("1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");
    pdf.push_str(&format!(
        "2 0 obj\n<< /Type /Pages /Count {} >>\nendobj\n",
        pages
    ));
    if !title.is_empty() {
        pdf.push_str(&format!("3 0 obj\n<< /Title ({}) >>\nendobj\n", title));
    }
    pdf.push_str("%%EOF\n");
    pdf.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::EventRouter;
    use crate::registry::HandleId;
    use std::io::Write;

    #[derive(Default)]
    struct Events(Mutex<Vec<NativeEvent>>);

    impl EventRouter for Events {
        fn route(&self, _id: HandleId, event: NativeEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    fn route() -> (Arc<Events>, CallbackRoute) {
        let events = Arc::new(Events::default());
        let route = CallbackRoute::new(HandleId::NULL, events.clone());
        (events, route)
    }

    #[test]
    fn test_converter_frees_adopted_settings() {
        let engine = NullEngine::new();
        let journal = engine.journal();

        let global = engine.create_global_settings().unwrap();
        let object = engine.create_object_settings().unwrap();
        let converter = engine.create_converter(global).unwrap();
        engine.add_object(converter, object);
        assert_eq!(journal.live_handles(), 3);

        engine.destroy_converter(converter);
        assert_eq!(journal.live_handles(), 0);
        assert_eq!(journal.invalid_frees(), 0);

        engine.destroy_global_settings(global);
        assert_eq!(journal.invalid_frees(), 1);
    }

    #[test]
    fn test_rejected_setting() {
        let engine = NullEngine::builder().reject_setting("dpi").build();
        let global = engine.create_global_settings().unwrap();
        assert!(engine.set_global_setting(global, "copies", "2"));
        assert!(!engine.set_global_setting(global, "dpi", "96"));
        assert!(!engine.set_object_setting(global, "page", "a.html"));
    }

    #[test]
    fn test_convert_requires_in_memory_output() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "<html><body>hello</body></html>").unwrap();
        let page = file.path().to_str().unwrap();

        for out in [Some(""), Some("out.pdf"), None] {
            let engine = NullEngine::new();
            let global = engine.create_global_settings().unwrap();
            if let Some(out) = out {
                engine.set_global_setting(global, OUTPUT_KEY, out);
            }
            let object = engine.create_object_settings().unwrap();
            engine.set_object_setting(object, "page", page);
            let converter = engine.create_converter(global).unwrap();
            engine.add_object(converter, object);

            let (events, route) = route();
            assert!(engine.convert(converter, &route));
            assert_eq!(engine.output(converter).is_empty(), out != Some(""));
            assert_eq!(
                events.0.lock().unwrap().last(),
                Some(&NativeEvent::Finished(true))
            );
            engine.destroy_converter(converter);
        }
    }

    #[test]
    fn test_missing_page_error_handling() {
        for (action, expect) in [("abort", false), ("ignore", true), ("skip", true)] {
            let engine = NullEngine::new();
            let global = engine.create_global_settings().unwrap();
            let object = engine.create_object_settings().unwrap();
            engine.set_object_setting(object, "page", "/definitely/missing.html");
            engine.set_object_setting(object, "load.loadErrorHandling", action);
            let converter = engine.create_converter(global).unwrap();
            engine.add_object(converter, object);

            let (events, route) = route();
            assert_eq!(engine.convert(converter, &route), expect);

            let events = events.0.lock().unwrap();
            let raised_error = events.iter().any(|e| matches!(e, NativeEvent::Error(_)));
            assert_eq!(raised_error, !expect, "action {}", action);
        }
    }

    #[test]
    fn test_injected_conversion_failure() {
        let engine = NullEngine::builder().fail_conversion(404).build();
        let global = engine.create_global_settings().unwrap();
        let object = engine.create_object_settings().unwrap();
        engine.set_object_setting(object, "page", "https://example.com");
        let converter = engine.create_converter(global).unwrap();
        engine.add_object(converter, object);

        let (_events, route) = route();
        assert!(!engine.convert(converter, &route));
        assert_eq!(engine.http_error_code(converter), 404);
    }
}
