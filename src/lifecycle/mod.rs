//! Ownership of native resources.
//!
//! Every native handle is owned by exactly one guard. Guards track a
//! [`ResourceState`] so teardown is idempotent and use after teardown fails
//! with [`Error::Destroyed`] instead of reaching the engine. Settings that a
//! native converter adopted are freed together with that converter; their
//! guards release nothing themselves.

mod temp;

pub use temp::TempInput;

use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::Arc;

use crate::convert::Observers;
use crate::error::{Error, Result};
use crate::native::{CallbackRoute, NativeEngine, RawHandle};
use crate::options::{option_name, SettingsSink};
use crate::registry::{HandleId, HandleRegistry};

/// State of a guarded native resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    /// No native handle was allocated.
    Uninitialized,
    /// The guard owns a live handle.
    Active,
    /// A native converter took ownership of the handle.
    Adopted,
    /// The handle was released.
    Destroyed,
}

impl ResourceState {
    /// Lowercase state name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceState::Uninitialized => "uninitialized",
            ResourceState::Active => "active",
            ResourceState::Adopted => "adopted",
            ResourceState::Destroyed => "destroyed",
        }
    }
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Selects the native calls for one kind of settings block.
pub trait SettingsKind {
    /// Resource name used in errors and logs.
    const NAME: &'static str;

    fn create(engine: &dyn NativeEngine) -> Option<RawHandle>;
    fn destroy(engine: &dyn NativeEngine, handle: RawHandle);
    fn set(engine: &dyn NativeEngine, handle: RawHandle, name: &str, value: &str) -> bool;
}

/// Converter-level settings.
#[derive(Debug)]
pub enum Global {}

/// Per-document settings.
#[derive(Debug)]
pub enum PerObject {}

impl SettingsKind for Global {
    const NAME: &'static str = "converter settings";

    fn create(engine: &dyn NativeEngine) -> Option<RawHandle> {
        engine.create_global_settings()
    }

    fn destroy(engine: &dyn NativeEngine, handle: RawHandle) {
        engine.destroy_global_settings(handle)
    }

    fn set(engine: &dyn NativeEngine, handle: RawHandle, name: &str, value: &str) -> bool {
        engine.set_global_setting(handle, name, value)
    }
}

impl SettingsKind for PerObject {
    const NAME: &'static str = "object settings";

    fn create(engine: &dyn NativeEngine) -> Option<RawHandle> {
        engine.create_object_settings()
    }

    fn destroy(engine: &dyn NativeEngine, handle: RawHandle) {
        engine.destroy_object_settings(handle)
    }

    fn set(engine: &dyn NativeEngine, handle: RawHandle, name: &str, value: &str) -> bool {
        engine.set_object_setting(handle, name, value)
    }
}

/// Guard over a native settings block.
pub struct Settings<K: SettingsKind> {
    engine: Rc<dyn NativeEngine>,
    handle: Option<RawHandle>,
    state: ResourceState,
    _kind: PhantomData<K>,
}

/// Guard over converter-level settings.
pub type GlobalSettings = Settings<Global>;

/// Guard over per-document settings.
pub type ObjectSettings = Settings<PerObject>;

impl<K: SettingsKind> Settings<K> {
    /// Allocate a settings block.
    pub fn create(engine: &Rc<dyn NativeEngine>) -> Result<Self> {
        let handle = K::create(engine.as_ref()).ok_or(Error::ResourceCreation(K::NAME))?;
        log::trace!("created {} {}", K::NAME, handle);
        Ok(Self {
            engine: Rc::clone(engine),
            handle: Some(handle),
            state: ResourceState::Active,
            _kind: PhantomData,
        })
    }

    /// Current state.
    pub fn state(&self) -> ResourceState {
        self.state
    }

    /// Hand the block over to a native converter.
    pub(crate) fn adopt(&mut self) -> Result<RawHandle> {
        match (self.state, self.handle) {
            (ResourceState::Active, Some(handle)) => {
                self.state = ResourceState::Adopted;
                Ok(handle)
            }
            _ => Err(Error::Destroyed(K::NAME)),
        }
    }

    /// Release the block. Adopted blocks are left to their converter.
    pub fn destroy(&mut self) {
        let handle = self.handle.take();
        match (self.state, handle) {
            (ResourceState::Active, Some(handle)) => {
                K::destroy(self.engine.as_ref(), handle);
                log::trace!("destroyed {} {}", K::NAME, handle);
            }
            (ResourceState::Adopted, Some(handle)) => {
                log::trace!("released adopted {} {}", K::NAME, handle);
            }
            _ => {}
        }
        self.state = ResourceState::Destroyed;
    }
}

impl<K: SettingsKind> SettingsSink for Settings<K> {
    fn set(&mut self, name: &str, value: &str) -> Result<()> {
        let handle = match (self.state, self.handle) {
            (ResourceState::Active, Some(handle)) => handle,
            _ => return Err(Error::Destroyed(K::NAME)),
        };
        let name = option_name(name)?;

        if !K::set(self.engine.as_ref(), handle, name, value) {
            return Err(Error::InvalidOption {
                name: name.to_string(),
                value: value.to_string(),
            });
        }
        Ok(())
    }
}

impl<K: SettingsKind> Drop for Settings<K> {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl<K: SettingsKind> fmt::Debug for Settings<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("kind", &K::NAME)
            .field("handle", &self.handle)
            .field("state", &self.state)
            .finish()
    }
}

/// Guard over a native converter.
///
/// While active, the converter's observers are registered under
/// [`id`](NativeConverter::id) so callbacks raised during
/// [`convert`](NativeConverter::convert) reach them.
pub struct NativeConverter {
    engine: Rc<dyn NativeEngine>,
    registry: Arc<HandleRegistry<Observers>>,
    handle: Option<RawHandle>,
    id: HandleId,
    state: ResourceState,
    phases: Vec<String>,
}

impl NativeConverter {
    /// Create a converter adopting `settings` and register `observers`.
    ///
    /// On failure `settings` stays active and is released by its own guard.
    pub fn create(
        engine: &Rc<dyn NativeEngine>,
        registry: &Arc<HandleRegistry<Observers>>,
        settings: &mut GlobalSettings,
        observers: Arc<Observers>,
    ) -> Result<Self> {
        let settings_handle = match (settings.state, settings.handle) {
            (ResourceState::Active, Some(handle)) => handle,
            _ => return Err(Error::Destroyed(Global::NAME)),
        };

        let handle = engine
            .create_converter(settings_handle)
            .ok_or(Error::ResourceCreation("converter"))?;
        settings.adopt()?;

        let id = registry.issue();
        registry.register(id, observers);

        let phases = (0..engine.phase_count(handle))
            .map(|phase| engine.phase_description(handle, phase))
            .collect();

        log::debug!("created converter {} as {}", handle, id);
        Ok(Self {
            engine: Rc::clone(engine),
            registry: Arc::clone(registry),
            handle: Some(handle),
            id,
            state: ResourceState::Active,
            phases,
        })
    }

    /// Registry id of this converter.
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Current state.
    pub fn state(&self) -> ResourceState {
        self.state
    }

    /// Descriptions of the conversion phases.
    pub fn phases(&self) -> &[String] {
        &self.phases
    }

    /// Description of one phase, empty if out of range.
    pub fn phase_description(&self, phase: usize) -> &str {
        self.phases.get(phase).map(String::as_str).unwrap_or("")
    }

    fn handle(&self) -> Result<RawHandle> {
        match (self.state, self.handle) {
            (ResourceState::Active, Some(handle)) => Ok(handle),
            _ => Err(Error::Destroyed("converter")),
        }
    }

    /// Append a document, adopting its settings.
    pub fn add_object(&mut self, settings: &mut ObjectSettings) -> Result<()> {
        let handle = self.handle()?;
        let object = settings.adopt()?;
        self.engine.add_object(handle, object);
        Ok(())
    }

    /// Run the native conversion.
    pub fn convert(&mut self) -> Result<()> {
        let handle = self.handle()?;
        let route = CallbackRoute::new(self.id, self.registry.clone());

        if !self.engine.convert(handle, &route) {
            let http_error_code = self.engine.http_error_code(handle);
            return Err(Error::Conversion { http_error_code });
        }
        Ok(())
    }

    /// HTTP error code reported by the engine.
    pub fn http_error_code(&self) -> Result<i32> {
        let handle = self.handle()?;
        Ok(self.engine.http_error_code(handle))
    }

    /// Copy of the output buffer. Fails if it is empty.
    pub fn output(&self) -> Result<Vec<u8>> {
        let handle = self.handle()?;
        let output = self.engine.output(handle);
        if output.is_empty() {
            return Err(Error::EmptyOutput);
        }
        Ok(output)
    }

    /// Unregister and free the converter together with adopted settings.
    pub fn destroy(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.registry.unregister(self.id);
            self.engine.destroy_converter(handle);
            log::debug!("destroyed converter {} ({})", handle, self.id);
        }
        self.state = ResourceState::Destroyed;
    }
}

impl Drop for NativeConverter {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl fmt::Debug for NativeConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeConverter")
            .field("handle", &self.handle)
            .field("id", &self.id)
            .field("state", &self.state)
            .finish()
    }
}
