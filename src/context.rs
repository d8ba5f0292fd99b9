//! Library context.
//!
//! A [`Context`] is the initialized engine plus the handle registry. It is
//! created on the thread that will run every native call and cannot leave
//! it: the engine is held through an `Rc`, so `Context` is neither `Send`
//! nor `Sync`.

use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::convert::Observers;
use crate::error::{Error, Result};
use crate::native::NativeEngine;
use crate::registry::HandleRegistry;

/// Set while a process-global engine is initialized.
static GLOBAL_ENGINE: AtomicBool = AtomicBool::new(false);

/// Initialized engine and handle registry.
pub struct Context {
    engine: Option<Rc<dyn NativeEngine>>,
    registry: Arc<HandleRegistry<Observers>>,
    process_global: bool,
}

impl Context {
    /// Initialize `engine` on the current thread.
    ///
    /// Fails with [`Error::AlreadyInitialized`] if the engine keeps
    /// process-global state and another instance is live.
    pub fn initialize<E: NativeEngine + 'static>(engine: E) -> Result<Self> {
        let process_global = engine.is_process_global();
        if process_global
            && GLOBAL_ENGINE
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
        {
            return Err(Error::AlreadyInitialized);
        }

        if !engine.init() {
            if process_global {
                GLOBAL_ENGINE.store(false, Ordering::Release);
            }
            return Err(Error::Init(format!("{} engine failed to start", engine.name())));
        }

        log::info!("initialized {} engine {}", engine.name(), engine.version());
        Ok(Self {
            engine: Some(Rc::new(engine)),
            registry: Arc::new(HandleRegistry::new()),
            process_global,
        })
    }

    /// Check if the engine is initialized.
    pub fn is_initialized(&self) -> bool {
        self.engine.is_some()
    }

    /// Engine version.
    pub fn version(&self) -> Result<String> {
        Ok(self.engine()?.version())
    }

    /// Whether the engine is built against its patched Qt.
    pub fn has_patched_qt(&self) -> Result<bool> {
        Ok(self.engine()?.has_patched_qt())
    }

    /// Registry routing native callbacks to converter observers.
    pub fn registry(&self) -> Result<&Arc<HandleRegistry<Observers>>> {
        self.engine()?;
        Ok(&self.registry)
    }

    pub(crate) fn engine(&self) -> Result<&Rc<dyn NativeEngine>> {
        self.engine.as_ref().ok_or(Error::NotInitialized)
    }

    /// Clear the registry and release the engine. Later calls are no-ops.
    pub fn shutdown(&mut self) {
        let Some(engine) = self.engine.take() else {
            return;
        };

        self.registry.clear();
        if Rc::strong_count(&engine) > 1 {
            log::warn!("shutting down with native resources still alive");
        }
        engine.deinit();
        if self.process_global {
            GLOBAL_ENGINE.store(false, Ordering::Release);
        }
        log::info!("shut down {} engine", engine.name());
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("engine", &self.engine.as_ref().map(|e| e.name()))
            .field("registry", &self.registry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::NullEngine;

    #[test]
    fn test_initialize_and_shutdown() {
        let engine = NullEngine::new();
        let journal = engine.journal();

        let mut ctx = Context::initialize(engine).unwrap();
        assert!(ctx.is_initialized());
        assert!(journal.is_initialized());
        assert_eq!(ctx.version().unwrap(), "0.12.6 (null)");
        assert!(!ctx.has_patched_qt().unwrap());

        ctx.shutdown();
        ctx.shutdown();
        assert!(!ctx.is_initialized());
        assert_eq!(journal.deinit_calls(), 1);
        assert!(matches!(ctx.version(), Err(Error::NotInitialized)));
        assert!(matches!(ctx.registry(), Err(Error::NotInitialized)));
    }

    #[test]
    fn test_init_failure() {
        let err = Context::initialize(NullEngine::builder().fail_init().build()).unwrap_err();
        assert!(matches!(err, Error::Init(_)));
    }

    #[test]
    fn test_drop_deinitializes() {
        let engine = NullEngine::new();
        let journal = engine.journal();
        drop(Context::initialize(engine).unwrap());
        assert_eq!(journal.deinit_calls(), 1);
        assert!(!journal.is_initialized());
    }
}
