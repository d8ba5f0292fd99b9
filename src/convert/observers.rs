//! Conversion observers.

use std::fmt;
use std::sync::Arc;

use crate::native::{EventRouter, NativeEvent};
use crate::registry::{HandleId, HandleRegistry};

type MessageFn = Arc<dyn Fn(&str) + Send + Sync>;
type PhaseFn = Arc<dyn Fn(usize, &str) + Send + Sync>;
type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;
type FinishedFn = Arc<dyn Fn(bool) + Send + Sync>;

/// Optional callbacks invoked while a conversion runs.
///
/// Observers run on the dispatcher thread, in the middle of a native call.
/// They must not submit work to the dispatcher; such submissions fail with
/// [`Error::Reentrant`](crate::Error::Reentrant).
#[derive(Clone, Default)]
pub struct Observers {
    warning: Option<MessageFn>,
    error: Option<MessageFn>,
    phase_changed: Option<PhaseFn>,
    progress_changed: Option<ProgressFn>,
    finished: Option<FinishedFn>,
}

impl Observers {
    /// Create an empty set of observers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with each warning message.
    pub fn on_warning(&mut self, f: impl Fn(&str) + Send + Sync + 'static) -> &mut Self {
        self.warning = Some(Arc::new(f));
        self
    }

    /// Called with each error message.
    pub fn on_error(&mut self, f: impl Fn(&str) + Send + Sync + 'static) -> &mut Self {
        self.error = Some(Arc::new(f));
        self
    }

    /// Called with the index and description of each new phase.
    pub fn on_phase_changed(
        &mut self,
        f: impl Fn(usize, &str) + Send + Sync + 'static,
    ) -> &mut Self {
        self.phase_changed = Some(Arc::new(f));
        self
    }

    /// Called with the progress of the current phase, in percent.
    pub fn on_progress_changed(&mut self, f: impl Fn(u8) + Send + Sync + 'static) -> &mut Self {
        self.progress_changed = Some(Arc::new(f));
        self
    }

    /// Called once the conversion finished, with its outcome.
    pub fn on_finished(&mut self, f: impl Fn(bool) + Send + Sync + 'static) -> &mut Self {
        self.finished = Some(Arc::new(f));
        self
    }

    /// Invoke the observer matching `event`, if set.
    pub fn notify(&self, event: NativeEvent) {
        match event {
            NativeEvent::Warning(message) => {
                log::warn!("conversion warning: {}", message);
                if let Some(f) = &self.warning {
                    f(&message);
                }
            }
            NativeEvent::Error(message) => {
                log::error!("conversion error: {}", message);
                if let Some(f) = &self.error {
                    f(&message);
                }
            }
            NativeEvent::PhaseChanged { index, description } => {
                log::debug!("phase {}: {}", index, description);
                if let Some(f) = &self.phase_changed {
                    f(index, &description);
                }
            }
            NativeEvent::ProgressChanged(percent) => {
                if let Some(f) = &self.progress_changed {
                    f(percent.clamp(0, 100) as u8);
                }
            }
            NativeEvent::Finished(success) => {
                log::debug!("conversion finished (success: {})", success);
                if let Some(f) = &self.finished {
                    f(success);
                }
            }
        }
    }
}

impl fmt::Debug for Observers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("warning", &self.warning.is_some())
            .field("error", &self.error.is_some())
            .field("phase_changed", &self.phase_changed.is_some())
            .field("progress_changed", &self.progress_changed.is_some())
            .field("finished", &self.finished.is_some())
            .finish()
    }
}

impl EventRouter for HandleRegistry<Observers> {
    fn route(&self, id: HandleId, event: NativeEvent) {
        match self.lookup(id) {
            Some(observers) => observers.notify(event),
            None => log::trace!("no observers for {}, dropped {:?}", id, event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_progress_is_clamped() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut observers = Observers::new();
        let sink = Arc::clone(&seen);
        observers.on_progress_changed(move |p| sink.lock().unwrap().push(p));

        for percent in [-5, 0, 42, 100, 250] {
            observers.notify(NativeEvent::ProgressChanged(percent));
        }
        assert_eq!(*seen.lock().unwrap(), vec![0, 0, 42, 100, 100]);
    }

    #[test]
    fn test_registry_routes_by_id() {
        let registry: HandleRegistry<Observers> = HandleRegistry::new();
        let messages = Arc::new(Mutex::new(Vec::new()));

        let mut observers = Observers::new();
        let sink = Arc::clone(&messages);
        observers.on_warning(move |m| sink.lock().unwrap().push(m.to_string()));

        let id = registry.issue();
        registry.register(id, Arc::new(observers));
        registry.route(id, NativeEvent::Warning("slow script".to_string()));

        registry.unregister(id);
        registry.route(id, NativeEvent::Warning("after teardown".to_string()));
        registry.route(registry.issue(), NativeEvent::Finished(true));

        assert_eq!(*messages.lock().unwrap(), vec!["slow script".to_string()]);
    }

    #[test]
    fn test_unset_slots_are_skipped() {
        let observers = Observers::new();
        observers.notify(NativeEvent::Error("boom".to_string()));
        observers.notify(NativeEvent::PhaseChanged {
            index: 1,
            description: "Counting pages".to_string(),
        });
        assert_eq!(
            format!("{:?}", observers),
            "Observers { warning: false, error: false, phase_changed: false, progress_changed: false, finished: false }"
        );
    }
}
