//! Handle registry.
//!
//! Native callbacks identify their source by an opaque handle. The registry
//! maps issued [`HandleId`]s back to the owner that should receive the
//! callback, so the native side never carries a pointer into Rust memory.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Identifier issued by a [`HandleRegistry`].
///
/// Ids are never reused within a registry. `HandleId::NULL` is never issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl HandleId {
    /// The null id.
    pub const NULL: HandleId = HandleId(0);

    /// Raw id value.
    pub fn get(self) -> u64 {
        self.0
    }

    /// Check if this is the null id.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Thread-safe map from handle ids to shared owners.
///
/// Lookups take a read lock and writes take a write lock. A poisoned lock
/// is recovered rather than propagated: the map holds no invariant that a
/// panicking writer could break halfway.
pub struct HandleRegistry<T: ?Sized> {
    next: AtomicU64,
    entries: RwLock<HashMap<HandleId, Arc<T>>>,
}

impl<T: ?Sized> HandleRegistry<T> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Issue a fresh, non-null id.
    pub fn issue(&self) -> HandleId {
        HandleId(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Associate `id` with `owner`. A null id is ignored.
    pub fn register(&self, id: HandleId, owner: Arc<T>) {
        if id.is_null() {
            return;
        }
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.insert(id, owner).is_some() {
            log::debug!("handle {} re-registered", id);
        }
    }

    /// Look up the owner of `id`.
    pub fn lookup(&self, id: HandleId) -> Option<Arc<T>> {
        if id.is_null() {
            return None;
        }
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(&id).cloned()
    }

    /// Remove `id`, returning its owner if it was registered.
    pub fn unregister(&self, id: HandleId) -> Option<Arc<T>> {
        if id.is_null() {
            return None;
        }
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(&id)
    }

    /// Number of registered owners.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check if no owner is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every entry.
    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if !entries.is_empty() {
            log::warn!("clearing {} live handle(s)", entries.len());
        }
        entries.clear();
    }
}

impl<T: ?Sized> Default for HandleRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for HandleRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleRegistry")
            .field("len", &self.len())
            .finish()
    }
}
