//! Single-slot, in-process snapshot store.

use std::sync::{Arc, PoisonError, RwLock};

use super::snapshot::CacheSnapshot;

/// Holds at most one catalog snapshot.
///
/// Readers get an `Arc` to the snapshot current at the time of the call; a
/// writer replaces the `Arc` wholesale. The lock is held only for the pointer
/// swap and never across an `.await`.
#[derive(Debug, Default)]
pub struct CacheStore {
    current: RwLock<Option<Arc<CacheSnapshot>>>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot, or `None` before the first successful fetch.
    pub fn read(&self) -> Option<Arc<CacheSnapshot>> {
        self.current.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Replace the stored snapshot.
    pub fn write(&self, snapshot: Arc<CacheSnapshot>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(snapshot);
    }
}
