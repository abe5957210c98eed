//! In-memory artifact store with revocable handles.
//!
//! Stands where the host platform's revocable-URL allocator would: decoded
//! inputs and encoded outputs live here behind [`ArtifactHandle`]s that the
//! batch coordinator releases exactly once when an artifact is superseded,
//! removed, or torn down. `release` is idempotent so a stale handle can
//! never double-free.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Opaque handle to a stored artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArtifactHandle(u64);

/// A stored artifact: shared bytes plus declared media type.
#[derive(Debug, Clone)]
pub struct StoredArtifact {
    pub bytes: Arc<Vec<u8>>,
    pub media_type: String,
}

impl StoredArtifact {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Shared, cheaply-clonable artifact store.
#[derive(Debug, Clone, Default)]
pub struct ArtifactStore {
    inner: Arc<StoreInner>,
}

#[derive(Debug, Default)]
struct StoreInner {
    entries: Mutex<HashMap<u64, StoredArtifact>>,
    next_id: AtomicU64,
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store bytes and return a fresh handle.
    pub fn insert(&self, bytes: Vec<u8>, media_type: impl Into<String>) -> ArtifactHandle {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let artifact = StoredArtifact {
            bytes: Arc::new(bytes),
            media_type: media_type.into(),
        };
        if let Ok(mut entries) = self.inner.entries.lock() {
            entries.insert(id, artifact);
        }
        ArtifactHandle(id)
    }

    /// Read a stored artifact. Returns `None` for released handles.
    pub fn get(&self, handle: ArtifactHandle) -> Option<StoredArtifact> {
        self.inner
            .entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(&handle.0).cloned())
    }

    /// Release a handle. Idempotent: releasing an already-released or
    /// unknown handle is a no-op returning `false`.
    pub fn release(&self, handle: ArtifactHandle) -> bool {
        self.inner
            .entries
            .lock()
            .map(|mut entries| entries.remove(&handle.0).is_some())
            .unwrap_or(false)
    }

    /// Number of live (unreleased) artifacts. Tests use this to assert the
    /// ledger is balanced.
    pub fn live_count(&self) -> usize {
        self.inner
            .entries
            .lock()
            .map(|entries| entries.len())
            .unwrap_or(0)
    }

    /// Total bytes held by live artifacts.
    pub fn live_bytes(&self) -> usize {
        self.inner
            .entries
            .lock()
            .map(|entries| entries.values().map(|a| a.bytes.len()).sum())
            .unwrap_or(0)
    }
}
