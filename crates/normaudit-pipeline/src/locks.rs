//! Per-source serialization of pipeline stages

use normaudit_domain::SourceId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockTable = Arc<Mutex<HashMap<SourceId, Arc<AsyncMutex<()>>>>>;

/// One async mutex per source document
///
/// Extraction and conversion of the same source take the same lock, so a
/// second caller waits until the first one finishes. Different sources never
/// block each other. An entry lives only while someone holds or waits for it.
#[derive(Debug, Clone, Default)]
pub struct SourceLocks {
    locks: LockTable,
}

/// Held lock of one source
#[derive(Debug)]
pub struct SourceGuard {
    guard: Option<OwnedMutexGuard<()>>,
    source: SourceId,
    locks: LockTable,
}

impl Drop for SourceGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Waiters hold their own clone of the mutex
        forget_if_idle(&self.locks, self.source);
    }
}

impl SourceLocks {
    /// Create an empty lock table
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the lock of `source`
    pub async fn acquire(&self, source: SourceId) -> SourceGuard {
        let guard = self.entry(source).lock_owned().await;
        self.wrap(source, guard)
    }

    /// Take the lock of `source` if nobody holds it
    pub fn try_acquire(&self, source: SourceId) -> Option<SourceGuard> {
        let guard = self.entry(source).try_lock_owned().ok()?;
        Some(self.wrap(source, guard))
    }

    /// Number of sources currently locked or awaited
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether no source is locked or awaited
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn wrap(&self, source: SourceId, guard: OwnedMutexGuard<()>) -> SourceGuard {
        SourceGuard {
            guard: Some(guard),
            source,
            locks: Arc::clone(&self.locks),
        }
    }

    fn entry(&self, source: SourceId) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(source).or_default())
    }
}

/// Drop the entry of `source` when the table holds the only reference
fn forget_if_idle(locks: &LockTable, source: SourceId) {
    let mut locks = locks.lock().unwrap_or_else(|e| e.into_inner());
    if locks.get(&source).is_some_and(|lock| Arc::strong_count(lock) == 1) {
        locks.remove(&source);
    }
}
