//! In-memory session store.

use crate::{PersistedSession, SessionLock, SessionStore, StorageError, StorageResult};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Session store held in process memory.
///
/// Clones share the same record and lock.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    session: Mutex<PersistedSession>,
    saves: AtomicUsize,
    locked: Arc<AtomicBool>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing record.
    pub fn with_session(session: PersistedSession) -> Self {
        let store = Self::default();
        *store.inner.session.lock() = session;
        store
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.inner.saves.load(Ordering::SeqCst)
    }

    pub fn is_locked(&self) -> bool {
        self.inner.locked.load(Ordering::SeqCst)
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> StorageResult<PersistedSession> {
        Ok(self.inner.session.lock().clone())
    }

    fn save(&self, session: &PersistedSession) -> StorageResult<()> {
        *self.inner.session.lock() = session.clone();
        self.inner.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn lock(&self) -> StorageResult<SessionLock> {
        if self
            .inner
            .locked
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(StorageError::Locked("in-memory session store".to_string()));
        }
        Ok(SessionLock::flag(self.inner.locked.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SessionTokens;

    #[test]
    fn test_roundtrip_and_save_count() {
        let store = MemorySessionStore::new();
        assert_eq!(store.load().unwrap(), PersistedSession::default());

        let session = PersistedSession::new(Some("dev".into()), SessionTokens::new("a", "r"));
        store.save(&session).unwrap();
        assert_eq!(store.load().unwrap(), session);
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn test_clones_share_state() {
        let store = MemorySessionStore::new();
        let other = store.clone();
        let session = PersistedSession::new(Some("dev".into()), None);
        other.save(&session).unwrap();
        assert_eq!(store.load().unwrap(), session);
    }

    #[test]
    fn test_lock_is_exclusive() {
        let store = MemorySessionStore::new();
        let guard = store.lock().unwrap();
        assert!(store.is_locked());
        assert!(matches!(store.lock(), Err(StorageError::Locked(_))));
        drop(guard);
        assert!(!store.is_locked());
        assert!(store.lock().is_ok());
    }
}
