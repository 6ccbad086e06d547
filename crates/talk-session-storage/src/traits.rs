//! Storage trait definitions.

use crate::{PersistedSession, StorageResult};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Trait for session record backends
pub trait SessionStore: Send + Sync {
    /// Load the stored session. Missing or unreadable content yields an
    /// empty record.
    fn load(&self) -> StorageResult<PersistedSession>;

    /// Replace the stored session.
    fn save(&self, session: &PersistedSession) -> StorageResult<()>;

    /// Take the single-writer lock. Released when the guard drops.
    fn lock(&self) -> StorageResult<SessionLock>;

    /// Resolve the device uuid on `session`, generating one if absent.
    ///
    /// Only the in-memory record is touched.
    fn load_or_create_device_uuid(&self, session: &mut PersistedSession) -> String {
        let (uuid, created) = session.ensure_device_uuid();
        if created {
            tracing::info!("generated new device uuid");
        } else {
            tracing::debug!("loaded existing device uuid");
        }
        uuid
    }
}

/// Guard for the session lock.
#[derive(Debug)]
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct SessionLock {
    release: Release,
}

#[derive(Debug)]
enum Release {
    File(PathBuf),
    Flag(Arc<AtomicBool>),
    Nothing,
}

impl SessionLock {
    /// Guard backed by a lock file that is removed on drop.
    pub(crate) fn file(path: PathBuf) -> Self {
        Self {
            release: Release::File(path),
        }
    }

    /// Guard that clears `flag` on drop.
    pub(crate) fn flag(flag: Arc<AtomicBool>) -> Self {
        Self {
            release: Release::Flag(flag),
        }
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        match std::mem::replace(&mut self.release, Release::Nothing) {
            Release::File(path) => {
                if let Err(e) = std::fs::remove_file(&path) {
                    tracing::warn!(path = %path.display(), error = %e, "failed to release session lock");
                }
            }
            Release::Flag(flag) => flag.store(false, Ordering::SeqCst),
            Release::Nothing => {}
        }
    }
}
