//! Durable storage for the single talkbridge session record.
//!
//! - [`FileSessionStore`]: pretty-printed JSON file, replaced atomically on
//!   every save, with a lock file for single-writer access
//! - [`MemorySessionStore`]: in-process store with the same contract

mod file;
mod memory;
mod session;
mod traits;

pub use file::{FileSessionStore, DEFAULT_STALE_LOCK_AGE};
pub use memory::MemorySessionStore;
pub use session::{generate_device_uuid, PersistedSession, SessionTokens, DEVICE_UUID_BYTES};
pub use traits::{SessionLock, SessionStore};

use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Another writer holds the session lock
    #[error("Session store is locked by another process: {0}")]
    Locked(String),

    /// Serialization error
    #[error("Encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
