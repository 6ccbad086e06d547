//! File-backed session store.

use crate::{PersistedSession, SessionLock, SessionStore, StorageError, StorageResult};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// Lock files older than this are considered abandoned.
pub const DEFAULT_STALE_LOCK_AGE: Duration = Duration::from_secs(10 * 60);

/// Session record stored as pretty-printed JSON.
///
/// Every save writes a temp file in the same directory, syncs it and renames
/// it over the target, so readers see either the old or the new record.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
    lock_path: PathBuf,
    stale_after: Duration,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut lock_name = path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "session.json".into());
        lock_name.push(".lock");
        let lock_path = path.with_file_name(lock_name);
        Self {
            path,
            lock_path,
            stale_after: DEFAULT_STALE_LOCK_AGE,
        }
    }

    /// Override the stale lock threshold.
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    fn try_create_lock(&self) -> io::Result<()> {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.lock_path)?;
        writeln!(file, "{}", std::process::id())?;
        file.sync_all()
    }

    fn lock_is_stale(&self) -> bool {
        fs::metadata(&self.lock_path)
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .map(|age| age >= self.stale_after)
            .unwrap_or(false)
    }

    fn lock_holder(&self) -> String {
        fs::read_to_string(&self.lock_path)
            .map(|content| content.trim().to_string())
            .unwrap_or_else(|_| "unknown".to_string())
    }

    /// The pid recorded in the lock file no longer runs.
    fn holder_exited(&self) -> bool {
        self.lock_holder()
            .parse::<u32>()
            .map(process_exited)
            .unwrap_or(false)
    }
}

#[cfg(target_os = "linux")]
fn process_exited(pid: u32) -> bool {
    let proc_root = Path::new("/proc");
    proc_root.join("self").exists() && !proc_root.join(pid.to_string()).exists()
}

// Elsewhere the lock age alone decides.
#[cfg(not(target_os = "linux"))]
fn process_exited(_pid: u32) -> bool {
    false
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> StorageResult<PersistedSession> {
        let content = match fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no session file, starting empty");
                return Ok(PersistedSession::default());
            }
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice(&content) {
            Ok(session) => Ok(session),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring unreadable session file");
                Ok(PersistedSession::default())
            }
        }
    }

    fn save(&self, session: &PersistedSession) -> StorageResult<()> {
        let content = serde_json::to_string_pretty(session)?;
        atomic_write(&self.path, content.as_bytes())?;
        debug!(path = %self.path.display(), "session saved");
        Ok(())
    }

    fn lock(&self) -> StorageResult<SessionLock> {
        if let Some(parent) = self.lock_path.parent() {
            fs::create_dir_all(parent)?;
        }

        match self.try_create_lock() {
            Ok(()) => return Ok(SessionLock::file(self.lock_path.clone())),
            Err(e) if e.kind() != io::ErrorKind::AlreadyExists => return Err(e.into()),
            Err(_) => {}
        }

        let reason = if self.holder_exited() {
            "holder exited"
        } else if self.lock_is_stale() {
            "lock expired"
        } else {
            return Err(StorageError::Locked(format!(
                "{} held by pid {}; reclaimed once the holder exits or after {}s",
                self.lock_path.display(),
                self.lock_holder(),
                self.stale_after.as_secs()
            )));
        };

        warn!(
            path = %self.lock_path.display(),
            holder = %self.lock_holder(),
            reason,
            "reclaiming stale session lock"
        );
        match fs::remove_file(&self.lock_path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        match self.try_create_lock() {
            Ok(()) => Ok(SessionLock::file(self.lock_path.clone())),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(StorageError::Locked(
                format!("{} reclaimed by another process", self.lock_path.display()),
            )),
            Err(e) => Err(e.into()),
        }
    }
}

/// Write `content` to `path` through a synced temp file and a rename.
fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "session path has no file name"))?;
    let tmp_path = dir.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

    let write_result = (|| -> io::Result<()> {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)?;
        file.write_all(content)?;
        file.sync_all()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o600))?;
        }

        fs::rename(&tmp_path, path)?;

        if let Ok(parent_dir) = fs::File::open(&dir) {
            let _ = parent_dir.sync_all();
        }
        Ok(())
    })();

    if let Err(err) = write_result {
        let _ = fs::remove_file(&tmp_path);
        return Err(err);
    }
    Ok(())
}
