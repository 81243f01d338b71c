//! File-based locking to prevent overlapping backup runs

use anyhow::{Context, Result};
use fd_lock::RwLock;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// The lock is taken by another live process
#[derive(Debug, thiserror::Error)]
#[error("Another backup run holds {path:?}")]
pub struct LockHeld {
    pub path: PathBuf,
}

/// Lock guard for one backup output directory
pub struct BackupLock {
    // Guard first: fields drop in declaration order, so the guard is released
    // before the RwLock it borrows from.
    _guard: Option<fd_lock::RwLockWriteGuard<'static, File>>,
    _lock: Box<RwLock<File>>,
    lock_path: PathBuf,
}

impl BackupLock {
    /// Acquire an exclusive lock for a backup directory.
    /// Returns an error if another run holds it.
    pub fn acquire(backup_dir: &Path) -> Result<Self> {
        Self::acquire_at(Self::lock_path(backup_dir))
    }

    fn acquire_at(lock_path: PathBuf) -> Result<Self> {
        debug!("Attempting to acquire lock: {:?}", lock_path);

        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create lock directory")?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file: {:?}", lock_path))?;

        let mut lock = Box::new(RwLock::new(file));

        // SAFETY: the RwLock lives on the heap and is never moved out of its
        // Box; the guard is dropped before the Box (field order above).
        let lock_ptr: *mut RwLock<File> = &mut *lock;
        let guard = match unsafe { (*lock_ptr).try_write() } {
            Ok(guard) => guard,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                return Err(LockHeld { path: lock_path }.into());
            }
            Err(e) => {
                return Err(anyhow::Error::new(e).context(format!("Failed to lock {:?}", lock_path)));
            }
        };
        let guard: fd_lock::RwLockWriteGuard<'static, File> = unsafe { std::mem::transmute(guard) };

        info!("Acquired backup lock: {:?}", lock_path);

        Ok(Self {
            _guard: Some(guard),
            _lock: lock,
            lock_path,
        })
    }

    /// Lock file path for a backup directory
    fn lock_path(backup_dir: &Path) -> PathBuf {
        let key: String = backup_dir
            .to_string_lossy()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();

        std::env::temp_dir().join(format!("stack-backup{}.lock", key))
    }

    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for BackupLock {
    fn drop(&mut self) {
        self._guard.take();
        info!("Released backup lock: {:?}", self.lock_path);

        if let Err(e) = std::fs::remove_file(&self.lock_path) {
            debug!("Failed to remove lock file: {}", e);
        }
    }
}
