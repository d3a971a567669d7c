//! Mutual exclusion identified by a filesystem path.
//!
//! Any process that knows the path can take the lock, so the broker and
//! independently started clients serialise on the same resource. Each
//! acquisition opens its own file description and takes an exclusive
//! `flock` on it: two acquisitions conflict whether they come from
//! different processes or from different threads of one process. The lock
//! is released when the guard drops, including when its holder dies.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use tracing::debug;

use crate::error::{IpcError, Result};
use crate::fifo;

#[derive(Debug, Clone)]
pub struct NamedMutex {
    path: PathBuf,
}

/// Held lock; dropping it releases the mutex.
pub struct NamedMutexGuard {
    _lock: Flock<File>,
}

impl std::fmt::Debug for NamedMutexGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("NamedMutexGuard")
    }
}

impl NamedMutex {
    /// Create the lock artifact if needed (the owner's side).
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .mode(0o600)
            .open(&path)
            .map_err(|e| IpcError::io("create lock", &path, e))?;
        debug!("named mutex ready at {}", path.display());
        Ok(NamedMutex { path })
    }

    /// Attach to an existing lock (a participant's side).
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        File::open(&path).map_err(|e| IpcError::io("open lock", &path, e))?;
        Ok(NamedMutex { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Block until the mutex is held.
    pub fn lock(&self) -> Result<NamedMutexGuard> {
        let file = File::open(&self.path).map_err(|e| IpcError::io("open lock", &self.path, e))?;
        let lock = Flock::lock(file, FlockArg::LockExclusive)
            .map_err(|(_, errno)| IpcError::io("lock", &self.path, errno.into()))?;
        Ok(NamedMutexGuard { _lock: lock })
    }

    /// Take the mutex only if nobody holds it.
    pub fn try_lock(&self) -> Result<Option<NamedMutexGuard>> {
        let file = File::open(&self.path).map_err(|e| IpcError::io("open lock", &self.path, e))?;
        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(lock) => Ok(Some(NamedMutexGuard { _lock: lock })),
            Err((_, Errno::EAGAIN)) => Ok(None),
            Err((_, errno)) => Err(IpcError::io("lock", &self.path, errno.into())),
        }
    }

    /// Remove the lock artifact. Holders keep their lock until they drop it.
    pub fn remove(self) -> Result<()> {
        fifo::remove(&self.path)
    }
}
