use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::registry::ProcessRegistry;

/// Lock records older than this are presumed abandoned by a crashed or
/// killed prior instance and may be overridden.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(300);

#[derive(Debug, Error)]
pub enum LockError {
    #[error("another instance is already running (pid {pid})")]
    AlreadyRunning { pid: u32 },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Single-instance guard: a text file in the working directory holding the
/// owning supervisor's pid. Freshness comes from the file's mtime.
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
    pid: u32,
}

struct LockRecord {
    pid: Option<u32>,
    age: Duration,
}

impl InstanceLock {
    /// Acquire the lock at `path`. An existing record blocks acquisition
    /// only when it is fresh and names a live process; stale, dead-owner,
    /// and corrupted records are removed and acquisition retried once.
    pub fn acquire(
        path: &Path,
        registry: &dyn ProcessRegistry,
        stale_after: Duration,
    ) -> Result<Self, LockError> {
        let own_pid = std::process::id();

        for _ in 0..2 {
            match Self::read_record(path)? {
                None => {
                    std::fs::write(path, own_pid.to_string())?;
                    info!(pid = own_pid, path = %path.display(), "lock acquired");
                    return Ok(Self {
                        path: path.to_path_buf(),
                        pid: own_pid,
                    });
                }
                Some(record) => {
                    if record.age > stale_after {
                        warn!(
                            age_secs = record.age.as_secs(),
                            "stale lock file detected, removing and retrying"
                        );
                        remove_quietly(path);
                        continue;
                    }
                    match record.pid {
                        None => {
                            warn!("corrupted lock file, removing and retrying");
                            remove_quietly(path);
                            continue;
                        }
                        Some(pid) if registry.is_alive(pid) => {
                            return Err(LockError::AlreadyRunning { pid });
                        }
                        Some(pid) => {
                            debug!(pid, "lock owner no longer running, removing stale lock");
                            remove_quietly(path);
                            continue;
                        }
                    }
                }
            }
        }

        Err(LockError::Io(std::io::Error::other(
            "lock file reappeared during stale-lock retry",
        )))
    }

    fn read_record(path: &Path) -> Result<Option<LockRecord>, LockError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        // Unknown mtime counts as fresh: better to refuse startup than to
        // clobber a possibly live instance.
        let age = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|mtime| mtime.elapsed().ok())
            .unwrap_or(Duration::ZERO);
        Ok(Some(LockRecord {
            pid: content.trim().parse::<u32>().ok(),
            age,
        }))
    }

    /// Idempotently delete the lock file, but only while it still names our
    /// own pid — a later instance may have re-acquired after a stale
    /// override, and its lock must not be disturbed.
    pub fn release(&self) {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim() == self.pid.to_string() => {
                remove_quietly(&self.path);
                info!("lock released");
            }
            Ok(_) => {
                debug!("lock file owned by a different instance, leaving it");
            }
            Err(_) => {}
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }
}

/// Unconditional lock-file removal, used only by the forced-shutdown path.
pub fn force_remove(path: &Path) {
    remove_quietly(path);
}

fn remove_quietly(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            debug!(path = %path.display(), error = %e, "could not remove lock file");
        }
    }
}
