use std::fs::{File, OpenOptions};
use std::time::{Duration, SystemTime};
use crate::core::error::{Error, Result};
use crate::storage::layout::StorageLayout;

/// Guards single-writer access to an index directory. A held lock is a thin
/// wrapper around `flock(2)`; a lock file left behind by a writer that died
/// without releasing it is considered stale once it is older than
/// `STALE_AFTER` and is broken rather than left to block forever.
pub struct FileLock {
    pub file: File,
    pub exclusive: bool,
}

const STALE_AFTER: Duration = Duration::from_secs(60);

impl FileLock {
    pub fn acquire(storage: &StorageLayout, exclusive: bool) -> Result<Self> {
        let lock_path = storage.base_dir.join(".lock");

        let file = if exclusive {
            OpenOptions::new()
                .create(true)
                .write(true)
                .open(&lock_path)?
        } else {
            OpenOptions::new()
                .create(true)
                .read(true)
                .open(&lock_path)?
        };

        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            use libc::{flock, LOCK_EX, LOCK_SH, LOCK_NB};

            let fd = file.as_raw_fd();
            let operation = if exclusive { LOCK_EX } else { LOCK_SH } | LOCK_NB;

            let mut attempted_break = false;
            loop {
                let rc = unsafe { flock(fd, operation) };
                if rc == 0 {
                    break;
                }
                if attempted_break || !Self::is_stale(&lock_path) {
                    return Err(Error::IndexIoError(format!(
                        "failed to acquire {} lock on {:?}",
                        if exclusive { "exclusive" } else { "shared" },
                        lock_path
                    )));
                }
                log::warn!(
                    "breaking stale writer lock at {:?}: unlocked older than {:?}",
                    lock_path,
                    STALE_AFTER
                );
                attempted_break = true;
            }
        }

        Ok(FileLock { file, exclusive })
    }

    #[cfg(unix)]
    fn is_stale(lock_path: &std::path::Path) -> bool {
        std::fs::metadata(lock_path)
            .and_then(|meta| meta.modified())
            .map(|modified| {
                SystemTime::now()
                    .duration_since(modified)
                    .map(|age| age > STALE_AFTER)
                    .unwrap_or(false)
            })
            .unwrap_or(false)
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            use libc::{flock, LOCK_UN};

            let fd = self.file.as_raw_fd();
            unsafe {
                flock(fd, LOCK_UN);
            }
        }
    }
}