use std::{
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use fs4::fs_std::FileExt;
use log::{debug, trace};
use thiserror::Error;

const LOCK_TIMEOUT: Duration = Duration::from_secs(300);
const RETRY_INTERVAL: Duration = Duration::from_millis(500);

/// Exclusive advisory lock on a file, released when dropped.
pub struct FileLock {
    _file: File,
    path: PathBuf,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Could not open lock file {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Could not lock {path}: {source}")]
    Lock {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl FileLock {
    /// Blocks until the lock is free, for at most five minutes.
    pub fn new(path: &Path) -> Result<Self, Error> {
        Self::with_timeout(path, LOCK_TIMEOUT)
    }

    pub fn with_timeout(path: &Path, timeout: Duration) -> Result<Self, Error> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .map_err(|source| Error::Open {
                path: path.to_path_buf(),
                source,
            })?;
        let start = Instant::now();
        loop {
            match file.try_lock_exclusive() {
                Ok(_) => {
                    trace!("Locked {}", path.display());
                    return Ok(Self {
                        _file: file,
                        path: path.to_path_buf(),
                    });
                }
                Err(error)
                    if error.raw_os_error() == fs4::lock_contended_error().raw_os_error()
                        && start.elapsed() < timeout =>
                {
                    debug!("{} is locked by another process, waiting", path.display());
                    std::thread::sleep(RETRY_INTERVAL);
                }
                Err(source) => {
                    return Err(Error::Lock {
                        path: path.to_path_buf(),
                        source,
                    })
                }
            }
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        trace!("Unlocking {}", self.path.display());
    }
}
