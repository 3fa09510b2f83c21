// Cross-process exclusive lock with a bounded wait

use fd_lock::RwLock;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::LockConfig;
use crate::error::{DeskError, DeskResult};

/// Advisory lock on a file. Every holder opens its own descriptor, so the lock
/// also excludes other threads and processes using the same path.
#[derive(Debug, Clone)]
pub struct ScriptLock {
    path: PathBuf,
    timeout: Duration,
    poll_interval: Duration,
}

impl ScriptLock {
    pub fn new(path: impl Into<PathBuf>, timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            path: path.into(),
            timeout,
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }

    pub fn from_config(config: &LockConfig) -> Self {
        Self::new(&config.path, config.timeout(), config.poll_interval())
    }

    /// Same wait settings, different file
    pub fn sibling(&self, path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..self.clone()
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `critical` while holding the lock. Fails with `LockTimeout` when the
    /// lock is still held by someone else once the timeout has passed.
    pub fn with_lock<T>(&self, critical: impl FnOnce() -> DeskResult<T>) -> DeskResult<T> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.path)?;
        let mut lock = RwLock::new(file);

        let started = Instant::now();
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match lock.try_write() {
                Ok(_guard) => {
                    debug!(
                        lock = %self.path.display(),
                        attempts,
                        waited_ms = started.elapsed().as_millis() as u64,
                        "Lock acquired"
                    );
                    return critical();
                }
                Err(e) => {
                    debug!(lock = %self.path.display(), error = %e, "Lock busy");
                }
            }

            let waited = started.elapsed();
            if waited >= self.timeout {
                warn!(
                    lock = %self.path.display(),
                    waited_ms = waited.as_millis() as u64,
                    attempts,
                    "Gave up waiting for lock"
                );
                return Err(DeskError::LockTimeout {
                    path: self.path.clone(),
                    waited,
                });
            }
            thread::sleep(self.poll_interval.min(self.timeout - waited));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use tempfile::TempDir;

    fn lock_in(dir: &TempDir, timeout_ms: u64) -> ScriptLock {
        ScriptLock::new(
            dir.path().join("locks").join("sequence.lock"),
            Duration::from_millis(timeout_ms),
            Duration::from_millis(5),
        )
    }

    #[test]
    fn runs_the_critical_section_and_returns_its_value() {
        let dir = TempDir::new().unwrap();
        let lock = lock_in(&dir, 100);
        assert_eq!(lock.with_lock(|| Ok(42)).unwrap(), 42);
        assert!(lock.path().exists());
        // Released: a second acquisition succeeds immediately
        assert_eq!(lock.with_lock(|| Ok("again")).unwrap(), "again");
    }

    #[test]
    fn errors_from_the_critical_section_pass_through() {
        let dir = TempDir::new().unwrap();
        let lock = lock_in(&dir, 100);
        let err = lock
            .with_lock::<()>(|| Err(DeskError::Config("boom".to_string())))
            .unwrap_err();
        assert!(matches!(err, DeskError::Config(_)));
    }

    #[test]
    fn held_lock_times_out_the_second_caller() {
        let dir = TempDir::new().unwrap();
        let holder = lock_in(&dir, 1_000);
        let contender = lock_in(&dir, 100);

        let (acquired_tx, acquired_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let handle = thread::spawn(move || {
            holder.with_lock(|| {
                acquired_tx.send(()).unwrap();
                release_rx.recv().unwrap();
                Ok(())
            })
        });

        acquired_rx.recv().unwrap();
        let err = contender.with_lock(|| Ok(())).unwrap_err();
        match err {
            DeskError::LockTimeout { waited, .. } => {
                assert!(waited >= Duration::from_millis(100))
            }
            other => panic!("unexpected error: {other}"),
        }

        release_tx.send(()).unwrap();
        handle.join().unwrap().unwrap();
        contender.with_lock(|| Ok(())).unwrap();
    }

    #[test]
    fn waiter_gets_the_lock_once_released() {
        let dir = TempDir::new().unwrap();
        let holder = lock_in(&dir, 1_000);
        let waiter = lock_in(&dir, 2_000);

        let (acquired_tx, acquired_rx) = mpsc::channel();
        let handle = thread::spawn(move || {
            holder.with_lock(|| {
                acquired_tx.send(()).unwrap();
                thread::sleep(Duration::from_millis(50));
                Ok(())
            })
        });

        acquired_rx.recv().unwrap();
        assert_eq!(waiter.with_lock(|| Ok(7)).unwrap(), 7);
        handle.join().unwrap().unwrap();
    }
}
