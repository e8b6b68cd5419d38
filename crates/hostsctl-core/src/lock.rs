//! Cross-process advisory lock
//!
//! Writers serialize on a sibling `<target>.lock` file using `flock(2)`.
//! The lock is advisory: it only excludes processes that also take it.
//!
//! A [`FileLock`] is either released or held. While held, the lock file
//! contains the holder's pid followed by a newline. The pid is informational
//! only; a lock file left behind by a crashed holder is not reclaimed, but
//! since the kernel drops `flock` locks when the holder exits, a stale file
//! does not block later writers.
//!
//! Acquisition polls with a non-blocking `flock` every
//! [`LOCK_POLL_INTERVAL`] until it succeeds or the timeout elapses.

use std::fs::{self, File, OpenOptions};
use std::future::Future;
use std::io::{self, Write};
use std::os::unix::fs::{MetadataExt, OpenOptionsExt};
use std::path::{Path, PathBuf};
use std::time::Duration;

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::error::{LockError, Result};

/// Interval between acquisition attempts while the lock is contended
pub const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Timeout for interactive, short-lived commands
pub const QUICK_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Path of the lock file guarding `target`
pub fn lock_path_for(target: &Path) -> PathBuf {
    let mut path = target.as_os_str().to_os_string();
    path.push(".lock");
    PathBuf::from(path)
}

/// Advisory lock on a target file
///
/// Two `FileLock`s on the same target exclude each other, whether they live
/// in the same process or in different ones. Locks are not re-entrant.
///
/// Dropping a held lock releases it and removes the lock file.
#[derive(Debug)]
pub struct FileLock {
    target: PathBuf,
    lock_path: PathBuf,
    held: Option<Flock<File>>,
}

impl FileLock {
    /// Create a released lock for `target`
    pub fn new(target: impl Into<PathBuf>) -> Self {
        let target = target.into();
        let lock_path = lock_path_for(&target);
        Self {
            target,
            lock_path,
            held: None,
        }
    }

    /// The file this lock guards
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// The `.lock` file backing this lock
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Whether this instance currently holds the lock
    pub fn is_locked(&self) -> bool {
        self.held.is_some()
    }

    /// Make a single non-blocking attempt to take the lock
    ///
    /// Returns [`LockError::Contended`] if another holder has it.
    pub fn try_lock(&mut self) -> std::result::Result<(), LockError> {
        self.ensure_released()?;
        match self.acquire_once()? {
            Some(guard) => {
                self.mark_held(guard);
                Ok(())
            }
            None => Err(LockError::Contended {
                path: self.lock_path.clone(),
            }),
        }
    }

    /// Take the lock, retrying every [`LOCK_POLL_INTERVAL`] until `timeout`
    ///
    /// Returns [`LockError::Timeout`] once the deadline passes.
    pub async fn lock_with_timeout(
        &mut self,
        timeout: Duration,
    ) -> std::result::Result<(), LockError> {
        self.ensure_released()?;

        let started = Instant::now();
        loop {
            if let Some(guard) = self.acquire_once()? {
                self.mark_held(guard);
                return Ok(());
            }

            let waited = started.elapsed();
            if waited >= timeout {
                debug!(file = %self.lock_path.display(), ?waited, "lock wait timed out");
                return Err(LockError::Timeout {
                    path: self.lock_path.clone(),
                    waited,
                });
            }
            sleep(LOCK_POLL_INTERVAL.min(timeout - waited)).await;
        }
    }

    /// Release the lock and remove the lock file
    ///
    /// Returns [`LockError::NotHeld`] if the lock is not held.
    pub fn unlock(&mut self) -> std::result::Result<(), LockError> {
        let guard = self.held.take().ok_or_else(|| LockError::NotHeld {
            path: self.lock_path.clone(),
        })?;

        // Unlink while still holding the lock; a waiter that then locks the
        // unlinked inode notices and retries on a fresh file.
        remove_lock_file(&self.lock_path);

        match guard.unlock() {
            Ok(file) => {
                drop(file);
                info!(file = %self.lock_path.display(), "released lock");
                Ok(())
            }
            Err((guard, errno)) => {
                // Closing the descriptor releases the lock regardless.
                drop(guard);
                Err(LockError::Os {
                    path: self.lock_path.clone(),
                    source: io::Error::from(errno),
                })
            }
        }
    }

    fn ensure_released(&self) -> std::result::Result<(), LockError> {
        if self.held.is_some() {
            return Err(LockError::AlreadyAcquired {
                path: self.lock_path.clone(),
            });
        }
        Ok(())
    }

    fn mark_held(&mut self, guard: Flock<File>) {
        write_pid(&self.lock_path, &guard);
        self.held = Some(guard);
        info!(file = %self.lock_path.display(), "acquired lock");
    }

    /// One non-blocking attempt; `Ok(None)` means contended
    fn acquire_once(&self) -> std::result::Result<Option<Flock<File>>, LockError> {
        loop {
            let file = open_lock_file(&self.lock_path)?;
            let guard = match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
                Ok(guard) => guard,
                Err((_, Errno::EAGAIN | Errno::EACCES)) => return Ok(None),
                Err((_, errno)) => {
                    return Err(LockError::Os {
                        path: self.lock_path.clone(),
                        source: io::Error::from(errno),
                    });
                }
            };

            if self.is_current(&guard)? {
                return Ok(Some(guard));
            }
            debug!(file = %self.lock_path.display(), "lock file replaced during acquisition, retrying");
        }
    }

    /// Whether the locked descriptor still refers to the file at `lock_path`
    fn is_current(&self, guard: &Flock<File>) -> std::result::Result<bool, LockError> {
        let os_err = |source| LockError::Os {
            path: self.lock_path.clone(),
            source,
        };
        let held = guard.metadata().map_err(os_err)?;
        match fs::metadata(&self.lock_path) {
            Ok(on_disk) => Ok(on_disk.dev() == held.dev() && on_disk.ino() == held.ino()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(error) => Err(os_err(error)),
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Some(guard) = self.held.take() {
            remove_lock_file(&self.lock_path);
            drop(guard);
            debug!(file = %self.lock_path.display(), "released lock on drop");
        }
    }
}

fn open_lock_file(path: &Path) -> std::result::Result<File, LockError> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(false).mode(0o600);
    options.open(path).map_err(|source| LockError::Os {
        path: path.to_path_buf(),
        source,
    })
}

fn write_pid(path: &Path, file: &File) {
    let result = file
        .set_len(0)
        .and_then(|()| {
            let mut writer = file;
            writeln!(writer, "{}", std::process::id())
        })
        .and_then(|()| file.sync_all());
    if let Err(error) = result {
        warn!(file = %path.display(), error = %error, "failed to write pid to lock file");
    }
}

fn remove_lock_file(path: &Path) {
    match fs::remove_file(path) {
        Err(error) if error.kind() != io::ErrorKind::NotFound => {
            warn!(file = %path.display(), error = %error, "failed to remove lock file");
        }
        _ => {}
    }
}

/// Run `action` while holding the lock on `target`
///
/// The lock is acquired with [`FileLock::lock_with_timeout`] and released on
/// every exit path, including a panic inside `action` or the returned future
/// being dropped. The action's result is returned unchanged; a failure to
/// release after the action ran is only logged.
pub async fn with_lock<T, F, Fut>(target: impl AsRef<Path>, timeout: Duration, action: F) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut lock = FileLock::new(target.as_ref());
    lock.lock_with_timeout(timeout).await?;

    let outcome = action().await;

    if let Err(error) = lock.unlock() {
        warn!(error = %error, "failed to release lock");
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::tempdir;

    fn blow_up() {
        panic!("action blew up");
    }

    #[test]
    fn test_lock_path_appends_suffix() {
        assert_eq!(lock_path_for(Path::new("/etc/hosts")), PathBuf::from("/etc/hosts.lock"));
        assert_eq!(
            lock_path_for(Path::new("/tmp/hosts.txt")),
            PathBuf::from("/tmp/hosts.txt.lock")
        );
    }

    #[test]
    fn test_try_lock_writes_pid_and_unlock_removes_file() {
        let dir = tempdir().unwrap();
        let mut lock = FileLock::new(dir.path().join("hosts"));

        lock.try_lock().unwrap();
        assert!(lock.is_locked());
        let content = fs::read_to_string(lock.lock_path()).unwrap();
        assert_eq!(content, format!("{}\n", std::process::id()));

        lock.unlock().unwrap();
        assert!(!lock.is_locked());
        assert!(!lock.lock_path().exists());
    }

    #[test]
    fn test_second_instance_is_contended_until_release() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("hosts");
        let mut first = FileLock::new(&target);
        let mut second = FileLock::new(&target);

        first.try_lock().unwrap();
        let err = second.try_lock().unwrap_err();
        assert!(matches!(err, LockError::Contended { .. }));
        assert!(!second.is_locked());

        first.unlock().unwrap();
        second.try_lock().unwrap();
        assert!(second.is_locked());
    }

    #[test]
    fn test_not_reentrant() {
        let dir = tempdir().unwrap();
        let mut lock = FileLock::new(dir.path().join("hosts"));
        lock.try_lock().unwrap();
        assert!(matches!(
            lock.try_lock().unwrap_err(),
            LockError::AlreadyAcquired { .. }
        ));
        assert!(lock.is_locked());
    }

    #[test]
    fn test_unlock_while_released() {
        let dir = tempdir().unwrap();
        let mut lock = FileLock::new(dir.path().join("hosts"));
        assert!(matches!(lock.unlock().unwrap_err(), LockError::NotHeld { .. }));
    }

    #[test]
    fn test_different_targets_do_not_interact() {
        let dir = tempdir().unwrap();
        let mut a = FileLock::new(dir.path().join("a"));
        let mut b = FileLock::new(dir.path().join("b"));
        a.try_lock().unwrap();
        b.try_lock().unwrap();
    }

    #[test]
    fn test_drop_releases() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("hosts");
        {
            let mut lock = FileLock::new(&target);
            lock.try_lock().unwrap();
        }
        assert!(!lock_path_for(&target).exists());
        FileLock::new(&target).try_lock().unwrap();
    }

    #[test]
    fn test_stale_lock_file_does_not_block() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("hosts");
        fs::write(lock_path_for(&target), "99999\n").unwrap();

        let mut lock = FileLock::new(&target);
        lock.try_lock().unwrap();
        let content = fs::read_to_string(lock.lock_path()).unwrap();
        assert_eq!(content, format!("{}\n", std::process::id()));
    }

    #[tokio::test]
    async fn test_lock_with_timeout_expires() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("hosts");
        let mut holder = FileLock::new(&target);
        holder.try_lock().unwrap();

        let mut waiter = FileLock::new(&target);
        let started = std::time::Instant::now();
        let err = waiter
            .lock_with_timeout(Duration::from_millis(250))
            .await
            .unwrap_err();
        assert!(matches!(err, LockError::Timeout { .. }));
        assert!(started.elapsed() >= Duration::from_millis(250));
        assert!(!waiter.is_locked());
    }

    #[tokio::test]
    async fn test_lock_with_timeout_acquires_after_release() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("hosts");
        let mut holder = FileLock::new(&target);
        holder.try_lock().unwrap();

        let release = tokio::spawn(async move {
            sleep(Duration::from_millis(200)).await;
            holder.unlock().unwrap();
        });

        let mut waiter = FileLock::new(&target);
        waiter.lock_with_timeout(Duration::from_secs(5)).await.unwrap();
        assert!(waiter.is_locked());
        release.await.unwrap();
    }

    #[tokio::test]
    async fn test_with_lock_propagates_outcome_and_releases() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("hosts");

        let value = with_lock(&target, QUICK_LOCK_TIMEOUT, || async { Ok(42) })
            .await
            .unwrap();
        assert_eq!(value, 42);
        assert!(!lock_path_for(&target).exists());

        let err = with_lock(&target, QUICK_LOCK_TIMEOUT, || async {
            Err::<(), _>(Error::not_found("entry 9"))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        FileLock::new(&target).try_lock().unwrap();
    }

    #[tokio::test]
    async fn test_with_lock_holds_during_action() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("hosts");

        let inner = target.clone();
        with_lock(&target, QUICK_LOCK_TIMEOUT, || async move {
            let mut other = FileLock::new(&inner);
            assert!(matches!(other.try_lock(), Err(LockError::Contended { .. })));
            Ok(())
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_with_lock_releases_on_panic() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("hosts");

        let task_target = target.clone();
        let joined = tokio::spawn(async move {
            with_lock(&task_target, QUICK_LOCK_TIMEOUT, || async {
                blow_up();
                Ok(())
            })
            .await
        })
        .await;
        assert!(joined.is_err());

        FileLock::new(&target).try_lock().unwrap();
    }

    #[tokio::test]
    async fn test_with_lock_times_out_under_contention() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("hosts");
        let mut holder = FileLock::new(&target);
        holder.try_lock().unwrap();

        let ran = AtomicBool::new(false);
        let flag = &ran;
        let err = with_lock(&target, Duration::from_millis(150), || async move {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Lock(LockError::Timeout { .. })));
        assert!(!ran.load(Ordering::SeqCst));
    }
}
