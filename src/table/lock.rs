use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use parking_lot::Mutex;
use crate::core::error::{Error, Result};
use crate::storage::lock_file::LockFile;

/// Advisory table lock: `UNLOCKED -> LOCKED -> UNLOCKED`.
///
/// Acquisition never waits; a held lock fails fast with `LockContention`.
/// Persistent tables mirror the state in a `<path>.lock` file so other
/// processes see it too.
#[derive(Debug)]
pub struct TableLock {
    held: AtomicBool,
    file_path: Option<PathBuf>,
    file: Mutex<Option<LockFile>>,
    target: String,
}

impl TableLock {
    pub fn new(target: &str, file_path: Option<PathBuf>) -> Self {
        TableLock {
            held: AtomicBool::new(false),
            file_path,
            file: Mutex::new(None),
            target: target.to_string(),
        }
    }

    pub fn lock(&self) -> Result<()> {
        if self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::deadlock_avoided(&self.target));
        }
        if let Some(path) = &self.file_path {
            match LockFile::acquire(path) {
                Ok(file) => *self.file.lock() = Some(file),
                Err(e) => {
                    self.held.store(false, Ordering::Release);
                    return Err(e);
                }
            }
        }
        tracing::debug!(table = %self.target, "locked");
        Ok(())
    }

    /// Releasing an unlocked table does nothing.
    pub fn unlock(&self) {
        if self.held.swap(false, Ordering::AcqRel) {
            // dropping the marker removes the file
            self.file.lock().take();
            tracing::debug!(table = %self.target, "unlocked");
        }
    }

    pub fn is_locked(&self) -> bool {
        self.held.load(Ordering::Acquire)
            || self.file_path.as_deref().map(LockFile::is_held).unwrap_or(false)
    }

    /// Forces the lock open whoever holds it, including a crashed process.
    pub fn clear(&self) -> Result<()> {
        self.held.store(false, Ordering::Release);
        self.file.lock().take();
        if let Some(path) = &self.file_path {
            LockFile::clear(path)?;
        }
        tracing::warn!(table = %self.target, "lock cleared");
        Ok(())
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    pub fn guard(&self) -> Result<LockGuard<'_>> {
        self.lock()?;
        Ok(LockGuard { lock: self })
    }

    /// Runs `f` with the lock held and releases it on every exit path.
    pub fn with<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let _guard = self.guard()?;
        f()
    }
}

/// Releases the lock when dropped, including during unwinding.
#[derive(Debug)]
pub struct LockGuard<'a> {
    lock: &'a TableLock,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.lock.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;

    #[test]
    fn second_lock_fails_fast() {
        let lock = TableLock::new("Bookmarks", None);
        lock.lock().unwrap();
        assert!(lock.is_locked());
        assert_eq!(lock.lock().unwrap_err().kind(), ErrorKind::LockContention);
        lock.unlock();
        assert!(!lock.is_locked());
        lock.lock().unwrap();
    }

    #[test]
    fn unlock_when_unlocked_is_a_no_op() {
        let lock = TableLock::new("Bookmarks", None);
        lock.unlock();
        assert!(!lock.is_locked());
    }

    #[test]
    fn scoped_lock_is_released_on_error() {
        let lock = TableLock::new("Bookmarks", None);
        let result: Result<()> = lock.with(|| Err(Error::invalid_argument("boom")));
        assert!(result.is_err());
        assert!(!lock.is_locked());
    }

    #[test]
    fn lock_file_is_visible_to_another_handle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Bookmarks.lock");
        let ours = TableLock::new("Bookmarks", Some(path.clone()));
        let theirs = TableLock::new("Bookmarks", Some(path.clone()));

        ours.lock().unwrap();
        assert!(theirs.is_locked());
        assert_eq!(theirs.lock().unwrap_err().kind(), ErrorKind::LockContention);
        assert!(path.exists());

        theirs.clear().unwrap();
        assert!(!path.exists());
        assert!(!theirs.is_locked());
        theirs.lock().unwrap();
        assert!(path.exists());
        theirs.unlock();
        assert!(!path.exists());
    }
}
