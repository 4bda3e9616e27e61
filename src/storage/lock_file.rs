use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use crate::core::error::{Error, ErrorKind, Result};

/// Cross-process lock marker. The file exists exactly while the lock is
/// held; a crashed holder leaves it behind until `clear` is called.
#[derive(Debug)]
pub struct LockFile {
    pub path: PathBuf,
}

impl LockFile {
    pub fn acquire(path: &Path) -> Result<Self> {
        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(Error::deadlock_avoided(&path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        writeln!(file, "{}", std::process::id())?;

        Ok(LockFile { path: path.to_path_buf() })
    }

    pub fn is_held(path: &Path) -> bool {
        path.exists()
    }

    /// Removes the marker regardless of who created it.
    pub fn clear(path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::new(ErrorKind::Io, format!("clear lock {}: {}", path.display(), e))),
        }
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if let Err(e) = Self::clear(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release lock file");
        }
    }
}
