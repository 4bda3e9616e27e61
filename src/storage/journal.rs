use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use crate::core::error::{Error, ErrorKind, Result};

/// Write-ahead log for mutations made since the last snapshot
pub struct Journal {
    pub writer: BufWriter<File>,
    pub path: PathBuf,
    pub position: u64,
    pub sync_mode: SyncMode,
    pub sequence: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Immediate,  // fsync after every write
    Batch,      // fsync every megabyte and on checkpoint
    None,       // Let OS handle it
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry<Op> {
    pub sequence: u64,
    pub op: Op,
    pub timestamp: DateTime<Utc>,
}

const MAX_ENTRY_SIZE: usize = 64 * 1024 * 1024;
const BATCH_SYNC_BYTES: u64 = 1024 * 1024;

impl Journal {
    pub fn open(path: &Path, sync_mode: SyncMode) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        let position = file.metadata()?.len();

        Ok(Journal {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            position,
            sync_mode,
            sequence: 0,
        })
    }

    pub fn append<Op: Serialize>(&mut self, op: &Op) -> Result<()> {
        let entry = JournalEntry {
            sequence: self.sequence,
            op,
            timestamp: Utc::now(),
        };

        let data = bincode::serialize(&entry)?;
        let len = data.len() as u32;

        // Write length + data
        self.writer.write_all(&len.to_le_bytes())?;
        self.writer.write_all(&data)?;

        let before = self.position;
        self.sequence += 1;
        self.position += 4 + data.len() as u64;

        match self.sync_mode {
            SyncMode::Immediate => self.sync()?,
            SyncMode::Batch if before / BATCH_SYNC_BYTES != self.position / BATCH_SYNC_BYTES => {
                self.sync()?
            }
            _ => {}
        }

        Ok(())
    }

    pub fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }

    /// Empties the journal once its entries are covered by a snapshot.
    pub fn reset(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().set_len(0)?;
        self.writer.get_ref().sync_all()?;
        self.position = 0;
        Ok(())
    }

    /// Reads every complete entry. A torn or undecodable tail (crash during
    /// append) ends the replay with a warning instead of failing the open.
    pub fn replay<Op: DeserializeOwned>(path: &Path) -> Result<Vec<JournalEntry<Op>>> {
        let mut data = Vec::new();
        match File::open(path) {
            Ok(mut file) => {
                file.read_to_end(&mut data)?;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        }

        let mut entries = Vec::new();
        let mut pos = 0usize;
        while pos < data.len() {
            if pos + 4 > data.len() {
                tracing::warn!(path = %path.display(), offset = pos, "torn journal length prefix, ignoring tail");
                break;
            }
            let mut len_buf = [0u8; 4];
            len_buf.copy_from_slice(&data[pos..pos + 4]);
            let len = u32::from_le_bytes(len_buf) as usize;

            if len > MAX_ENTRY_SIZE {
                return Err(Error::new(
                    ErrorKind::Corrupt,
                    format!("journal entry of {} bytes in {}", len, path.display()),
                ));
            }
            if pos + 4 + len > data.len() {
                tracing::warn!(path = %path.display(), offset = pos, "torn journal entry, ignoring tail");
                break;
            }

            match bincode::deserialize::<JournalEntry<Op>>(&data[pos + 4..pos + 4 + len]) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    tracing::warn!(path = %path.display(), offset = pos, error = %e, "undecodable journal entry, ignoring tail");
                    break;
                }
            }
            pos += 4 + len;
        }

        Ok(entries)
    }

    pub fn remove(path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for Journal {
    fn drop(&mut self) {
        if let Err(e) = self.writer.flush() {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to flush journal");
        }
    }
}
