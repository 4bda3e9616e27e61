use std::path::Path;
use serde::Serialize;
use serde::de::DeserializeOwned;
use crate::compression::compress::CompressionType;
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::storage::journal::{Journal, SyncMode};
use crate::storage::layout::journal_path;
use crate::storage::region::{ObjectTag, Region};

/// Durability knobs shared by every journaled object of a database.
#[derive(Debug, Clone, Copy)]
pub struct StorageSettings {
    pub sync_mode: SyncMode,
    pub compression: CompressionType,
    pub checkpoint_ops: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        StorageSettings::from(&Config::default())
    }
}

impl From<&Config> for StorageSettings {
    fn from(config: &Config) -> Self {
        StorageSettings {
            sync_mode: config.sync_mode,
            compression: config.compression,
            checkpoint_ops: config.journal_checkpoint_ops.max(1),
        }
    }
}

/// Snapshot region plus the journal of operations applied since.
pub struct Durable {
    region: Region,
    journal: Journal,
    tag: ObjectTag,
    settings: StorageSettings,
    pending: u64,
}

impl Durable {
    /// Creates the region at `path` with `payload` as its first snapshot.
    pub fn create(path: &Path, tag: ObjectTag, settings: StorageSettings, payload: &[u8]) -> Result<Self> {
        let mut region = Region::create(path)?;
        region.write_snapshot(tag, payload, settings.compression)?;

        // A journal without its region is left over from a removed object.
        let wal = journal_path(path);
        Journal::remove(&wal)?;
        let journal = Journal::open(&wal, settings.sync_mode)?;

        tracing::debug!(path = %path.display(), object = %tag.describe(), "created region");
        Ok(Durable { region, journal, tag, settings, pending: 0 })
    }

    /// Opens `path`, returning the last snapshot payload and the journaled
    /// operations to replay on top of it.
    pub fn open<Op: DeserializeOwned>(
        path: &Path,
        tag: ObjectTag,
        settings: StorageSettings,
    ) -> Result<(Self, Vec<u8>, Vec<Op>)> {
        let region = Region::open(path)?;
        region.expect_tag(tag)?;
        let payload = match region.read_snapshot()? {
            Some((_, payload)) => payload,
            None => {
                return Err(Error::new(
                    ErrorKind::Corrupt,
                    format!("{} holds no snapshot", path.display()),
                ));
            }
        };

        let wal = journal_path(path);
        let ops: Vec<Op> = Journal::replay(&wal)?.into_iter().map(|entry| entry.op).collect();
        let mut journal = Journal::open(&wal, settings.sync_mode)?;
        journal.sequence = ops.len() as u64;

        tracing::debug!(path = %path.display(), replayed = ops.len(), "opened region");
        let pending = ops.len() as u64;
        Ok((Durable { region, journal, tag, settings, pending }, payload, ops))
    }

    pub fn path(&self) -> Option<&Path> {
        self.region.path()
    }

    /// Journals `op`; returns true once a checkpoint is due.
    pub fn log<Op: Serialize>(&mut self, op: &Op) -> Result<bool> {
        self.journal.append(op)?;
        self.pending += 1;
        Ok(self.pending >= self.settings.checkpoint_ops)
    }

    pub fn pending(&self) -> u64 {
        self.pending
    }

    /// Writes a new snapshot and empties the journal.
    pub fn checkpoint(&mut self, payload: &[u8]) -> Result<()> {
        self.region.write_snapshot(self.tag, payload, self.settings.compression)?;
        self.journal.reset()?;
        tracing::debug!(
            path = %self.region.describe_path(),
            bytes = payload.len(),
            ops = self.pending,
            "checkpoint"
        );
        self.pending = 0;
        Ok(())
    }

    pub fn sync(&mut self) -> Result<()> {
        self.journal.sync()?;
        self.region.flush()
    }

    /// Deletes the region and its journal.
    pub fn remove(self) -> Result<()> {
        let wal = self.journal.path.clone();
        drop(self.journal);
        Journal::remove(&wal)?;
        self.region.remove()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    enum Op {
        Push(u32),
    }

    fn settings(checkpoint_ops: u64) -> StorageSettings {
        StorageSettings {
            sync_mode: SyncMode::None,
            compression: CompressionType::Lz4,
            checkpoint_ops,
        }
    }

    #[test]
    fn reopen_replays_journal_after_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("obj");
        {
            let mut durable = Durable::create(&path, ObjectTag::Column, settings(10), b"base").unwrap();
            assert!(!durable.log(&Op::Push(1)).unwrap());
            durable.log(&Op::Push(2)).unwrap();
        }
        let (durable, payload, ops) = Durable::open::<Op>(&path, ObjectTag::Column, settings(10)).unwrap();
        assert_eq!(payload, b"base");
        assert_eq!(ops, vec![Op::Push(1), Op::Push(2)]);
        assert_eq!(durable.pending(), 2);
    }

    #[test]
    fn checkpoint_is_due_after_configured_ops() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("obj");
        let mut durable = Durable::create(&path, ObjectTag::Column, settings(2), b"v1").unwrap();
        assert!(!durable.log(&Op::Push(1)).unwrap());
        assert!(durable.log(&Op::Push(2)).unwrap());
        durable.checkpoint(b"v2").unwrap();
        drop(durable);

        let (_, payload, ops) = Durable::open::<Op>(&path, ObjectTag::Column, settings(2)).unwrap();
        assert_eq!(payload, b"v2");
        assert!(ops.is_empty());
    }

    #[test]
    fn wrong_object_kind_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("obj");
        Durable::create(&path, ObjectTag::Column, settings(2), b"x").unwrap();
        let err = Durable::open::<Op>(&path, ObjectTag::IndexColumn, settings(2)).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn remove_deletes_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("obj");
        let durable = Durable::create(&path, ObjectTag::Column, settings(2), b"x").unwrap();
        durable.remove().unwrap();
        assert!(!path.exists());
        assert!(!journal_path(&path).exists());
    }
}
