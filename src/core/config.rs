use std::path::PathBuf;
use crate::compression::compress::CompressionType;
use crate::storage::journal::SyncMode;

#[derive(Debug, Clone)]
pub struct Config {
    /// Database directory; `None` keeps everything in memory.
    pub storage_path: Option<PathBuf>,

    pub sync_mode: SyncMode,
    pub compression: CompressionType,

    /// Journal entries after which a snapshot is written and the journal rotated.
    pub journal_checkpoint_ops: u64,

    /// Tokenizer for lexicons that do not name one. `None` indexes whole values.
    pub default_tokenizer: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage_path: None,
            sync_mode: SyncMode::Batch,
            compression: CompressionType::Lz4,
            journal_checkpoint_ops: 100_000,
            default_tokenizer: None,
        }
    }
}

impl Config {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Config {
            storage_path: Some(path.into()),
            ..Config::default()
        }
    }

    pub fn sync_mode(mut self, mode: SyncMode) -> Self {
        self.sync_mode = mode;
        self
    }

    pub fn compression(mut self, compression: CompressionType) -> Self {
        self.compression = compression;
        self
    }

    pub fn journal_checkpoint_ops(mut self, ops: u64) -> Self {
        self.journal_checkpoint_ops = ops;
        self
    }

    pub fn default_tokenizer(mut self, name: &str) -> Self {
        self.default_tokenizer = Some(name.to_string());
        self
    }

    pub fn is_persistent(&self) -> bool {
        self.storage_path.is_some()
    }
}
