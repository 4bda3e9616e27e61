use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use crate::core::error::Result;

/// Directory structure of a persistent database
#[derive(Debug, Clone)]
pub struct StorageLayout {
    pub base_dir: PathBuf,      // Root directory
    pub tables_dir: PathBuf,    // Table regions (keys + values)
    pub columns_dir: PathBuf,   // Column and index column regions
}

impl StorageLayout {
    pub fn new(base_dir: PathBuf) -> Result<Self> {
        let tables_dir = base_dir.join("tables");
        let columns_dir = base_dir.join("columns");

        fs::create_dir_all(&tables_dir)?;
        fs::create_dir_all(&columns_dir)?;

        Ok(StorageLayout {
            base_dir,
            tables_dir,
            columns_dir,
        })
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.base_dir.join("catalog.json")
    }

    pub fn table_path(&self, name: &str) -> PathBuf {
        self.tables_dir.join(name)
    }

    pub fn column_path(&self, table: &str, column: &str) -> PathBuf {
        self.columns_dir.join(format!("{}.{}", table, column))
    }
}

/// `<path><suffix>`, e.g. `tables/Bookmarks.wal`.
pub fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

pub fn journal_path(region: &Path) -> PathBuf {
    sibling_path(region, ".wal")
}

pub fn lock_path(region: &Path) -> PathBuf {
    sibling_path(region, ".lock")
}
