use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use crate::core::error::Result;
use crate::core::types::TableKind;
use crate::storage::layout::sibling_path;

/// Where a named table lives. Paths under the database directory are
/// stored relative to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub kind: TableKind,
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
}

/// `catalog.json`: name -> table of a persistent database.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    pub tables: BTreeMap<String, CatalogEntry>,
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Catalog> {
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Written through a temporary file and renamed into place.
    pub fn save(&self, path: &Path) -> Result<()> {
        let tmp = sibling_path(path, ".tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(self)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn insert(&mut self, name: &str, entry: CatalogEntry) {
        self.tables.insert(name.to_string(), entry);
    }

    pub fn remove(&mut self, name: &str) -> Option<CatalogEntry> {
        self.tables.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.tables.get(name)
    }
}

/// Relative form of `path` when it lies under `base`.
pub(crate) fn relative_to(path: &Path, base: &Path) -> PathBuf {
    path.strip_prefix(base).map(Path::to_path_buf).unwrap_or_else(|_| path.to_path_buf())
}
