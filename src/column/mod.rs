pub mod data;
pub mod index;
pub mod options;
pub(crate) mod store;

use std::fmt;
use std::path::Path;
use std::sync::{Arc, Weak};
use crate::column::data::DataColumn;
use crate::column::index::{IndexColumn, IndexColumnInner};
use crate::column::options::{ColumnDef, ColumnKind};
use crate::core::error::Result;

/// Registration of an index on a value source (a column or a table's keys).
/// `section` is the 1-based ordinal of the source within the index.
#[derive(Debug, Clone)]
pub(crate) struct IndexHook {
    pub(crate) index: Weak<IndexColumnInner>,
    pub(crate) section: u32,
}

impl IndexHook {
    pub(crate) fn live(&self) -> Option<Arc<IndexColumnInner>> {
        self.index.upgrade().filter(|index| !index.is_removed())
    }
}

/// Any column of a table.
#[derive(Clone)]
pub enum Column {
    Data(DataColumn),
    Index(IndexColumn),
}

impl Column {
    /// `Table.column`
    pub fn name(&self) -> &str {
        match self {
            Column::Data(c) => c.name(),
            Column::Index(c) => c.name(),
        }
    }

    pub fn local_name(&self) -> &str {
        match self {
            Column::Data(c) => c.local_name(),
            Column::Index(c) => c.local_name(),
        }
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            Column::Data(c) => c.kind(),
            Column::Index(_) => ColumnKind::Index,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Column::Data(c) => c.path(),
            Column::Index(c) => c.path(),
        }
    }

    pub fn is_persistent(&self) -> bool {
        self.path().is_some()
    }

    pub fn as_data(&self) -> Option<&DataColumn> {
        match self {
            Column::Data(c) => Some(c),
            Column::Index(_) => None,
        }
    }

    pub fn as_index(&self) -> Option<&IndexColumn> {
        match self {
            Column::Index(c) => Some(c),
            Column::Data(_) => None,
        }
    }

    pub(crate) fn def(&self) -> ColumnDef {
        match self {
            Column::Data(c) => c.def(),
            Column::Index(c) => c.inner.def(),
        }
    }

    pub(crate) fn flush(&self) -> Result<()> {
        match self {
            Column::Data(c) => c.inner.store.flush(),
            Column::Index(c) => c.inner.flush(),
        }
    }

    pub(crate) fn remove_files(&self) -> Result<()> {
        match self {
            Column::Data(c) => c.remove_files(),
            Column::Index(c) => c.inner.remove_files(),
        }
    }
}

impl PartialEq for Column {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Column::Data(a), Column::Data(b)) => a == b,
            (Column::Index(a), Column::Index(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Column::Data(c) => fmt::Display::fmt(c, f),
            Column::Index(c) => fmt::Display::fmt(c, f),
        }
    }
}

impl fmt::Debug for Column {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Renders `path: <p>` or `path: (temporary)`.
pub(crate) fn describe_path(path: Option<&Path>) -> String {
    match path {
        Some(path) => format!("<{}>", path.display()),
        None => "(temporary)".to_string(),
    }
}
