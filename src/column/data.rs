use std::fmt;
use std::path::Path;
use std::sync::{Arc, Weak};
use parking_lot::RwLock;
use crate::column::index::IndexColumnInner;
use crate::column::options::{ColumnDef, ColumnKind};
use crate::column::store::ColumnStore;
use crate::column::{describe_path, IndexHook};
use crate::core::error::{Error, Result};
use crate::core::types::{DataType, RecordId, Value};
use crate::index::inverted::IndexDelta;
use crate::table::table::{Table, TableInner};

pub(crate) struct DataColumnInner {
    name: String,
    full_name: String,
    pub(crate) table: Weak<TableInner>,
    pub(crate) store: Arc<ColumnStore>,
    pub(crate) hooks: RwLock<Vec<IndexHook>>,
}

impl DataColumnInner {
    pub(crate) fn new(table: &Arc<TableInner>, name: &str, store: Arc<ColumnStore>) -> Arc<Self> {
        let full_name = match &table.name {
            Some(table) => format!("{}.{}", table, name),
            None => name.to_string(),
        };
        Arc::new(DataColumnInner {
            name: name.to_string(),
            full_name,
            table: Arc::downgrade(table),
            store,
            hooks: RwLock::new(Vec::new()),
        })
    }

    fn table(&self) -> Result<Arc<TableInner>> {
        self.table
            .upgrade()
            .filter(|table| !table.is_removed())
            .ok_or_else(|| Error::not_found(format!("table of {} was removed", self.full_name)))
    }

    /// Casts `value` to the column type, registering referenced keys.
    fn normalize(&self, table: &TableInner, value: Value) -> Result<Value> {
        match (self.store.vector, value) {
            (true, Value::Vector(items)) => items
                .into_iter()
                .map(|item| self.normalize_element(table, item))
                .collect::<Result<Vec<Value>>>()
                .map(Value::Vector),
            (true, item) => Ok(Value::Vector(vec![self.normalize_element(table, item)?])),
            (false, Value::Vector(_)) => Err(Error::invalid_argument(format!(
                "{} is a scalar column", self.full_name
            ))),
            (false, item) => self.normalize_element(table, item),
        }
    }

    fn normalize_element(&self, table: &TableInner, value: Value) -> Result<Value> {
        let value = self.store.data_type.cast(value)?;
        match &self.store.data_type {
            DataType::Reference(target) => table
                .database()?
                .reference_table(target)?
                .inner
                .resolve_reference(&value),
            _ => Ok(value),
        }
    }

    fn live_hooks(&self) -> Vec<(Arc<IndexColumnInner>, u32)> {
        self.hooks
            .read()
            .iter()
            .filter_map(|hook| hook.live().map(|index| (index, hook.section)))
            .collect()
    }

    /// Order: validate, build index deltas, write the value, install deltas.
    /// A rejected value changes nothing. Building deltas registers new terms
    /// in the lexicons, so a failing store write can leave lexicon keys
    /// without postings behind; value and postings stay as they were.
    fn write(&self, id: RecordId, value: Option<Value>) -> Result<()> {
        let table = self.table()?;
        if !table.contains(id) {
            return Err(Error::not_found(format!(
                "{} has no record {}", table.display_name(), id
            )));
        }
        let value = match value {
            Some(value) => Some(self.normalize(&table, value)?),
            None => None,
        };

        let mut deltas: Vec<(Arc<IndexColumnInner>, IndexDelta)> = Vec::new();
        for (index, section) in self.live_hooks() {
            let delta = index.prepare(section, id, value.as_ref())?;
            deltas.push((index, delta));
        }
        for (index, _) in &deltas {
            index.mark_dirty()?;
        }

        self.store.set(id, value)?;
        for (index, delta) in deltas {
            index.apply(delta);
        }
        Ok(())
    }
}

/// Typed values attached to the records of a table.
#[derive(Clone)]
pub struct DataColumn {
    pub(crate) inner: Arc<DataColumnInner>,
}

impl DataColumn {
    pub(crate) fn from_inner(inner: Arc<DataColumnInner>) -> Self {
        DataColumn { inner }
    }

    /// `Table.column`
    pub fn name(&self) -> &str {
        &self.inner.full_name
    }

    pub fn local_name(&self) -> &str {
        &self.inner.name
    }

    pub fn data_type(&self) -> &DataType {
        &self.inner.store.data_type
    }

    pub fn kind(&self) -> ColumnKind {
        if self.inner.store.vector { ColumnKind::Vector } else { ColumnKind::Scalar }
    }

    pub fn path(&self) -> Option<&Path> {
        self.inner.store.path()
    }

    pub fn is_persistent(&self) -> bool {
        self.path().is_some()
    }

    pub fn table(&self) -> Option<Table> {
        self.inner.table.upgrade().map(Table::from_inner)
    }

    pub fn get(&self, id: RecordId) -> Option<Value> {
        self.inner.store.get(id)
    }

    /// Writes the value of record `id`, re-indexing it in every index
    /// sourcing this column.
    pub fn set(&self, id: RecordId, value: impl Into<Value>) -> Result<()> {
        self.inner.write(id, Some(value.into()))
    }

    pub fn clear(&self, id: RecordId) -> Result<()> {
        self.inner.write(id, None)
    }

    /// True when another table binds the same store through `add_column`.
    pub fn is_shared(&self) -> bool {
        Arc::strong_count(&self.inner.store) > 1
    }

    pub(crate) fn def(&self) -> ColumnDef {
        ColumnDef::Data {
            name: self.inner.name.clone(),
            data_type: self.inner.store.data_type.clone(),
            vector: self.inner.store.vector,
            path: self.inner.store.path().map(Path::to_path_buf),
        }
    }

    pub(crate) fn remove_files(&self) -> Result<()> {
        if self.is_shared() {
            tracing::debug!(column = %self.name(), "column store still shared, keeping files");
            return Ok(());
        }
        self.inner.store.remove()
    }
}

impl PartialEq for DataColumn {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Display for DataColumn {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "#<Column name: <{}>, path: {}, type: <{}>, kind: {}>",
            self.name(),
            describe_path(self.path()),
            self.data_type(),
            self.kind().name()
        )
    }
}

impl fmt::Debug for DataColumn {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
