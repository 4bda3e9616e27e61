use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use parking_lot::{Mutex, RwLock};
use serde::{Serialize, Deserialize};
use crate::column::data::{DataColumn, DataColumnInner};
use crate::column::index::{IndexColumn, IndexColumnInner};
use crate::column::options::{ColumnDef, ColumnKind, ColumnOptions, IndexColumnOptions};
use crate::column::{Column, IndexHook};
use crate::core::database::DatabaseInner;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{DataType, RecordId, TableKind, Value, ValueType};
use crate::search::options::SortOptions;
use crate::search::results::RecordSet;
use crate::storage::checkpoint::Durable;
use crate::storage::layout::{lock_path, sibling_path};
use crate::storage::region::{ObjectTag, Region};
use crate::table::keys::Keys;
use crate::table::lock::{LockGuard, TableLock};
use crate::table::options::validate_name;
use crate::table::record::Record;

/// Journaled table mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) enum TableOp {
    Add(Option<Vec<u8>>),
    Delete(RecordId),
    SetValue(RecordId, Vec<u8>),
    Truncate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct TableState {
    pub(crate) keys: Keys,
    values: Vec<Option<Vec<u8>>>,
}

impl TableState {
    fn new(kind: TableKind) -> Self {
        TableState { keys: Keys::new(kind), values: Vec::new() }
    }

    fn apply(&mut self, op: TableOp) -> Result<Option<RecordId>> {
        match op {
            TableOp::Add(key) => {
                let (id, _) = self.keys.add(key.as_deref())?;
                Ok(Some(id))
            }
            TableOp::Delete(id) => {
                if self.keys.delete(id) {
                    if let Some(slot) = self.values.get_mut(id.index()) {
                        *slot = None;
                    }
                }
                Ok(None)
            }
            TableOp::SetValue(id, bytes) => {
                let index = id.index();
                if index >= self.values.len() {
                    self.values.resize(index + 1, None);
                }
                self.values[index] = Some(bytes);
                Ok(None)
            }
            TableOp::Truncate => {
                self.keys.truncate();
                self.values.clear();
                Ok(None)
            }
        }
    }

    fn value(&self, id: RecordId) -> Option<&[u8]> {
        self.values.get(id.index()).and_then(|v| v.as_deref())
    }
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    kind: TableKind,
    key_type: &'a Option<DataType>,
    value_type: &'a Option<ValueType>,
    default_tokenizer: &'a Option<String>,
    token_filters: &'a [String],
    state: &'a TableState,
    columns: Vec<ColumnDef>,
}

#[derive(Deserialize)]
struct TableSnapshot {
    kind: TableKind,
    key_type: Option<DataType>,
    value_type: Option<ValueType>,
    default_tokenizer: Option<String>,
    token_filters: Vec<String>,
    state: TableState,
    columns: Vec<ColumnDef>,
}

/// Resolved creation parameters of a table.
pub(crate) struct TableSpec {
    pub(crate) name: Option<String>,
    pub(crate) kind: TableKind,
    pub(crate) key_type: Option<DataType>,
    pub(crate) value_type: Option<ValueType>,
    pub(crate) default_tokenizer: Option<String>,
    pub(crate) token_filters: Vec<String>,
    pub(crate) path: Option<PathBuf>,
}

pub(crate) struct TableInner {
    pub(crate) db: Weak<DatabaseInner>,
    pub(crate) name: Option<String>,
    pub(crate) kind: TableKind,
    pub(crate) key_type: Option<DataType>,
    pub(crate) value_type: Option<ValueType>,
    pub(crate) default_tokenizer: Option<String>,
    pub(crate) token_filters: Vec<String>,
    pub(crate) path: Option<PathBuf>,
    pub(crate) state: RwLock<TableState>,
    storage: Mutex<Option<Durable>>,
    pub(crate) columns: RwLock<BTreeMap<String, Column>>,
    pub(crate) key_hooks: RwLock<Vec<IndexHook>>,
    pub(crate) lock: TableLock,
    removed: AtomicBool,
}

// Lock order: `state` before `storage` before `columns`. Index hooks run
// with no table lock held because a lexicon may have to add terms.
impl TableInner {
    pub(crate) fn create(db: &Arc<DatabaseInner>, spec: TableSpec) -> Result<Arc<TableInner>> {
        let state = TableState::new(spec.kind);
        let inner = Arc::new(Self::assemble(db, spec, state));
        if let Some(path) = &inner.path {
            let payload = inner.snapshot(&inner.state.read())?;
            let durable = Durable::create(path, ObjectTag::Table(inner.kind), db.settings, &payload)?;
            *inner.storage.lock() = Some(durable);
        }
        tracing::debug!(table = %inner.display_name(), kind = inner.kind.name(), "created table");
        Ok(inner)
    }

    /// Loads a table region, replaying its journal. Index columns come back
    /// unbound; the database wires them to their sources afterwards.
    pub(crate) fn load(db: &Arc<DatabaseInner>, path: &Path, name: Option<String>) -> Result<Arc<TableInner>> {
        let tag = stored_tag(path)?;
        let kind = match tag {
            ObjectTag::Table(kind) => kind,
            other => {
                return Err(Error::type_mismatch(format!(
                    "{} holds a {}, not a table", path.display(), other.describe()
                )));
            }
        };
        let (durable, payload, ops) = Durable::open::<TableOp>(path, tag, db.settings)?;
        let snapshot: TableSnapshot = bincode::deserialize(&payload)?;
        if snapshot.kind != kind {
            return Err(Error::new(ErrorKind::Corrupt, format!(
                "{} is tagged {} but holds a {} snapshot", path.display(), kind.name(), snapshot.kind.name()
            )));
        }

        let mut state = snapshot.state;
        let replayed = ops.len();
        for op in ops {
            state.apply(op)?;
        }

        let spec = TableSpec {
            name,
            kind,
            key_type: snapshot.key_type,
            value_type: snapshot.value_type,
            default_tokenizer: snapshot.default_tokenizer,
            token_filters: snapshot.token_filters,
            path: Some(path.to_path_buf()),
        };
        let inner = Arc::new(Self::assemble(db, spec, state));
        *inner.storage.lock() = Some(durable);

        for def in snapshot.columns {
            let column = match def {
                ColumnDef::Data { name, data_type, vector, path } => {
                    let store = match path {
                        Some(path) => {
                            let store = db.open_column_store(&path)?;
                            store.expect_type(&data_type, vector)?;
                            store
                        }
                        None => db.temporary_column_store(data_type, vector),
                    };
                    Column::Data(DataColumn::from_inner(DataColumnInner::new(&inner, &name, store)))
                }
                def @ ColumnDef::Index { .. } => {
                    Column::Index(IndexColumn::from_inner(IndexColumnInner::load(&inner, def, db)?))
                }
            };
            inner.columns.write().insert(column.local_name().to_string(), column);
        }

        tracing::debug!(
            table = %inner.display_name(),
            path = %path.display(),
            records = inner.state.read().keys.size(),
            replayed,
            "opened table"
        );
        Ok(inner)
    }

    fn assemble(db: &Arc<DatabaseInner>, spec: TableSpec, state: TableState) -> TableInner {
        let target = spec.name.clone().unwrap_or_else(|| "(anonymous)".to_string());
        TableInner {
            db: Arc::downgrade(db),
            lock: TableLock::new(&target, spec.path.as_deref().map(lock_path)),
            name: spec.name,
            kind: spec.kind,
            key_type: spec.key_type,
            value_type: spec.value_type,
            default_tokenizer: spec.default_tokenizer,
            token_filters: spec.token_filters,
            path: spec.path,
            state: RwLock::new(state),
            storage: Mutex::new(None),
            columns: RwLock::new(BTreeMap::new()),
            key_hooks: RwLock::new(Vec::new()),
            removed: AtomicBool::new(false),
        }
    }

    pub(crate) fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("(anonymous)")
    }

    pub(crate) fn database(&self) -> Result<Arc<DatabaseInner>> {
        self.db
            .upgrade()
            .ok_or_else(|| Error::new(ErrorKind::Internal, "database is closed"))
    }

    pub(crate) fn is_removed(&self) -> bool {
        self.removed.load(Ordering::Acquire)
    }

    fn check_live(&self) -> Result<()> {
        if self.is_removed() {
            return Err(Error::not_found(format!("table {} was removed", self.display_name())));
        }
        Ok(())
    }

    fn snapshot(&self, state: &TableState) -> Result<Vec<u8>> {
        let columns = self.columns.read().values().map(Column::def).collect();
        Ok(bincode::serialize(&SnapshotRef {
            kind: self.kind,
            key_type: &self.key_type,
            value_type: &self.value_type,
            default_tokenizer: &self.default_tokenizer,
            token_filters: &self.token_filters,
            state,
            columns,
        })?)
    }

    fn commit(&self, op: TableOp) -> Result<Option<RecordId>> {
        let mut state = self.state.write();
        self.commit_locked(&mut state, op)
    }

    fn commit_locked(&self, state: &mut TableState, op: TableOp) -> Result<Option<RecordId>> {
        let mut storage = self.storage.lock();
        match storage.as_mut() {
            Some(durable) => {
                let due = durable.log(&op)?;
                let result = state.apply(op)?;
                if due {
                    durable.checkpoint(&self.snapshot(state)?)?;
                }
                Ok(result)
            }
            None => state.apply(op),
        }
    }

    /// Writes a snapshot now, e.g. after the column set changed.
    pub(crate) fn checkpoint(&self) -> Result<()> {
        let state = self.state.read();
        let mut storage = self.storage.lock();
        if let Some(durable) = storage.as_mut() {
            durable.checkpoint(&self.snapshot(&state)?)?;
        }
        Ok(())
    }

    pub(crate) fn flush(&self) -> Result<()> {
        if self.is_removed() {
            return Ok(());
        }
        {
            let state = self.state.read();
            let mut storage = self.storage.lock();
            if let Some(durable) = storage.as_mut() {
                if durable.pending() > 0 {
                    durable.checkpoint(&self.snapshot(&state)?)?;
                }
                durable.sync()?;
            }
        }
        let columns: Vec<Column> = self.columns.read().values().cloned().collect();
        for column in columns {
            column.flush()?;
        }
        Ok(())
    }

    pub(crate) fn contains(&self, id: RecordId) -> bool {
        self.state.read().keys.contains(id)
    }

    pub(crate) fn size(&self) -> usize {
        self.state.read().keys.size()
    }

    pub(crate) fn ids(&self) -> Vec<RecordId> {
        self.state.read().keys.ids()
    }

    fn key_type(&self) -> Result<&DataType> {
        self.key_type.as_ref().ok_or_else(|| {
            Error::invalid_argument(format!("{} tables have no key", self.kind.name()))
        })
    }

    /// Maps a caller key onto the stored key type. Keys of a table keyed
    /// by another table may be given as the referenced table's key.
    fn normalize_key(&self, key: &Value) -> Result<Value> {
        let key_type = self.key_type()?;
        match (key_type, key) {
            (DataType::Reference(_), Value::Record(_)) => Ok(key.clone()),
            (DataType::Reference(target), other) => {
                let target = self.database()?.reference_table(target)?;
                target.inner.resolve_reference(other)
            }
            (key_type, key) => key_type.cast(key.clone()),
        }
    }

    pub(crate) fn encode_key(&self, key: &Value) -> Result<Vec<u8>> {
        let key = self.normalize_key(key)?;
        self.key_type()?.encode_key(&key)
    }

    pub(crate) fn find(&self, key: &Value) -> Result<Option<RecordId>> {
        let bytes = self.encode_key(key)?;
        Ok(self.state.read().keys.find(&bytes))
    }

    /// Lexicon lookup; tokens that cannot be keys are simply absent.
    pub(crate) fn find_term(&self, text: &str) -> Option<RecordId> {
        let key_type = self.key_type.as_ref()?;
        let bytes = key_type.encode_key(&Value::from(text)).ok()?;
        self.state.read().keys.find(&bytes)
    }

    pub(crate) fn key(&self, id: RecordId) -> Result<Option<Value>> {
        let key_type = match &self.key_type {
            Some(key_type) => key_type,
            None => return Ok(None),
        };
        let state = self.state.read();
        match state.keys.key(id) {
            Some(bytes) => key_type.decode_key(bytes).map(Some),
            None => Ok(None),
        }
    }

    pub(crate) fn add_key(&self, key: &Value) -> Result<(RecordId, bool)> {
        self.check_live()?;
        let normalized = self.normalize_key(key)?;
        let bytes = self.key_type()?.encode_key(&normalized)?;
        let id = {
            let mut state = self.state.write();
            if let Some(id) = state.keys.find(&bytes) {
                return Ok((id, false));
            }
            self.commit_locked(&mut state, TableOp::Add(Some(bytes)))?
                .ok_or_else(|| Error::new(ErrorKind::Internal, "add returned no id"))?
        };
        self.index_key(id, &normalized)?;
        Ok((id, true))
    }

    pub(crate) fn add_record(&self) -> Result<RecordId> {
        self.check_live()?;
        if self.kind.is_keyed() {
            return Err(Error::invalid_argument(format!(
                "{} tables require a key", self.kind.name()
            )));
        }
        self.commit(TableOp::Add(None))?
            .ok_or_else(|| Error::new(ErrorKind::Internal, "add returned no id"))
    }

    /// Resolves a value written to a column referencing this table.
    pub(crate) fn resolve_reference(&self, value: &Value) -> Result<Value> {
        match (self.kind, value) {
            (_, Value::Record(id)) => {
                if self.contains(*id) {
                    Ok(Value::Record(*id))
                } else {
                    Err(Error::not_found(format!("{} has no record {}", self.display_name(), id)))
                }
            }
            (TableKind::Array, Value::Int(_) | Value::UInt(_)) => {
                let id = DataType::UInt32.cast(value.clone())?;
                let id = RecordId(id.as_i64().unwrap_or_default() as u32);
                self.resolve_reference(&Value::Record(id))
            }
            (TableKind::Array, other) => Err(Error::invalid_argument(format!(
                "array table {} is referenced by id, got {}", self.display_name(), other.type_name()
            ))),
            (_, key) => self.add_key(key).map(|(id, _)| Value::Record(id)),
        }
    }

    fn index_key(&self, id: RecordId, key: &Value) -> Result<()> {
        let hooks: Vec<(Arc<IndexColumnInner>, u32)> = self
            .key_hooks
            .read()
            .iter()
            .filter_map(|hook| hook.live().map(|index| (index, hook.section)))
            .collect();
        for (index, section) in hooks {
            let delta = index.prepare(section, id, Some(key))?;
            index.mark_dirty()?;
            index.apply(delta);
        }
        Ok(())
    }

    pub(crate) fn data_columns(&self) -> Vec<DataColumn> {
        self.columns
            .read()
            .values()
            .filter_map(|c| c.as_data().cloned())
            .collect()
    }

    pub(crate) fn index_columns(&self) -> Vec<IndexColumn> {
        self.columns
            .read()
            .values()
            .filter_map(|c| c.as_index().cloned())
            .collect()
    }

    /// Every live index fed by this table's keys or columns.
    pub(crate) fn source_indexes(&self) -> Vec<Arc<IndexColumnInner>> {
        let mut indexes: Vec<Arc<IndexColumnInner>> = Vec::new();
        let mut push = |hook: &IndexHook| {
            if let Some(index) = hook.live() {
                if !indexes.iter().any(|i| Arc::ptr_eq(i, &index)) {
                    indexes.push(index);
                }
            }
        };
        for hook in self.key_hooks.read().iter() {
            push(hook);
        }
        for column in self.data_columns() {
            for hook in column.inner.hooks.read().iter() {
                push(hook);
            }
        }
        indexes
    }

    fn delete(&self, id: RecordId) -> Result<()> {
        self.check_live()?;
        if !self.contains(id) {
            return Err(Error::not_found(format!("{} has no record {}", self.display_name(), id)));
        }
        for index in self.source_indexes() {
            index.remove_record(id)?;
        }
        for index in self.index_columns() {
            index.inner.remove_term(id)?;
        }
        for column in self.data_columns() {
            column.inner.store.set(id, None)?;
        }
        self.commit(TableOp::Delete(id))?;
        Ok(())
    }

    fn truncate(&self) -> Result<()> {
        self.check_live()?;
        for index in self.source_indexes() {
            index.clear()?;
        }
        for index in self.index_columns() {
            index.inner.clear()?;
        }
        for column in self.data_columns() {
            column.inner.store.truncate()?;
        }
        self.commit(TableOp::Truncate)?;
        tracing::debug!(table = %self.display_name(), "truncated");
        Ok(())
    }

    /// Type of the value a record accessor path resolves to.
    pub(crate) fn resolve_type(&self, path: &str) -> Result<DataType> {
        let path = path.strip_prefix('.').unwrap_or(path);
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        let data_type = match head {
            "_id" | "_nsubrecs" => DataType::UInt32,
            "_score" => DataType::Float,
            "_value" => DataType::ShortText,
            "_key" => self.key_type()?.clone(),
            column => match self.columns.read().get(column) {
                Some(Column::Data(column)) => column.data_type().clone(),
                Some(Column::Index(_)) => {
                    return Err(Error::invalid_argument(format!("{} is an index column", column)));
                }
                None => {
                    return Err(Error::not_found(format!(
                        "{} has no column '{}'", self.display_name(), column
                    )));
                }
            },
        };
        match rest {
            None => Ok(data_type),
            Some(rest) => match &data_type {
                DataType::Reference(target) => self.database()?.reference_table(target)?.inner.resolve_type(rest),
                other => Err(Error::invalid_argument(format!(
                    "cannot dereference '{}' of type {}", head, other
                ))),
            },
        }
    }

    fn column_path(&self, column: &str, explicit: Option<PathBuf>, persistent: Option<bool>) -> Result<Option<PathBuf>> {
        if explicit.is_some() {
            return Ok(explicit);
        }
        let persistent = persistent.unwrap_or(self.path.is_some());
        if !persistent {
            return Ok(None);
        }
        let db = self.database()?;
        match (&self.name, &db.layout, &self.path) {
            (Some(name), Some(layout), _) => Ok(Some(layout.column_path(name, column))),
            (_, _, Some(path)) => Ok(Some(sibling_path(path, &format!(".{}", column)))),
            _ => Err(Error::invalid_configuration(format!(
                "column {} of a temporary table needs an explicit path to be persistent", column
            ))),
        }
    }

    fn insert_column(&self, name: &str, column: Column) -> Result<()> {
        {
            let mut columns = self.columns.write();
            if columns.contains_key(name) {
                return Err(Error::new(ErrorKind::AlreadyExists, format!(
                    "{}.{} already exists", self.display_name(), name
                )));
            }
            columns.insert(name.to_string(), column);
        }
        self.checkpoint()
    }

    fn ensure_column_free(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        if self.columns.read().contains_key(name) {
            return Err(Error::new(ErrorKind::AlreadyExists, format!(
                "{}.{} already exists", self.display_name(), name
            )));
        }
        Ok(())
    }
}

fn stored_tag(path: &Path) -> Result<ObjectTag> {
    let region = Region::open(path)?;
    match region.header()? {
        Some(header) => Ok(header.tag),
        None => Err(Error::new(ErrorKind::Corrupt, format!("{} is empty", path.display()))),
    }
}

impl Drop for TableInner {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!(table = %self.display_name(), error = %e, "failed to flush table");
        }
    }
}

/// Handle on a table. Cloning is cheap; every clone sees the same records.
/// The handle carries the name it was opened under, which may differ from
/// the catalog identity.
#[derive(Clone)]
pub struct Table {
    pub(crate) inner: Arc<TableInner>,
    name: Option<String>,
}

impl Table {
    pub(crate) fn from_inner(inner: Arc<TableInner>) -> Self {
        let name = inner.name.clone();
        Table { inner, name }
    }

    pub(crate) fn with_name(inner: Arc<TableInner>, name: Option<String>) -> Self {
        Table { inner, name }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn kind(&self) -> TableKind {
        self.inner.kind
    }

    pub fn key_type(&self) -> Option<&DataType> {
        self.inner.key_type.as_ref()
    }

    pub fn value_type(&self) -> Option<&ValueType> {
        self.inner.value_type.as_ref()
    }

    pub fn default_tokenizer(&self) -> Option<&str> {
        self.inner.default_tokenizer.as_deref()
    }

    pub fn token_filters(&self) -> &[String] {
        &self.inner.token_filters
    }

    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }

    pub fn is_persistent(&self) -> bool {
        self.inner.path.is_some()
    }

    pub fn is_removed(&self) -> bool {
        self.inner.is_removed()
    }

    /// Same underlying table, regardless of handle names.
    pub fn same_table(&self, other: &Table) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Adds an anonymous record to an array table.
    pub fn add_record(&self) -> Result<RecordId> {
        self.inner.add_record()
    }

    /// Returns the id of `key`, adding the record when it is new.
    pub fn add(&self, key: impl Into<Value>) -> Result<RecordId> {
        self.inner.add_key(&key.into()).map(|(id, _)| id)
    }

    /// Like `add`, also reporting whether the record was created.
    pub fn add_if_absent(&self, key: impl Into<Value>) -> Result<(RecordId, bool)> {
        self.inner.add_key(&key.into())
    }

    /// Adds (or finds) a record and writes column values in one call.
    /// Arrays take `None` as key.
    pub fn add_with(&self, key: Option<Value>, values: &[(&str, Value)]) -> Result<RecordId> {
        let id = match key {
            Some(key) => self.add(key)?,
            None => self.add_record()?,
        };
        for (column, value) in values {
            self.set(id, column, value.clone())?;
        }
        Ok(id)
    }

    pub fn set_column_value(&self, key: impl Into<Value>, column: &str, value: impl Into<Value>) -> Result<RecordId> {
        let id = self.add(key)?;
        self.set(id, column, value)?;
        Ok(id)
    }

    pub fn find(&self, key: impl Into<Value>) -> Result<Option<RecordId>> {
        self.inner.find(&key.into())
    }

    pub fn key(&self, id: RecordId) -> Result<Option<Value>> {
        self.inner.key(id)
    }

    pub fn exists(&self, id: RecordId) -> bool {
        self.inner.contains(id)
    }

    /// Removes the record, its column values and its postings.
    pub fn delete(&self, id: RecordId) -> Result<()> {
        self.inner.delete(id)
    }

    pub fn delete_key(&self, key: impl Into<Value>) -> Result<bool> {
        match self.find(key)? {
            Some(id) => self.delete(id).map(|_| true),
            None => Ok(false),
        }
    }

    /// Drops every record, column value and dependent posting. Ids restart at 1.
    pub fn truncate(&self) -> Result<()> {
        self.inner.truncate()
    }

    pub fn size(&self) -> usize {
        self.inner.size()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Live ids in table order: insertion order for arrays and hashes,
    /// key order for tries.
    pub fn ids(&self) -> Vec<RecordId> {
        self.inner.ids()
    }

    pub fn record(&self, id: RecordId) -> Option<Record> {
        self.exists(id).then(|| Record::new(self.clone(), id))
    }

    pub fn records(&self) -> RecordSet {
        RecordSet::from_ids(self.clone(), self.ids())
    }

    pub fn select<F>(&self, mut predicate: F) -> Result<RecordSet>
    where
        F: FnMut(&Record) -> Result<bool>,
    {
        let mut set = RecordSet::new(self.clone());
        for id in self.ids() {
            if predicate(&Record::new(self.clone(), id))? {
                set.add(id, 1.0);
            }
        }
        Ok(set)
    }

    pub fn sort(&self, options: &SortOptions) -> Result<RecordSet> {
        self.records().sort(options)
    }

    /// Writes the fixed-size value slot, truncating or zero-padding `bytes`.
    pub fn set_value(&self, id: RecordId, bytes: &[u8]) -> Result<()> {
        let value_type = self.inner.value_type.as_ref().ok_or_else(|| {
            Error::invalid_argument(format!("{} has no value type", self.inner.display_name()))
        })?;
        self.inner.check_live()?;
        let mut slot = bytes[..bytes.len().min(value_type.size)].to_vec();
        slot.resize(value_type.size, 0);

        let mut state = self.inner.state.write();
        if !state.keys.contains(id) {
            return Err(Error::not_found(format!("{} has no record {}", self.inner.display_name(), id)));
        }
        self.inner.commit_locked(&mut state, TableOp::SetValue(id, slot))?;
        Ok(())
    }

    pub fn value(&self, id: RecordId) -> Option<Vec<u8>> {
        let state = self.inner.state.read();
        if !state.keys.contains(id) {
            return None;
        }
        match (&self.inner.value_type, state.value(id)) {
            (_, Some(bytes)) => Some(bytes.to_vec()),
            (Some(value_type), None) => Some(vec![0; value_type.size]),
            (None, None) => None,
        }
    }

    /// Adds (or finds) `key` and writes its value slot.
    pub fn set_key_value(&self, key: impl Into<Value>, bytes: &[u8]) -> Result<RecordId> {
        let id = self.add(key)?;
        self.set_value(id, bytes)?;
        Ok(id)
    }

    pub fn prefix_search(&self, prefix: impl Into<Value>) -> Result<RecordSet> {
        let bytes = self.inner.encode_key(&prefix.into())?;
        let ids = self.inner.state.read().keys.prefix_search(&bytes)?;
        Ok(RecordSet::from_ids(self.clone(), ids))
    }

    /// Records whose key is a prefix of `query`, shortest first.
    pub fn common_prefix_search(&self, query: impl Into<Value>) -> Result<RecordSet> {
        let bytes = self.inner.encode_key(&query.into())?;
        let ids = self.inner.state.read().keys.common_prefix_search(&bytes)?;
        Ok(RecordSet::from_ids(self.clone(), ids))
    }

    pub fn range(&self, min: Bound<Value>, max: Bound<Value>) -> Result<RecordSet> {
        let encode = |bound: Bound<Value>| -> Result<Bound<Vec<u8>>> {
            Ok(match bound {
                Bound::Included(v) => Bound::Included(self.inner.encode_key(&v)?),
                Bound::Excluded(v) => Bound::Excluded(self.inner.encode_key(&v)?),
                Bound::Unbounded => Bound::Unbounded,
            })
        };
        let min = encode(min)?;
        let max = encode(max)?;
        let ids = self
            .inner
            .state
            .read()
            .keys
            .range(min.as_ref().map(|v| v.as_slice()), max.as_ref().map(|v| v.as_slice()))?;
        Ok(RecordSet::from_ids(self.clone(), ids))
    }

    pub fn define_column(&self, name: &str, options: ColumnOptions) -> Result<DataColumn> {
        self.inner.check_live()?;
        options.validate()?;
        self.inner.ensure_column_free(name)?;
        let db = self.inner.database()?;
        if let DataType::Reference(target) = &options.data_type {
            db.reference_table(target)?;
        }

        let vector = options.kind == ColumnKind::Vector;
        let store = match self.inner.column_path(name, options.path, options.persistent)? {
            Some(path) => db.create_column_store(&path, options.data_type.clone(), vector)?,
            None => db.temporary_column_store(options.data_type.clone(), vector),
        };
        let column = DataColumn::from_inner(DataColumnInner::new(&self.inner, name, store));
        self.inner.insert_column(name, Column::Data(column.clone()))?;
        tracing::debug!(column = %column.name(), data_type = %column.data_type(), "defined column");
        Ok(column)
    }

    /// Binds a column that already exists at `path` (possibly owned by
    /// another table) into this table. Both handles share one store.
    pub fn add_column(&self, name: &str, path: impl AsRef<Path>) -> Result<DataColumn> {
        self.inner.check_live()?;
        self.inner.ensure_column_free(name)?;
        let store = self.inner.database()?.open_column_store(path.as_ref())?;
        let column = DataColumn::from_inner(DataColumnInner::new(&self.inner, name, store));
        self.inner.insert_column(name, Column::Data(column.clone()))?;
        Ok(column)
    }

    /// Defines an index column on this table, which becomes the lexicon
    /// for terms taken from `source`.
    pub fn define_index_column(&self, name: &str, source: &Table, options: IndexColumnOptions) -> Result<IndexColumn> {
        self.inner.check_live()?;
        options.validate()?;
        self.inner.ensure_column_free(name)?;
        if !self.inner.kind.is_keyed() {
            return Err(Error::invalid_configuration(format!(
                "index lexicon {} must be a keyed table", self.inner.display_name()
            )));
        }

        let path = self.inner.column_path(name, options.path.clone(), options.persistent)?;
        let index = IndexColumnInner::create(&self.inner, name, &source.inner, &options, path)?;
        index.bind(&source.inner)?;
        let column = IndexColumn::from_inner(index);
        if let Err(e) = self.inner.insert_column(name, Column::Index(column.clone())) {
            column.inner.unbind();
            return Err(e);
        }
        if !source.is_empty() {
            column.inner.rebuild()?;
        }
        tracing::debug!(column = %column.name(), sources = ?column.sources(), "defined index column");
        Ok(column)
    }

    pub fn column(&self, name: &str) -> Option<Column> {
        self.inner.columns.read().get(name).cloned()
    }

    pub fn data_column(&self, name: &str) -> Result<DataColumn> {
        match self.column(name) {
            Some(Column::Data(column)) => Ok(column),
            Some(Column::Index(_)) => Err(Error::type_mismatch(format!("{} is an index column", name))),
            None => Err(Error::not_found(format!(
                "{} has no column '{}'", self.inner.display_name(), name
            ))),
        }
    }

    pub fn index_column(&self, name: &str) -> Result<IndexColumn> {
        match self.column(name) {
            Some(Column::Index(column)) => Ok(column),
            Some(Column::Data(_)) => Err(Error::type_mismatch(format!("{} is not an index column", name))),
            None => Err(Error::not_found(format!(
                "{} has no column '{}'", self.inner.display_name(), name
            ))),
        }
    }

    pub fn columns(&self) -> Vec<Column> {
        self.inner.columns.read().values().cloned().collect()
    }

    pub fn remove_column(&self, name: &str) -> Result<()> {
        let column = self.inner.columns.write().remove(name).ok_or_else(|| {
            Error::not_found(format!("{} has no column '{}'", self.inner.display_name(), name))
        })?;
        column.remove_files()?;
        self.inner.checkpoint()?;
        tracing::debug!(column = %column.name(), "removed column");
        Ok(())
    }

    /// Value of `column` for record `id`.
    pub fn get(&self, id: RecordId, column: &str) -> Result<Option<Value>> {
        Ok(self.data_column(column)?.get(id))
    }

    pub fn set(&self, id: RecordId, column: &str, value: impl Into<Value>) -> Result<()> {
        self.data_column(column)?.set(id, value)
    }

    pub fn lock(&self) -> Result<()> {
        self.inner.lock.lock()
    }

    pub fn unlock(&self) {
        self.inner.lock.unlock()
    }

    pub fn is_locked(&self) -> bool {
        self.inner.lock.is_locked()
    }

    pub fn clear_lock(&self) -> Result<()> {
        self.inner.lock.clear()
    }

    pub fn lock_guard(&self) -> Result<LockGuard<'_>> {
        self.inner.lock.guard()
    }

    /// Runs `f` with the table locked; the lock is released on every exit.
    pub fn with_lock<T>(&self, f: impl FnOnce(&Table) -> Result<T>) -> Result<T> {
        self.inner.lock.with(|| f(self))
    }

    /// Destroys the table, its columns and every backing file.
    ///
    /// Dropping the catalog entry is the commit point: if that fails the
    /// table is left as it was. File removal comes after and keeps going
    /// past failures, so an error from there leaves stray files but never a
    /// half-removed table.
    pub fn remove(self) -> Result<()> {
        if self.inner.lock.is_locked() {
            return Err(Error::deadlock_avoided(self.inner.display_name()));
        }
        self.inner.check_live()?;
        if let Some(db) = self.inner.db.upgrade() {
            db.forget_table(&self.inner)?;
        }
        self.inner.removed.store(true, Ordering::Release);
        self.inner.key_hooks.write().clear();

        let columns = std::mem::take(&mut *self.inner.columns.write());
        let mut results: Vec<Result<()>> = columns.into_values().map(|column| column.remove_files()).collect();
        if let Some(durable) = self.inner.storage.lock().take() {
            results.push(durable.remove());
        }
        let mut failures = results.into_iter().filter_map(Result::err);
        match failures.next() {
            None => {
                tracing::debug!(table = %self.inner.display_name(), "removed table");
                Ok(())
            }
            Some(first) => {
                for other in failures {
                    tracing::warn!(table = %self.inner.display_name(), error = %other, "failed to remove file");
                }
                Err(first)
            }
        }
    }

    pub fn flush(&self) -> Result<()> {
        self.inner.flush()
    }
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.same_table(other)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "#<Table name: <{}>, kind: {}, size: {}, path: ",
            self.name.as_deref().unwrap_or("(anonymous)"),
            self.inner.kind.name(),
            self.size()
        )?;
        match &self.inner.path {
            Some(path) => write!(f, "<{}>>", path.display()),
            None => write!(f, "(temporary)>"),
        }
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
