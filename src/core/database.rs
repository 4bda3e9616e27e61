use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use parking_lot::{Mutex, RwLock};
use crate::analysis::analyzer::AnalyzerRegistry;
use crate::analysis::filter::TokenFilter;
use crate::analysis::tokenizer::Tokenizer;
use crate::column::store::ColumnStore;
use crate::core::catalog::{relative_to, Catalog, CatalogEntry};
use crate::core::clock::{Clock, SystemClock};
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{DataType, TableKind};
use crate::storage::checkpoint::StorageSettings;
use crate::storage::layout::StorageLayout;
use crate::table::options::TableOptions;
use crate::table::table::{Table, TableInner, TableSpec};

pub(crate) struct DatabaseInner {
    pub(crate) config: Config,
    pub(crate) layout: Option<StorageLayout>,
    pub(crate) settings: StorageSettings,
    pub(crate) registry: AnalyzerRegistry,
    clock: Arc<dyn Clock>,
    catalog: Mutex<Catalog>,
    // Named tables
    tables: RwLock<BTreeMap<String, Table>>,
    // Every loaded persistent table, by canonical path
    opened: Mutex<HashMap<PathBuf, Weak<TableInner>>>,
    column_stores: Mutex<HashMap<PathBuf, Weak<ColumnStore>>>,
}

impl DatabaseInner {
    fn new(config: Config, layout: Option<StorageLayout>, catalog: Catalog, clock: Arc<dyn Clock>) -> Arc<Self> {
        Arc::new(DatabaseInner {
            settings: StorageSettings::from(&config),
            config,
            layout,
            registry: AnalyzerRegistry::new(),
            clock,
            catalog: Mutex::new(catalog),
            tables: RwLock::new(BTreeMap::new()),
            opened: Mutex::new(HashMap::new()),
            column_stores: Mutex::new(HashMap::new()),
        })
    }

    /// Named table of this database, e.g. the target of a reference type.
    pub(crate) fn reference_table(&self, name: &str) -> Result<Table> {
        self.tables
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("table '{}' not found", name)))
    }

    pub(crate) fn create_table(self: &Arc<Self>, options: TableOptions) -> Result<Table> {
        let key_type = options.validate()?;
        if let Some(DataType::Reference(target)) = &key_type {
            self.reference_table(target)?;
        }
        if let Some(tokenizer) = &options.default_tokenizer {
            if !self.registry.has_tokenizer(tokenizer) {
                return Err(Error::invalid_configuration(format!("unknown tokenizer '{}'", tokenizer)));
            }
        }
        // Filters are checked by building the pipeline once.
        self.registry.build(None, &options.token_filters)?;

        if let Some(name) = &options.name {
            if self.tables.read().contains_key(name) {
                return Err(Error::new(ErrorKind::AlreadyExists, format!("table '{}' already exists", name)));
            }
        }

        let persistent = match (&options.path, options.persistent) {
            (Some(_), _) => true,
            (None, Some(persistent)) => persistent,
            (None, None) => options.name.is_some() && self.layout.is_some(),
        };
        let path = match (options.path, persistent) {
            (Some(path), _) => Some(path),
            (None, false) => None,
            (None, true) => match (&options.name, &self.layout) {
                (Some(name), Some(layout)) => Some(layout.table_path(name)),
                _ => {
                    return Err(Error::invalid_configuration(
                        "a persistent table needs a path or a name in a persistent database",
                    ));
                }
            },
        };
        if let Some(path) = &path {
            if path.exists() {
                return Err(Error::new(ErrorKind::AlreadyExists, format!("{} already exists", path.display())));
            }
        }

        let inner = TableInner::create(self, TableSpec {
            name: options.name.clone(),
            kind: options.kind,
            key_type,
            value_type: options.value_type,
            default_tokenizer: options.default_tokenizer,
            token_filters: options.token_filters,
            path: path.clone(),
        })?;
        if let Some(path) = &path {
            self.opened.lock().insert(canonical(path), Arc::downgrade(&inner));
        }

        let table = Table::from_inner(inner);
        if let Some(name) = &options.name {
            self.tables.write().insert(name.clone(), table.clone());
            if let (Some(path), Some(layout)) = (&path, &self.layout) {
                let mut catalog = self.catalog.lock();
                catalog.insert(name, CatalogEntry {
                    kind: options.kind,
                    path: relative_to(path, &layout.base_dir),
                    created_at: self.clock.now(),
                });
                catalog.save(&layout.catalog_path())?;
            }
        }
        Ok(table)
    }

    /// Loaded table at `path`, loading it on first use.
    fn load_table(self: &Arc<Self>, path: &Path, name: Option<String>) -> Result<Arc<TableInner>> {
        let key = canonical(path);
        if let Some(inner) = self.opened.lock().get(&key).and_then(Weak::upgrade) {
            if !inner.is_removed() {
                return Ok(inner);
            }
        }
        if !path.exists() {
            return Err(Error::not_found(format!("no table at {}", path.display())));
        }
        let inner = TableInner::load(self, path, name)?;
        self.opened.lock().insert(key, Arc::downgrade(&inner));
        Ok(inner)
    }

    /// Binds index columns whose source table is available now.
    fn wire_indexes(&self) {
        let loaded: Vec<Arc<TableInner>> = self.opened.lock().values().filter_map(Weak::upgrade).collect();
        for lexicon in loaded {
            for column in lexicon.index_columns() {
                let index = &column.inner;
                if index.is_removed() || index.is_bound() {
                    continue;
                }
                let source = self.find_source(index.source_path(), index.source_table_name());
                let result = match source {
                    Some(source) => index.bind(&source),
                    None => {
                        tracing::warn!(column = %column.name(), "index source table is not loaded");
                        continue;
                    }
                };
                if let Err(e) = result {
                    tracing::warn!(column = %column.name(), error = %e, "failed to wire index column");
                }
            }
        }
    }

    fn find_source(&self, path: Option<&Path>, name: Option<&str>) -> Option<Arc<TableInner>> {
        if let Some(path) = path {
            if let Some(inner) = self.opened.lock().get(&canonical(path)).and_then(Weak::upgrade) {
                return Some(inner);
            }
        }
        name.and_then(|name| self.tables.read().get(name).map(|table| table.inner.clone()))
    }

    /// Shared store of the column at `path`.
    pub(crate) fn open_column_store(&self, path: &Path) -> Result<Arc<ColumnStore>> {
        let key = canonical(path);
        let mut stores = self.column_stores.lock();
        if let Some(store) = stores.get(&key).and_then(Weak::upgrade) {
            return Ok(store);
        }
        if !path.exists() {
            return Err(Error::not_found(format!("no column at {}", path.display())));
        }
        let store = Arc::new(ColumnStore::open(path, self.settings)?);
        stores.insert(key, Arc::downgrade(&store));
        Ok(store)
    }

    pub(crate) fn create_column_store(&self, path: &Path, data_type: DataType, vector: bool) -> Result<Arc<ColumnStore>> {
        if path.exists() {
            return Err(Error::new(ErrorKind::AlreadyExists, format!("{} already exists", path.display())));
        }
        let store = Arc::new(ColumnStore::create(path, data_type, vector, self.settings)?);
        self.column_stores.lock().insert(canonical(path), Arc::downgrade(&store));
        Ok(store)
    }

    pub(crate) fn temporary_column_store(&self, data_type: DataType, vector: bool) -> Arc<ColumnStore> {
        Arc::new(ColumnStore::temporary(data_type, vector))
    }

    /// Unregisters a table being removed. The catalog is saved before the
    /// name is released; on a failed save both stay as they were.
    pub(crate) fn forget_table(&self, inner: &TableInner) -> Result<()> {
        let registered = inner.name.as_ref().filter(|name| {
            self.tables
                .read()
                .get(name.as_str())
                .is_some_and(|table| std::ptr::eq(Arc::as_ptr(&table.inner), inner))
        });
        if let Some(name) = registered {
            if let Some(layout) = &self.layout {
                let mut catalog = self.catalog.lock();
                if let Some(entry) = catalog.remove(name) {
                    if let Err(e) = catalog.save(&layout.catalog_path()) {
                        catalog.insert(name, entry);
                        return Err(e);
                    }
                }
            }
            self.tables.write().remove(name);
        }
        if let Some(path) = &inner.path {
            self.opened.lock().remove(&canonical(path));
        }
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        let loaded: Vec<Arc<TableInner>> = self.opened.lock().values().filter_map(Weak::upgrade).collect();
        for table in loaded {
            table.flush()?;
        }
        for table in self.tables.read().values() {
            if !table.is_persistent() {
                table.flush()?;
            }
        }
        if let Some(layout) = &self.layout {
            self.catalog.lock().save(&layout.catalog_path())?;
        }
        Ok(())
    }
}

/// Stable identity of a file path; falls back to the path as given.
fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Handle on one database: the owner of its tables, catalog, column stores
/// and tokenizer registry. Every table and column reaches its database
/// through this handle; there is no process-wide default database.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

impl Database {
    /// Creates a database. With no `storage_path` everything stays in memory.
    pub fn create(config: Config) -> Result<Database> {
        Self::create_with_clock(config, Arc::new(SystemClock))
    }

    pub fn create_with_clock(config: Config, clock: Arc<dyn Clock>) -> Result<Database> {
        let layout = match &config.storage_path {
            Some(base) => {
                let layout = StorageLayout::new(base.clone())?;
                if layout.catalog_path().exists() {
                    return Err(Error::new(ErrorKind::AlreadyExists, format!(
                        "a database already exists at {}", base.display()
                    )));
                }
                Catalog::default().save(&layout.catalog_path())?;
                Some(layout)
            }
            None => None,
        };
        tracing::info!(path = ?config.storage_path, "created database");
        Ok(Database { inner: DatabaseInner::new(config, layout, Catalog::default(), clock) })
    }

    /// Opens an existing database, loading every cataloged table.
    pub fn open(config: Config) -> Result<Database> {
        Self::open_with_clock(config, Arc::new(SystemClock))
    }

    pub fn open_with_clock(config: Config, clock: Arc<dyn Clock>) -> Result<Database> {
        let base = config
            .storage_path
            .clone()
            .ok_or_else(|| Error::invalid_configuration("opening a database requires a storage path"))?;
        let layout = StorageLayout::new(base.clone())?;
        if !layout.catalog_path().exists() {
            return Err(Error::not_found(format!("no database at {}", base.display())));
        }
        let catalog = Catalog::load(&layout.catalog_path())?;
        let entries = catalog.tables.clone();
        let inner = DatabaseInner::new(config, Some(layout), catalog, clock);

        for (name, entry) in entries {
            let path = base.join(&entry.path);
            let table = inner.load_table(&path, Some(name.clone()))?;
            if table.kind != entry.kind {
                return Err(Error::type_mismatch(format!(
                    "{} is cataloged as {} but stored as {}", name, entry.kind.name(), table.kind.name()
                )));
            }
            inner.tables.write().insert(name, Table::from_inner(table));
        }
        inner.wire_indexes();
        tracing::info!(path = %base.display(), tables = inner.tables.read().len(), "opened database");
        Ok(Database { inner })
    }

    /// In-memory database; nothing touches the filesystem unless a table is
    /// given an explicit path.
    pub fn temporary() -> Database {
        Database {
            inner: DatabaseInner::new(Config::default(), None, Catalog::default(), Arc::new(SystemClock)),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn path(&self) -> Option<&Path> {
        self.inner.layout.as_ref().map(|layout| layout.base_dir.as_path())
    }

    pub fn clock(&self) -> &dyn Clock {
        self.inner.clock.as_ref()
    }

    pub fn create_table(&self, options: TableOptions) -> Result<Table> {
        self.inner.create_table(options)
    }

    /// Opens the table stored at `path`. The handle has no name; the stored
    /// data is the same as under any other handle on that path.
    pub fn open_table(&self, path: impl AsRef<Path>) -> Result<Table> {
        let inner = self.inner.load_table(path.as_ref(), None)?;
        self.inner.wire_indexes();
        Ok(Table::with_name(inner, None))
    }

    /// Like `open_table`, naming the handle `name` for its lifetime.
    pub fn open_table_named(&self, path: impl AsRef<Path>, name: &str) -> Result<Table> {
        let table = self.open_table(path)?;
        Ok(Table::with_name(table.inner, Some(name.to_string())))
    }

    /// Like `open_table`, failing with `TypeMismatch` unless the stored
    /// table is a `kind` table.
    pub fn open_table_as(&self, path: impl AsRef<Path>, kind: TableKind) -> Result<Table> {
        let path = path.as_ref();
        let table = self.open_table(path)?;
        if table.kind() != kind {
            return Err(Error::type_mismatch(format!(
                "{} holds a {} table, not {}", path.display(), table.kind().name(), kind.name()
            )));
        }
        Ok(table)
    }

    pub fn table(&self, name: &str) -> Option<Table> {
        self.inner.tables.read().get(name).cloned()
    }

    /// Named tables, by name.
    pub fn tables(&self) -> Vec<Table> {
        self.inner.tables.read().values().cloned().collect()
    }

    pub fn remove_table(&self, name: &str) -> Result<()> {
        let table = self
            .table(name)
            .ok_or_else(|| Error::not_found(format!("table '{}' not found", name)))?;
        table.remove()
    }

    pub fn register_tokenizer(&self, tokenizer: Box<dyn Tokenizer>) {
        self.inner.registry.register_tokenizer(tokenizer);
    }

    pub fn register_token_filter(&self, filter: Box<dyn TokenFilter>) {
        self.inner.registry.register_filter(filter);
    }

    pub fn tokenizer_names(&self) -> Vec<String> {
        self.inner.registry.tokenizer_names()
    }

    /// Checkpoints every table and saves the catalog.
    pub fn flush(&self) -> Result<()> {
        self.inner.flush()
    }

    pub fn close(self) -> Result<()> {
        self.inner.flush()?;
        tracing::info!(path = ?self.path(), "closed database");
        Ok(())
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path())
            .field("tables", &self.inner.tables.read().keys().collect::<Vec<_>>())
            .finish()
    }
}
