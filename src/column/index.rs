use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use parking_lot::{Mutex, RwLock};
use crate::analysis::analyzer::Analyzer;
use crate::analysis::token::TokenizeMode;
use crate::column::data::DataColumn;
use crate::column::options::{ColumnDef, IndexColumnOptions};
use crate::column::{describe_path, Column, IndexHook};
use crate::compression::compress::CompressionType;
use crate::core::database::DatabaseInner;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{DataType, RecordId, Value};
use crate::index::inverted::{IndexDelta, InvertedIndex, QueryTerm};
use crate::index::posting::Posting;
use crate::search::options::SearchOptions;
use crate::search::results::RecordSet;
use crate::storage::region::{ObjectTag, Region};
use crate::table::table::{Table, TableInner};

struct IndexStorage {
    region: Region,
    dirty: bool,
}

enum SourceTarget {
    Key,
    Column(DataColumn),
}

/// Inverted index over the values of one source table, keyed by the terms
/// of its lexicon (the table owning the column).
///
/// Not journaled: the region is flagged dirty on the first change after a
/// snapshot and rewritten on flush. A dirty index found on open is rebuilt
/// from its sources.
pub(crate) struct IndexColumnInner {
    name: String,
    full_name: String,
    lexicon: Weak<TableInner>,
    source: RwLock<Option<Weak<TableInner>>>,
    source_table: Option<String>,
    source_path: Option<PathBuf>,
    sources: Vec<String>,
    tokenizer: Option<String>,
    token_filters: Vec<String>,
    analyzer: Analyzer,
    with_section: bool,
    with_position: bool,
    index: RwLock<InvertedIndex>,
    storage: Mutex<Option<IndexStorage>>,
    path: Option<PathBuf>,
    compression: CompressionType,
    needs_rebuild: AtomicBool,
    removed: AtomicBool,
}

impl IndexColumnInner {
    pub(crate) fn create(
        lexicon: &Arc<TableInner>,
        name: &str,
        source: &Arc<TableInner>,
        options: &IndexColumnOptions,
        path: Option<PathBuf>,
    ) -> Result<Arc<Self>> {
        let db = lexicon.database()?;
        let tokenizer = options
            .tokenizer
            .clone()
            .or_else(|| lexicon.default_tokenizer.clone())
            .or_else(|| db.config.default_tokenizer.clone());
        if let Some(name) = &tokenizer {
            if !db.registry.has_tokenizer(name) {
                return Err(Error::invalid_configuration(format!("unknown tokenizer '{}'", name)));
            }
        }
        let analyzer = db.registry.build(tokenizer.as_deref(), &lexicon.token_filters)?;
        let with_position = options.with_position.unwrap_or(tokenizer.is_some());

        let index = InvertedIndex::new();
        let storage = match &path {
            Some(path) => {
                if path.exists() {
                    return Err(Error::new(ErrorKind::AlreadyExists, format!(
                        "{} already exists", path.display()
                    )));
                }
                let mut region = Region::create(path)?;
                region.write_snapshot(ObjectTag::IndexColumn, &index.encode(), db.settings.compression)?;
                Some(IndexStorage { region, dirty: false })
            }
            None => None,
        };

        Ok(Arc::new(IndexColumnInner {
            name: name.to_string(),
            full_name: full_name(lexicon, name),
            lexicon: Arc::downgrade(lexicon),
            source: RwLock::new(None),
            source_table: source.name.clone(),
            source_path: source.path.clone(),
            sources: options.sources.clone(),
            tokenizer,
            token_filters: lexicon.token_filters.clone(),
            analyzer,
            with_section: options.with_section,
            with_position,
            index: RwLock::new(index),
            storage: Mutex::new(storage),
            path,
            compression: db.settings.compression,
            needs_rebuild: AtomicBool::new(false),
            removed: AtomicBool::new(false),
        }))
    }

    /// Restores an index column from its definition. The column stays
    /// unbound until its source table is wired in.
    pub(crate) fn load(lexicon: &Arc<TableInner>, def: ColumnDef, db: &Arc<DatabaseInner>) -> Result<Arc<Self>> {
        let ColumnDef::Index {
            name,
            source_table,
            source_path,
            sources,
            tokenizer,
            token_filters,
            with_section,
            with_position,
            path,
        } = def
        else {
            return Err(Error::new(ErrorKind::Internal, "not an index column definition"));
        };
        let analyzer = db.registry.build(tokenizer.as_deref(), &token_filters)?;

        let (index, storage) = match &path {
            Some(path) => {
                let region = Region::open(path)?;
                region.expect_tag(ObjectTag::IndexColumn)?;
                let decoded = region.read_snapshot().and_then(|snapshot| match snapshot {
                    Some((header, payload)) if header.is_clean() => InvertedIndex::decode(&payload).map(Some),
                    _ => Ok(None),
                });
                let index = match decoded {
                    Ok(index) => index,
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "unreadable index, rebuilding");
                        None
                    }
                };
                (index, Some(IndexStorage { region, dirty: false }))
            }
            None => (None, None),
        };
        let needs_rebuild = index.is_none();

        Ok(Arc::new(IndexColumnInner {
            full_name: full_name(lexicon, &name),
            name,
            lexicon: Arc::downgrade(lexicon),
            source: RwLock::new(None),
            source_table,
            source_path,
            sources,
            tokenizer,
            token_filters,
            analyzer,
            with_section,
            with_position,
            index: RwLock::new(index.unwrap_or_default()),
            storage: Mutex::new(storage),
            path,
            compression: db.settings.compression,
            needs_rebuild: AtomicBool::new(needs_rebuild),
            removed: AtomicBool::new(false),
        }))
    }

    pub(crate) fn def(&self) -> ColumnDef {
        ColumnDef::Index {
            name: self.name.clone(),
            source_table: self.source_table.clone(),
            source_path: self.source_path.clone(),
            sources: self.sources.clone(),
            tokenizer: self.tokenizer.clone(),
            token_filters: self.token_filters.clone(),
            with_section: self.with_section,
            with_position: self.with_position,
            path: self.path.clone(),
        }
    }

    pub(crate) fn is_removed(&self) -> bool {
        self.removed.load(Ordering::Acquire)
    }

    pub(crate) fn is_bound(&self) -> bool {
        self.source.read().as_ref().and_then(Weak::upgrade).is_some()
    }

    pub(crate) fn source_table_name(&self) -> Option<&str> {
        self.source_table.as_deref()
    }

    pub(crate) fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    fn lexicon(&self) -> Result<Arc<TableInner>> {
        self.lexicon
            .upgrade()
            .ok_or_else(|| Error::not_found(format!("lexicon of {} was removed", self.full_name)))
    }

    fn source(&self) -> Result<Arc<TableInner>> {
        self.source
            .read()
            .as_ref()
            .and_then(Weak::upgrade)
            .filter(|table| !table.is_removed())
            .ok_or_else(|| Error::not_found(format!(
                "source table {} of {} is not available",
                self.source_table.as_deref().unwrap_or("(anonymous)"),
                self.full_name
            )))
    }

    fn resolve_sources(&self, source: &TableInner) -> Result<Vec<(u32, SourceTarget)>> {
        let lexicon = self.lexicon()?;
        let mut targets = Vec::with_capacity(self.sources.len());
        for (ordinal, spec) in self.sources.iter().enumerate() {
            let column = match spec.split_once('.') {
                Some((table, column)) => {
                    if source.name.as_deref() != Some(table) {
                        return Err(Error::invalid_configuration(format!(
                            "source {} does not belong to {}", spec, source.display_name()
                        )));
                    }
                    column
                }
                None => spec.as_str(),
            };

            let (target, value_type) = if column == "_key" {
                match &source.key_type {
                    Some(key_type) => (SourceTarget::Key, key_type.clone()),
                    None => {
                        return Err(Error::invalid_configuration(format!(
                            "{} has no key to index", source.display_name()
                        )));
                    }
                }
            } else {
                match source.columns.read().get(column) {
                    Some(Column::Data(c)) => (SourceTarget::Column(c.clone()), c.data_type().clone()),
                    Some(Column::Index(_)) => {
                        return Err(Error::invalid_configuration(format!(
                            "{} is an index column and cannot be indexed", spec
                        )));
                    }
                    None => {
                        return Err(Error::not_found(format!(
                            "{} has no column '{}'", source.display_name(), column
                        )));
                    }
                }
            };

            // Reference values are lexicon record ids, so the lexicon must be
            // the referenced table.
            if let DataType::Reference(target) = &value_type {
                if lexicon.name.as_deref() != Some(target.as_str()) {
                    return Err(Error::invalid_configuration(format!(
                        "{} references {}, but the lexicon is {}", spec, target, lexicon.display_name()
                    )));
                }
            }
            targets.push((ordinal as u32 + 1, target));
        }
        Ok(targets)
    }

    /// Registers this index with every source; nothing is registered when
    /// any source fails to resolve.
    pub(crate) fn bind(self: &Arc<Self>, source: &Arc<TableInner>) -> Result<()> {
        let targets = self.resolve_sources(source)?;
        for (section, target) in targets {
            let hook = IndexHook { index: Arc::downgrade(self), section };
            match target {
                SourceTarget::Key => source.key_hooks.write().push(hook),
                SourceTarget::Column(column) => column.inner.hooks.write().push(hook),
            }
        }
        *self.source.write() = Some(Arc::downgrade(source));

        if self.needs_rebuild.load(Ordering::Acquire) {
            self.rebuild()?;
        }
        Ok(())
    }

    /// Stops receiving updates; hooks pointing here go dead.
    pub(crate) fn unbind(&self) {
        self.removed.store(true, Ordering::Release);
    }

    /// Reindexes every source value from scratch.
    pub(crate) fn rebuild(&self) -> Result<()> {
        let source = self.source()?;
        let targets = self.resolve_sources(&source)?;
        self.mark_dirty()?;
        self.index.write().clear();

        let ids = source.ids();
        for id in &ids {
            for (section, target) in &targets {
                let value = match target {
                    SourceTarget::Key => source.key(*id)?,
                    SourceTarget::Column(column) => column.get(*id),
                };
                let delta = self.prepare(*section, *id, value.as_ref())?;
                self.apply(delta);
            }
        }
        self.needs_rebuild.store(false, Ordering::Release);
        tracing::debug!(column = %self.full_name, records = ids.len(), "rebuilt index");
        Ok(())
    }

    /// Tokenizes `value` into the postings record `id` should hold in
    /// `section`. New tokens are added to the lexicon right away and stay
    /// there even if the delta is never applied; the index itself is not
    /// touched.
    pub(crate) fn prepare(&self, section: u32, id: RecordId, value: Option<&Value>) -> Result<IndexDelta> {
        let section = if self.with_section { section } else { 0 };
        let mut delta = IndexDelta::clear(id, section);
        let value = match value {
            Some(value) => value,
            None => return Ok(delta),
        };
        let lexicon = self.lexicon()?;

        let items: Vec<&Value> = match value {
            Value::Vector(items) => items.iter().collect(),
            single => vec![single],
        };
        let mut occurrences: BTreeMap<RecordId, Vec<u32>> = BTreeMap::new();
        // Vector elements continue the position sequence of the previous one.
        let mut base = 0u32;
        for item in items {
            if let Value::Record(term) = item {
                occurrences.entry(*term).or_default().push(base);
                base += 1;
                continue;
            }
            let text = match item.to_index_text() {
                Some(text) => text,
                None => continue,
            };
            let mut next = base;
            for token in self.analyzer.analyze(&text, TokenizeMode::Add) {
                let (term, _) = lexicon.add_key(&Value::Text(token.text))?;
                let position = base + token.position;
                occurrences.entry(term).or_default().push(position);
                next = next.max(position + 1);
            }
            base = next;
        }

        delta.added = occurrences
            .into_iter()
            .map(|(term, positions)| {
                let mut posting = Posting::new(id, section, positions);
                if !self.with_position {
                    posting.positions.clear();
                }
                (term, posting)
            })
            .collect();
        Ok(delta)
    }

    pub(crate) fn mark_dirty(&self) -> Result<()> {
        let mut storage = self.storage.lock();
        if let Some(storage) = storage.as_mut() {
            if !storage.dirty {
                storage.region.set_flags(0)?;
                storage.region.flush()?;
                storage.dirty = true;
            }
        }
        Ok(())
    }

    pub(crate) fn apply(&self, delta: IndexDelta) {
        self.index.write().apply(delta);
    }

    pub(crate) fn remove_record(&self, id: RecordId) -> Result<()> {
        self.mark_dirty()?;
        self.index.write().remove_record(id);
        Ok(())
    }

    pub(crate) fn remove_term(&self, term: RecordId) -> Result<()> {
        if self.index.read().postings(term).is_none() {
            return Ok(());
        }
        self.mark_dirty()?;
        self.index.write().remove_term(term);
        Ok(())
    }

    pub(crate) fn clear(&self) -> Result<()> {
        self.mark_dirty()?;
        self.index.write().clear();
        Ok(())
    }

    pub(crate) fn flush(&self) -> Result<()> {
        let index = self.index.read();
        let mut storage = self.storage.lock();
        if let Some(storage) = storage.as_mut() {
            if storage.dirty {
                storage.region.write_snapshot(ObjectTag::IndexColumn, &index.encode(), self.compression)?;
                storage.dirty = false;
                tracing::debug!(column = %self.full_name, terms = index.term_count(), "saved index");
            }
        }
        Ok(())
    }

    pub(crate) fn remove_files(&self) -> Result<()> {
        self.unbind();
        match self.storage.lock().take() {
            Some(storage) => storage.region.remove(),
            None => Ok(()),
        }
    }

    fn search(&self, query: &str, options: &SearchOptions) -> Result<RecordSet> {
        let source = self.source()?;
        let lexicon = self.lexicon()?;
        let terms: Vec<QueryTerm> = self
            .analyzer
            .analyze(query, TokenizeMode::Query)
            .iter()
            .map(|token| QueryTerm {
                term: lexicon.find_term(&token.text),
                position: token.position,
            })
            .collect();

        let hits = self.index.read().search(
            &terms,
            options.operator,
            options.scorer.as_ref(),
            self.with_position,
        );
        tracing::trace!(column = %self.full_name, query, hits = hits.len(), "search");
        Ok(RecordSet::from_hits(Table::from_inner(source), hits))
    }
}

impl Drop for IndexColumnInner {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!(column = %self.full_name, error = %e, "failed to save index");
        }
    }
}

fn full_name(lexicon: &TableInner, name: &str) -> String {
    match &lexicon.name {
        Some(table) => format!("{}.{}", table, name),
        None => name.to_string(),
    }
}

/// Full-text index column. Values are never written to it directly; it
/// follows writes to its source columns.
#[derive(Clone)]
pub struct IndexColumn {
    pub(crate) inner: Arc<IndexColumnInner>,
}

impl IndexColumn {
    pub(crate) fn from_inner(inner: Arc<IndexColumnInner>) -> Self {
        IndexColumn { inner }
    }

    /// `Lexicon.column`
    pub fn name(&self) -> &str {
        &self.inner.full_name
    }

    pub fn local_name(&self) -> &str {
        &self.inner.name
    }

    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }

    pub fn is_persistent(&self) -> bool {
        self.inner.path.is_some()
    }

    pub fn sources(&self) -> &[String] {
        &self.inner.sources
    }

    pub fn tokenizer(&self) -> Option<&str> {
        self.inner.tokenizer.as_deref()
    }

    pub fn with_section(&self) -> bool {
        self.inner.with_section
    }

    pub fn with_position(&self) -> bool {
        self.inner.with_position
    }

    pub fn lexicon(&self) -> Option<Table> {
        self.inner.lexicon.upgrade().map(Table::from_inner)
    }

    pub fn source_table(&self) -> Option<Table> {
        self.inner.source().ok().map(Table::from_inner)
    }

    /// Number of distinct terms with postings.
    pub fn term_count(&self) -> usize {
        self.inner.index.read().term_count()
    }

    /// Records of the source table matching `query`, best first.
    pub fn search(&self, query: &str) -> Result<RecordSet> {
        self.inner.search(query, &SearchOptions::default())
    }

    pub fn search_with(&self, query: &str, options: &SearchOptions) -> Result<RecordSet> {
        self.inner.search(query, options)
    }

    /// Postings of a single lexicon term, e.g. `postings("engine")`.
    pub fn postings(&self, term: &str) -> Vec<Posting> {
        let lexicon = match self.inner.lexicon.upgrade() {
            Some(lexicon) => lexicon,
            None => return Vec::new(),
        };
        match lexicon.find_term(term) {
            Some(term) => self
                .inner
                .index
                .read()
                .postings(term)
                .map(|list| list.postings.clone())
                .unwrap_or_default(),
            None => Vec::new(),
        }
    }

    /// Reindexes all source values.
    pub fn rebuild(&self) -> Result<()> {
        self.inner.rebuild()
    }
}

impl PartialEq for IndexColumn {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Display for IndexColumn {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "#<Column name: <{}>, path: {}, type: <{}>, kind: index>",
            self.name(),
            describe_path(self.path()),
            self.inner.source_table.as_deref().unwrap_or("(anonymous)")
        )
    }
}

impl fmt::Debug for IndexColumn {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
