use std::fmt;
use std::sync::Arc;
use crate::index::inverted::SearchOperator;
use crate::scoring::scorer::{Scorer, TfScorer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    /// Accepts `ascending`/`asc` and `descending`/`desc`.
    pub fn parse(name: &str) -> Option<SortOrder> {
        match name {
            "ascending" | "asc" => Some(SortOrder::Ascending),
            "descending" | "desc" => Some(SortOrder::Descending),
            _ => None,
        }
    }
}

/// One sort criterion: an accessor path (`"id"`, `"_key"`, `"bookmark.title"`)
/// and a direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub key: String,
    pub order: SortOrder,
}

impl SortKey {
    pub fn ascending(key: &str) -> Self {
        SortKey { key: key.to_string(), order: SortOrder::Ascending }
    }

    pub fn descending(key: &str) -> Self {
        SortKey { key: key.to_string(), order: SortOrder::Descending }
    }
}

impl From<&str> for SortKey {
    fn from(key: &str) -> Self {
        SortKey::ascending(key)
    }
}

/// Keys are applied most significant first; `offset` ranked records are
/// skipped before `limit` are taken.
#[derive(Debug, Clone, Default)]
pub struct SortOptions {
    pub keys: Vec<SortKey>,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl SortOptions {
    pub fn new() -> Self {
        SortOptions::default()
    }

    pub fn by(keys: Vec<SortKey>) -> Self {
        SortOptions { keys, ..SortOptions::default() }
    }

    pub fn key(mut self, key: impl Into<SortKey>) -> Self {
        self.keys.push(key.into());
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Options of an index column search.
#[derive(Clone)]
pub struct SearchOptions {
    pub operator: SearchOperator,
    pub scorer: Arc<dyn Scorer>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            operator: SearchOperator::default(),
            scorer: Arc::new(TfScorer),
        }
    }
}

impl SearchOptions {
    pub fn new() -> Self {
        SearchOptions::default()
    }

    pub fn operator(mut self, operator: SearchOperator) -> Self {
        self.operator = operator;
        self
    }

    pub fn scorer(mut self, scorer: impl Scorer + 'static) -> Self {
        self.scorer = Arc::new(scorer);
        self
    }
}

impl fmt::Debug for SearchOptions {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SearchOptions")
            .field("operator", &self.operator)
            .field("scorer", &self.scorer.name())
            .finish()
    }
}
