use std::path::PathBuf;
use serde::{Serialize, Deserialize};
use crate::core::error::{Error, Result};
use crate::core::types::DataType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    Scalar,
    Vector,
    Index,
}

impl ColumnKind {
    pub fn name(&self) -> &'static str {
        match self {
            ColumnKind::Scalar => "scalar",
            ColumnKind::Vector => "vector",
            ColumnKind::Index => "index",
        }
    }
}

/// Options for `Table::define_column`.
#[derive(Debug, Clone)]
pub struct ColumnOptions {
    pub data_type: DataType,
    pub kind: ColumnKind,
    pub path: Option<PathBuf>,
    /// `None` follows the owning table.
    pub persistent: Option<bool>,
}

impl ColumnOptions {
    pub fn new(data_type: DataType) -> Self {
        ColumnOptions {
            data_type,
            kind: ColumnKind::Scalar,
            path: None,
            persistent: None,
        }
    }

    /// `ColumnOptions::of("ShortText")`, or a table name for a reference column.
    pub fn of(type_name: &str) -> Self {
        Self::new(DataType::parse(type_name))
    }

    pub fn vector(mut self) -> Self {
        self.kind = ColumnKind::Vector;
        self
    }

    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn persistent(mut self, persistent: bool) -> Self {
        self.persistent = Some(persistent);
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.kind == ColumnKind::Index {
            return Err(Error::invalid_argument(
                "index columns are defined with define_index_column",
            ));
        }
        check_persistence(self.persistent, &self.path)
    }
}

/// Options for `Table::define_index_column`.
#[derive(Debug, Clone, Default)]
pub struct IndexColumnOptions {
    /// `"_key"`, `"column"` or `"Table.column"`. Empty indexes nothing.
    pub sources: Vec<String>,
    /// Overrides the lexicon's default tokenizer.
    pub tokenizer: Option<String>,
    pub with_section: bool,
    /// Defaults to true when values are tokenized.
    pub with_position: Option<bool>,
    pub path: Option<PathBuf>,
    pub persistent: Option<bool>,
}

impl IndexColumnOptions {
    pub fn new() -> Self {
        IndexColumnOptions::default()
    }

    pub fn source(mut self, source: &str) -> Self {
        self.sources.push(source.to_string());
        self
    }

    pub fn sources(mut self, sources: &[&str]) -> Self {
        self.sources.extend(sources.iter().map(|s| s.to_string()));
        self
    }

    pub fn tokenizer(mut self, tokenizer: &str) -> Self {
        self.tokenizer = Some(tokenizer.to_string());
        self
    }

    pub fn with_section(mut self, with_section: bool) -> Self {
        self.with_section = with_section;
        self
    }

    pub fn with_position(mut self, with_position: bool) -> Self {
        self.with_position = Some(with_position);
        self
    }

    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn persistent(mut self, persistent: bool) -> Self {
        self.persistent = Some(persistent);
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        check_persistence(self.persistent, &self.path)?;
        if self.sources.len() > 1 && !self.with_section {
            return Err(Error::invalid_configuration(
                "indexing several sources requires with_section",
            ));
        }
        Ok(())
    }
}

fn check_persistence(persistent: Option<bool>, path: &Option<PathBuf>) -> Result<()> {
    if persistent == Some(false) && path.is_some() {
        return Err(Error::invalid_configuration(
            "should not pass path if persistent is false",
        ));
    }
    Ok(())
}

/// Column definition stored in the owning table's snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) enum ColumnDef {
    Data {
        name: String,
        data_type: DataType,
        vector: bool,
        path: Option<PathBuf>,
    },
    Index {
        name: String,
        source_table: Option<String>,
        source_path: Option<PathBuf>,
        sources: Vec<String>,
        tokenizer: Option<String>,
        token_filters: Vec<String>,
        with_section: bool,
        with_position: bool,
        path: Option<PathBuf>,
    },
}

impl ColumnDef {
    pub(crate) fn name(&self) -> &str {
        match self {
            ColumnDef::Data { name, .. } | ColumnDef::Index { name, .. } => name,
        }
    }
}
