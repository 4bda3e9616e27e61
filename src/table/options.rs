use std::path::PathBuf;
use crate::core::error::{Error, Result};
use crate::core::types::{DataType, TableKind, ValueType};

/// Options for `Database::create_table`.
#[derive(Debug, Clone)]
pub struct TableOptions {
    pub kind: TableKind,
    pub name: Option<String>,
    pub path: Option<PathBuf>,
    /// Defaults to ShortText for keyed kinds; must stay unset for arrays.
    pub key_type: Option<DataType>,
    pub value_type: Option<ValueType>,
    /// Tokenizer used by index columns defined on this table (the lexicon).
    pub default_tokenizer: Option<String>,
    pub token_filters: Vec<String>,
    /// `None` follows the database: named tables of a persistent database
    /// are persistent.
    pub persistent: Option<bool>,
}

impl TableOptions {
    pub fn new(kind: TableKind) -> Self {
        TableOptions {
            kind,
            name: None,
            path: None,
            key_type: None,
            value_type: None,
            default_tokenizer: None,
            token_filters: Vec::new(),
            persistent: None,
        }
    }

    pub fn array() -> Self {
        Self::new(TableKind::Array)
    }

    pub fn hash() -> Self {
        Self::new(TableKind::Hash)
    }

    pub fn patricia_trie() -> Self {
        Self::new(TableKind::PatriciaTrie)
    }

    pub fn double_array_trie() -> Self {
        Self::new(TableKind::DoubleArrayTrie)
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn key_type(mut self, key_type: DataType) -> Self {
        self.key_type = Some(key_type);
        self
    }

    pub fn value_type(mut self, value_type: ValueType) -> Self {
        self.value_type = Some(value_type);
        self
    }

    pub fn default_tokenizer(mut self, tokenizer: &str) -> Self {
        self.default_tokenizer = Some(tokenizer.to_string());
        self
    }

    pub fn token_filters(mut self, filters: &[&str]) -> Self {
        self.token_filters = filters.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn persistent(mut self, persistent: bool) -> Self {
        self.persistent = Some(persistent);
        self
    }

    /// Checks option combinations and returns the effective key type.
    pub(crate) fn validate(&self) -> Result<Option<DataType>> {
        if self.persistent == Some(false) && self.path.is_some() {
            return Err(Error::invalid_configuration(
                "should not pass path if persistent is false",
            ));
        }
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(value_type) = &self.value_type {
            if value_type.size == 0 {
                return Err(Error::invalid_argument(format!(
                    "value type {} has no size", value_type.name
                )));
            }
        }

        match (self.kind, &self.key_type) {
            (TableKind::Array, Some(key_type)) => Err(Error::invalid_argument(format!(
                "array tables take no key, got key type {}", key_type
            ))),
            (TableKind::Array, None) => Ok(None),
            (kind, Some(key_type)) => {
                key_type.check_key_type(kind)?;
                Ok(Some(key_type.clone()))
            }
            (_, None) => Ok(Some(DataType::ShortText)),
        }
    }
}

/// Table and column names become file names and `Table.column` paths.
pub(crate) fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && !name.starts_with('_')
        && name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(Error::invalid_argument(format!("invalid name '{}'", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;

    #[test]
    fn keyed_tables_default_to_short_text() {
        assert_eq!(TableOptions::hash().validate().unwrap(), Some(DataType::ShortText));
        assert_eq!(TableOptions::array().validate().unwrap(), None);
    }

    #[test]
    fn conflicting_options_are_rejected() {
        let err = TableOptions::hash().path("/tmp/x").persistent(false).validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);

        let err = TableOptions::array().key_type(DataType::ShortText).validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = TableOptions::patricia_trie().key_type(DataType::Float).validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidKeyType);

        let err = TableOptions::hash().key_type(DataType::Text).validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidKeyType);
    }

    #[test]
    fn names_must_be_plain() {
        assert!(validate_name("Bookmarks").is_ok());
        assert!(validate_name("content-index").is_ok());
        assert!(validate_name("a.b").is_err());
        assert!(validate_name("_key").is_err());
        assert!(validate_name("").is_err());
    }
}
