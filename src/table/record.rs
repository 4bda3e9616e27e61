use std::fmt;
use crate::core::error::{Error, Result};
use crate::core::types::{DataType, RecordId, Value};
use crate::table::table::Table;

/// One record of a table as seen from a record set: id plus the score and
/// sub-record count it carries there.
#[derive(Clone)]
pub struct Record {
    table: Table,
    id: RecordId,
    score: f64,
    n_sub_records: u32,
}

impl Record {
    pub fn new(table: Table, id: RecordId) -> Self {
        Record { table, id, score: 1.0, n_sub_records: 0 }
    }

    pub(crate) fn scored(table: Table, id: RecordId, score: f64, n_sub_records: u32) -> Self {
        Record { table, id, score, n_sub_records }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn n_sub_records(&self) -> u32 {
        self.n_sub_records
    }

    pub fn exists(&self) -> bool {
        self.table.exists(self.id)
    }

    pub fn key(&self) -> Result<Option<Value>> {
        self.table.key(self.id)
    }

    pub fn value(&self) -> Option<Vec<u8>> {
        self.table.value(self.id)
    }

    pub fn set_value(&self, bytes: &[u8]) -> Result<()> {
        self.table.set_value(self.id, bytes)
    }

    /// Resolves an accessor path: `"title"`, `".title"`, `"bookmark.title"`
    /// (through a reference), or one of `_id`, `_key`, `_value`, `_score`,
    /// `_nsubrecs`.
    pub fn get(&self, path: &str) -> Result<Option<Value>> {
        let path = path.strip_prefix('.').unwrap_or(path);
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };

        let value = match head {
            "_id" => Some(Value::UInt(self.id.0 as u64)),
            "_key" => self.key()?,
            "_value" => self.value().map(|bytes| Value::Text(slot_text(&bytes))),
            "_score" => Some(Value::Float(self.score)),
            "_nsubrecs" => Some(Value::UInt(self.n_sub_records as u64)),
            column => self.table.get(self.id, column)?,
        };

        let rest = match rest {
            Some(rest) => rest,
            None => return Ok(value),
        };
        match value {
            None => Ok(None),
            Some(Value::Record(target)) => self.reference_record(head, target)?.get(rest),
            Some(other) => Err(Error::invalid_argument(format!(
                "cannot dereference '{}' holding {}", head, other.type_name()
            ))),
        }
    }

    pub fn set(&self, column: &str, value: impl Into<Value>) -> Result<()> {
        self.table.set(self.id, column, value)
    }

    /// The record a reference column (or reference key) points at.
    pub fn reference(&self, column: &str) -> Result<Option<Record>> {
        match self.get(column)? {
            Some(Value::Record(target)) => self.reference_record(column, target).map(Some),
            Some(other) => Err(Error::type_mismatch(format!(
                "'{}' holds {}, not a reference", column, other.type_name()
            ))),
            None => Ok(None),
        }
    }

    fn reference_record(&self, path: &str, target: RecordId) -> Result<Record> {
        match self.table.inner.resolve_type(path)? {
            DataType::Reference(name) => {
                let table = self.table.inner.database()?.reference_table(&name)?;
                Ok(Record::new(table, target))
            }
            other => Err(Error::type_mismatch(format!("'{}' is {}, not a reference", path, other))),
        }
    }
}

/// Value slots are zero padded; text stops at the first NUL.
fn slot_text(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

impl From<&Record> for Value {
    fn from(record: &Record) -> Self {
        Value::Record(record.id)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Record(record.id)
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Record")
            .field("table", &self.table.name())
            .field("id", &self.id)
            .field("score", &self.score)
            .field("n_sub_records", &self.n_sub_records)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_text_stops_at_padding() {
        assert_eq!(slot_text(b"http://groonga.org/\0\0\0"), "http://groonga.org/");
        assert_eq!(slot_text(b"plain"), "plain");
    }
}
