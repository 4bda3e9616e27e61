use std::collections::HashMap;
use crate::column::options::ColumnOptions;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{DataType, RecordId, Value};
use crate::search::results::{Entry, RecordSet};
use crate::table::options::TableOptions;
use crate::table::table::Table;

/// Accumulates members into group records in first-appearance order.
#[derive(Default)]
struct Grouping {
    order: Vec<RecordId>,
    folded: HashMap<RecordId, Entry>,
    members: HashMap<RecordId, Vec<RecordId>>,
}

impl Grouping {
    fn fold(&mut self, group: RecordId, member: &Entry) {
        let members = self.members.entry(group).or_default();
        if members.last() == Some(&member.id) {
            return;
        }
        members.push(member.id);
        let entry = self.folded.entry(group).or_insert_with(|| {
            self.order.push(group);
            Entry { id: group, score: 0.0, n_sub_records: 0 }
        });
        entry.score += member.score;
        entry.n_sub_records += 1;
    }

    fn into_set(mut self, table: Table) -> RecordSet {
        let entries = self
            .order
            .iter()
            .filter_map(|id| self.folded.remove(id))
            .collect();
        RecordSet::from_entries(table, entries, self.members)
    }
}

impl RecordSet {
    /// One record per distinct value of `keys`, carrying the number of
    /// folded records (`_nsubrecs`) and the sum of their scores.
    ///
    /// A single reference key groups into the referenced table; a single
    /// scalar key into a temporary hash table keyed by the value; several
    /// keys into a temporary array with one column per key. Vector values
    /// put a record into one group per element.
    pub fn group(&self, keys: &[&str]) -> Result<RecordSet> {
        let set = match keys {
            [] => return Err(Error::invalid_argument("group needs at least one key")),
            [key] => self.group_by(key)?,
            keys => self.group_by_tuple(keys)?,
        };
        tracing::debug!(keys = ?keys, records = self.len(), groups = set.len(), "grouped record set");
        Ok(set)
    }

    fn group_key_type(&self, key: &str) -> Result<DataType> {
        self.table().inner.resolve_type(key).map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::invalid_argument(format!("unsupported group key '{}': {}", key, e.context)),
            _ => e,
        })
    }

    fn group_by(&self, key: &str) -> Result<RecordSet> {
        let data_type = self.group_key_type(key)?;
        let db = self.table().inner.database()?;
        let (target, by_reference) = match &data_type {
            DataType::Reference(name) => (db.reference_table(name)?, true),
            other => {
                let key_type = if other.is_text() { DataType::ShortText } else { other.clone() };
                (db.create_table(TableOptions::hash().key_type(key_type))?, false)
            }
        };

        let mut grouping = Grouping::default();
        for entry in &self.entries {
            let items = match self.record_of(entry).get(key)? {
                None => continue,
                Some(Value::Vector(items)) => items,
                Some(value) => vec![value],
            };
            for item in items {
                let group = match item {
                    Value::Record(id) if by_reference => id,
                    value => target.add(value)?,
                };
                grouping.fold(group, entry);
            }
        }
        Ok(grouping.into_set(target))
    }

    fn group_by_tuple(&self, keys: &[&str]) -> Result<RecordSet> {
        let types = keys
            .iter()
            .map(|key| self.group_key_type(key))
            .collect::<Result<Vec<DataType>>>()?;
        let mut tuples = Vec::with_capacity(self.len());
        for entry in &self.entries {
            let record = self.record_of(entry);
            let values = keys
                .iter()
                .map(|key| record.get(key))
                .collect::<Result<Vec<Option<Value>>>>()?;
            tuples.push((values, *entry));
        }

        let db = self.table().inner.database()?;
        let target = db.create_table(TableOptions::array())?;
        let names = column_names(keys);
        for (i, (name, data_type)) in names.iter().zip(types).enumerate() {
            let mut options = ColumnOptions::new(data_type);
            if tuples.iter().any(|(values, _)| matches!(values[i], Some(Value::Vector(_)))) {
                options = options.vector();
            }
            target.define_column(name, options)?;
        }

        let mut grouping = Grouping::default();
        let mut groups: HashMap<Vec<u8>, RecordId> = HashMap::new();
        for (values, entry) in tuples {
            let signature = bincode::serialize(&values)?;
            let group = match groups.get(&signature) {
                Some(id) => *id,
                None => {
                    let id = target.add_record()?;
                    for (name, value) in names.iter().zip(values) {
                        if let Some(value) = value {
                            target.set(id, name, value)?;
                        }
                    }
                    groups.insert(signature, id);
                    id
                }
            };
            grouping.fold(group, &entry);
        }
        Ok(grouping.into_set(target))
    }
}

/// Column names for grouping keys: `"bookmark.title"` becomes
/// `bookmark_title`, `"_key"` becomes `key`.
fn column_names(keys: &[&str]) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(keys.len());
    for key in keys {
        let base = key.trim_start_matches(['.', '_']).replace('.', "_");
        let base = if base.is_empty() { "key".to_string() } else { base };
        let mut name = base.clone();
        let mut n = 2;
        while names.contains(&name) {
            name = format!("{}_{}", base, n);
            n += 1;
        }
        names.push(name);
    }
    names
}
