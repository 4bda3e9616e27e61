use std::collections::HashMap;
use std::fmt;
use crate::core::error::Result;
use crate::core::types::{RecordId, Value};
use crate::table::record::Record;
use crate::table::table::Table;

/// Record with the score and sub-record count it carries in a set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Entry {
    pub id: RecordId,
    pub score: f64,
    pub n_sub_records: u32,
}

/// Ordered collection of scored records of one table. Produced by
/// enumeration, `select`, index search, `sort` and `group`; combined with
/// `union`, `intersection`, `difference` and `merge`.
#[derive(Clone)]
pub struct RecordSet {
    table: Table,
    pub(crate) entries: Vec<Entry>,
    positions: HashMap<RecordId, usize>,
    // Members folded into each group record
    pub(crate) groups: HashMap<RecordId, Vec<RecordId>>,
}

impl RecordSet {
    pub fn new(table: Table) -> Self {
        RecordSet {
            table,
            entries: Vec::new(),
            positions: HashMap::new(),
            groups: HashMap::new(),
        }
    }

    pub fn from_ids(table: Table, ids: Vec<RecordId>) -> Self {
        let mut set = RecordSet::new(table);
        for id in ids {
            set.add(id, 1.0);
        }
        set
    }

    /// Search hits, already ranked.
    pub fn from_hits(table: Table, hits: Vec<(RecordId, f64)>) -> Self {
        let mut set = RecordSet::new(table);
        for (id, score) in hits {
            set.add(id, score);
        }
        set
    }

    pub(crate) fn from_entries(table: Table, entries: Vec<Entry>, groups: HashMap<RecordId, Vec<RecordId>>) -> Self {
        let mut set = RecordSet::new(table);
        for entry in entries {
            set.push(entry);
        }
        set.groups = groups;
        set
    }

    /// Appends `id`; returns false (and leaves the entry alone) when it is
    /// already present.
    pub fn add(&mut self, id: RecordId, score: f64) -> bool {
        self.push(Entry { id, score, n_sub_records: 0 })
    }

    pub(crate) fn push(&mut self, entry: Entry) -> bool {
        if self.positions.contains_key(&entry.id) {
            return false;
        }
        self.positions.insert(entry.id, self.entries.len());
        self.entries.push(entry);
        true
    }

    pub(crate) fn entry_mut(&mut self, id: RecordId) -> Option<&mut Entry> {
        let pos = *self.positions.get(&id)?;
        self.entries.get_mut(pos)
    }

    /// Keeps the entries matching `keep`, preserving order.
    pub(crate) fn retain(&mut self, mut keep: impl FnMut(&Entry) -> bool) {
        self.entries.retain(|entry| keep(entry));
        self.positions = self
            .entries
            .iter()
            .enumerate()
            .map(|(pos, entry)| (entry.id, pos))
            .collect();
        let positions = &self.positions;
        self.groups.retain(|id, _| positions.contains_key(id));
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn ids(&self) -> Vec<RecordId> {
        self.entries.iter().map(|e| e.id).collect()
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.positions.contains_key(&id)
    }

    pub fn score(&self, id: RecordId) -> Option<f64> {
        self.positions.get(&id).map(|pos| self.entries[*pos].score)
    }

    /// Members of a group record; empty for sets that are not groupings.
    pub fn sub_records(&self, id: RecordId) -> &[RecordId] {
        self.groups.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn record_of(&self, entry: &Entry) -> Record {
        Record::scored(self.table.clone(), entry.id, entry.score, entry.n_sub_records)
    }

    pub fn iter(&self) -> impl Iterator<Item = Record> + '_ {
        self.entries.iter().map(|entry| self.record_of(entry))
    }

    pub fn records(&self) -> Vec<Record> {
        self.iter().collect()
    }

    /// Value of the accessor `path` for every record, in set order.
    pub fn values(&self, path: &str) -> Result<Vec<Option<Value>>> {
        self.iter().map(|record| record.get(path)).collect()
    }

    /// Subset whose records satisfy `predicate`; scores are kept.
    pub fn select<F>(&self, mut predicate: F) -> Result<RecordSet>
    where
        F: FnMut(&Record) -> Result<bool>,
    {
        let mut set = RecordSet::new(self.table.clone());
        for entry in &self.entries {
            if predicate(&self.record_of(entry))? {
                set.push(*entry);
                if let Some(members) = self.groups.get(&entry.id) {
                    set.groups.insert(entry.id, members.clone());
                }
            }
        }
        Ok(set)
    }
}

impl fmt::Debug for RecordSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RecordSet")
            .field("table", &self.table.name())
            .field("entries", &self.entries)
            .finish()
    }
}
