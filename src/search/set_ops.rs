use crate::core::error::{Error, Result};
use crate::search::results::{Entry, RecordSet};

impl RecordSet {
    fn check_same_table(&self, other: &RecordSet, operation: &str) -> Result<()> {
        if self.table().same_table(other.table()) {
            Ok(())
        } else {
            Err(Error::invalid_argument(format!(
                "{} of record sets over different tables ({} and {})",
                operation,
                self.table().name().unwrap_or("(anonymous)"),
                other.table().name().unwrap_or("(anonymous)")
            )))
        }
    }

    /// Appends the records of `other` missing here, with their scores.
    pub fn union(mut self, other: &RecordSet) -> Result<RecordSet> {
        self.check_same_table(other, "union")?;
        for entry in other.entries() {
            self.adopt(other, entry);
        }
        Ok(self)
    }

    /// Pushes an entry of `other` together with its group members, unless
    /// the record is already here.
    fn adopt(&mut self, other: &RecordSet, entry: &Entry) {
        if self.push(*entry) {
            if let Some(members) = other.groups.get(&entry.id) {
                self.groups.insert(entry.id, members.clone());
            }
        }
    }

    /// Keeps the records also in `other`; scores stay as they are here.
    pub fn intersection(mut self, other: &RecordSet) -> Result<RecordSet> {
        self.check_same_table(other, "intersection")?;
        self.retain(|entry| other.contains(entry.id));
        Ok(self)
    }

    /// Drops the records present in `other`.
    pub fn difference(mut self, other: &RecordSet) -> Result<RecordSet> {
        self.check_same_table(other, "difference")?;
        self.retain(|entry| !other.contains(entry.id));
        Ok(self)
    }

    /// Union where the scores of records present on both sides add up.
    pub fn merge(mut self, other: &RecordSet) -> Result<RecordSet> {
        self.check_same_table(other, "merge")?;
        for entry in other.entries() {
            match self.entry_mut(entry.id) {
                Some(existing) => existing.score += entry.score,
                None => {
                    self.adopt(other, entry);
                }
            }
        }
        Ok(self)
    }
}
