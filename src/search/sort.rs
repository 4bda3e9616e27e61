use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{RecordId, Value};
use crate::search::options::{SortOptions, SortOrder};
use crate::search::results::{Entry, RecordSet};

/// Entry with its precomputed sort key values.
struct Ranked<'a> {
    keys: Vec<Option<Value>>,
    entry: Entry,
    orders: &'a [SortOrder],
}

impl Ranked<'_> {
    /// `Less` means ranked earlier.
    fn rank(&self, other: &Self) -> Ordering {
        for ((a, b), order) in self.keys.iter().zip(other.keys.iter()).zip(self.orders) {
            // Missing values come first in ascending order.
            let ord = match (a, b) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(a), Some(b)) => a.compare(b),
            };
            let ord = match order {
                SortOrder::Ascending => ord,
                SortOrder::Descending => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        self.entry.id.cmp(&other.entry.id)
    }
}

impl PartialEq for Ranked<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.rank(other) == Ordering::Equal
    }
}

impl Eq for Ranked<'_> {}

impl PartialOrd for Ranked<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Max-heap order: the worst ranked entry sits on top.
impl Ord for Ranked<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank(other)
    }
}

/// Resolved sort key.
enum Accessor {
    Score,
    SubRecords,
    Path(String),
}

impl RecordSet {
    /// Orders the set by `options.keys`, then skips `offset` records and
    /// takes at most `limit`. Ties beyond the keys break by ascending id.
    pub fn sort(&self, options: &SortOptions) -> Result<RecordSet> {
        if options.limit == Some(0) {
            return Err(Error::invalid_argument("sort limit must be positive"));
        }
        let accessors = options
            .keys
            .iter()
            .map(|key| self.sort_accessor(&key.key))
            .collect::<Result<Vec<Accessor>>>()?;
        let orders: Vec<SortOrder> = options.keys.iter().map(|key| key.order).collect();

        let mut ranked = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            let record = self.record_of(entry);
            let keys = accessors
                .iter()
                .map(|accessor| match accessor {
                    Accessor::Score => Ok(Some(Value::Float(entry.score))),
                    Accessor::SubRecords => Ok(Some(Value::UInt(entry.n_sub_records as u64))),
                    Accessor::Path(path) => record.get(path),
                })
                .collect::<Result<Vec<Option<Value>>>>()?;
            ranked.push(Ranked { keys, entry: *entry, orders: &orders });
        }

        let sorted = match options.limit {
            Some(limit) => top_k(ranked, options.offset.saturating_add(limit)),
            None => {
                ranked.sort();
                ranked
            }
        };

        let entries: Vec<Entry> = sorted
            .into_iter()
            .skip(options.offset)
            .take(options.limit.unwrap_or(usize::MAX))
            .map(|ranked| ranked.entry)
            .collect();
        let groups: HashMap<RecordId, Vec<RecordId>> = entries
            .iter()
            .filter_map(|e| self.groups.get(&e.id).map(|members| (e.id, members.clone())))
            .collect();
        tracing::trace!(input = self.len(), output = entries.len(), "sorted record set");
        Ok(RecordSet::from_entries(self.table().clone(), entries, groups))
    }

    /// `id` is a column when the table has one, the record id otherwise.
    fn sort_accessor(&self, key: &str) -> Result<Accessor> {
        let key = key.strip_prefix('.').unwrap_or(key);
        match key {
            "_score" => return Ok(Accessor::Score),
            "_nsubrecs" => return Ok(Accessor::SubRecords),
            "id" if self.table().column("id").is_none() => return Ok(Accessor::Path("_id".to_string())),
            _ => {}
        }
        match self.table().inner.resolve_type(key) {
            Ok(_) => Ok(Accessor::Path(key.to_string())),
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::InvalidArgument) => Err(
                Error::invalid_argument(format!("unsupported sort key '{}': {}", key, e.context)),
            ),
            Err(e) => Err(e),
        }
    }
}

/// Best `k` entries, best first.
fn top_k(ranked: Vec<Ranked<'_>>, k: usize) -> Vec<Ranked<'_>> {
    let mut heap = BinaryHeap::with_capacity(k.min(ranked.len()) + 1);
    for item in ranked {
        if heap.len() < k {
            heap.push(item);
        } else if let Some(worst) = heap.peek() {
            if item < *worst {
                heap.pop();
                heap.push(item);
            }
        }
    }
    heap.into_sorted_vec()
}
