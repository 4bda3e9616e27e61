use std::ops::Bound;
use roaring::RoaringBitmap;
use serde::{Serialize, Deserialize};
use crate::core::error::{Error, Result};
use crate::core::types::{RecordId, TableKind};
use crate::table::double_array::DoubleArrayTrie;
use crate::table::hash::HashStore;
use crate::table::patricia::PatriciaTrie;

/// Capability shared by the keyed table variants.
pub trait KeyStore {
    /// Returns the id for `key`, inserting it when absent. The flag tells
    /// whether a new record was created.
    fn add(&mut self, key: &[u8]) -> (RecordId, bool);

    fn find(&self, key: &[u8]) -> Option<RecordId>;

    fn key(&self, id: RecordId) -> Option<&[u8]>;

    fn delete(&mut self, id: RecordId) -> bool;

    fn size(&self) -> usize;

    /// Live ids in iteration order.
    fn ids(&self) -> Vec<RecordId>;

    fn truncate(&mut self);

    fn contains(&self, id: RecordId) -> bool {
        self.key(id).is_some()
    }
}

/// Key stores that keep byte-lexicographic order.
pub trait OrderedKeyStore: KeyStore {
    fn prefix_search(&self, prefix: &[u8]) -> Vec<RecordId>;

    /// Records whose key is a prefix of `query`, shortest first.
    fn common_prefix_search(&self, query: &[u8]) -> Vec<RecordId> {
        (0..=query.len())
            .filter_map(|len| self.find(&query[..len]))
            .collect()
    }

    fn range(&self, min: Bound<&[u8]>, max: Bound<&[u8]>) -> Vec<RecordId> {
        self.ids()
            .into_iter()
            .filter(|id| {
                let key = match self.key(*id) {
                    Some(key) => key,
                    None => return false,
                };
                let above = match min {
                    Bound::Included(m) => key >= m,
                    Bound::Excluded(m) => key > m,
                    Bound::Unbounded => true,
                };
                let below = match max {
                    Bound::Included(m) => key <= m,
                    Bound::Excluded(m) => key < m,
                    Bound::Unbounded => true,
                };
                above && below
            })
            .collect()
    }
}

/// Hands out ids from 1, recycling released ones last-in first-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdAllocator {
    next: u32,
    free: Vec<u32>,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdAllocator {
    pub fn new() -> Self {
        IdAllocator { next: 1, free: Vec::new() }
    }

    pub fn allocate(&mut self) -> RecordId {
        match self.free.pop() {
            Some(id) => RecordId(id),
            None => {
                let id = self.next;
                self.next += 1;
                RecordId(id)
            }
        }
    }

    pub fn release(&mut self, id: RecordId) {
        self.free.push(id.0);
    }
}

mod bitmap_serde {
    use roaring::RoaringBitmap;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(bitmap: &RoaringBitmap, serializer: S) -> Result<S::Ok, S::Error> {
        bitmap.iter().collect::<Vec<u32>>().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<RoaringBitmap, D::Error> {
        let ids = Vec::<u32>::deserialize(deserializer)?;
        Ok(ids.into_iter().collect())
    }
}

/// Id-only table storage: ids grow monotonically and are never reused
/// while the table lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrayStore {
    next: u32,
    #[serde(with = "bitmap_serde")]
    deleted: RoaringBitmap,
}

impl Default for ArrayStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ArrayStore {
    pub fn new() -> Self {
        ArrayStore { next: 1, deleted: RoaringBitmap::new() }
    }

    pub fn add(&mut self) -> RecordId {
        let id = RecordId(self.next);
        self.next += 1;
        id
    }

    pub fn contains(&self, id: RecordId) -> bool {
        id.0 >= 1 && id.0 < self.next && !self.deleted.contains(id.0)
    }

    pub fn delete(&mut self, id: RecordId) -> bool {
        self.contains(id) && self.deleted.insert(id.0)
    }

    pub fn size(&self) -> usize {
        (self.next - 1) as usize - self.deleted.len() as usize
    }

    pub fn ids(&self) -> Vec<RecordId> {
        (1..self.next)
            .filter(|id| !self.deleted.contains(*id))
            .map(RecordId)
            .collect()
    }

    pub fn truncate(&mut self) {
        *self = ArrayStore::new();
    }
}

/// Per-variant key storage behind one table contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Keys {
    Array(ArrayStore),
    Hash(HashStore),
    PatriciaTrie(PatriciaTrie),
    DoubleArrayTrie(DoubleArrayTrie),
}

impl Keys {
    pub fn new(kind: TableKind) -> Self {
        match kind {
            TableKind::Array => Keys::Array(ArrayStore::new()),
            TableKind::Hash => Keys::Hash(HashStore::new()),
            TableKind::PatriciaTrie => Keys::PatriciaTrie(PatriciaTrie::new()),
            TableKind::DoubleArrayTrie => Keys::DoubleArrayTrie(DoubleArrayTrie::new()),
        }
    }

    pub fn kind(&self) -> TableKind {
        match self {
            Keys::Array(_) => TableKind::Array,
            Keys::Hash(_) => TableKind::Hash,
            Keys::PatriciaTrie(_) => TableKind::PatriciaTrie,
            Keys::DoubleArrayTrie(_) => TableKind::DoubleArrayTrie,
        }
    }

    fn keyed(&self) -> Option<&dyn KeyStore> {
        match self {
            Keys::Array(_) => None,
            Keys::Hash(store) => Some(store as &dyn KeyStore),
            Keys::PatriciaTrie(store) => Some(store as &dyn KeyStore),
            Keys::DoubleArrayTrie(store) => Some(store as &dyn KeyStore),
        }
    }

    fn keyed_mut(&mut self) -> Option<&mut dyn KeyStore> {
        match self {
            Keys::Array(_) => None,
            Keys::Hash(store) => Some(store as &mut dyn KeyStore),
            Keys::PatriciaTrie(store) => Some(store as &mut dyn KeyStore),
            Keys::DoubleArrayTrie(store) => Some(store as &mut dyn KeyStore),
        }
    }

    fn ordered(&self) -> Result<&dyn OrderedKeyStore> {
        match self {
            Keys::PatriciaTrie(store) => Ok(store as &dyn OrderedKeyStore),
            Keys::DoubleArrayTrie(store) => Ok(store as &dyn OrderedKeyStore),
            other => Err(Error::invalid_argument(format!(
                "{} tables do not support ordered key search", other.kind().name()
            ))),
        }
    }

    pub fn add(&mut self, key: Option<&[u8]>) -> Result<(RecordId, bool)> {
        match (self, key) {
            (Keys::Array(store), None) => Ok((store.add(), true)),
            (Keys::Array(_), Some(_)) => Err(Error::invalid_argument("array tables take no key")),
            (keys, Some(key)) => match keys.keyed_mut() {
                Some(store) => Ok(store.add(key)),
                None => Err(Error::invalid_argument("table takes no key")),
            },
            (keys, None) => Err(Error::invalid_argument(format!(
                "{} tables require a key", keys.kind().name()
            ))),
        }
    }

    pub fn find(&self, key: &[u8]) -> Option<RecordId> {
        self.keyed().and_then(|store| store.find(key))
    }

    pub fn key(&self, id: RecordId) -> Option<&[u8]> {
        self.keyed().and_then(|store| store.key(id))
    }

    pub fn contains(&self, id: RecordId) -> bool {
        match self {
            Keys::Array(store) => store.contains(id),
            keys => keys.keyed().map(|store| store.contains(id)).unwrap_or(false),
        }
    }

    pub fn delete(&mut self, id: RecordId) -> bool {
        match self {
            Keys::Array(store) => store.delete(id),
            keys => keys.keyed_mut().map(|store| store.delete(id)).unwrap_or(false),
        }
    }

    pub fn size(&self) -> usize {
        match self {
            Keys::Array(store) => store.size(),
            keys => keys.keyed().map(|store| store.size()).unwrap_or(0),
        }
    }

    pub fn ids(&self) -> Vec<RecordId> {
        match self {
            Keys::Array(store) => store.ids(),
            keys => keys.keyed().map(|store| store.ids()).unwrap_or_default(),
        }
    }

    pub fn truncate(&mut self) {
        match self {
            Keys::Array(store) => store.truncate(),
            Keys::Hash(store) => store.truncate(),
            Keys::PatriciaTrie(store) => store.truncate(),
            Keys::DoubleArrayTrie(store) => store.truncate(),
        }
    }

    pub fn prefix_search(&self, prefix: &[u8]) -> Result<Vec<RecordId>> {
        Ok(self.ordered()?.prefix_search(prefix))
    }

    pub fn common_prefix_search(&self, query: &[u8]) -> Result<Vec<RecordId>> {
        Ok(self.ordered()?.common_prefix_search(query))
    }

    pub fn range(&self, min: Bound<&[u8]>, max: Bound<&[u8]>) -> Result<Vec<RecordId>> {
        Ok(self.ordered()?.range(min, max))
    }
}
