use serde::{Serialize, Deserialize};
use crate::core::types::RecordId;
use crate::table::keys::{IdAllocator, KeyStore};

const EMPTY: u32 = 0;
const TOMBSTONE: u32 = u32::MAX;
const MIN_CAPACITY: usize = 16;

/// Open-addressing hash table (linear probing, tombstones) from key bytes
/// to record ids. Iteration follows id order, not key order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashStore {
    slots: Vec<u32>,
    keys: Vec<Option<Vec<u8>>>,
    ids: IdAllocator,
    used: usize,
    tombstones: usize,
}

impl Default for HashStore {
    fn default() -> Self {
        Self::new()
    }
}

impl HashStore {
    pub fn new() -> Self {
        HashStore {
            slots: vec![EMPTY; MIN_CAPACITY],
            keys: vec![None],
            ids: IdAllocator::new(),
            used: 0,
            tombstones: 0,
        }
    }

    fn hash(key: &[u8]) -> usize {
        crc32fast::hash(key) as usize
    }

    fn mask(&self) -> usize {
        self.slots.len() - 1
    }

    /// Slot holding `key`, if present.
    fn lookup(&self, key: &[u8]) -> Option<usize> {
        let mask = self.mask();
        let mut slot = Self::hash(key) & mask;
        loop {
            match self.slots[slot] {
                EMPTY => return None,
                TOMBSTONE => {}
                id => {
                    if self.keys[id as usize].as_deref() == Some(key) {
                        return Some(slot);
                    }
                }
            }
            slot = (slot + 1) & mask;
        }
    }

    fn place(slots: &mut [u32], key: &[u8], id: u32) {
        let mask = slots.len() - 1;
        let mut slot = Self::hash(key) & mask;
        while slots[slot] != EMPTY && slots[slot] != TOMBSTONE {
            slot = (slot + 1) & mask;
        }
        slots[slot] = id;
    }

    fn grow_if_needed(&mut self) {
        // Keep the load (live + dead slots) at or below one half.
        if (self.used + self.tombstones + 1) * 2 <= self.slots.len() {
            return;
        }
        let mut capacity = self.slots.len();
        while (self.used + 1) * 2 > capacity / 2 {
            capacity *= 2;
        }
        let mut slots = vec![EMPTY; capacity.max(MIN_CAPACITY)];
        for (id, key) in self.keys.iter().enumerate() {
            if let Some(key) = key {
                Self::place(&mut slots, key, id as u32);
            }
        }
        self.slots = slots;
        self.tombstones = 0;
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

impl KeyStore for HashStore {
    fn add(&mut self, key: &[u8]) -> (RecordId, bool) {
        if let Some(slot) = self.lookup(key) {
            return (RecordId(self.slots[slot]), false);
        }
        self.grow_if_needed();

        let id = self.ids.allocate();
        if self.keys.len() <= id.index() {
            self.keys.resize(id.index() + 1, None);
        }
        self.keys[id.index()] = Some(key.to_vec());
        Self::place(&mut self.slots, key, id.0);
        self.used += 1;
        (id, true)
    }

    fn find(&self, key: &[u8]) -> Option<RecordId> {
        self.lookup(key).map(|slot| RecordId(self.slots[slot]))
    }

    fn key(&self, id: RecordId) -> Option<&[u8]> {
        self.keys.get(id.index()).and_then(|k| k.as_deref())
    }

    fn delete(&mut self, id: RecordId) -> bool {
        let key = match self.keys.get_mut(id.index()).and_then(Option::take) {
            Some(key) => key,
            None => return false,
        };
        if let Some(slot) = self.lookup_slot_of(&key, id.0) {
            self.slots[slot] = TOMBSTONE;
            self.tombstones += 1;
        }
        self.used -= 1;
        self.ids.release(id);
        true
    }

    fn size(&self) -> usize {
        self.used
    }

    fn ids(&self) -> Vec<RecordId> {
        self.keys
            .iter()
            .enumerate()
            .filter(|(_, key)| key.is_some())
            .map(|(id, _)| RecordId(id as u32))
            .collect()
    }

    fn truncate(&mut self) {
        *self = HashStore::new();
    }
}

impl HashStore {
    // The key was already taken out of `keys`, so match on the id.
    fn lookup_slot_of(&self, key: &[u8], id: u32) -> Option<usize> {
        let mask = self.mask();
        let mut slot = Self::hash(key) & mask;
        loop {
            match self.slots[slot] {
                EMPTY => return None,
                s if s == id => return Some(slot),
                _ => {}
            }
            slot = (slot + 1) & mask;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_is_idempotent() {
        let mut store = HashStore::new();
        let (a, added) = store.add(b"groonga");
        assert!(added);
        let (b, added) = store.add(b"groonga");
        assert!(!added);
        assert_eq!(a, b);
        assert_eq!(store.size(), 1);
    }

    #[test]
    fn grows_and_keeps_every_key() {
        let mut store = HashStore::new();
        for i in 0..5000u32 {
            store.add(format!("{:08}", i).as_bytes());
        }
        assert_eq!(store.size(), 5000);
        assert!(store.capacity() >= 10000);
        for i in 0..5000u32 {
            let id = store.find(format!("{:08}", i).as_bytes()).unwrap();
            assert_eq!(store.key(id).unwrap(), format!("{:08}", i).as_bytes());
        }
    }

    #[test]
    fn deleted_ids_are_recycled_and_probe_chains_survive() {
        let mut store = HashStore::new();
        let ids: Vec<RecordId> = (0..64u32).map(|i| store.add(&i.to_be_bytes()).0).collect();
        assert!(store.delete(ids[10]));
        assert!(!store.delete(ids[10]));
        assert_eq!(store.find(&10u32.to_be_bytes()), None);
        for i in 11..64u32 {
            assert_eq!(store.find(&i.to_be_bytes()), Some(ids[i as usize]));
        }
        let (reused, _) = store.add(b"new");
        assert_eq!(reused, ids[10]);
    }
}
