use serde::{Serialize, Deserialize};
use crate::core::types::RecordId;
use crate::table::keys::{IdAllocator, KeyStore, OrderedKeyStore};

const ROOT: usize = 0;
const FREE: i32 = -1;
const ROOT_CHECK: i32 = -2;
const TERMINATOR: usize = 0;
const ALPHABET: usize = 257;

/// Double-array trie.
///
/// A transition from node `s` on label `c` lands on `base[s] + c`, valid when
/// `check` of that slot equals `s`. Byte `b` is label `b + 1`; label 0 ends a
/// key, and the node it reaches stores `-(record id)` in its base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoubleArrayTrie {
    base: Vec<i32>,
    check: Vec<i32>,
    keys: Vec<Option<Vec<u8>>>,
    ids: IdAllocator,
    size: usize,
    free_cursor: usize,
}

fn labels(key: &[u8]) -> impl Iterator<Item = usize> + '_ {
    key.iter().map(|b| *b as usize + 1).chain(std::iter::once(TERMINATOR))
}

impl Default for DoubleArrayTrie {
    fn default() -> Self {
        Self::new()
    }
}

impl DoubleArrayTrie {
    pub fn new() -> Self {
        DoubleArrayTrie {
            base: vec![0],
            check: vec![ROOT_CHECK],
            keys: vec![None],
            ids: IdAllocator::new(),
            size: 0,
            free_cursor: 1,
        }
    }

    fn ensure(&mut self, index: usize) {
        if index >= self.base.len() {
            self.base.resize(index + 1, 0);
            self.check.resize(index + 1, FREE);
        }
    }

    fn is_free(&self, index: usize) -> bool {
        index != ROOT && self.check.get(index).map_or(true, |c| *c == FREE)
    }

    fn child(&self, node: usize, label: usize) -> Option<usize> {
        let base = self.base[node];
        if base <= 0 {
            return None;
        }
        let next = base as usize + label;
        (self.check.get(next) == Some(&(node as i32))).then_some(next)
    }

    /// Labels of the outgoing transitions of `node`, ascending.
    fn child_labels(&self, node: usize) -> Vec<usize> {
        (0..ALPHABET).filter(|c| self.child(node, *c).is_some()).collect()
    }

    fn walk(&self, labels: impl Iterator<Item = usize>) -> Option<usize> {
        let mut node = ROOT;
        for label in labels {
            node = self.child(node, label)?;
        }
        Some(node)
    }

    /// Lowest base at which every label in `labels` (ascending, non-empty)
    /// lands on a free slot.
    fn find_base(&mut self, labels: &[usize]) -> usize {
        while !self.is_free(self.free_cursor) {
            self.free_cursor += 1;
        }
        let first = labels[0];
        let mut pos = self.free_cursor;
        loop {
            if self.is_free(pos) && pos > first {
                let base = pos - first;
                if labels.iter().all(|c| self.is_free(base + c)) {
                    return base;
                }
            }
            pos += 1;
        }
    }

    /// Moves the children of `node` so that they start at `new_base`.
    fn relocate(&mut self, node: usize, new_base: usize) {
        let old_base = self.base[node] as usize;
        for label in self.child_labels(node) {
            let from = old_base + label;
            let to = new_base + label;
            self.ensure(to);
            self.base[to] = self.base[from];
            self.check[to] = node as i32;
            for grandchild_label in self.child_labels(from) {
                let grandchild = self.base[from] as usize + grandchild_label;
                self.check[grandchild] = to as i32;
            }
            self.release(from);
        }
        self.base[node] = new_base as i32;
    }

    fn release(&mut self, index: usize) {
        self.base[index] = 0;
        self.check[index] = FREE;
        self.free_cursor = self.free_cursor.min(index);
    }

    /// Adds the transition `node --label-->`, moving siblings on collision.
    fn insert_child(&mut self, node: usize, label: usize) -> usize {
        if self.base[node] <= 0 {
            let base = self.find_base(&[label]);
            self.base[node] = base as i32;
        } else if !self.is_free(self.base[node] as usize + label) {
            let mut wanted = self.child_labels(node);
            wanted.push(label);
            wanted.sort_unstable();
            let base = self.find_base(&wanted);
            self.relocate(node, base);
        }
        let next = self.base[node] as usize + label;
        self.ensure(next);
        self.base[next] = 0;
        self.check[next] = node as i32;
        next
    }

    fn collect(&self, node: usize, out: &mut Vec<RecordId>) {
        let mut stack = vec![node];
        while let Some(cur) = stack.pop() {
            let base = self.base[cur];
            if base < 0 {
                out.push(RecordId((-base) as u32));
                continue;
            }
            for label in self.child_labels(cur).into_iter().rev() {
                stack.push(base as usize + label);
            }
        }
    }

    /// Number of slots in the double array, free ones included.
    pub fn capacity(&self) -> usize {
        self.base.len()
    }
}

impl KeyStore for DoubleArrayTrie {
    fn add(&mut self, key: &[u8]) -> (RecordId, bool) {
        let mut node = ROOT;
        for label in labels(key) {
            node = match self.child(node, label) {
                Some(next) => next,
                None => self.insert_child(node, label),
            };
        }
        if self.base[node] < 0 {
            return (RecordId((-self.base[node]) as u32), false);
        }

        let id = self.ids.allocate();
        self.base[node] = -(id.0 as i32);
        if self.keys.len() <= id.index() {
            self.keys.resize(id.index() + 1, None);
        }
        self.keys[id.index()] = Some(key.to_vec());
        self.size += 1;
        (id, true)
    }

    fn find(&self, key: &[u8]) -> Option<RecordId> {
        let node = self.walk(labels(key))?;
        let base = self.base[node];
        (base < 0).then(|| RecordId((-base) as u32))
    }

    fn key(&self, id: RecordId) -> Option<&[u8]> {
        self.keys.get(id.index()).and_then(|k| k.as_deref())
    }

    fn delete(&mut self, id: RecordId) -> bool {
        let key = match self.key(id) {
            Some(key) => key.to_vec(),
            None => return false,
        };

        let mut path = vec![ROOT];
        for label in labels(&key) {
            match self.child(*path.last().unwrap_or(&ROOT), label) {
                Some(next) => path.push(next),
                None => return false,
            }
        }

        // Prune from the terminal upwards while nodes are left childless.
        while let Some(node) = path.pop() {
            if node == ROOT {
                if self.child_labels(ROOT).is_empty() {
                    self.base[ROOT] = 0;
                }
                break;
            }
            if self.base[node] > 0 && !self.child_labels(node).is_empty() {
                break;
            }
            self.release(node);
        }

        self.keys[id.index()] = None;
        self.ids.release(id);
        self.size -= 1;
        true
    }

    fn size(&self) -> usize {
        self.size
    }

    fn ids(&self) -> Vec<RecordId> {
        let mut out = Vec::with_capacity(self.size);
        self.collect(ROOT, &mut out);
        out
    }

    fn truncate(&mut self) {
        *self = DoubleArrayTrie::new();
    }
}

impl OrderedKeyStore for DoubleArrayTrie {
    fn prefix_search(&self, prefix: &[u8]) -> Vec<RecordId> {
        let mut out = Vec::new();
        if let Some(node) = self.walk(prefix.iter().map(|b| *b as usize + 1)) {
            self.collect(node, &mut out);
        }
        out
    }

    fn common_prefix_search(&self, query: &[u8]) -> Vec<RecordId> {
        let mut out = Vec::new();
        let mut node = ROOT;
        for (depth, label) in query.iter().map(|b| *b as usize + 1).enumerate() {
            if let Some(end) = self.child(node, TERMINATOR) {
                out.push(RecordId((-self.base[end]) as u32));
            }
            node = match self.child(node, label) {
                Some(next) => next,
                None => return out,
            };
            if depth + 1 == query.len() {
                if let Some(end) = self.child(node, TERMINATOR) {
                    out.push(RecordId((-self.base[end]) as u32));
                }
            }
        }
        if query.is_empty() {
            if let Some(end) = self.child(ROOT, TERMINATOR) {
                out.push(RecordId((-self.base[end]) as u32));
            }
        }
        out
    }
}
