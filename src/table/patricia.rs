use serde::{Serialize, Deserialize};
use crate::core::types::RecordId;
use crate::table::keys::{IdAllocator, KeyStore, OrderedKeyStore};

/// Crit-bit (PATRICIA) tree over byte keys.
///
/// Keys are compared as sequences of 9-bit symbols: a presence bit followed
/// by the 8 data bits, with "end of key" encoded as an all-zero symbol. A key
/// therefore sorts before every key it is a proper prefix of, and an
/// in-order walk yields byte-lexicographic order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatriciaTrie {
    nodes: Vec<Node>,
    free_nodes: Vec<u32>,
    root: Option<u32>,
    keys: Vec<Option<Vec<u8>>>,
    ids: IdAllocator,
    size: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
enum Node {
    Leaf(u32),
    Branch { bit: u32, children: [u32; 2] },
}

const SYMBOL_BITS: usize = 9;

fn bit_at(key: &[u8], bit: usize) -> usize {
    let sym = bit / SYMBOL_BITS;
    let offset = bit % SYMBOL_BITS;
    match key.get(sym) {
        None => 0,
        Some(_) if offset == 0 => 1,
        Some(byte) => ((byte >> (8 - offset)) & 1) as usize,
    }
}

fn symbol(key: &[u8], sym: usize) -> u16 {
    key.get(sym).map(|b| 0x100 | *b as u16).unwrap_or(0)
}

/// Index of the first bit where two distinct keys differ.
fn critical_bit(a: &[u8], b: &[u8]) -> Option<usize> {
    let len = a.len().max(b.len());
    (0..=len).find_map(|sym| {
        let diff = symbol(a, sym) ^ symbol(b, sym);
        if diff == 0 {
            None
        } else {
            let high = 15 - diff.leading_zeros() as usize;
            Some(sym * SYMBOL_BITS + (8 - high))
        }
    })
}

impl Default for PatriciaTrie {
    fn default() -> Self {
        Self::new()
    }
}

impl PatriciaTrie {
    pub fn new() -> Self {
        PatriciaTrie {
            nodes: Vec::new(),
            free_nodes: Vec::new(),
            root: None,
            keys: vec![None],
            ids: IdAllocator::new(),
            size: 0,
        }
    }

    fn alloc(&mut self, node: Node) -> u32 {
        match self.free_nodes.pop() {
            Some(index) => {
                self.nodes[index as usize] = node;
                index
            }
            None => {
                self.nodes.push(node);
                (self.nodes.len() - 1) as u32
            }
        }
    }

    /// Leaf reached by following `key`'s bits; the only candidate match.
    fn best_match(&self, key: &[u8]) -> Option<u32> {
        let mut cur = self.root?;
        loop {
            match self.nodes[cur as usize] {
                Node::Branch { bit, children } => cur = children[bit_at(key, bit as usize)],
                Node::Leaf(id) => return Some(id),
            }
        }
    }

    fn leaf_key(&self, id: u32) -> &[u8] {
        self.keys[id as usize].as_deref().unwrap_or(&[])
    }

    fn set_child(&mut self, parent: Option<(u32, usize)>, node: u32) {
        match parent {
            None => self.root = Some(node),
            Some((p, dir)) => {
                if let Node::Branch { children, .. } = &mut self.nodes[p as usize] {
                    children[dir] = node;
                }
            }
        }
    }

    /// Appends the ids below `node` in key order.
    fn collect(&self, node: u32, out: &mut Vec<RecordId>) {
        let mut stack = vec![node];
        while let Some(cur) = stack.pop() {
            match self.nodes[cur as usize] {
                Node::Leaf(id) => out.push(RecordId(id)),
                Node::Branch { children, .. } => {
                    stack.push(children[1]);
                    stack.push(children[0]);
                }
            }
        }
    }

    fn leftmost_leaf(&self, mut node: u32) -> u32 {
        loop {
            match self.nodes[node as usize] {
                Node::Leaf(id) => return id,
                Node::Branch { children, .. } => node = children[0],
            }
        }
    }

    fn store_key(&mut self, key: &[u8]) -> RecordId {
        let id = self.ids.allocate();
        if self.keys.len() <= id.index() {
            self.keys.resize(id.index() + 1, None);
        }
        self.keys[id.index()] = Some(key.to_vec());
        self.size += 1;
        id
    }
}

impl KeyStore for PatriciaTrie {
    fn add(&mut self, key: &[u8]) -> (RecordId, bool) {
        let (root, existing) = match (self.root, self.best_match(key)) {
            (Some(root), Some(existing)) => (root, existing),
            _ => {
                let id = self.store_key(key);
                let leaf = self.alloc(Node::Leaf(id.0));
                self.root = Some(leaf);
                return (id, true);
            }
        };

        let crit = match critical_bit(key, self.leaf_key(existing)) {
            None => return (RecordId(existing), false),
            Some(crit) => crit,
        };

        // Descend again to the first node that splits after `crit`.
        let mut parent = None;
        let mut cur = root;
        while let Node::Branch { bit, children } = self.nodes[cur as usize] {
            if bit as usize > crit {
                break;
            }
            let dir = bit_at(key, bit as usize);
            parent = Some((cur, dir));
            cur = children[dir];
        }

        let id = self.store_key(key);
        let leaf = self.alloc(Node::Leaf(id.0));
        let dir = bit_at(key, crit);
        let mut children = [0u32; 2];
        children[dir] = leaf;
        children[1 - dir] = cur;
        let branch = self.alloc(Node::Branch { bit: crit as u32, children });
        self.set_child(parent, branch);

        (id, true)
    }

    fn find(&self, key: &[u8]) -> Option<RecordId> {
        let id = self.best_match(key)?;
        (self.leaf_key(id) == key).then_some(RecordId(id))
    }

    fn key(&self, id: RecordId) -> Option<&[u8]> {
        self.keys.get(id.index()).and_then(|k| k.as_deref())
    }

    fn delete(&mut self, id: RecordId) -> bool {
        let key = match self.key(id) {
            Some(key) => key.to_vec(),
            None => return false,
        };

        let mut grandparent = None;
        let mut parent: Option<(u32, usize)> = None;
        let mut cur = match self.root {
            Some(root) => root,
            None => return false,
        };
        while let Node::Branch { bit, children } = self.nodes[cur as usize] {
            let dir = bit_at(&key, bit as usize);
            grandparent = parent;
            parent = Some((cur, dir));
            cur = children[dir];
        }

        match parent {
            None => self.root = None,
            Some((p, dir)) => {
                let sibling = match self.nodes[p as usize] {
                    Node::Branch { children, .. } => children[1 - dir],
                    Node::Leaf(_) => return false,
                };
                self.set_child(grandparent, sibling);
                self.free_nodes.push(p);
            }
        }
        self.free_nodes.push(cur);

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
        if let Some(root) = self.root {
            self.collect(root, &mut out);
        }
        out
    }

    fn truncate(&mut self) {
        *self = PatriciaTrie::new();
    }
}

impl OrderedKeyStore for PatriciaTrie {
    fn prefix_search(&self, prefix: &[u8]) -> Vec<RecordId> {
        let mut cur = match self.root {
            Some(root) => root,
            None => return Vec::new(),
        };
        let prefix_bits = prefix.len() * SYMBOL_BITS;
        while let Node::Branch { bit, children } = self.nodes[cur as usize] {
            if bit as usize >= prefix_bits {
                break;
            }
            cur = children[bit_at(prefix, bit as usize)];
        }

        // Every key below `cur` agrees on the first `prefix_bits` bits.
        let mut out = Vec::new();
        if self.leaf_key(self.leftmost_leaf(cur)).starts_with(prefix) {
            self.collect(cur, &mut out);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn critical_bit_orders_prefix_first() {
        // "a" vs "ab": differ at the presence bit of symbol 1.
        assert_eq!(critical_bit(b"a", b"ab"), Some(9));
        assert_eq!(bit_at(b"a", 9), 0);
        assert_eq!(bit_at(b"ab", 9), 1);
        assert_eq!(critical_bit(b"abc", b"abc"), None);
    }

    #[test]
    fn keys_with_zero_bytes_stay_distinct() {
        let mut trie = PatriciaTrie::new();
        let (a, _) = trie.add(b"a");
        let (b, _) = trie.add(b"a\0");
        assert_ne!(a, b);
        assert_eq!(trie.find(b"a"), Some(a));
        assert_eq!(trie.find(b"a\0"), Some(b));
        assert_eq!(trie.ids(), vec![a, b]);
    }

    #[test]
    fn delete_keeps_the_rest_reachable() {
        let mut trie = PatriciaTrie::new();
        let words = ["romance", "romanus", "romulus", "rubens", "ruber", "rubicon", "rubicundus"];
        let ids: Vec<RecordId> = words.iter().map(|w| trie.add(w.as_bytes()).0).collect();

        assert!(trie.delete(ids[2]));
        assert!(!trie.delete(ids[2]));
        assert_eq!(trie.find(b"romulus"), None);
        for (i, w) in words.iter().enumerate() {
            if i != 2 {
                assert_eq!(trie.find(w.as_bytes()), Some(ids[i]), "{}", w);
            }
        }
        assert_eq!(trie.size(), 6);
        assert_eq!(trie.prefix_search(b"rubic").len(), 2);

        for id in &ids {
            trie.delete(*id);
        }
        assert_eq!(trie.size(), 0);
        assert!(trie.ids().is_empty());
        assert!(trie.prefix_search(b"r").is_empty());
    }

    #[test]
    fn ordered_walk_matches_sorted_keys() {
        let mut trie = PatriciaTrie::new();
        let mut keys: Vec<String> = (0..500).map(|i| format!("{:x}", i * 7919 % 1000)).collect();
        for k in &keys {
            trie.add(k.as_bytes());
        }
        keys.sort();
        keys.dedup();
        let walked: Vec<String> = trie
            .ids()
            .iter()
            .map(|id| String::from_utf8(trie.key(*id).unwrap().to_vec()).unwrap())
            .collect();
        assert_eq!(walked, keys);
    }
}
