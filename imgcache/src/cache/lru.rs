//! Recency-ordered map backing the memory tier.
//!
//! Nodes live in a slab (`Vec<Option<Node>>`) and are threaded into a doubly
//! linked list by index, so lookup, touch, insert and pop are all O(1).
//! The head is the most recently used entry, the tail the least.

use std::collections::HashMap;
use std::hash::Hash;

const NIL: usize = usize::MAX;

struct Node<K, V> {
    key: K,
    value: V,
    cost: usize,
    prev: usize,
    next: usize,
}

pub(crate) struct LruMap<K, V> {
    index: HashMap<K, usize>,
    nodes: Vec<Option<Node<K, V>>>,
    free: Vec<usize>,
    head: usize,
    tail: usize,
    total_cost: usize,
}

impl<K, V> LruMap<K, V>
where
    K: Hash + Eq + Clone,
{
    pub(crate) fn new() -> Self {
        Self {
            index: HashMap::new(),
            nodes: Vec::new(),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
            total_cost: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.index.len()
    }

    pub(crate) fn total_cost(&self) -> usize {
        self.total_cost
    }

    pub(crate) fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Look up a value and mark it most recently used.
    pub(crate) fn get(&mut self, key: &K) -> Option<&V> {
        let idx = *self.index.get(key)?;
        self.detach(idx);
        self.push_front(idx);
        self.nodes[idx].as_ref().map(|node| &node.value)
    }

    /// Insert or replace a value, marking it most recently used.
    ///
    /// Returns the replaced value, if any.
    pub(crate) fn insert(&mut self, key: K, value: V, cost: usize) -> Option<V> {
        let replaced = self.remove(&key);

        let node = Node {
            key: key.clone(),
            value,
            cost,
            prev: NIL,
            next: NIL,
        };
        let idx = match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = Some(node);
                idx
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        };

        self.index.insert(key, idx);
        self.push_front(idx);
        self.total_cost += cost;
        replaced
    }

    pub(crate) fn remove(&mut self, key: &K) -> Option<V> {
        let idx = self.index.remove(key)?;
        self.release(idx).map(|(_, value, _)| value)
    }

    /// Remove and return the least recently used entry with its cost.
    pub(crate) fn pop_lru(&mut self) -> Option<(K, V, usize)> {
        if self.tail == NIL {
            return None;
        }
        let idx = self.tail;
        let released = self.release(idx)?;
        self.index.remove(&released.0);
        Some(released)
    }

    pub(crate) fn clear(&mut self) {
        self.index.clear();
        self.nodes.clear();
        self.free.clear();
        self.head = NIL;
        self.tail = NIL;
        self.total_cost = 0;
    }

    fn release(&mut self, idx: usize) -> Option<(K, V, usize)> {
        self.detach(idx);
        let node = self.nodes[idx].take()?;
        self.free.push(idx);
        self.total_cost = self.total_cost.saturating_sub(node.cost);
        Some((node.key, node.value, node.cost))
    }

    fn detach(&mut self, idx: usize) {
        let (prev, next) = match self.nodes[idx].as_ref() {
            Some(node) => (node.prev, node.next),
            None => return,
        };

        match prev {
            NIL => self.head = next,
            p => {
                if let Some(node) = self.nodes[p].as_mut() {
                    node.next = next;
                }
            }
        }
        match next {
            NIL => self.tail = prev,
            n => {
                if let Some(node) = self.nodes[n].as_mut() {
                    node.prev = prev;
                }
            }
        }

        if let Some(node) = self.nodes[idx].as_mut() {
            node.prev = NIL;
            node.next = NIL;
        }
    }

    fn push_front(&mut self, idx: usize) {
        let old_head = self.head;
        if let Some(node) = self.nodes[idx].as_mut() {
            node.prev = NIL;
            node.next = old_head;
        }
        if old_head != NIL {
            if let Some(node) = self.nodes[old_head].as_mut() {
                node.prev = idx;
            }
        } else {
            self.tail = idx;
        }
        self.head = idx;
    }
}
