//! Probabilistic skip list, the ordered backbone of the sorted index.
//!
//! A sorted linked list with express lanes: each node is linked at a random
//! number of levels, so search, insert, and delete run in O(log n) expected
//! time. Max level 16 with bump probability 0.25 keeps that expectation up
//! to a few million keys.
//!
//! Nodes live in a slab and link by `u32` index; the head is a plain array
//! of level pointers rather than a sentinel node, so every key value is
//! legal, including defaults. The RNG is instance-local; the structure does
//! no locking of its own.

use std::cmp::Ordering;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::value::IndexKey;

const MAX_LEVEL: usize = 16;
const POPULATION: f64 = 0.25;

/// End-of-chain marker.
const NIL: u32 = u32::MAX;
/// Predecessor marker for "the head itself".
const HEAD: u32 = u32::MAX - 1;

struct Node<K, V> {
    key: K,
    value: V,
    next: [u32; MAX_LEVEL],
}

/// Sorted map from `K` to `V`, ordered by [`IndexKey::cmp_key`].
pub struct SkipList<K, V> {
    head: [u32; MAX_LEVEL],
    slots: Vec<Option<Node<K, V>>>,
    free: Vec<u32>,
    level: usize,
    len: usize,
    rng: SmallRng,
}

impl<K: IndexKey, V> Default for SkipList<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: IndexKey, V> SkipList<K, V> {
    pub fn new() -> Self {
        SkipList {
            head: [NIL; MAX_LEVEL],
            slots: Vec::new(),
            free: Vec::new(),
            level: 1,
            len: 0,
            rng: SmallRng::from_entropy(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn node(&self, id: u32) -> &Node<K, V> {
        self.slots[id as usize].as_ref().expect("skip list node is live")
    }

    fn node_mut(&mut self, id: u32) -> &mut Node<K, V> {
        self.slots[id as usize].as_mut().expect("skip list node is live")
    }

    fn next_of(&self, at: u32, lvl: usize) -> u32 {
        if at == HEAD {
            self.head[lvl]
        } else {
            self.node(at).next[lvl]
        }
    }

    fn link(&mut self, at: u32, lvl: usize, to: u32) {
        if at == HEAD {
            self.head[lvl] = to;
        } else {
            self.node_mut(at).next[lvl] = to;
        }
    }

    fn random_level(&mut self) -> usize {
        let mut lvl = 1;
        while lvl < MAX_LEVEL && self.rng.gen::<f64>() < POPULATION {
            lvl += 1;
        }
        lvl
    }

    /// Walks down the lanes collecting, per level, the last node whose key
    /// is `< key`. Returns the predecessors and the level-0 successor (the
    /// first node with key `>= key`).
    fn find_update(&self, key: &K) -> ([u32; MAX_LEVEL], u32) {
        let mut update = [HEAD; MAX_LEVEL];
        let mut at = HEAD;

        for lvl in (0..self.level).rev() {
            loop {
                let next = self.next_of(at, lvl);
                if next != NIL && self.node(next).key.cmp_key(key) == Ordering::Less {
                    at = next;
                } else {
                    break;
                }
            }
            update[lvl] = at;
        }

        (update, self.next_of(at, 0))
    }

    /// First node with key `>= key`, or `NIL`.
    fn seek_ge(&self, key: &K) -> u32 {
        self.find_update(key).1
    }

    /// Inserts or updates. Returns true when a new node was inserted,
    /// false when an existing key's value was replaced.
    pub fn put(&mut self, key: K, value: V) -> bool {
        let (mut update, candidate) = self.find_update(&key);

        if candidate != NIL && self.node(candidate).key.cmp_key(&key) == Ordering::Equal {
            self.node_mut(candidate).value = value;
            return false;
        }

        let lvl = self.random_level();
        if lvl > self.level {
            for entry in update.iter_mut().take(lvl).skip(self.level) {
                *entry = HEAD;
            }
            self.level = lvl;
        }

        let mut node = Node {
            key,
            value,
            next: [NIL; MAX_LEVEL],
        };
        for (i, entry) in node.next.iter_mut().enumerate().take(lvl) {
            *entry = self.next_of(update[i], i);
        }

        let id = match self.free.pop() {
            Some(id) => {
                self.slots[id as usize] = Some(node);
                id
            }
            None => {
                self.slots.push(Some(node));
                (self.slots.len() - 1) as u32
            }
        };

        for (i, &pred) in update.iter().enumerate().take(lvl) {
            self.link(pred, i, id);
        }

        self.len += 1;
        true
    }

    /// Removes the key; false if it was not present.
    pub fn delete(&mut self, key: &K) -> bool {
        let (update, candidate) = self.find_update(key);

        if candidate == NIL || self.node(candidate).key.cmp_key(key) != Ordering::Equal {
            return false;
        }

        for lvl in 0..self.level {
            if self.next_of(update[lvl], lvl) != candidate {
                break;
            }
            let after = self.node(candidate).next[lvl];
            self.link(update[lvl], lvl, after);
        }

        while self.level > 1 && self.head[self.level - 1] == NIL {
            self.level -= 1;
        }

        self.slots[candidate as usize] = None;
        self.free.push(candidate);
        self.len -= 1;
        true
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        let candidate = self.seek_ge(key);
        if candidate != NIL && self.node(candidate).key.cmp_key(key) == Ordering::Equal {
            return Some(&self.node(candidate).value);
        }
        None
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let candidate = self.seek_ge(key);
        if candidate != NIL && self.node(candidate).key.cmp_key(key) == Ordering::Equal {
            return Some(&mut self.node_mut(candidate).value);
        }
        None
    }

    /// Visits every entry in ascending key order. Returns false when the
    /// visitor stopped early.
    pub fn traverse(&self, mut visit: impl FnMut(&K, &V) -> bool) -> bool {
        let mut at = self.head[0];
        while at != NIL {
            let node = self.node(at);
            if !visit(&node.key, &node.value) {
                return false;
            }
            at = node.next[0];
        }
        true
    }

    /// Visits keys in `[lo, hi]`, both ends inclusive. `lo > hi` visits
    /// nothing.
    pub fn range(&self, lo: &K, hi: &K, mut visit: impl FnMut(&K, &V) -> bool) {
        if lo.cmp_key(hi) == Ordering::Greater {
            return;
        }

        let mut at = self.seek_ge(lo);
        while at != NIL {
            let node = self.node(at);
            if node.key.cmp_key(hi) == Ordering::Greater {
                return;
            }
            if !visit(&node.key, &node.value) {
                return;
            }
            at = node.next[0];
        }
    }

    /// Visits all keys `< key`.
    pub fn less(&self, key: &K, mut visit: impl FnMut(&K, &V) -> bool) {
        let mut at = self.head[0];
        while at != NIL {
            let node = self.node(at);
            if node.key.cmp_key(key) != Ordering::Less {
                return;
            }
            if !visit(&node.key, &node.value) {
                return;
            }
            at = node.next[0];
        }
    }

    /// Visits all keys `<= key`.
    pub fn less_equal(&self, key: &K, mut visit: impl FnMut(&K, &V) -> bool) {
        let mut at = self.head[0];
        while at != NIL {
            let node = self.node(at);
            if node.key.cmp_key(key) == Ordering::Greater {
                return;
            }
            if !visit(&node.key, &node.value) {
                return;
            }
            at = node.next[0];
        }
    }

    /// Visits all keys `> key`.
    pub fn greater(&self, key: &K, mut visit: impl FnMut(&K, &V) -> bool) {
        let mut at = self.seek_ge(key);
        // keys are unique, at most one node to skip
        if at != NIL && self.node(at).key.cmp_key(key) == Ordering::Equal {
            at = self.node(at).next[0];
        }
        while at != NIL {
            let node = self.node(at);
            if !visit(&node.key, &node.value) {
                return;
            }
            at = node.next[0];
        }
    }

    /// Visits all keys `>= key`.
    pub fn greater_equal(&self, key: &K, mut visit: impl FnMut(&K, &V) -> bool) {
        let mut at = self.seek_ge(key);
        while at != NIL {
            let node = self.node(at);
            if !visit(&node.key, &node.value) {
                return;
            }
            at = node.next[0];
        }
    }

    pub fn min_key(&self) -> Option<&K> {
        match self.head[0] {
            NIL => None,
            first => Some(&self.node(first).key),
        }
    }

    pub fn max_key(&self) -> Option<&K> {
        self.last().map(|node| &node.key)
    }

    /// Value under the smallest key.
    pub fn first_value(&self) -> Option<&V> {
        match self.head[0] {
            NIL => None,
            first => Some(&self.node(first).value),
        }
    }

    /// Value under the largest key.
    pub fn last_value(&self) -> Option<&V> {
        self.last().map(|node| &node.value)
    }

    /// Rightmost node, found by jumping as far right as possible per lane.
    fn last(&self) -> Option<&Node<K, V>> {
        let mut at = HEAD;
        for lvl in (0..self.level).rev() {
            loop {
                let next = self.next_of(at, lvl);
                if next == NIL {
                    break;
                }
                at = next;
            }
        }
        if at == HEAD {
            None
        } else {
            Some(self.node(at))
        }
    }
}

impl<V> SkipList<String, V> {
    /// Visits every key carrying `prefix`, in order: position at the first
    /// key `>= prefix`, continue while the prefix holds.
    pub fn starts_with(&self, prefix: &str, mut visit: impl FnMut(&String, &V) -> bool) {
        let start = prefix.to_string();
        let mut at = self.seek_ge(&start);
        while at != NIL {
            let node = self.node(at);
            if !node.key.starts_with(prefix) {
                return;
            }
            if !visit(&node.key, &node.value) {
                return;
            }
            at = node.next[0];
        }
    }
}
