//! Open-addressed hash table primitive with stable element indices.
//!
//! Two parallel halves: a power-of-two `positions` slot vector (the probe
//! structure) and a dense-ish `keys`/`hash_codes`/`values` entries vector (the
//! storage). A slot holds `0` when empty or `!eindex` (bitwise NOT) when it
//! points at a live entry; decreasing linear probing with wraparound resolves
//! collisions. Deleted entries are returned to a free list threaded through
//! `hash_codes` so the entries vector never needs to be repacked.
//!
//! The entries vectors are `Arc`-wrapped so that [`FastHash::fork`] can hand
//! out an immutable [`FastHashSnapshot`] in O(|positions|) by copying only the
//! probe structure and cloning the `Arc`s; a subsequent mutation on the parent
//! copies the data vectors via [`Arc::make_mut`] (copy-on-write), which is a
//! no-op once no snapshot is left aliasing them. This single generic type
//! plays both the role of the plain primitive and the persistable variant the
//! spec describes separately — forking is simply unused by callers that never
//! need persistence.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_TABLE_ID: AtomicU64 = AtomicU64::new(1);

/// Decouples hashing/equality from `Hash`/`Eq` so a table can use an
/// application-level notion of both (e.g. [`crate::node::Node::hash_code`],
/// or a triple equality that ignores one pinned position).
pub trait KeyPolicy<K>: Clone {
    fn eq(&self, a: &K, b: &K) -> bool;
    fn hash(&self, k: &K) -> u64;
}

const MIN_CAPACITY: usize = 4;
const NONE_SLOT: i64 = 0;
const NO_NEXT_FREE: u64 = u64::MAX;

/// Mutable, open-addressed hash set/map. A map is `FastHash<K, V, P>`; a set
/// is `FastHash<K, (), P>`.
#[derive(Clone)]
pub struct FastHash<K, V, P: KeyPolicy<K>> {
    policy: P,
    positions: Vec<i64>,
    deleted: Vec<bool>,
    keys: Arc<Vec<Option<K>>>,
    hash_codes: Arc<Vec<u64>>,
    values: Arc<Vec<Option<V>>>,
    len: usize,
    keys_pos: usize,
    free_head: Option<usize>,
    id: u64,
}

/// Immutable fork of a [`FastHash`] at a point in time. Holds its own
/// `positions`/`deleted` vectors but aliases the parent's data arrays until
/// the parent's next structural mutation.
#[derive(Clone)]
pub struct FastHashSnapshot<K, V, P: KeyPolicy<K>> {
    policy: P,
    positions: Vec<i64>,
    deleted: Vec<bool>,
    keys: Arc<Vec<Option<K>>>,
    hash_codes: Arc<Vec<u64>>,
    values: Arc<Vec<Option<V>>>,
    len: usize,
    keys_pos: usize,
    parent_id: u64,
}

#[inline]
fn initial_slot(hash: u64, positions_len: usize) -> usize {
    (hash as usize) & (positions_len - 1)
}

#[inline]
fn dec_slot(slot: usize, positions_len: usize) -> usize {
    if slot == 0 { positions_len - 1 } else { slot - 1 }
}

impl<K, V, P: KeyPolicy<K>> FastHash<K, V, P>
where
    K: Clone,
    V: Clone,
{
    pub fn new(policy: P) -> Self {
        Self {
            policy,
            positions: vec![NONE_SLOT; MIN_CAPACITY],
            deleted: Vec::new(),
            keys: Arc::new(Vec::new()),
            hash_codes: Arc::new(Vec::new()),
            values: Arc::new(Vec::new()),
            len: 0,
            keys_pos: 0,
            free_head: None,
            id: NEXT_TABLE_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn size(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn probe(&self, key: &K) -> ProbeResult {
        let hash = self.policy.hash(key);
        let mut slot = initial_slot(hash, self.positions.len());
        loop {
            let p = self.positions[slot];
            if p == NONE_SLOT {
                return ProbeResult::Empty { slot, hash };
            }
            let eidx = (!p) as usize;
            if self.hash_codes[eidx] == hash
                && self.policy.eq(self.keys[eidx].as_ref().expect("live slot has a key"), key)
            {
                return ProbeResult::Found { slot, eidx };
            }
            slot = dec_slot(slot, self.positions.len());
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        matches!(self.probe(key), ProbeResult::Found { .. })
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        match self.probe(key) {
            ProbeResult::Found { eidx, .. } => self.values[eidx].as_ref(),
            ProbeResult::Empty { .. } => None,
        }
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        match self.probe(key) {
            ProbeResult::Found { eidx, .. } => Arc::make_mut(&mut self.values)[eidx].as_mut(),
            ProbeResult::Empty { .. } => None,
        }
    }

    fn ensure_capacity(&mut self) {
        if self.positions.len() <= 2 * (self.len + 1) {
            self.grow();
        }
    }

    fn grow(&mut self) {
        let new_len = (self.positions.len() * 2).max(MIN_CAPACITY);
        let mut positions = vec![NONE_SLOT; new_len];
        for i in 0..self.keys_pos {
            if self.deleted[i] {
                continue;
            }
            let hash = self.hash_codes[i];
            let mut slot = initial_slot(hash, new_len);
            while positions[slot] != NONE_SLOT {
                slot = dec_slot(slot, new_len);
            }
            positions[slot] = !(i as i64);
        }
        self.positions = positions;
    }

    fn allocate_slot(&mut self, key: K, value: V, hash: u64) -> usize {
        let keys = Arc::make_mut(&mut self.keys);
        let values = Arc::make_mut(&mut self.values);
        let hash_codes = Arc::make_mut(&mut self.hash_codes);
        if let Some(i) = self.free_head {
            let next = hash_codes[i];
            self.free_head = if next == NO_NEXT_FREE { None } else { Some(next as usize) };
            keys[i] = Some(key);
            values[i] = Some(value);
            hash_codes[i] = hash;
            self.deleted[i] = false;
            i
        } else {
            let i = self.keys_pos;
            keys.push(Some(key));
            values.push(Some(value));
            hash_codes.push(hash);
            self.deleted.push(false);
            self.keys_pos += 1;
            i
        }
    }

    /// Returns the new entry's stable index on insert, `!existing_index` on duplicate.
    pub fn add_and_get_index(&mut self, key: K, value: V) -> isize {
        self.ensure_capacity();
        match self.probe(&key) {
            ProbeResult::Found { eidx, .. } => !(eidx as isize),
            ProbeResult::Empty { slot, hash } => {
                let eidx = self.allocate_slot(key, value, hash);
                self.positions[slot] = !(eidx as i64);
                self.len += 1;
                eidx as isize
            }
        }
    }

    pub fn try_add(&mut self, key: K, value: V) -> bool {
        self.add_and_get_index(key, value) >= 0
    }

    /// Caller guarantees `key` is not already present. Debug-asserted; a release
    /// build that violates this leaves the table's invariants undefined.
    pub fn add_unchecked(&mut self, key: K, value: V) {
        debug_assert!(!self.contains(&key), "add_unchecked called with a key already present");
        self.ensure_capacity();
        let hash = self.policy.hash(&key);
        let mut slot = initial_slot(hash, self.positions.len());
        while self.positions[slot] != NONE_SLOT {
            slot = dec_slot(slot, self.positions.len());
        }
        let eidx = self.allocate_slot(key, value, hash);
        self.positions[slot] = !(eidx as i64);
        self.len += 1;
    }

    /// Knuth Algorithm R deletion, reversed-direction variant (spec §4.1):
    /// walk backward from the vacated slot, pulling forward any entry whose
    /// probe sequence still reaches the gap, to keep probe chains dense.
    fn remove_slot(&mut self, mut here: usize) -> usize {
        let eidx_removed = (!self.positions[here]) as usize;
        let mut scan = dec_slot(here, self.positions.len());
        loop {
            if self.positions[scan] == NONE_SLOT {
                break;
            }
            let scan_eidx = (!self.positions[scan]) as usize;
            let r = initial_slot(self.hash_codes[scan_eidx], self.positions.len());
            let condition = !((scan > r || r >= here) && (r >= here || here >= scan) && (here >= scan || scan > r));
            if condition {
                self.positions[here] = self.positions[scan];
                here = scan;
            }
            scan = dec_slot(scan, self.positions.len());
        }
        self.positions[here] = NONE_SLOT;

        let hash_codes = Arc::make_mut(&mut self.hash_codes);
        let keys = Arc::make_mut(&mut self.keys);
        let values = Arc::make_mut(&mut self.values);
        keys[eidx_removed] = None;
        values[eidx_removed] = None;
        self.deleted[eidx_removed] = true;
        hash_codes[eidx_removed] = self.free_head.map(|h| h as u64).unwrap_or(NO_NEXT_FREE);
        self.free_head = Some(eidx_removed);
        self.len -= 1;
        eidx_removed
    }

    pub fn try_remove(&mut self, key: &K) -> bool {
        match self.probe(key) {
            ProbeResult::Found { slot, .. } => {
                self.remove_slot(slot);
                true
            }
            ProbeResult::Empty { .. } => false,
        }
    }

    /// Returns the removed entry's stable index, or `-1` if absent.
    pub fn remove_and_get_index(&mut self, key: &K) -> isize {
        match self.probe(key) {
            ProbeResult::Found { slot, .. } => self.remove_slot(slot) as isize,
            ProbeResult::Empty { .. } => -1,
        }
    }

    /// Caller guarantees `key` is present. Debug-asserted; a release build
    /// that violates this is a documented no-op, never a corruption.
    pub fn remove_unchecked(&mut self, key: &K) {
        debug_assert!(self.contains(key), "remove_unchecked called with an absent key");
        if let ProbeResult::Found { slot, .. } = self.probe(key) {
            self.remove_slot(slot);
        }
    }

    pub fn clear(&mut self) {
        *self = Self::new(self.policy.clone());
    }

    pub fn key_iter(&self) -> impl Iterator<Item = &K> {
        LiveEntries { keys: &self.keys, deleted: &self.deleted, pos: 0, limit: self.keys_pos }
            .map(|(k, _)| k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        LiveEntries { keys: &self.keys, deleted: &self.deleted, pos: 0, limit: self.keys_pos }
            .map(|(k, i)| (k, self.values[i].as_ref().expect("live slot has a value")))
    }

    pub fn any_match<F: Fn(&K) -> bool>(&self, f: F) -> bool {
        self.key_iter().any(|k| f(k))
    }

    pub fn try_put(&mut self, key: K, value: V) -> bool {
        self.ensure_capacity();
        match self.probe(&key) {
            ProbeResult::Found { .. } => false,
            ProbeResult::Empty { slot, hash } => {
                let eidx = self.allocate_slot(key, value, hash);
                self.positions[slot] = !(eidx as i64);
                self.len += 1;
                true
            }
        }
    }

    pub fn put(&mut self, key: K, value: V) -> Option<V> {
        self.ensure_capacity();
        match self.probe(&key) {
            ProbeResult::Found { eidx, .. } => Arc::make_mut(&mut self.values)[eidx].replace(value),
            ProbeResult::Empty { slot, hash } => {
                let eidx = self.allocate_slot(key, value, hash);
                self.positions[slot] = !(eidx as i64);
                self.len += 1;
                None
            }
        }
    }

    pub fn get_or_default<'a>(&'a self, key: &K, default: &'a V) -> &'a V {
        self.get(key).unwrap_or(default)
    }

    pub fn compute_if_absent<F: FnOnce() -> V>(&mut self, key: K, f: F) -> &mut V {
        if !self.contains(&key) {
            self.put(key.clone(), f());
        }
        self.get_mut(&key).expect("just inserted or already present")
    }

    pub fn compute<F: FnOnce(Option<&V>) -> V>(&mut self, key: K, f: F) -> &mut V {
        let new_value = f(self.get(&key));
        self.put(key.clone(), new_value);
        self.get_mut(&key).expect("just inserted")
    }

    /// Forks an immutable snapshot sharing this table's data arrays. O(|positions|).
    pub fn fork(&self) -> FastHashSnapshot<K, V, P> {
        FastHashSnapshot {
            policy: self.policy.clone(),
            positions: self.positions.clone(),
            deleted: self.deleted.clone(),
            keys: Arc::clone(&self.keys),
            hash_codes: Arc::clone(&self.hash_codes),
            values: Arc::clone(&self.values),
            len: self.len,
            keys_pos: self.keys_pos,
            parent_id: self.id,
        }
    }
}

impl<K, V, P: KeyPolicy<K> + Default> Default for FastHash<K, V, P>
where
    K: Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new(P::default())
    }
}

impl<K, V, P: KeyPolicy<K>> FastHashSnapshot<K, V, P> {
    pub fn size(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Identifier of the [`FastHash`] this snapshot was forked from; used by
    /// tests to assert a snapshot is observably tied to its parent.
    pub fn parent_id(&self) -> u64 {
        self.parent_id
    }

    fn probe(&self, key: &K) -> ProbeResult {
        let hash = self.policy.hash(key);
        let mut slot = initial_slot(hash, self.positions.len());
        loop {
            let p = self.positions[slot];
            if p == NONE_SLOT {
                return ProbeResult::Empty { slot, hash };
            }
            let eidx = (!p) as usize;
            if self.hash_codes[eidx] == hash
                && self.policy.eq(self.keys[eidx].as_ref().expect("live slot has a key"), key)
            {
                return ProbeResult::Found { slot, eidx };
            }
            slot = dec_slot(slot, self.positions.len());
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        matches!(self.probe(key), ProbeResult::Found { .. })
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        match self.probe(key) {
            ProbeResult::Found { eidx, .. } => self.values[eidx].as_ref(),
            ProbeResult::Empty { .. } => None,
        }
    }

    pub fn key_iter(&self) -> impl Iterator<Item = &K> {
        LiveEntries { keys: &self.keys, deleted: &self.deleted, pos: 0, limit: self.keys_pos }
            .map(|(k, _)| k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        LiveEntries { keys: &self.keys, deleted: &self.deleted, pos: 0, limit: self.keys_pos }
            .map(|(k, i)| (k, self.values[i].as_ref().expect("live slot has a value")))
    }
}

enum ProbeResult {
    Empty { slot: usize, hash: u64 },
    Found { slot: usize, eidx: usize },
}

struct LiveEntries<'a, K> {
    keys: &'a [Option<K>],
    deleted: &'a [bool],
    pos: usize,
    limit: usize,
}

impl<'a, K> Iterator for LiveEntries<'a, K> {
    type Item = (&'a K, usize);

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.limit {
            let i = self.pos;
            self.pos += 1;
            if !self.deleted[i] {
                return Some((self.keys[i].as_ref().expect("live slot has a key"), i));
            }
        }
        None
    }
}
