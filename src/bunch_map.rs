//! A [`FastHash`] map from [`Node`] to [`Bunch`] (spec C5). Values are
//! `Arc`-wrapped so that, once a bunch map has been forked for a snapshot
//! (see [`crate::transaction`]), mutating one bunch clones only that bunch —
//! not the whole map — the granular half of the copy-on-write story whose
//! coarse half lives in [`FastHash`] itself.

use std::sync::Arc;

use crate::bunch::Bunch;
use crate::config::StoreConfig;
use crate::fasthash::{FastHash, FastHashSnapshot, KeyPolicy};
use crate::node::Node;
use crate::triple::{Position, Triple};

#[derive(Clone, Copy, Default)]
pub struct NodeKeyPolicy;

impl KeyPolicy<Arc<dyn Node>> for NodeKeyPolicy {
    fn eq(&self, a: &Arc<dyn Node>, b: &Arc<dyn Node>) -> bool {
        a.equals(b.as_ref())
    }

    fn hash(&self, k: &Arc<dyn Node>) -> u64 {
        k.indexing_value_hash()
    }
}

pub type BunchMapTable = FastHash<Arc<dyn Node>, Arc<Bunch>, NodeKeyPolicy>;
pub type BunchMapSnapshot = FastHashSnapshot<Arc<dyn Node>, Arc<Bunch>, NodeKeyPolicy>;

/// A single-position index (by-subject, by-predicate, or by-object).
#[derive(Clone)]
pub struct BunchMap {
    pinned: Position,
    table: BunchMapTable,
}

impl BunchMap {
    pub fn new(pinned: Position) -> Self {
        Self { pinned, table: FastHash::new(NodeKeyPolicy) }
    }

    pub fn get(&self, key: &Arc<dyn Node>) -> Option<&Arc<Bunch>> {
        self.table.get(key)
    }

    pub fn len(&self) -> usize {
        self.table.size()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn iter_bunches(&self) -> impl Iterator<Item = &Arc<Bunch>> {
        self.table.iter().map(|(_, b)| b)
    }

    pub fn fork(&self) -> BunchMapSnapshot {
        self.table.fork()
    }

    /// Inserts `t` under `key`, creating a fresh array bunch if absent.
    /// Returns whether a new triple was added (false on duplicate).
    pub fn insert(&mut self, key: Arc<dyn Node>, t: Triple, config: &StoreConfig) -> bool {
        if let Some(existing) = self.table.get_mut(&key) {
            Arc::make_mut(existing).try_add(t, config)
        } else {
            self.table.add_unchecked(key, Arc::new(Bunch::new(self.pinned, t)));
            true
        }
    }

    /// Inserts `t` under `key` without checking for duplicates (the caller
    /// already established via the subject bunch that `t` is new).
    pub fn insert_unchecked(&mut self, key: Arc<dyn Node>, t: Triple, config: &StoreConfig) {
        if let Some(existing) = self.table.get_mut(&key) {
            let added = Arc::make_mut(existing).try_add(t, config);
            debug_assert!(added, "insert_unchecked expected a genuinely new triple");
        } else {
            self.table.add_unchecked(key, Arc::new(Bunch::new(self.pinned, t)));
        }
    }

    /// Removes `t` from under `key`. If the bunch becomes empty, the key is
    /// dropped from the map immediately (spec §3 invariant: no empty bunches).
    pub fn remove(&mut self, key: &Arc<dyn Node>, t: &Triple) -> bool {
        let Some(bunch) = self.table.get_mut(key) else {
            return false;
        };
        let removed = Arc::make_mut(bunch).try_remove(t);
        if removed && bunch.is_empty() {
            self.table.remove_unchecked(key);
        }
        removed
    }

    /// Like [`BunchMap::remove`], but the caller guarantees the triple is
    /// present (it was already removed from the primary index).
    pub fn remove_unchecked(&mut self, key: &Arc<dyn Node>, t: &Triple) {
        if let Some(bunch) = self.table.get_mut(key) {
            Arc::make_mut(bunch).remove_unchecked(t);
            if bunch.is_empty() {
                self.table.remove_unchecked(key);
            }
        } else {
            debug_assert!(false, "remove_unchecked called with no bunch for key");
        }
    }

    pub fn clear(&mut self) {
        self.table.clear();
    }
}
