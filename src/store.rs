//! The indexed triple store (spec C7): three [`BunchMap`]s, one per pinned
//! position, kept in lockstep so every stored triple is reachable from its
//! subject, predicate, and object.

use std::sync::Arc;

use crate::bunch::Bunch;
use crate::bunch_map::{BunchMap, BunchMapSnapshot};
use crate::config::StoreConfig;
use crate::pattern::{choose_pivot, classify, PatternClass, PivotBranch};
use crate::triple::{Position, Triple, TripleMatch};

/// An in-memory, triply-indexed set of [`Triple`]s.
///
/// Usable standalone (no MVCC) — see [`crate::transaction::TransactionalStore`]
/// for the snapshot-isolated wrapper.
#[derive(Clone)]
pub struct TripleStore {
    config: StoreConfig,
    by_subject: BunchMap,
    by_predicate: BunchMap,
    by_object: BunchMap,
    size: usize,
}

impl TripleStore {
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            config,
            by_subject: BunchMap::new(Position::Subject),
            by_predicate: BunchMap::new(Position::Predicate),
            by_object: BunchMap::new(Position::Object),
            size: 0,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Whether any stored triple matches `pattern` (spec §4.3: dispatches on
    /// the pattern class like [`TripleStore::find`], but short-circuits
    /// instead of collecting). The `Spo` class collapses to exact membership.
    pub fn contains(&self, pattern: &TripleMatch) -> bool {
        match classify(pattern) {
            PatternClass::Spo => {
                let t = Triple::new(Arc::clone(&pattern.subject), Arc::clone(&pattern.predicate), Arc::clone(&pattern.object));
                self.by_subject.get(&pattern.subject).is_some_and(|b| b.contains(&t))
            }
            PatternClass::SpAny | PatternClass::SAnyO | PatternClass::SAnyAny => {
                self.by_subject.get(&pattern.subject).is_some_and(|b| b.any_match(|t| pattern.matches(t)))
            }
            PatternClass::AnyPo => match (self.by_predicate.get(&pattern.predicate), self.by_object.get(&pattern.object)) {
                (Some(pb), Some(ob)) => {
                    match choose_pivot(pb.size(), ob.size(), self.config.secondary_lookup_threshold) {
                        PivotBranch::Predicate => pb.any_match(|t| pattern.matches(t)),
                        PivotBranch::Object => ob.any_match(|t| pattern.matches(t)),
                    }
                }
                _ => false,
            },
            PatternClass::AnyPAny => self.by_predicate.get(&pattern.predicate).is_some_and(|b| b.any_match(|t| pattern.matches(t))),
            PatternClass::AnyAnyO => self.by_object.get(&pattern.object).is_some_and(|b| b.any_match(|t| pattern.matches(t))),
            PatternClass::AnyAnyAny => self.by_subject.iter_bunches().any(|b| b.any_match(|t| pattern.matches(t))),
        }
    }

    /// Adds `t`, indexing it under all three positions. Returns `false` if
    /// already present (the store is a set, not a bag).
    pub fn add(&mut self, t: Triple) -> bool {
        if !self.by_subject.insert(Arc::clone(&t.subject), t.clone(), &self.config) {
            return false;
        }
        self.by_predicate.insert_unchecked(Arc::clone(&t.predicate), t.clone(), &self.config);
        self.by_object.insert_unchecked(Arc::clone(&t.object), t, &self.config);
        self.size += 1;
        true
    }

    /// Removes `t` from all three indices. Returns `false` if absent.
    pub fn remove(&mut self, t: &Triple) -> bool {
        if !self.by_subject.remove(&t.subject, t) {
            return false;
        }
        self.by_predicate.remove_unchecked(&t.predicate, t);
        self.by_object.remove_unchecked(&t.object, t);
        self.size -= 1;
        true
    }

    pub fn clear(&mut self) {
        self.by_subject.clear();
        self.by_predicate.clear();
        self.by_object.clear();
        self.size = 0;
    }

    /// All triples, in no particular order.
    pub fn stream(&self) -> impl Iterator<Item = &Triple> + '_ {
        self.by_subject.iter_bunches().flat_map(|b| b.iter())
    }

    /// All triples matching `pattern`, driven by whichever index (or index
    /// pair, for `?PO`) the pattern class picks (spec §4.4).
    pub fn find(&self, pattern: &TripleMatch) -> Vec<Triple> {
        match classify(pattern) {
            PatternClass::Spo | PatternClass::SpAny | PatternClass::SAnyO | PatternClass::SAnyAny => {
                self.scan(self.by_subject.get(&pattern.subject), pattern)
            }
            PatternClass::AnyPo => match (self.by_predicate.get(&pattern.predicate), self.by_object.get(&pattern.object)) {
                (Some(pb), Some(ob)) => {
                    match choose_pivot(pb.size(), ob.size(), self.config.secondary_lookup_threshold) {
                        PivotBranch::Predicate => self.scan(Some(pb), pattern),
                        PivotBranch::Object => self.scan(Some(ob), pattern),
                    }
                }
                _ => Vec::new(),
            },
            PatternClass::AnyPAny => self.scan(self.by_predicate.get(&pattern.predicate), pattern),
            PatternClass::AnyAnyO => self.scan(self.by_object.get(&pattern.object), pattern),
            PatternClass::AnyAnyAny => self.stream().cloned().collect(),
        }
    }

    fn scan(&self, bunch: Option<&Arc<Bunch>>, pattern: &TripleMatch) -> Vec<Triple> {
        match bunch {
            Some(b) => b.iter().filter(|t| pattern.matches(t)).cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Forks an immutable, point-in-time view backed by [`BunchMapSnapshot`]s
    /// (copy-on-write: O(index capacity), not O(store size)). Used by
    /// [`crate::transaction::TransactionCoordinator`] to pin a READ
    /// transaction to the generation current at `begin`.
    pub fn fork(&self) -> TripleStoreSnapshot {
        TripleStoreSnapshot {
            config: self.config.clone(),
            by_subject: self.by_subject.fork(),
            by_predicate: self.by_predicate.fork(),
            by_object: self.by_object.fork(),
            size: self.size,
        }
    }

    /// A removal-capable cursor over [`TripleStore::find`]'s result set.
    ///
    /// The match set is materialized once, at construction, rather than
    /// streamed live off the underlying bunches: a live borrow of a bunch
    /// can't coexist with the `&mut self` a removal needs, and structural
    /// mutation of a bunch mid-scan (an array bunch's `swap_remove`, a hashed
    /// bunch's probe-chain repair) would otherwise reorder or skip entries
    /// out from under the scan.
    pub fn find_iter<'a>(&'a mut self, pattern: TripleMatch) -> FindIter<'a> {
        let matched = self.find(&pattern);
        FindIter { store: self, pattern, remaining: matched.into_iter(), current: None }
    }
}

impl Default for TripleStore {
    fn default() -> Self {
        Self::new()
    }
}

/// A frozen, read-only view of a [`TripleStore`] at the generation it was
/// forked from. Later writes to the parent store are invisible to it.
#[derive(Clone)]
pub struct TripleStoreSnapshot {
    config: StoreConfig,
    by_subject: BunchMapSnapshot,
    by_predicate: BunchMapSnapshot,
    by_object: BunchMapSnapshot,
    size: usize,
}

impl TripleStoreSnapshot {
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Whether any triple in this snapshot matches `pattern`. See
    /// [`TripleStore::contains`].
    pub fn contains(&self, pattern: &TripleMatch) -> bool {
        match classify(pattern) {
            PatternClass::Spo => {
                let t = Triple::new(Arc::clone(&pattern.subject), Arc::clone(&pattern.predicate), Arc::clone(&pattern.object));
                self.by_subject.get(&pattern.subject).is_some_and(|b| b.contains(&t))
            }
            PatternClass::SpAny | PatternClass::SAnyO | PatternClass::SAnyAny => {
                self.by_subject.get(&pattern.subject).is_some_and(|b| b.any_match(|t| pattern.matches(t)))
            }
            PatternClass::AnyPo => match (self.by_predicate.get(&pattern.predicate), self.by_object.get(&pattern.object)) {
                (Some(pb), Some(ob)) => {
                    match choose_pivot(pb.size(), ob.size(), self.config.secondary_lookup_threshold) {
                        PivotBranch::Predicate => pb.any_match(|t| pattern.matches(t)),
                        PivotBranch::Object => ob.any_match(|t| pattern.matches(t)),
                    }
                }
                _ => false,
            },
            PatternClass::AnyPAny => self.by_predicate.get(&pattern.predicate).is_some_and(|b| b.any_match(|t| pattern.matches(t))),
            PatternClass::AnyAnyO => self.by_object.get(&pattern.object).is_some_and(|b| b.any_match(|t| pattern.matches(t))),
            PatternClass::AnyAnyAny => self.by_subject.iter().any(|(_, b)| b.any_match(|t| pattern.matches(t))),
        }
    }

    pub fn stream(&self) -> impl Iterator<Item = &Triple> + '_ {
        self.by_subject.iter().flat_map(|(_, b)| b.iter())
    }

    pub fn find(&self, pattern: &TripleMatch) -> Vec<Triple> {
        match classify(pattern) {
            PatternClass::Spo | PatternClass::SpAny | PatternClass::SAnyO | PatternClass::SAnyAny => {
                Self::scan(self.by_subject.get(&pattern.subject), pattern)
            }
            PatternClass::AnyPo => match (self.by_predicate.get(&pattern.predicate), self.by_object.get(&pattern.object)) {
                (Some(pb), Some(ob)) => {
                    match choose_pivot(pb.size(), ob.size(), self.config.secondary_lookup_threshold) {
                        PivotBranch::Predicate => Self::scan(Some(pb), pattern),
                        PivotBranch::Object => Self::scan(Some(ob), pattern),
                    }
                }
                _ => Vec::new(),
            },
            PatternClass::AnyPAny => Self::scan(self.by_predicate.get(&pattern.predicate), pattern),
            PatternClass::AnyAnyO => Self::scan(self.by_object.get(&pattern.object), pattern),
            PatternClass::AnyAnyAny => self.stream().cloned().collect(),
        }
    }

    fn scan(bunch: Option<&Arc<Bunch>>, pattern: &TripleMatch) -> Vec<Triple> {
        match bunch {
            Some(b) => b.iter().filter(|t| pattern.matches(t)).cloned().collect(),
            None => Vec::new(),
        }
    }
}

pub struct FindIter<'a> {
    store: &'a mut TripleStore,
    #[allow(dead_code)]
    pattern: TripleMatch,
    remaining: std::vec::IntoIter<Triple>,
    current: Option<Triple>,
}

impl<'a> FindIter<'a> {
    /// Removes the triple most recently yielded by `next()`. No-op (returns
    /// `false`) before the first `next()` call or after the iterator is
    /// exhausted.
    pub fn remove_current(&mut self) -> bool {
        match self.current.take() {
            Some(t) => self.store.remove(&t),
            None => false,
        }
    }
}

impl<'a> Iterator for FindIter<'a> {
    type Item = Triple;

    fn next(&mut self) -> Option<Triple> {
        let next = self.remaining.next();
        self.current = next.clone();
        next
    }
}
