//! Adaptive set of triples sharing one pinned node position (all same
//! subject, all same predicate, or all same object). Starts as a packed
//! array and promotes in place to a hashed set once it crosses a threshold;
//! demotion never happens (spec §4.2).

use crate::config::StoreConfig;
use crate::fasthash::{FastHash, KeyPolicy};
use crate::triple::{Position, Triple};

/// Pinned-position triple equality: since every triple in a bunch shares the
/// pinned node already, only the other two positions need comparing. This
/// implementation fast-fails on **predicate before object** for
/// subject-pinned bunches (see DESIGN.md for the Open Question resolution);
/// predicate- and object-pinned bunches compare their own two non-pinned
/// positions in subject-then-remaining order.
#[derive(Clone, Copy)]
struct PinnedPolicy {
    pinned: Position,
}

impl KeyPolicy<Triple> for PinnedPolicy {
    fn eq(&self, a: &Triple, b: &Triple) -> bool {
        match self.pinned {
            Position::Subject => {
                a.predicate.equals(b.predicate.as_ref()) && a.object.equals(b.object.as_ref())
            }
            Position::Predicate => {
                a.subject.equals(b.subject.as_ref()) && a.object.equals(b.object.as_ref())
            }
            Position::Object => {
                a.subject.equals(b.subject.as_ref()) && a.predicate.equals(b.predicate.as_ref())
            }
        }
    }

    fn hash(&self, k: &Triple) -> u64 {
        match self.pinned {
            Position::Subject => mix(k.predicate.hash_code(), k.object.hash_code()),
            Position::Predicate => mix(k.subject.hash_code(), k.object.hash_code()),
            Position::Object => mix(k.subject.hash_code(), k.predicate.hash_code()),
        }
    }
}

fn mix(a: u64, b: u64) -> u64 {
    a.wrapping_mul(1_000_003) ^ b
}

fn pinned_eq(pinned: Position, a: &Triple, b: &Triple) -> bool {
    PinnedPolicy { pinned }.eq(a, b)
}

type HashedSet = FastHash<Triple, (), PinnedPolicy>;

/// A small, order-preserving array of triples, used while a bunch is below
/// its promotion threshold.
#[derive(Clone, Debug)]
struct ArrayBunch {
    pinned: Position,
    items: Vec<Triple>,
}

impl ArrayBunch {
    fn new(pinned: Position, first: Triple) -> Self {
        Self { pinned, items: vec![first] }
    }

    fn try_add(&mut self, t: Triple) -> bool {
        if self.items.iter().any(|existing| pinned_eq(self.pinned, existing, &t)) {
            return false;
        }
        self.items.push(t);
        true
    }

    fn try_remove(&mut self, t: &Triple) -> bool {
        if let Some(pos) = self.items.iter().position(|existing| pinned_eq(self.pinned, existing, t)) {
            self.items.swap_remove(pos);
            true
        } else {
            false
        }
    }

    fn contains(&self, t: &Triple) -> bool {
        self.items.iter().any(|existing| pinned_eq(self.pinned, existing, t))
    }

    fn size(&self) -> usize {
        self.items.len()
    }

    fn promote(&self) -> HashedSet {
        let mut hashed = FastHash::new(PinnedPolicy { pinned: self.pinned });
        for t in &self.items {
            hashed.add_unchecked(t.clone(), ());
        }
        hashed
    }
}

/// A bunch backed by a [`FastHash`] set, used once an array bunch crosses its
/// threshold. Internally keyed by the cheaper pinned-position equality.
#[derive(Clone)]
struct HashedBunch {
    pinned: Position,
    set: HashedSet,
}

impl HashedBunch {
    fn try_add(&mut self, t: Triple) -> bool {
        self.set.try_add(t, ())
    }

    fn try_remove(&mut self, t: &Triple) -> bool {
        self.set.try_remove(t)
    }

    fn contains(&self, t: &Triple) -> bool {
        self.set.contains(t)
    }

    fn size(&self) -> usize {
        self.set.size()
    }
}

/// The set of triples sharing one pinned node position. Promotes from
/// [`ArrayBunch`] to [`HashedBunch`] once the array exceeds its threshold;
/// never demotes.
#[derive(Clone)]
pub enum Bunch {
    Array(ArrayBunch),
    Hashed(HashedBunch),
}

impl Bunch {
    pub fn new(pinned: Position, first: Triple) -> Self {
        Bunch::Array(ArrayBunch::new(pinned, first))
    }

    fn threshold(pinned: Position, config: &StoreConfig) -> usize {
        match pinned {
            Position::Subject => config.subject_bunch_threshold,
            Position::Predicate | Position::Object => config.predicate_object_bunch_threshold,
        }
    }

    /// Inserts `t`, promoting an array bunch to a hashed bunch first if the
    /// insert would otherwise exceed the threshold. Returns whether a new
    /// triple was actually added (false on duplicate).
    pub fn try_add(&mut self, t: Triple, config: &StoreConfig) -> bool {
        match self {
            Bunch::Hashed(h) => h.try_add(t),
            Bunch::Array(a) => {
                if a.contains(&t) {
                    return false;
                }
                if a.size() >= Self::threshold(a.pinned, config) {
                    let mut hashed = HashedBunch { pinned: a.pinned, set: a.promote() };
                    let added = hashed.try_add(t);
                    *self = Bunch::Hashed(hashed);
                    added
                } else {
                    a.try_add(t)
                }
            }
        }
    }

    pub fn try_remove(&mut self, t: &Triple) -> bool {
        match self {
            Bunch::Array(a) => a.try_remove(t),
            Bunch::Hashed(h) => h.try_remove(t),
        }
    }

    /// Removes `t`, which the caller guarantees is present (e.g. it was just
    /// removed from a sibling bunch for the same stored triple).
    pub fn remove_unchecked(&mut self, t: &Triple) {
        let removed = self.try_remove(t);
        debug_assert!(removed, "remove_unchecked called on a bunch not containing the triple");
    }

    pub fn contains(&self, t: &Triple) -> bool {
        match self {
            Bunch::Array(a) => a.contains(t),
            Bunch::Hashed(h) => h.contains(t),
        }
    }

    /// Whether any triple in the bunch satisfies `f`, short-circuiting on the
    /// first match. Used by pattern-match `contains` queries (non-`Spo`
    /// classes), where the caller already knows the pinned position and only
    /// needs to test the remaining positions.
    pub fn any_match<F: Fn(&Triple) -> bool>(&self, f: F) -> bool {
        match self {
            Bunch::Array(a) => a.items.iter().any(|t| f(t)),
            Bunch::Hashed(h) => h.set.any_match(f),
        }
    }

    pub fn size(&self) -> usize {
        match self {
            Bunch::Array(a) => a.size(),
            Bunch::Hashed(h) => h.size(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = &Triple> + '_> {
        match self {
            Bunch::Array(a) => Box::new(a.items.iter()),
            Bunch::Hashed(h) => Box::new(h.set.key_iter()),
        }
    }

    pub fn is_hashed(&self) -> bool {
        matches!(self, Bunch::Hashed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Term;

    fn t(s: &str, p: &str, o: &str) -> Triple {
        Triple::of(Term::iri(s), Term::iri(p), Term::iri(o))
    }

    #[test]
    fn array_bunch_promotes_at_threshold() {
        let config = StoreConfig::default();
        let mut bunch = Bunch::new(Position::Subject, t("s", "p", "o0"));
        assert!(!bunch.is_hashed());
        for i in 1..16 {
            bunch.try_add(t("s", "p", &format!("o{i}")), &config);
        }
        assert!(!bunch.is_hashed(), "still at threshold, not yet over it");
        bunch.try_add(t("s", "p", "o16"), &config);
        assert!(bunch.is_hashed());
        assert_eq!(bunch.size(), 17);
    }

    #[test]
    fn duplicate_insert_is_idempotent() {
        let config = StoreConfig::default();
        let mut bunch = Bunch::new(Position::Subject, t("s", "p", "o"));
        assert!(!bunch.try_add(t("s", "p", "o"), &config));
        assert_eq!(bunch.size(), 1);
    }

    #[test]
    fn remove_from_array_and_hashed() {
        let config = StoreConfig::default();
        let mut bunch = Bunch::new(Position::Object, t("s0", "p", "o"));
        for i in 1..40 {
            bunch.try_add(t(&format!("s{i}"), "p", "o"), &config);
        }
        assert!(bunch.is_hashed());
        assert!(bunch.try_remove(&t("s5", "p", "o")));
        assert!(!bunch.contains(&t("s5", "p", "o")));
        assert!(!bunch.try_remove(&t("s5", "p", "o")));
    }
}
