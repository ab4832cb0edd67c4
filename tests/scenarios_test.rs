// End-to-end scenarios over the public TripleStore and MVCC surface.

use std::collections::HashSet;
use std::time::Duration;

use triad_store::transaction::{Mode, TransactionCoordinator, TransactionCoordinatorScheduler};
use triad_store::{Node, StoreError, Term, Triple, TripleMatch, TripleStore};

fn t(s: &str, p: &str, o: &str) -> Triple {
    Triple::of(Term::iri(s), Term::iri(p), Term::iri(o))
}

#[test]
fn e1_insert_and_pattern_counts() {
    let mut store = TripleStore::new();
    store.add(t("s", "p", "x"));
    store.add(t("x", "p", "o"));
    store.add(t("x2", "p", "o1"));
    store.add(t("x2", "p", "o3"));
    store.add(t("x2", "p", "o4"));

    assert_eq!(store.size(), 5);
    assert_eq!(store.find(&TripleMatch::of(Term::iri("x2"), Term::Any, Term::Any)).len(), 3);
    assert_eq!(store.find(&TripleMatch::of(Term::Any, Term::iri("p"), Term::Any)).len(), 5);
}

#[test]
fn e2_remove_then_contains_and_double_remove() {
    let mut store = TripleStore::new();
    store.add(t("s", "p", "x"));
    store.add(t("x", "p", "o"));
    store.add(t("x2", "p", "o1"));
    store.add(t("x2", "p", "o3"));
    store.add(t("x2", "p", "o4"));

    assert!(store.remove(&t("x2", "p", "o1")));
    assert_eq!(store.size(), 4);
    assert!(!store.contains(&t("x2", "p", "o1").into()));
    assert_eq!(store.find(&TripleMatch::of(Term::iri("x2"), Term::Any, Term::Any)).len(), 2);

    assert!(!store.remove(&t("x2", "p", "o1")));
    assert_eq!(store.size(), 4);
}

#[test]
fn e3_subject_bunch_promotes_at_seventeenth_insert() {
    let mut store = TripleStore::new();
    let mut inserted = HashSet::new();
    for i in 1..=17 {
        let triple = t("s", "p", &format!("o{i}"));
        store.add(triple.clone());
        inserted.insert((triple.subject.hash_code(), triple.predicate.hash_code(), triple.object.hash_code()));
    }

    let found: HashSet<_> = store
        .find(&TripleMatch::of(Term::iri("s"), Term::iri("p"), Term::Any))
        .into_iter()
        .map(|triple| (triple.subject.hash_code(), triple.predicate.hash_code(), triple.object.hash_code()))
        .collect();
    assert_eq!(found, inserted);
    assert_eq!(found.len(), 17);
}

#[test]
fn e4_any_po_query_returns_full_match_set_regardless_of_pivot_branch() {
    let mut store = TripleStore::new();
    for i in 1..=500 {
        store.add(t(&format!("s{i}"), "p", "true"));
    }
    // Predicate bunch and object bunch are both size 500 here (every triple
    // shares both "p" and "true"), so choose_pivot's tie-break takes the
    // object branch; the result must still be correct regardless.
    let result = store.find(&TripleMatch::of(Term::Any, Term::iri("p"), Term::iri("true")));
    assert_eq!(result.len(), 500);

    // Object bunch for "single" holds 450 triples spread across 450 distinct
    // predicates; only 5 of them also use predicate "p2". With
    // object_bunch_size (450) > threshold (400) and predicate_bunch_size (5)
    // < object_bunch_size, choose_pivot takes the predicate-pivot branch here.
    let mut store2 = TripleStore::new();
    for i in 1..=445 {
        store2.add(t(&format!("s{i}"), &format!("other_p{i}"), "single"));
    }
    for i in 1..=5 {
        store2.add(t(&format!("t{i}"), "p2", "single"));
    }
    let result2 = store2.find(&TripleMatch::of(Term::Any, Term::iri("p2"), Term::iri("single")));
    assert_eq!(result2.len(), 5);
}

#[test]
fn e5_reader_pinned_before_commit_does_not_see_it() {
    let coordinator = TransactionCoordinator::new(
        Duration::from_secs(30),
        Duration::from_secs(30),
        TransactionCoordinatorScheduler::new(Duration::from_millis(20)),
    );

    let mut reader = coordinator.begin(Mode::Read).unwrap();
    let mut writer = coordinator.begin(Mode::Write).unwrap();
    writer.add(t("s", "p", "o")).unwrap();
    writer.commit().unwrap();

    assert_eq!(reader.size().unwrap(), 0);
    reader.end().unwrap();

    let reader2 = coordinator.begin(Mode::Read).unwrap();
    assert_eq!(reader2.size().unwrap(), 1);

    coordinator.shutdown();
}

#[test]
fn e6_write_timeout_then_next_write_sees_pre_expiry_state() {
    let coordinator = TransactionCoordinator::new(
        Duration::from_millis(400),
        Duration::from_secs(30),
        TransactionCoordinatorScheduler::new(Duration::from_millis(20)),
    );

    let mut first = coordinator.begin(Mode::Write).unwrap();
    first.add(t("s", "p", "o")).unwrap();
    std::thread::sleep(Duration::from_millis(500));
    let result = first.commit();
    assert!(matches!(result, Err(StoreError::TransactionTimedOut)));

    let reader = coordinator.begin(Mode::Read).unwrap();
    assert_eq!(reader.size().unwrap(), 0, "timed-out write must not have been published");

    let mut second = coordinator.begin(Mode::Write).unwrap();
    second.add(t("s", "p", "o2")).unwrap();
    second.commit().unwrap();

    let reader2 = coordinator.begin(Mode::Read).unwrap();
    assert_eq!(reader2.size().unwrap(), 1);

    coordinator.shutdown();
}
