//! Classifies a query pattern into one of the eight SPO pattern classes
//! (spec §4.4) and decides the `?PO` secondary-index pivot.

use crate::triple::TripleMatch;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PatternClass {
    /// s, p, o all concrete.
    Spo,
    /// s, p concrete.
    SpAny,
    /// s, o concrete.
    SAnyO,
    /// only s concrete.
    SAnyAny,
    /// p, o concrete.
    AnyPo,
    /// only p concrete.
    AnyPAny,
    /// only o concrete.
    AnyAnyO,
    /// nothing concrete.
    AnyAnyAny,
}

pub fn classify(tm: &TripleMatch) -> PatternClass {
    use PatternClass::*;
    match (tm.subject.is_concrete(), tm.predicate.is_concrete(), tm.object.is_concrete()) {
        (true, true, true) => Spo,
        (true, true, false) => SpAny,
        (true, false, true) => SAnyO,
        (true, false, false) => SAnyAny,
        (false, true, true) => AnyPo,
        (false, true, false) => AnyPAny,
        (false, false, true) => AnyAnyO,
        (false, false, false) => AnyAnyAny,
    }
}

/// For an `?PO` query, which index to drive the scan from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PivotBranch {
    Predicate,
    Object,
}

/// Spec §4.4: if the object bunch exceeds `threshold` and the predicate bunch
/// is strictly smaller, scan the predicate bunch and filter by object;
/// otherwise scan the object bunch and filter by predicate.
pub fn choose_pivot(predicate_bunch_size: usize, object_bunch_size: usize, threshold: usize) -> PivotBranch {
    if object_bunch_size > threshold && predicate_bunch_size < object_bunch_size {
        PivotBranch::Predicate
    } else {
        PivotBranch::Object
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Term;

    #[test]
    fn classifies_all_eight_classes() {
        let concrete = || Term::iri("x");
        let any = Term::Any;

        assert_eq!(
            classify(&TripleMatch::of(concrete(), concrete(), concrete())),
            PatternClass::Spo
        );
        assert_eq!(
            classify(&TripleMatch::of(concrete(), concrete(), any.clone())),
            PatternClass::SpAny
        );
        assert_eq!(
            classify(&TripleMatch::of(concrete(), any.clone(), concrete())),
            PatternClass::SAnyO
        );
        assert_eq!(
            classify(&TripleMatch::of(concrete(), any.clone(), any.clone())),
            PatternClass::SAnyAny
        );
        assert_eq!(
            classify(&TripleMatch::of(any.clone(), concrete(), concrete())),
            PatternClass::AnyPo
        );
        assert_eq!(
            classify(&TripleMatch::of(any.clone(), concrete(), any.clone())),
            PatternClass::AnyPAny
        );
        assert_eq!(
            classify(&TripleMatch::of(any.clone(), any.clone(), concrete())),
            PatternClass::AnyAnyO
        );
        assert_eq!(
            classify(&TripleMatch::of(any.clone(), any.clone(), any)),
            PatternClass::AnyAnyAny
        );
    }

    #[test]
    fn pivot_favors_predicate_when_object_bunch_huge_and_predicate_smaller() {
        assert_eq!(choose_pivot(10, 500, 400), PivotBranch::Predicate);
    }

    #[test]
    fn pivot_falls_back_to_object_under_threshold() {
        assert_eq!(choose_pivot(10, 399, 400), PivotBranch::Object);
    }

    #[test]
    fn pivot_falls_back_to_object_on_tie() {
        assert_eq!(choose_pivot(500, 500, 400), PivotBranch::Object);
    }
}
