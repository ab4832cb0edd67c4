//! The RDF term model is, per scope, an external collaborator: the indexing
//! code in [`crate::fasthash`], [`crate::bunch`] and [`crate::store`] is
//! generic over the [`Node`] trait and never hard-codes [`Term`]. `Term` is
//! provided so the crate is directly usable without a separate term-model
//! dependency, and it is what the integration tests and doctests exercise.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A hashable, comparable RDF term.
///
/// Implementors must uphold `a.equals(b) ⇒ a.hash_code() == b.hash_code()`;
/// the store's correctness depends on it exactly as a `Hash`/`Eq` impl would.
pub trait Node: fmt::Debug + Send + Sync + std::any::Any {
    /// Strict equality: same kind, same lexical/structural value.
    fn equals(&self, other: &dyn Node) -> bool;

    /// Value equality across datatypes (e.g. `"1"^^xsd:int` == `"1.0"^^xsd:double`).
    /// Defaults to [`Node::equals`] for terms with no notion of cross-datatype value.
    fn same_value_as(&self, other: &dyn Node) -> bool {
        self.equals(other)
    }

    /// Hash consistent with [`Node::equals`].
    fn hash_code(&self) -> u64;

    /// A node used purely for bucketing/indexing purposes may collapse distinct
    /// representations of the same value onto one hash; defaults to `hash_code`.
    fn indexing_value_hash(&self) -> u64 {
        self.hash_code()
    }

    /// False only for the wildcard sentinel.
    fn is_concrete(&self) -> bool;
}

/// Concrete, `'static` RDF term. The crate's default [`Node`] implementation.
#[derive(Debug, Clone)]
pub enum Term {
    Iri(Arc<str>),
    BlankNode(Arc<str>),
    Literal { lexical: Arc<str>, datatype: Arc<str> },
    /// Wildcard sentinel; never stored, only used in a [`crate::triple::TripleMatch`].
    Any,
}

impl Term {
    pub fn iri(s: impl Into<Arc<str>>) -> Self {
        Term::Iri(s.into())
    }

    pub fn blank(s: impl Into<Arc<str>>) -> Self {
        Term::BlankNode(s.into())
    }

    pub fn literal(lexical: impl Into<Arc<str>>, datatype: impl Into<Arc<str>>) -> Self {
        Term::Literal { lexical: lexical.into(), datatype: datatype.into() }
    }

    pub fn plain_literal(lexical: impl Into<Arc<str>>) -> Self {
        Term::literal(lexical, "http://www.w3.org/2001/XMLSchema#string")
    }
}

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        Node::equals(self, other)
    }
}
impl Eq for Term {}

impl Hash for Term {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(Node::hash_code(self));
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    let mut hash = OFFSET;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

impl Node for Term {
    fn equals(&self, other: &dyn Node) -> bool {
        let Some(other) = (other as &dyn std::any::Any).downcast_ref::<Term>() else {
            return false;
        };
        match (self, other) {
            (Term::Iri(a), Term::Iri(b)) => a == b,
            (Term::BlankNode(a), Term::BlankNode(b)) => a == b,
            (Term::Literal { lexical: la, datatype: da }, Term::Literal { lexical: lb, datatype: db }) => {
                la == lb && da == db
            }
            (Term::Any, Term::Any) => true,
            _ => false,
        }
    }

    fn same_value_as(&self, other: &dyn Node) -> bool {
        let Some(other) = (other as &dyn std::any::Any).downcast_ref::<Term>() else {
            return false;
        };
        // Numeric literals compare by parsed value across xsd:int/xsd:double/etc;
        // every other kind falls back to strict equality.
        if let (
            Term::Literal { lexical: la, datatype: da },
            Term::Literal { lexical: lb, datatype: db },
        ) = (self, other)
        {
            if is_numeric_datatype(da) && is_numeric_datatype(db) {
                if let (Ok(fa), Ok(fb)) = (la.parse::<f64>(), lb.parse::<f64>()) {
                    return fa == fb;
                }
            }
        }
        self.equals(other)
    }

    fn hash_code(&self) -> u64 {
        match self {
            Term::Iri(s) => fnv1a(s.as_bytes()) ^ 0x1,
            Term::BlankNode(s) => fnv1a(s.as_bytes()) ^ 0x2,
            Term::Literal { lexical, datatype } => {
                let mut h = fnv1a(lexical.as_bytes());
                h = h.wrapping_mul(31).wrapping_add(fnv1a(datatype.as_bytes()));
                h ^ 0x3
            }
            Term::Any => 0,
        }
    }

    fn is_concrete(&self) -> bool {
        !matches!(self, Term::Any)
    }
}

fn is_numeric_datatype(datatype: &str) -> bool {
    matches!(
        datatype,
        "http://www.w3.org/2001/XMLSchema#int"
            | "http://www.w3.org/2001/XMLSchema#integer"
            | "http://www.w3.org/2001/XMLSchema#long"
            | "http://www.w3.org/2001/XMLSchema#double"
            | "http://www.w3.org/2001/XMLSchema#float"
            | "http://www.w3.org/2001/XMLSchema#decimal"
    )
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Iri(s) => write!(f, "<{s}>"),
            Term::BlankNode(s) => write!(f, "_:{s}"),
            Term::Literal { lexical, datatype } => write!(f, "\"{lexical}\"^^<{datatype}>"),
            Term::Any => write!(f, "*"),
        }
    }
}
