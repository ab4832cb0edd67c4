//! An in-memory, triply-indexed RDF triple store with optional MVCC
//! snapshot isolation.
//!
//! [`TripleStore`] is the core, single-threaded data structure: a set of
//! [`Triple`]s indexed by subject, predicate, and object, queryable by
//! `(S?, P?, O?)` pattern. [`TransactionalStore`] wraps it with a
//! [`TransactionCoordinator`] to add snapshot-isolated reads concurrent with
//! a single writer.

pub mod bunch;
pub mod bunch_map;
pub mod config;
pub mod delta;
pub mod error;
pub mod fasthash;
pub mod node;
pub mod pattern;
pub mod store;
pub mod transaction;
pub mod triple;

pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use node::{Node, Term};
pub use store::{FindIter, TripleStore, TripleStoreSnapshot};
pub use transaction::{Mode, Transaction, TransactionCoordinator, TransactionCoordinatorScheduler, TransactionalStore};
pub use triple::{Position, Triple, TripleMatch};
