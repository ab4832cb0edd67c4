//! MVCC transaction layer (spec §4.5–§4.8, C10): single-writer exclusion,
//! snapshot-isolated readers, and deadline-based forced termination.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::config::StoreConfig;
use crate::delta::{Delta, DeltaKind, DeltaPropagator, DeltaQueue};
use crate::error::{Result, StoreError};
use crate::store::{TripleStore, TripleStoreSnapshot};
use crate::triple::{Triple, TripleMatch};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    Read,
    Write,
}

struct RegisteredTransaction {
    id: u64,
    mode: Mode,
    deadline: Instant,
    expired: Arc<AtomicBool>,
}

struct Inner {
    active: Mutex<TripleStore>,
    stale: Arc<Mutex<TripleStore>>,
    generation: AtomicU64,
    /// Id of the transaction currently holding the writer slot, or `None` if
    /// free. Keyed by id (not a bare flag) so a release only takes effect if
    /// the releasing transaction still owns the slot — this is what makes a
    /// timed-out writer's release and the scheduler's expiry-release of the
    /// same slot idempotent together instead of racing (see
    /// `Inner::release_writer_slot`).
    writer_owner: Mutex<Option<u64>>,
    next_tx_id: AtomicU64,
    active_queue: Arc<DeltaQueue>,
    stale_queue: Arc<DeltaQueue>,
    registry: Mutex<Vec<RegisteredTransaction>>,
    write_timeout: Duration,
    read_timeout: Duration,
}

impl Inner {
    fn register(&self, mode: Mode, deadline: Instant) -> (u64, Arc<AtomicBool>) {
        let id = self.next_tx_id.fetch_add(1, Ordering::Relaxed);
        let expired = Arc::new(AtomicBool::new(false));
        self.registry.lock().push(RegisteredTransaction { id, mode, deadline, expired: Arc::clone(&expired) });
        (id, expired)
    }

    fn deregister(&self, id: u64) {
        self.registry.lock().retain(|tx| tx.id != id);
    }

    /// Releases the writer slot only if `id` is still its current owner.
    /// Called from both the timed-out/committing/aborting transaction itself
    /// and from the scheduler's expiry sweep; whichever runs first actually
    /// clears the slot, the other is a no-op, so the slot is never freed
    /// twice for one writer (which would let two writers hold it at once).
    fn release_writer_slot(&self, id: u64) {
        let mut owner = self.writer_owner.lock();
        if *owner == Some(id) {
            *owner = None;
        }
    }
}

/// Bounds transaction lifetimes and enforces single-writer exclusion.
///
/// Owns a background [`TransactionCoordinatorScheduler`] tick thread and a
/// [`DeltaPropagator`] thread; both are started at construction and must be
/// stopped explicitly with [`TransactionCoordinator::shutdown`].
pub struct TransactionCoordinator {
    inner: Arc<Inner>,
    scheduler: TransactionCoordinatorScheduler,
    propagator: DeltaPropagator,
}

impl TransactionCoordinator {
    pub fn new(write_timeout: Duration, read_timeout: Duration, scheduler: TransactionCoordinatorScheduler) -> Self {
        let inner = Arc::new(Inner {
            active: Mutex::new(TripleStore::new()),
            stale: Arc::new(Mutex::new(TripleStore::new())),
            generation: AtomicU64::new(0),
            writer_owner: Mutex::new(None),
            next_tx_id: AtomicU64::new(1),
            active_queue: Arc::new(DeltaQueue::new()),
            stale_queue: Arc::new(DeltaQueue::new()),
            registry: Mutex::new(Vec::new()),
            write_timeout,
            read_timeout,
        });
        scheduler.start(Arc::clone(&inner));
        let propagator = DeltaPropagator::start(
            Arc::clone(&inner.stale),
            Arc::clone(&inner.active_queue),
            Arc::clone(&inner.stale_queue),
            scheduler.tick_period,
        );
        Self { inner, scheduler, propagator }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(
            config.write_timeout,
            config.read_timeout,
            TransactionCoordinatorScheduler::new(config.scheduler_tick_period),
        )
    }

    pub fn begin(&self, mode: Mode) -> Result<Transaction> {
        match mode {
            Mode::Write => {
                let deadline = Instant::now() + self.inner.write_timeout;
                let (id, expired) = self.inner.register(Mode::Write, deadline);
                {
                    let mut owner = self.inner.writer_owner.lock();
                    if owner.is_some() {
                        drop(owner);
                        self.inner.deregister(id);
                        return Err(StoreError::WriterBusy);
                    }
                    *owner = Some(id);
                }
                let working = self.inner.active.lock().clone();
                Ok(Transaction {
                    inner: Arc::clone(&self.inner),
                    id,
                    mode,
                    deadline,
                    expired,
                    state: TxState::Active,
                    snapshot: None,
                    working: Some(working),
                    deltas: Vec::new(),
                })
            }
            Mode::Read => {
                let deadline = Instant::now() + self.inner.read_timeout;
                let (id, expired) = self.inner.register(Mode::Read, deadline);
                let snapshot = self.inner.active.lock().fork();
                Ok(Transaction {
                    inner: Arc::clone(&self.inner),
                    id,
                    mode,
                    deadline,
                    expired,
                    state: TxState::Active,
                    snapshot: Some(snapshot),
                    working: None,
                    deltas: Vec::new(),
                })
            }
        }
    }

    pub fn active_graph_delta_queue_length(&self) -> usize {
        self.inner.active_queue.len()
    }

    pub fn stale_graph_delta_queue_length(&self) -> usize {
        self.inner.stale_queue.len()
    }

    pub fn active_graph_delta_chain_length(&self) -> usize {
        self.inner.active_queue.chain_length()
    }

    pub fn stale_graph_delta_chain_length(&self) -> usize {
        self.inner.stale_queue.chain_length()
    }

    pub fn shutdown(self) {
        self.scheduler.shutdown();
        self.propagator.shutdown();
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum TxState {
    Active,
    Committed,
    Aborted,
    Ended,
}

/// A handle returned by [`TransactionCoordinator::begin`]. READ transactions
/// expose the read-only query surface against a pinned snapshot; WRITE
/// transactions expose the mutating surface against a private working copy
/// that is only published to the active graph at [`Transaction::commit`].
pub struct Transaction {
    inner: Arc<Inner>,
    id: u64,
    mode: Mode,
    deadline: Instant,
    expired: Arc<AtomicBool>,
    state: TxState,
    snapshot: Option<TripleStoreSnapshot>,
    working: Option<TripleStore>,
    deltas: Vec<Delta>,
}

impl Transaction {
    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    fn check_alive(&self) -> Result<()> {
        if self.expired.load(Ordering::Acquire) {
            return Err(StoreError::TransactionTimedOut);
        }
        if self.state != TxState::Active {
            return Err(StoreError::TransactionState(format!(
                "transaction {} is not active (state = {:?})",
                self.id, self.state
            )));
        }
        Ok(())
    }

    pub fn size(&self) -> Result<usize> {
        self.check_alive()?;
        Ok(match self.mode {
            Mode::Read => self.snapshot.as_ref().expect("read tx has a snapshot").size(),
            Mode::Write => self.working.as_ref().expect("write tx has a working copy").size(),
        })
    }

    pub fn contains(&self, pattern: &TripleMatch) -> Result<bool> {
        self.check_alive()?;
        Ok(match self.mode {
            Mode::Read => self.snapshot.as_ref().expect("read tx has a snapshot").contains(pattern),
            Mode::Write => self.working.as_ref().expect("write tx has a working copy").contains(pattern),
        })
    }

    pub fn find(&self, pattern: &TripleMatch) -> Result<Vec<Triple>> {
        self.check_alive()?;
        Ok(match self.mode {
            Mode::Read => self.snapshot.as_ref().expect("read tx has a snapshot").find(pattern),
            Mode::Write => self.working.as_ref().expect("write tx has a working copy").find(pattern),
        })
    }

    /// Inserts `t` into this transaction's working copy. WRITE mode only.
    pub fn add(&mut self, t: Triple) -> Result<bool> {
        self.check_alive()?;
        if self.mode != Mode::Write {
            return Err(StoreError::TransactionState("add called on a READ transaction".into()));
        }
        let working = self.working.as_mut().expect("write tx has a working copy");
        let added = working.add(t.clone());
        if added {
            self.deltas.push(Delta { kind: DeltaKind::Add, triple: t, generation: 0 });
        }
        Ok(added)
    }

    /// Removes `t` from this transaction's working copy. WRITE mode only.
    pub fn remove(&mut self, t: &Triple) -> Result<bool> {
        self.check_alive()?;
        if self.mode != Mode::Write {
            return Err(StoreError::TransactionState("remove called on a READ transaction".into()));
        }
        let working = self.working.as_mut().expect("write tx has a working copy");
        let removed = working.remove(t);
        if removed {
            self.deltas.push(Delta { kind: DeltaKind::Remove, triple: t.clone(), generation: 0 });
        }
        Ok(removed)
    }

    /// Publishes this WRITE transaction's working copy as the new active
    /// generation and enqueues its deltas. WRITE mode only.
    pub fn commit(&mut self) -> Result<()> {
        if self.mode != Mode::Write {
            return Err(StoreError::TransactionState("commit called on a READ transaction".into()));
        }
        self.check_alive()?;
        let working = self.working.take().expect("write tx has a working copy");
        let generation = self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1;
        for delta in &mut self.deltas {
            delta.generation = generation;
        }
        *self.inner.active.lock() = working;
        let deltas = std::mem::take(&mut self.deltas);
        self.inner.active_queue.push_batch(deltas.clone());
        self.inner.stale_queue.push_batch(deltas);
        self.release_writer_and_deregister();
        self.state = TxState::Committed;
        Ok(())
    }

    /// Discards this WRITE transaction's working copy. No deltas are
    /// enqueued; the active generation is unchanged. WRITE mode only.
    pub fn abort(&mut self) -> Result<()> {
        if self.mode != Mode::Write {
            return Err(StoreError::TransactionState("abort called on a READ transaction".into()));
        }
        self.working = None;
        self.deltas.clear();
        self.release_writer_and_deregister();
        self.state = TxState::Aborted;
        Ok(())
    }

    /// Releases this READ transaction's generation pin. READ mode only;
    /// calling `end` on an uncommitted/unaborted WRITE transaction, or on an
    /// already-ended transaction, is a contract violation.
    pub fn end(&mut self) -> Result<()> {
        if self.mode != Mode::Read {
            return Err(StoreError::TransactionState(
                "end called on a WRITE transaction; use commit or abort".into(),
            ));
        }
        if self.state != TxState::Active {
            return Err(StoreError::TransactionState(format!(
                "end called on a transaction already in state {:?}",
                self.state
            )));
        }
        self.snapshot = None;
        self.inner.deregister(self.id);
        self.state = TxState::Ended;
        Ok(())
    }

    fn release_writer_and_deregister(&self) {
        self.inner.release_writer_slot(self.id);
        self.inner.deregister(self.id);
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.state == TxState::Active {
            if self.mode == Mode::Write {
                self.inner.release_writer_slot(self.id);
            }
            self.inner.deregister(self.id);
        }
    }
}

/// Ticks every `tick_period`, scanning registered transactions for deadline
/// expiry. A WRITE expiry also releases the writer-exclusion slot so a new
/// writer can proceed even though the expired transaction's thread has not
/// called `commit`/`abort` yet (per spec, it will receive
/// [`StoreError::TransactionTimedOut`] if it tries to).
pub struct TransactionCoordinatorScheduler {
    tick_period: Duration,
    shutdown: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TransactionCoordinatorScheduler {
    pub fn new(tick_period: Duration) -> Self {
        Self { tick_period, shutdown: Arc::new(AtomicBool::new(false)), handle: Mutex::new(None) }
    }

    fn start(&self, inner: Arc<Inner>) {
        let tick_period = self.tick_period;
        let shutdown = Arc::clone(&self.shutdown);
        let handle = thread::Builder::new()
            .name("triad-store-scheduler".into())
            .spawn(move || scheduler_loop(inner, tick_period, shutdown))
            .expect("failed to spawn transaction scheduler thread");
        *self.handle.lock() = Some(handle);
    }

    fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
        tracing::info!("transaction coordinator scheduler shut down");
    }
}

fn scheduler_loop(inner: Arc<Inner>, tick_period: Duration, shutdown: Arc<AtomicBool>) {
    tracing::info!("transaction coordinator scheduler started");
    loop {
        let now = Instant::now();
        let mut expired_writer_ids = Vec::new();
        for tx in inner.registry.lock().iter() {
            if now >= tx.deadline && !tx.expired.swap(true, Ordering::AcqRel) {
                tracing::warn!(tx_id = tx.id, mode = ?tx.mode, "transaction deadline expired");
                if tx.mode == Mode::Write {
                    expired_writer_ids.push(tx.id);
                }
            }
        }
        // Release by id, not a blanket flag-clear: if the expired writer's own
        // thread is concurrently calling `commit`/`abort`/dropping, exactly one
        // of the two releases takes effect (`release_writer_slot` is a no-op
        // once the slot has already moved to a different owner), so a second
        // writer's slot is never freed out from under it.
        for id in expired_writer_ids {
            inner.release_writer_slot(id);
        }
        if shutdown.load(Ordering::Acquire) {
            break;
        }
        thread::sleep(tick_period);
    }
    tracing::info!("transaction coordinator scheduler loop exiting");
}

/// The additive MVCC wrapper: owns the active/stale graphs and the
/// coordinator, and is the only way callers reach them (spec §4.8 — there is
/// deliberately no way back to a bare [`TripleStore`]'s mutating methods
/// once wrapped).
pub struct TransactionalStore {
    coordinator: TransactionCoordinator,
}

impl TransactionalStore {
    pub fn new(config: StoreConfig) -> Self {
        Self { coordinator: TransactionCoordinator::from_config(&config) }
    }

    pub fn begin(&self, mode: Mode) -> Result<Transaction> {
        self.coordinator.begin(mode)
    }

    pub fn active_graph_delta_queue_length(&self) -> usize {
        self.coordinator.active_graph_delta_queue_length()
    }

    pub fn stale_graph_delta_queue_length(&self) -> usize {
        self.coordinator.stale_graph_delta_queue_length()
    }

    pub fn active_graph_delta_chain_length(&self) -> usize {
        self.coordinator.active_graph_delta_chain_length()
    }

    pub fn stale_graph_delta_chain_length(&self) -> usize {
        self.coordinator.stale_graph_delta_chain_length()
    }

    pub fn shutdown(self) {
        self.coordinator.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Term;

    fn t(s: &str, p: &str, o: &str) -> Triple {
        Triple::of(Term::iri(s), Term::iri(p), Term::iri(o))
    }

    fn coordinator() -> TransactionCoordinator {
        TransactionCoordinator::new(
            Duration::from_secs(30),
            Duration::from_secs(30),
            TransactionCoordinatorScheduler::new(Duration::from_millis(20)),
        )
    }

    #[test]
    fn write_commit_is_visible_to_new_reads_but_not_to_the_pinned_reader() {
        let coordinator = coordinator();

        let mut reader = coordinator.begin(Mode::Read).unwrap();
        assert_eq!(reader.size().unwrap(), 0);

        let mut writer = coordinator.begin(Mode::Write).unwrap();
        writer.add(t("s", "p", "o")).unwrap();
        writer.commit().unwrap();

        assert_eq!(reader.size().unwrap(), 0, "reader pinned before commit sees the old generation");
        reader.end().unwrap();

        let reader2 = coordinator.begin(Mode::Read).unwrap();
        assert_eq!(reader2.size().unwrap(), 1);

        coordinator.shutdown();
    }

    #[test]
    fn second_writer_is_rejected_while_one_is_active() {
        let coordinator = coordinator();
        let _writer = coordinator.begin(Mode::Write).unwrap();
        let second = coordinator.begin(Mode::Write);
        assert!(matches!(second, Err(StoreError::WriterBusy)));
        coordinator.shutdown();
    }

    #[test]
    fn abort_discards_writes_and_releases_the_writer_slot() {
        let coordinator = coordinator();
        let mut writer = coordinator.begin(Mode::Write).unwrap();
        writer.add(t("s", "p", "o")).unwrap();
        writer.abort().unwrap();

        let reader = coordinator.begin(Mode::Read).unwrap();
        assert_eq!(reader.size().unwrap(), 0);

        let writer2 = coordinator.begin(Mode::Write);
        assert!(writer2.is_ok(), "writer slot must be free after abort");
        coordinator.shutdown();
    }

    #[test]
    fn write_timeout_surfaces_at_commit() {
        let coordinator = TransactionCoordinator::new(
            Duration::from_millis(30),
            Duration::from_secs(30),
            TransactionCoordinatorScheduler::new(Duration::from_millis(5)),
        );
        let mut writer = coordinator.begin(Mode::Write).unwrap();
        thread::sleep(Duration::from_millis(100));
        let result = writer.commit();
        assert!(matches!(result, Err(StoreError::TransactionTimedOut)));

        // The writer slot must already be free, per §4.7, so the next write proceeds.
        let mut writer2 = coordinator.begin(Mode::Write).unwrap();
        writer2.add(t("s", "p", "o")).unwrap();
        writer2.commit().unwrap();
        coordinator.shutdown();
    }

    #[test]
    fn end_on_unresolved_write_transaction_is_a_contract_violation() {
        let coordinator = coordinator();
        let mut writer = coordinator.begin(Mode::Write).unwrap();
        assert!(matches!(writer.end(), Err(StoreError::TransactionState(_))));
        writer.abort().unwrap();
        coordinator.shutdown();
    }

    #[test]
    fn delta_queues_converge_after_commit() {
        let coordinator = coordinator();
        let mut writer = coordinator.begin(Mode::Write).unwrap();
        writer.add(t("s", "p", "o")).unwrap();
        writer.commit().unwrap();

        assert_eq!(coordinator.active_graph_delta_chain_length(), 1);

        for _ in 0..200 {
            if coordinator.stale_graph_delta_queue_length() == 0 && coordinator.active_graph_delta_queue_length() == 0 {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(coordinator.stale_graph_delta_queue_length(), 0);
        assert_eq!(coordinator.active_graph_delta_queue_length(), 0);
        assert_eq!(coordinator.stale_graph_delta_chain_length(), 1);
        coordinator.shutdown();
    }
}
