//! Commit deltas and the background worker that replays them onto the stale
//! (lagging) graph mirror (spec §4.6, C9).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::queue::SegQueue;
use parking_lot::Mutex;

use crate::store::TripleStore;
use crate::triple::Triple;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DeltaKind {
    Add,
    Remove,
}

/// A single `(kind, triple, generation)` record appended at commit.
///
/// `generation` is the commit generation that produced this delta. Spec
/// §4.6 motivates it as the key for skip-if-already-applied idempotency when
/// a freshly-forked replica replays a delta suffix it may overlap with; this
/// crate's [`DeltaPropagator`] has no such replica client (each delta is
/// popped from its queue and applied exactly once, never replayed), so the
/// field is carried for observability and for a future replica consumer
/// rather than consulted by `apply` today.
#[derive(Clone, Debug)]
pub struct Delta {
    pub kind: DeltaKind,
    pub triple: Triple,
    pub generation: u64,
}

/// An append-only FIFO of deltas, drained by exactly one consumer.
///
/// Tracks two counters: `len` (deltas currently enqueued, not yet drained —
/// what `*_delta_queue_length` reports) and `chain_length` (deltas ever
/// pushed, monotonic — what `*_delta_chain_length` reports, used by a fresh
/// replica to know how much history it would need to replay to catch up).
pub struct DeltaQueue {
    queue: SegQueue<Delta>,
    len: AtomicU64,
    chain_length: AtomicU64,
}

impl DeltaQueue {
    pub fn new() -> Self {
        Self { queue: SegQueue::new(), len: AtomicU64::new(0), chain_length: AtomicU64::new(0) }
    }

    pub fn push_batch(&self, deltas: impl IntoIterator<Item = Delta>) {
        let mut n = 0u64;
        for delta in deltas {
            self.queue.push(delta);
            n += 1;
        }
        self.len.fetch_add(n, Ordering::AcqRel);
        self.chain_length.fetch_add(n, Ordering::AcqRel);
    }

    pub fn pop(&self) -> Option<Delta> {
        let popped = self.queue.pop();
        if popped.is_some() {
            self.len.fetch_sub(1, Ordering::AcqRel);
        }
        popped
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire) as usize
    }

    pub fn chain_length(&self) -> usize {
        self.chain_length.load(Ordering::Acquire) as usize
    }
}

impl Default for DeltaQueue {
    fn default() -> Self {
        Self::new()
    }
}

fn apply(store: &mut TripleStore, delta: &Delta) {
    match delta.kind {
        DeltaKind::Add => {
            store.add(delta.triple.clone());
        }
        DeltaKind::Remove => {
            store.remove(&delta.triple);
        }
    }
}

/// Owns the background thread that drains a [`DeltaQueue`] onto a stale
/// [`TripleStore`] mirror. Started explicitly, stopped explicitly via
/// [`DeltaPropagator::shutdown`] — never a process-wide singleton.
pub struct DeltaPropagator {
    shutdown: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl DeltaPropagator {
    /// `active_queue` has no standalone replica attached to drain it in this
    /// crate's API surface, so the propagator retires it alongside
    /// `stale_queue` (pop-only, nothing to apply — the active graph already
    /// has the write) so it still converges to zero per the delta
    /// convergence property once the scheduler quiesces.
    pub fn start(
        stale: Arc<Mutex<TripleStore>>,
        active_queue: Arc<DeltaQueue>,
        stale_queue: Arc<DeltaQueue>,
        tick_period: Duration,
    ) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_for_thread = Arc::clone(&shutdown);
        let handle = thread::Builder::new()
            .name("triad-store-delta-propagator".into())
            .spawn(move || propagate_loop(stale, active_queue, stale_queue, tick_period, shutdown_for_thread))
            .expect("failed to spawn delta propagator thread");
        Self { shutdown, handle: Mutex::new(Some(handle)) }
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
        tracing::info!("delta propagator shut down");
    }
}

fn propagate_loop(
    stale: Arc<Mutex<TripleStore>>,
    active_queue: Arc<DeltaQueue>,
    stale_queue: Arc<DeltaQueue>,
    tick_period: Duration,
    shutdown: Arc<AtomicBool>,
) {
    tracing::info!("delta propagator started");
    loop {
        let mut applied = 0u64;
        {
            let mut guard = stale.lock();
            while let Some(delta) = stale_queue.pop() {
                apply(&mut guard, &delta);
                applied += 1;
            }
        }
        while active_queue.pop().is_some() {}
        if applied > 0 {
            tracing::debug!(applied, "delta propagator drained batch");
        }
        if shutdown.load(Ordering::Acquire) {
            break;
        }
        thread::sleep(tick_period);
    }
    tracing::info!("delta propagator loop exiting");
}
