//! Execution context pool (§3 ExecutionContext, §4.1, §4.2 step 1). A live
//! context here is not a fixed OS stack (see DESIGN.md / SPEC_FULL.md §9 for
//! why) — it is an admission slot consumed by a suspended `async` task and
//! released only when the batcher processes a burst off the context-free
//! ring (§4.4 Phase A), preserving the original's "bursted to amortize ring
//! overhead" behavior even though nothing here strictly needs a stack freed.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_queue::ArrayQueue;

/// Opaque identity of a suspended execution context. Stands in for the raw
/// `ucontext_t*` the source prepends into buffer headroom (§3 AsyncOp).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl ContextId {
    /// The in-process stand-in for the raw pointer value the source prepends
    /// into buffer headroom.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// A fixed-capacity admission gate for live contexts (§3 "at most
/// `CONTEXT_POOL_CAPACITY` contexts per core" — the pool itself is
/// process-wide per §3's "Pools & rings" table, so the same gate is shared by
/// every worker in this process).
pub struct ContextPool {
    capacity: usize,
    live: AtomicUsize,
    next_id: AtomicU64,
}

impl ContextPool {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, live: AtomicUsize::new(0), next_id: AtomicU64::new(0) }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn live_count(&self) -> usize {
        self.live.load(Ordering::Relaxed)
    }

    /// §4.2 step 1: attempt to admit one more live context. Returns `None`
    /// when the pool is at capacity, which the caller treats as a packet
    /// drop.
    pub fn try_acquire(&self) -> Option<ContextId> {
        loop {
            let current = self.live.load(Ordering::Acquire);
            if current >= self.capacity {
                return None;
            }
            if self
                .live
                .compare_exchange_weak(current, current + 1, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                return Some(ContextId(id));
            }
        }
    }

    /// §4.4 Phase A: release `n` admission slots at once, after the batcher
    /// has drained that many ids off the context-free ring.
    pub fn release_burst(&self, n: usize) {
        self.live.fetch_sub(n, Ordering::AcqRel);
    }
}

/// Cross-core ring (§3 "context-free ring (32k slots, cross-core freeing)")
/// that a finished context's owner pushes into, and that the batcher drains
/// in bursts during Phase A.
pub struct ContextFreeRing {
    ring: Arc<ArrayQueue<ContextId>>,
}

impl ContextFreeRing {
    pub fn new(capacity: usize) -> Self {
        Self { ring: Arc::new(ArrayQueue::new(capacity)) }
    }

    /// Marks a context as finished and eligible for its admission slot to be
    /// reclaimed. Silently drops the id on overflow (§5: bounded, overflow
    /// tolerated) — an overflowing free ring only delays reclamation, it
    /// never corrupts the count, because `ContextPool::live_count` was
    /// already incremented exactly once per `try_acquire`.
    pub fn free(&self, id: ContextId) {
        let _ = self.ring.push(id);
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn pop_burst(&self, max: usize) -> usize {
        let mut popped = 0;
        for _ in 0..max {
            if self.ring.pop().is_none() {
                break;
            }
            popped += 1;
        }
        popped
    }
}

impl Clone for ContextFreeRing {
    fn clone(&self) -> Self {
        Self { ring: Arc::clone(&self.ring) }
    }
}
