//! Per-core async-op queue (§3 AsyncQueue, §4.4 Phase B). An `AsyncOp` is the
//! core's own representation of a pending crypto request, produced by
//! `do_async_op`/`do_blocking_sync_op` and consumed by the batcher, which
//! translates it into a device-native `CryptoDescriptor`.

use std::sync::Arc;

use crossbeam_queue::ArrayQueue;
use tokio::sync::oneshot;

use crate::buffer::BufferWrapper;
use crate::context::ContextId;
use crate::crypto::CryptoOpKind;
use crate::error::EngineError;

/// A pending crypto request. In context mode it additionally carries the
/// caller's `ContextId`, the in-process equivalent of prepending the
/// execution context pointer into the buffer's headroom (§3 AsyncOp,
/// §4.3 step 3), and the channel the batcher uses to hand the buffer back
/// once the device completes the op (the in-process stand-in for swapping
/// back into the suspended context, §4.5 step 4).
pub struct AsyncOp {
    pub kind: CryptoOpKind,
    pub buffer: BufferWrapper,
    pub offset: usize,
    pub context: Option<ContextId>,
    pub resume_tx: Option<oneshot::Sender<Result<BufferWrapper, EngineError>>>,
}

/// A bounded, lock-free multi-producer/multi-consumer queue of `AsyncOp`s. The
/// source calls for MPSC; `ArrayQueue` is MPMC, a strict superset, and is the
/// ring implementation already reached for elsewhere in this dataplane's
/// corpus for bounded cross-thread handoff.
pub struct AsyncQueue {
    ring: Arc<ArrayQueue<AsyncOp>>,
}

impl AsyncQueue {
    pub fn new(capacity: usize) -> Self {
        Self { ring: Arc::new(ArrayQueue::new(capacity)) }
    }

    /// Enqueues one op. Returns it back on overflow (§5 "overflow on enqueue
    /// is tolerated") so the caller can log/drop at its own boundary.
    pub fn push(&self, op: AsyncOp) -> Result<(), AsyncOp> {
        self.ring.push(op)
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Pops up to `max` ops in FIFO order (§4.4 Phase B step 1).
    pub fn pop_burst(&self, max: usize) -> Vec<AsyncOp> {
        let mut out = Vec::with_capacity(max.min(self.ring.len()));
        for _ in 0..max {
            match self.ring.pop() {
                Some(op) => out.push(op),
                None => break,
            }
        }
        out
    }
}

impl Clone for AsyncQueue {
    fn clone(&self) -> Self {
        Self { ring: Arc::clone(&self.ring) }
    }
}
