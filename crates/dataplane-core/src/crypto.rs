//! Crypto device interface (§6): the symmetric block-crypto submit/complete
//! contract the batcher drives. Implemented by `dataplane-fakecrypto` for the
//! emulated device; a real hardware/software cryptodev binding would
//! implement the same trait.

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::buffer::BufferWrapper;
use crate::context::ContextId;
use crate::error::EngineError;

/// The operation an `AsyncOp`/`CryptoDescriptor` requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoOpKind {
    Encrypt,
    Decrypt,
    Auth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoStatus {
    Success,
    Error,
}

/// A device-native descriptor: the translated form of an `AsyncOp` (§4.4
/// Phase B step 3). Source and destination are the same buffer in place.
pub struct CryptoDescriptor {
    pub kind: CryptoOpKind,
    pub buffer: BufferWrapper,
    pub offset: usize,
    pub length: usize,
    pub key: [u8; 16],
    pub iv: [u8; 16],
    pub status: Option<CryptoStatus>,
    /// Routing back to the suspended execution, carried through the device
    /// untouched (devices never inspect it). `None` for ops submitted via the
    /// blocking fallback, which has no context to resume.
    pub context: Option<ContextId>,
    pub resume_tx: Option<oneshot::Sender<Result<BufferWrapper, EngineError>>>,
}

/// The burst submit/complete contract a crypto device exposes (§6). All three
/// operations are named directly after the source: `bulk_alloc` is
/// all-or-nothing and fatal on failure, `enqueue_burst`/`dequeue_burst` are
/// partial-ok.
#[async_trait]
pub trait CryptoDevice: Send + Sync {
    /// Reserves device-side descriptor slots for `n` operations. All-or-
    /// nothing: returns an error rather than a partial count (§4.4 Phase B
    /// step 2, §7 "Fatal resource exhaustion").
    fn bulk_alloc(&self, n: usize) -> Result<(), EngineError>;

    /// Submits descriptors to the device; returns how many were actually
    /// accepted (§4.4 Phase B step 5, §5 "queue backpressure is normal").
    async fn enqueue_burst(&self, descriptors: Vec<CryptoDescriptor>) -> usize;

    /// Drains up to `max` completed descriptors.
    async fn dequeue_burst(&self, max: usize) -> Vec<CryptoDescriptor>;
}
