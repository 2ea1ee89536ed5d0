//! Error taxonomy (§7). Only conditions that are genuinely exceptional at the
//! call site are `Result` errors; drop accounting and backpressure are plain
//! counters on the hot path (see [`crate::metrics`]) to keep it branch-light.

use thiserror::Error;

/// Errors surfaced by the engine. Most variants are fatal by policy (§7): the
/// caller is expected to log and abort the process rather than recover.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("buffer headroom exhausted: requested {requested} bytes, {available} available")]
    BufferHeadroomExhausted { requested: usize, available: usize },

    #[error("buffer underflow: requested to advance {requested} bytes, only {available} remain")]
    BufferUnderflow { requested: usize, available: usize },

    #[error("buffer tailroom exhausted: requested {requested} bytes, {available} available")]
    BufferTailroomExhausted { requested: usize, available: usize },

    #[error("async-op pool exhausted (capacity {capacity})")]
    AsyncOpPoolExhausted { capacity: usize },

    #[error("crypto descriptor bulk allocation failed: requested {requested}, device had {available}")]
    CryptoBulkAllocFailed { requested: usize, available: usize },

    #[error("storage initialization failed: {0}")]
    StorageInitFailed(&'static str),

    #[error("invalid engine configuration: {0}")]
    InvalidConfig(&'static str),

    #[error("crypto device reported failure status for an in-flight operation")]
    CryptoOpFailed,
}
