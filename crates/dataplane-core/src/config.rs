//! Runtime configuration (§4.9, §6). What the original dataplane selected at
//! compile time via preprocessor flags is, here, a validated, serde-friendly
//! struct the surrounding binary constructs once at startup.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Whether packets suspend on a crypto boundary (`Context`) or every crypto
/// operation is routed through the blocking fallback (`Off`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AsyncMode {
    Context,
    Off,
}

/// Which implementation backs the fake crypto node's burst processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CryptoNodeMode {
    /// Runs a real software cipher (AES-128-CTR) over each descriptor's region.
    Software,
    /// Only emulates latency; bytes pass through unchanged.
    Fake,
}

/// What happens when the crypto device reports a non-success status for an
/// in-flight operation. `Abort` preserves the historical (debug-era) behavior
/// of the source dataplane; `DropPacket` is the production-safe choice.
/// See DESIGN.md for the record of this decision (§9 Open Question).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CryptoFailurePolicy {
    Abort,
    DropPacket,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub crypto_burst_size: usize,
    pub context_pool_capacity: usize,
    pub async_queue_capacity: usize,
    pub async_op_pool_capacity: usize,
    pub context_free_ring_capacity: usize,
    pub fake_crypto_ring_capacity: usize,
    pub async_mode: AsyncMode,
    pub crypto_node_mode: CryptoNodeMode,
    pub start_crypto_node: bool,
    pub fake_crypto_sleep_multiplier: u64,
    pub crypto_offset: usize,
    pub crypto_failure_policy: CryptoFailurePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            crypto_burst_size: 32,
            context_pool_capacity: 1023,
            async_queue_capacity: 32 * 1024,
            async_op_pool_capacity: 1024 * 1024 - 1,
            context_free_ring_capacity: 32 * 1024,
            fake_crypto_ring_capacity: 32 * 1024,
            async_mode: AsyncMode::Context,
            crypto_node_mode: CryptoNodeMode::Fake,
            start_crypto_node: true,
            fake_crypto_sleep_multiplier: 1,
            crypto_offset: 0,
            crypto_failure_policy: CryptoFailurePolicy::Abort,
        }
    }
}

impl EngineConfig {
    /// Checks the invariants the rest of the engine assumes hold. Called once
    /// at startup; a failure here is a configuration bug, not a runtime
    /// condition, so it returns an error rather than panicking directly.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.crypto_burst_size == 0 {
            return Err(EngineError::InvalidConfig("crypto_burst_size must be non-zero"));
        }
        if self.context_pool_capacity == 0 {
            return Err(EngineError::InvalidConfig("context_pool_capacity must be non-zero"));
        }
        if self.async_queue_capacity < self.crypto_burst_size {
            return Err(EngineError::InvalidConfig(
                "async_queue_capacity must be at least one burst",
            ));
        }
        if self.context_free_ring_capacity < self.crypto_burst_size {
            return Err(EngineError::InvalidConfig(
                "context_free_ring_capacity must be at least one burst",
            ));
        }
        Ok(())
    }
}
