//! Per-process storage initialization (§4.1): allocates the pools and rings
//! every core's worker and batcher share handles to. Mirrors the source's
//! `async_init_storage`, which allocates every ring once at startup before
//! any core's main loop begins.

use std::sync::Arc;

use tracing::info;

use crate::asyncop::AsyncQueue;
use crate::config::EngineConfig;
use crate::context::{ContextFreeRing, ContextPool};
use crate::error::EngineError;
use crate::metrics::WorkerMetrics;

/// The shared handles every core needs. Cheap to clone except `context_pool`,
/// which is intentionally process-wide rather than per-core (§3 "Pools &
/// rings").
#[derive(Clone)]
pub struct Storage {
    pub config: Arc<EngineConfig>,
    pub context_pool: Arc<ContextPool>,
    pub context_free_ring: ContextFreeRing,
    pub async_queue: AsyncQueue,
}

/// §4.1: validates the configuration, then allocates the context pool, the
/// context-free ring, and the async-op queue. Returns an error rather than
/// panicking — allocation failure here is a startup condition the caller
/// should report and exit on, not a panic the runtime should unwind through.
pub fn init_storage(config: EngineConfig) -> Result<Storage, EngineError> {
    config.validate()?;

    info!(
        context_pool_capacity = config.context_pool_capacity,
        async_queue_capacity = config.async_queue_capacity,
        async_mode = ?config.async_mode,
        crypto_node_mode = ?config.crypto_node_mode,
        "initializing dataplane storage"
    );

    let context_pool = Arc::new(ContextPool::new(config.context_pool_capacity));
    let context_free_ring = ContextFreeRing::new(config.context_free_ring_capacity);
    let async_queue = AsyncQueue::new(config.async_queue_capacity);

    Ok(Storage { config: Arc::new(config), context_pool, context_free_ring, async_queue })
}

/// Convenience for binaries that want one `Arc<WorkerMetrics>` per core,
/// constructed alongside storage rather than threaded in separately.
pub fn new_worker_metrics() -> Arc<WorkerMetrics> {
    Arc::new(WorkerMetrics::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_storage_rejects_invalid_config() {
        let mut config = EngineConfig::default();
        config.crypto_burst_size = 0;
        assert!(init_storage(config).is_err());
    }

    #[test]
    fn init_storage_builds_pools_at_configured_capacity() {
        let config = EngineConfig::default();
        let capacity = config.context_pool_capacity;
        let storage = init_storage(config).unwrap();
        assert_eq!(storage.context_pool.capacity(), capacity);
    }
}
