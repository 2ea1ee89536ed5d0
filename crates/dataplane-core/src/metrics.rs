//! Per-core counters and sampled drop logging (§4.10). The hot path only ever
//! touches an atomic increment; turning a counter into a log line is rate-
//! limited to once per second per counter so a sustained drop condition does
//! not itself become a throughput problem.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::warn;

const SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

struct SampledCounter {
    count: AtomicU64,
    last_logged: Mutex<Option<Instant>>,
}

impl SampledCounter {
    fn new() -> Self {
        Self { count: AtomicU64::new(0), last_logged: Mutex::new(None) }
    }

    fn bump(&self, label: &str) {
        let total = self.count.fetch_add(1, Ordering::Relaxed) + 1;
        let now = Instant::now();
        let mut last = self.last_logged.lock();
        let should_log = match *last {
            Some(t) => now.duration_since(t) >= SAMPLE_INTERVAL,
            None => true,
        };
        if should_log {
            *last = Some(now);
            warn!(counter = label, total, "rate-limited sample");
        }
    }

    fn get(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

/// Counters owned by one worker core. Not `Clone` — a core's metrics live as
/// long as the core's executor does; sharing is by reference (`Arc`).
pub struct WorkerMetrics {
    context_exhausted: SampledCounter,
    async_queue_overflow: SampledCounter,
    crypto_op_failed: SampledCounter,
    crypto_enqueued: AtomicU64,
    crypto_dequeued: AtomicU64,
    pending_crypto: AtomicU64,
}

impl WorkerMetrics {
    pub fn new() -> Self {
        Self {
            context_exhausted: SampledCounter::new(),
            async_queue_overflow: SampledCounter::new(),
            crypto_op_failed: SampledCounter::new(),
            crypto_enqueued: AtomicU64::new(0),
            crypto_dequeued: AtomicU64::new(0),
            pending_crypto: AtomicU64::new(0),
        }
    }

    pub fn record_context_exhausted(&self) {
        self.context_exhausted.bump("context_pool_exhausted");
    }

    pub fn record_async_queue_overflow(&self) {
        self.async_queue_overflow.bump("async_queue_overflow");
    }

    pub fn record_crypto_op_failed(&self) {
        self.crypto_op_failed.bump("crypto_op_failed");
    }

    pub fn record_crypto_enqueued(&self, n: u64) {
        self.crypto_enqueued.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_crypto_dequeued(&self, n: u64) {
        self.crypto_dequeued.fetch_add(n, Ordering::Relaxed);
    }

    pub fn set_pending_crypto(&self, n: u64) {
        self.pending_crypto.store(n, Ordering::Relaxed);
    }

    pub fn context_exhausted_total(&self) -> u64 {
        self.context_exhausted.get()
    }

    pub fn async_queue_overflow_total(&self) -> u64 {
        self.async_queue_overflow.get()
    }

    pub fn crypto_op_failed_total(&self) -> u64 {
        self.crypto_op_failed.get()
    }

    pub fn crypto_enqueued_total(&self) -> u64 {
        self.crypto_enqueued.load(Ordering::Relaxed)
    }

    pub fn crypto_dequeued_total(&self) -> u64 {
        self.crypto_dequeued.load(Ordering::Relaxed)
    }

    pub fn pending_crypto(&self) -> u64 {
        self.pending_crypto.load(Ordering::Relaxed)
    }
}

impl Default for WorkerMetrics {
    fn default() -> Self {
        Self::new()
    }
}
