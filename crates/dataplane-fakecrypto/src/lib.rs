//! Emulated crypto device (§4.6): stands in for the hardware cryptodev the
//! batcher would otherwise submit to. Two per-device rings — one the batcher
//! enqueues into, one the processing loop enqueues completions onto — mirror
//! the source's per-core fake-crypto RX/TX ring pair, collapsed here to one
//! device-wide pair since nothing about the emulation is actually per-core.
//!
//! `CryptoNodeMode::Software` runs a real AES-128-CTR cipher over each
//! descriptor's region; `CryptoNodeMode::Fake` only emulates latency and
//! leaves the bytes untouched, matching the source's `wait_for_cycles` path.

use std::sync::Arc;
use std::time::Duration;

use aes::Aes128;
use async_trait::async_trait;
use crossbeam_queue::ArrayQueue;
use ctr::cipher::{KeyIvInit, StreamCipher};
use dataplane_core::{CryptoDescriptor, CryptoDevice, CryptoNodeMode, CryptoStatus, EngineError};
use tracing::{debug, warn};

type Aes128Ctr = ctr::Ctr128BE<Aes128>;

/// Per-call latency the fake node emulates, scaled by
/// `EngineConfig::fake_crypto_sleep_multiplier`. The base value has no
/// particular significance beyond being a few microseconds, matching the
/// source's cycle-count busy-wait translated into wall-clock terms.
const FAKE_LATENCY_BASE: Duration = Duration::from_micros(2);

/// An in-process emulation of a symmetric crypto device. `bulk_alloc` always
/// succeeds up to a fixed descriptor-slot budget (the device-side analogue of
/// the source's fixed-size descriptor ring); `enqueue_burst`/`dequeue_burst`
/// move descriptors between the pending ring and the completed ring, with a
/// background-free design — the actual cipher work happens inline in
/// `enqueue_burst` for `Software` mode, or after an async sleep for `Fake`
/// mode, rather than on a separate task, since there is no real device
/// interrupt to wait for.
pub struct FakeCryptoDevice {
    mode: CryptoNodeMode,
    sleep_multiplier: u64,
    descriptor_slots: usize,
    completed: ArrayQueue<CryptoDescriptor>,
}

impl FakeCryptoDevice {
    pub fn new(mode: CryptoNodeMode, sleep_multiplier: u64, ring_capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            mode,
            sleep_multiplier,
            descriptor_slots: ring_capacity,
            completed: ArrayQueue::new(ring_capacity),
        })
    }

    async fn process_one(&self, mut descriptor: CryptoDescriptor) -> CryptoDescriptor {
        match self.mode {
            CryptoNodeMode::Fake => {
                if self.sleep_multiplier > 0 {
                    tokio::time::sleep(FAKE_LATENCY_BASE * self.sleep_multiplier as u32).await;
                }
                descriptor.status = Some(CryptoStatus::Success);
            }
            CryptoNodeMode::Software => {
                let region_end = (descriptor.offset + descriptor.length).min(descriptor.buffer.pkt_len());
                if descriptor.offset > region_end {
                    warn!(
                        offset = descriptor.offset,
                        length = descriptor.length,
                        pkt_len = descriptor.buffer.pkt_len(),
                        "crypto region out of bounds"
                    );
                    descriptor.status = Some(CryptoStatus::Error);
                } else {
                    let mut cipher = Aes128Ctr::new(&descriptor.key.into(), &descriptor.iv.into());
                    cipher.apply_keystream(&mut descriptor.buffer.mtod_mut()[descriptor.offset..region_end]);
                    descriptor.status = Some(CryptoStatus::Success);
                }
            }
        }
        descriptor
    }
}

#[async_trait]
impl CryptoDevice for FakeCryptoDevice {
    fn bulk_alloc(&self, n: usize) -> Result<(), EngineError> {
        if n > self.descriptor_slots {
            return Err(EngineError::CryptoBulkAllocFailed { requested: n, available: self.descriptor_slots });
        }
        Ok(())
    }

    async fn enqueue_burst(&self, descriptors: Vec<CryptoDescriptor>) -> usize {
        let total = descriptors.len();
        let mut accepted = 0;
        for descriptor in descriptors {
            let completed = self.process_one(descriptor).await;
            if self.completed.push(completed).is_err() {
                debug!("fake crypto device completion ring full, op dropped");
                break;
            }
            accepted += 1;
        }
        if accepted < total {
            warn!(total, accepted, "fake crypto device rejected part of a burst");
        }
        accepted
    }

    async fn dequeue_burst(&self, max: usize) -> Vec<CryptoDescriptor> {
        let mut out = Vec::with_capacity(max.min(self.completed.len()));
        for _ in 0..max {
            match self.completed.pop() {
                Some(descriptor) => out.push(descriptor),
                None => break,
            }
        }
        out
    }
}
