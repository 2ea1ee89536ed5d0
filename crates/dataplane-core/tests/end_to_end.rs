//! End-to-end scenarios driving a packet through admission, suspension at a
//! crypto boundary, and resume, against the emulated crypto device from
//! `dataplane-fakecrypto`.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dataplane_core::{
    init_storage, handle_packet_async, new_worker_metrics, Batcher, BufferWrapper,
    CryptoKeyMaterial, CryptoOpKind, EngineConfig, PacketDescriptor, PacketOutcome,
    PacketPipeline, PipelineContext, PipelineEntry,
};
use dataplane_fakecrypto::FakeCryptoDevice;

struct PassThroughPipeline;

impl PacketPipeline for PassThroughPipeline {
    fn init_headers(&self, _pd: &mut PacketDescriptor) {}
    fn reset_headers(&self, _pd: &mut PacketDescriptor) {}
    fn parse_packet(&self, _pd: &mut PacketDescriptor) {}
    fn emit_packet(&self, _pd: &mut PacketDescriptor) {}
}

struct EncryptOnceEntry;

#[async_trait]
impl PipelineEntry for EncryptOnceEntry {
    async fn run(
        &self,
        cx: &mut PipelineContext,
        pipeline: &dyn PacketPipeline,
        pd: &mut PacketDescriptor,
        _port_id: u16,
    ) -> PacketOutcome {
        match cx.do_async_op(pd, CryptoOpKind::Encrypt, pipeline).await {
            Ok(()) => PacketOutcome::Emitted,
            Err(_) => PacketOutcome::Dropped,
        }
    }
}

/// Like `EncryptOnceEntry`, but stashes the post-resume buffer state so the
/// test can assert on it directly — `handle_packet_async` only ever hands
/// back a `PacketOutcome`, which can't distinguish "resumed with a sane
/// `pkt_len`" from "resumed truncated to zero".
struct RecordingEntry {
    resumed: Arc<Mutex<Option<(usize, Vec<u8>)>>>,
}

#[async_trait]
impl PipelineEntry for RecordingEntry {
    async fn run(
        &self,
        cx: &mut PipelineContext,
        pipeline: &dyn PacketPipeline,
        pd: &mut PacketDescriptor,
        _port_id: u16,
    ) -> PacketOutcome {
        match cx.do_async_op(pd, CryptoOpKind::Encrypt, pipeline).await {
            Ok(()) => {
                *self.resumed.lock().unwrap() = Some((pd.wrapper.pkt_len(), pd.wrapper.mtod().to_vec()));
                PacketOutcome::Emitted
            }
            Err(_) => PacketOutcome::Dropped,
        }
    }
}

/// Spawns the batcher as its own background task, looping `run_once` for a
/// fixed number of passes with a `yield_now` between each. Because this runs
/// as an independently scheduled task rather than inline in the test body,
/// it keeps making progress regardless of how the test awaits the packet
/// tasks it's driving — there's no risk of the test blocking on a handle
/// before the driver gets a chance to dispatch the burst that would resolve
/// it.
fn spawn_batcher_driver(mut batcher: Batcher, passes: usize) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        for _ in 0..passes {
            tokio::task::yield_now().await;
            let _ = batcher.run_once().await;
        }
    })
}

fn make_batcher(storage: &dataplane_core::Storage, metrics: &Arc<dataplane_core::WorkerMetrics>) -> Batcher {
    let device = FakeCryptoDevice::new(
        storage.config.crypto_node_mode,
        storage.config.fake_crypto_sleep_multiplier,
        storage.config.fake_crypto_ring_capacity,
    );
    Batcher::new(
        storage.config.clone(),
        storage.context_pool.clone(),
        storage.context_free_ring.clone(),
        storage.async_queue.clone(),
        device,
        metrics.clone(),
        CryptoKeyMaterial::zeroed(),
    )
}

#[tokio::test]
async fn single_packet_round_trips_through_context_mode() {
    // A lone packet never reaches the default burst size of 32 on its own;
    // shrink the burst to 1 so Phase B/C actually dispatch it.
    let mut config = EngineConfig::default();
    config.crypto_burst_size = 1;
    let storage = init_storage(config).unwrap();
    let metrics = new_worker_metrics();
    let driver = spawn_batcher_driver(make_batcher(&storage, &metrics), 32);

    let pipeline = Arc::new(PassThroughPipeline);
    let resumed = Arc::new(Mutex::new(None));
    let entry = Arc::new(RecordingEntry { resumed: resumed.clone() });
    let payload = b"hello world".to_vec();
    let pd = PacketDescriptor::new(BufferWrapper::new(&payload));

    let handle = handle_packet_async(
        storage.context_pool.clone(),
        storage.context_free_ring.clone(),
        storage.async_queue.clone(),
        storage.config.clone(),
        metrics.clone(),
        pipeline,
        entry,
        pd,
        0,
    )
    .expect("context pool has room for one packet");

    let outcome = handle.await.expect("packet task panicked");
    assert_eq!(outcome, PacketOutcome::Emitted);
    assert_eq!(storage.context_pool.live_count(), 0);

    let (pkt_len, bytes) = resumed.lock().unwrap().take().expect("entry recorded a resume");
    assert_eq!(pkt_len, payload.len());
    assert_eq!(bytes, payload);

    driver.abort();
}

#[tokio::test]
async fn context_pool_exhaustion_drops_the_packet() {
    let mut config = EngineConfig::default();
    config.context_pool_capacity = 1;
    let storage = init_storage(config).unwrap();
    let metrics = new_worker_metrics();

    storage.context_pool.try_acquire().unwrap();

    let pipeline = Arc::new(PassThroughPipeline);
    let entry = Arc::new(EncryptOnceEntry);
    let pd = PacketDescriptor::new(BufferWrapper::new(b"no room"));

    let result = handle_packet_async(
        storage.context_pool.clone(),
        storage.context_free_ring.clone(),
        storage.async_queue.clone(),
        storage.config.clone(),
        metrics.clone(),
        pipeline,
        entry,
        pd,
        0,
    );

    assert_eq!(result.unwrap_err(), PacketOutcome::Dropped);
    assert_eq!(metrics.context_exhausted_total(), 1);
}

#[tokio::test]
async fn sub_burst_does_not_dispatch() {
    // §4.4's boundary property: fewer than a full burst queued means a pass
    // dispatches nothing, on any of the three phases.
    let mut config = EngineConfig::default();
    config.crypto_burst_size = 4;
    let storage = init_storage(config).unwrap();
    let metrics = new_worker_metrics();
    let mut batcher = make_batcher(&storage, &metrics);

    let pipeline = Arc::new(PassThroughPipeline);
    let entry = Arc::new(EncryptOnceEntry);
    let pd = PacketDescriptor::new(BufferWrapper::new(b"one packet"));

    let _handle = handle_packet_async(
        storage.context_pool.clone(),
        storage.context_free_ring.clone(),
        storage.async_queue.clone(),
        storage.config.clone(),
        metrics.clone(),
        pipeline,
        entry,
        pd,
        0,
    )
    .unwrap();

    // Let the spawned task run up to its suspend point so exactly one op is
    // queued — one short of the configured burst of four.
    tokio::task::yield_now().await;
    assert_eq!(storage.async_queue.len(), 1);

    let stats = batcher.run_once().await.unwrap();
    assert_eq!(stats.ops_submitted, 0);
    assert_eq!(stats.completions_drained, 0);
    assert_eq!(batcher.pending_crypto(), 0);
    assert_eq!(
        storage.async_queue.len(),
        1,
        "a sub-burst pass must leave the op queued rather than dispatch it"
    );
}

#[tokio::test]
async fn batch_of_mixed_crypto_kinds_all_complete() {
    let config = EngineConfig::default();
    let storage = init_storage(config).unwrap();
    let metrics = new_worker_metrics();
    let driver = spawn_batcher_driver(make_batcher(&storage, &metrics), 256);

    let pipeline = Arc::new(PassThroughPipeline);
    let mut handles = Vec::new();
    for i in 0..32u8 {
        let entry = Arc::new(EncryptOnceEntry);
        let payload = vec![i; 20];
        let pd = PacketDescriptor::new(BufferWrapper::new(&payload));
        let handle = handle_packet_async(
            storage.context_pool.clone(),
            storage.context_free_ring.clone(),
            storage.async_queue.clone(),
            storage.config.clone(),
            metrics.clone(),
            pipeline.clone(),
            entry,
            pd,
            0,
        )
        .expect("context pool sized well above burst");
        handles.push(handle);
    }

    for handle in handles {
        let outcome = handle.await.expect("packet task panicked");
        assert_eq!(outcome, PacketOutcome::Emitted);
    }

    driver.abort();
}

#[tokio::test]
async fn padding_rounds_the_crypto_region_to_a_cipher_block_boundary() {
    // 11 bytes of payload plus a 4-byte length prefix and an 8-byte context
    // handle (async_mode = Context) lands on 23 bytes before padding, which
    // is not a multiple of 16 — do_async_op must pad the tail so the region
    // the device ciphers is block-aligned, and resume must strip back down
    // to the original, unpadded length.
    let mut config = EngineConfig::default();
    config.crypto_burst_size = 1;
    let storage = init_storage(config).unwrap();
    let metrics = new_worker_metrics();
    let driver = spawn_batcher_driver(make_batcher(&storage, &metrics), 32);

    let pipeline = Arc::new(PassThroughPipeline);
    let resumed = Arc::new(Mutex::new(None));
    let entry = Arc::new(RecordingEntry { resumed: resumed.clone() });
    let payload = b"hello world".to_vec();
    let pd = PacketDescriptor::new(BufferWrapper::new(&payload));

    let handle = handle_packet_async(
        storage.context_pool.clone(),
        storage.context_free_ring.clone(),
        storage.async_queue.clone(),
        storage.config.clone(),
        metrics.clone(),
        pipeline,
        entry,
        pd,
        0,
    )
    .unwrap();

    let outcome = handle.await.expect("packet task panicked");
    assert_eq!(outcome, PacketOutcome::Emitted);

    let (pkt_len, bytes) = resumed.lock().unwrap().take().expect("entry recorded a resume");
    assert_eq!(pkt_len, payload.len());
    assert_eq!(bytes, payload);

    driver.abort();
}

#[tokio::test]
async fn blocking_fallback_completes_without_a_context() {
    let config = EngineConfig::default();
    let device = FakeCryptoDevice::new(
        config.crypto_node_mode,
        config.fake_crypto_sleep_multiplier,
        config.fake_crypto_ring_capacity,
    );
    let pipeline = PassThroughPipeline;
    let mut pd = PacketDescriptor::new(BufferWrapper::new(b"blocking path"));

    dataplane_core::do_blocking_sync_op(
        device.as_ref(),
        &mut pd,
        CryptoOpKind::Encrypt,
        &pipeline,
        [0u8; 16],
        [0u8; 16],
    )
    .await
    .unwrap();

    assert!(pd.context.is_none());
}

#[tokio::test]
async fn fake_node_emulation_leaves_bytes_unchanged() {
    let mut config = EngineConfig::default();
    config.crypto_node_mode = dataplane_core::CryptoNodeMode::Fake;
    config.crypto_burst_size = 1;
    let storage = init_storage(config).unwrap();
    let metrics = new_worker_metrics();
    let driver = spawn_batcher_driver(make_batcher(&storage, &metrics), 32);

    let pipeline = Arc::new(PassThroughPipeline);
    let resumed = Arc::new(Mutex::new(None));
    let entry = Arc::new(RecordingEntry { resumed: resumed.clone() });
    let payload = b"unchanged payload".to_vec();
    let pd = PacketDescriptor::new(BufferWrapper::new(&payload));

    let handle = handle_packet_async(
        storage.context_pool.clone(),
        storage.context_free_ring.clone(),
        storage.async_queue.clone(),
        storage.config.clone(),
        metrics.clone(),
        pipeline,
        entry,
        pd,
        0,
    )
    .unwrap();

    let outcome = handle.await.expect("packet task panicked");
    assert_eq!(outcome, PacketOutcome::Emitted);

    let (pkt_len, bytes) = resumed.lock().unwrap().take().expect("entry recorded a resume");
    assert_eq!(pkt_len, payload.len());
    assert_eq!(bytes, payload);

    driver.abort();
}
