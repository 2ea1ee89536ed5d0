//! Packet-context entry points (§4.2, §4.3, §4.7): the async-task side of the
//! suspend/resume protocol. `PacketPipeline` supplies the synchronous parse/
//! match/deparse primitives; `PipelineEntry` is the data-plane program itself,
//! which decides when a packet needs a crypto operation and calls
//! [`PipelineContext::do_async_op`] at that point.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::asyncop::{AsyncOp, AsyncQueue};
use crate::config::{AsyncMode, EngineConfig};
use crate::context::{ContextFreeRing, ContextId, ContextPool};
use crate::crypto::{CryptoDevice, CryptoDescriptor, CryptoOpKind, CryptoStatus};
use crate::error::EngineError;
use crate::metrics::WorkerMetrics;
use crate::packet::{PacketDescriptor, PacketState};
use crate::pipeline::{PacketOutcome, PacketPipeline};

/// Resources a running packet context needs to reach the crypto boundary and
/// suspend. Cheap to clone: every field is a handle to shared state.
#[derive(Clone)]
pub struct PipelineContext {
    pub(crate) async_queue: AsyncQueue,
    pub(crate) config: Arc<EngineConfig>,
    pub(crate) metrics: Arc<WorkerMetrics>,
    pub(crate) context_id: ContextId,
}

impl PipelineContext {
    /// §4.3: deparses and emits the packet, frames it for the crypto device
    /// (length prefix, and in context mode, the context handle), pads the
    /// crypto region to a cipher block boundary, then suspends this task on
    /// an `oneshot` until the batcher hands the processed buffer back.
    pub async fn do_async_op(
        &mut self,
        pd: &mut PacketDescriptor,
        kind: CryptoOpKind,
        pipeline: &dyn PacketPipeline,
    ) -> Result<(), EngineError> {
        pd.standard_metadata_snapshot = Some(pd.standard_metadata.clone());

        pipeline.deparse(pd);
        pipeline.emit_packet(pd);

        // Prepends happen innermost-first: the context handle goes on before
        // the length, so the length ends up at the buffer head where
        // `resume_packet_handling` expects to find it (§4.5 step 1).
        let pkt_len = pd.wrapper.pkt_len() as u32;
        let mut prefix_len = 0;

        if self.config.async_mode == AsyncMode::Context {
            pd.wrapper.prepend(8)?;
            pd.wrapper.mtod_mut()[..8].copy_from_slice(&self.context_id.as_u64().to_be_bytes());
            prefix_len += 8;
        }

        pd.wrapper.prepend(4)?;
        pd.wrapper.mtod_mut()[..4].copy_from_slice(&pkt_len.to_be_bytes());
        prefix_len += 4;

        let crypto_offset = prefix_len + self.config.crypto_offset;
        let region_len = pd.wrapper.pkt_len().saturating_sub(crypto_offset);
        let pad = (16 - region_len % 16) % 16;
        if pad > 0 {
            pd.wrapper.append(pad)?;
        }

        let (resume_tx, resume_rx) = oneshot::channel();
        let op = AsyncOp {
            kind,
            buffer: pd.wrapper.clone(),
            offset: crypto_offset,
            context: Some(self.context_id),
            resume_tx: Some(resume_tx),
        };

        if self.async_queue.push(op).is_err() {
            self.metrics.record_async_queue_overflow();
            pd.mark_dropped();
            return Err(EngineError::AsyncOpPoolExhausted {
                capacity: self.config.async_op_pool_capacity,
            });
        }

        let resumed = match resume_rx.await {
            Ok(Ok(buffer)) => buffer,
            Ok(Err(err)) => {
                pd.mark_dropped();
                return Err(err);
            }
            Err(_) => {
                // The batcher dropped the op without resolving it (e.g. the
                // device never completed it). Treat identically to an
                // explicit failure.
                pd.mark_dropped();
                return Err(EngineError::CryptoOpFailed);
            }
        };

        pd.wrapper = resumed;
        pd.reset();
        pipeline.reset_headers(pd);
        pipeline.parse_packet(pd);
        pd.state = PacketState::Running;
        if let Some(meta) = pd.standard_metadata_snapshot.take() {
            pd.standard_metadata = meta;
        }
        Ok(())
    }
}

/// Supplied by the surrounding data-plane program: the control logic that
/// parses, matches, and emits a packet, calling [`PipelineContext::do_async_op`]
/// wherever the program's tables require a crypto operation.
#[async_trait]
pub trait PipelineEntry: Send + Sync {
    async fn run(
        &self,
        cx: &mut PipelineContext,
        pipeline: &dyn PacketPipeline,
        pd: &mut PacketDescriptor,
        port_id: u16,
    ) -> PacketOutcome;
}

/// §4.2: admits a packet into an execution context and hands it to `entry` on
/// the per-core executor. Returns immediately once the task is spawned — the
/// caller's receive loop never waits on a suspended packet. `Err` means
/// admission itself failed (the packet was dropped before parsing even
/// started); `Ok` carries a handle to the spawned task's eventual outcome,
/// which the caller is free to ignore.
pub fn handle_packet_async<P, E>(
    context_pool: Arc<ContextPool>,
    context_free_ring: ContextFreeRing,
    async_queue: AsyncQueue,
    config: Arc<EngineConfig>,
    metrics: Arc<WorkerMetrics>,
    pipeline: Arc<P>,
    entry: Arc<E>,
    mut pd: PacketDescriptor,
    port_id: u16,
) -> Result<tokio::task::JoinHandle<PacketOutcome>, PacketOutcome>
where
    P: PacketPipeline + 'static,
    E: PipelineEntry + 'static,
{
    let context_id = match context_pool.try_acquire() {
        Some(id) => id,
        None => {
            metrics.record_context_exhausted();
            pd.mark_dropped();
            return Err(PacketOutcome::Dropped);
        }
    };
    pd.context = Some(context_id);

    let mut cx = PipelineContext { async_queue, config, metrics, context_id };

    let handle = tokio::spawn(async move {
        pipeline.init_headers(&mut pd);
        pipeline.parse_packet(&mut pd);
        pd.state = PacketState::Parsed;
        pd.state = PacketState::Running;

        let outcome = entry.run(&mut cx, pipeline.as_ref(), &mut pd, port_id).await;

        context_free_ring.free(context_id);
        outcome
    });

    Ok(handle)
}

/// §4.7: the blocking-fallback path used when `async_mode` is `Off`. There is
/// no execution context to suspend, so the crypto op is submitted directly to
/// the device and this task polls until it completes, rather than going
/// through the batcher's queue.
pub async fn do_blocking_sync_op(
    device: &dyn CryptoDevice,
    pd: &mut PacketDescriptor,
    kind: CryptoOpKind,
    pipeline: &dyn PacketPipeline,
    key: [u8; 16],
    iv: [u8; 16],
) -> Result<(), EngineError> {
    pipeline.deparse(pd);
    pipeline.emit_packet(pd);

    let offset = 0;
    let length = pd.wrapper.pkt_len();

    device.bulk_alloc(1)?;
    let descriptor = CryptoDescriptor {
        kind,
        buffer: pd.wrapper.clone(),
        offset,
        length,
        key,
        iv,
        status: None,
        context: None,
        resume_tx: None,
    };

    let accepted = device.enqueue_burst(vec![descriptor]).await;
    if accepted == 0 {
        return Err(EngineError::CryptoOpFailed);
    }

    loop {
        let mut completed = device.dequeue_burst(1).await;
        if let Some(descriptor) = completed.pop() {
            match descriptor.status {
                Some(CryptoStatus::Success) => {
                    pd.wrapper = descriptor.buffer;
                    pipeline.reset_headers(pd);
                    pipeline.parse_packet(pd);
                    return Ok(());
                }
                _ => return Err(EngineError::CryptoOpFailed),
            }
        }
        tokio::task::yield_now().await;
    }
}
