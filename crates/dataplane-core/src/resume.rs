//! The worker-side half of resume (§4.5 steps 1-3): strips the length prefix
//! and, in context mode, the context handle that `do_async_op` prepended,
//! then hands the bare buffer back across the `oneshot` the suspended task is
//! waiting on. The task-side half (logical reset, reparse, metadata restore)
//! runs on the other end of that channel in [`crate::worker::PipelineContext::do_async_op`].

use tracing::trace;

use crate::config::{AsyncMode, EngineConfig};
use crate::crypto::CryptoDescriptor;

/// Consumes one completed descriptor. Returns `Err` only when the completed
/// descriptor carried no resume channel, which means the batcher mis-routed a
/// blocking-fallback op into the context-mode completion path — a bug, not a
/// runtime condition.
pub fn resume_packet_handling(
    config: &EngineConfig,
    mut descriptor: CryptoDescriptor,
) -> Result<(), CryptoDescriptor> {
    let resume_tx = match descriptor.resume_tx.take() {
        Some(tx) => tx,
        None => return Err(descriptor),
    };

    let mut buffer = descriptor.buffer;

    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&buffer.mtod()[..4]);
    let pkt_len = u32::from_be_bytes(len_bytes) as usize;
    let _ = buffer.adj(4);

    if config.async_mode == AsyncMode::Context {
        let _ = buffer.adj(8);
    }

    buffer.set_pkt_len(pkt_len);

    trace!(context = ?descriptor.context, pkt_len, "resuming suspended packet context");

    let _ = resume_tx.send(Ok(buffer));
    Ok(())
}
