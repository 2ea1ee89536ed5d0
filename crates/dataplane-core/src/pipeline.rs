//! External pipeline contract (§6): the four synchronous, side-effect-only
//! callbacks the surrounding data-plane program supplies. The core never
//! implements parsing or matching itself — it only calls through this trait
//! at the right points in the suspend/resume lifecycle.

use crate::packet::PacketDescriptor;

/// Implemented by the data-plane program. Every method is synchronous and
/// must never suspend (§6): parsing, matching, and deparsing run to
/// completion inside whichever executor (packet context or worker) calls
/// them.
pub trait PacketPipeline: Send + Sync {
    /// Allocates/clears header instance slots for a fresh packet.
    fn init_headers(&self, pd: &mut PacketDescriptor);

    /// Clears header instance slots on a packet being reused (e.g. after a
    /// resume, §4.5 step 3).
    fn reset_headers(&self, pd: &mut PacketDescriptor);

    /// Parses the buffer's current content into `pd.headers`.
    fn parse_packet(&self, pd: &mut PacketDescriptor);

    /// Serializes `pd.headers` back into the buffer (the deparser's `emit`
    /// step, §4.3 step 2).
    fn emit_packet(&self, pd: &mut PacketDescriptor);

    /// Runs the deparser control logic ahead of `emit_packet`. Kept as a
    /// separate step to mirror `control_DeparserImpl` in the source contract.
    fn deparse(&self, pd: &mut PacketDescriptor) {
        let _ = pd;
    }
}

/// Outcome of driving one packet through the pipeline to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketOutcome {
    Emitted,
    Dropped,
}
