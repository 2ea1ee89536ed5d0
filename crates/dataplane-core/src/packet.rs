//! Packet descriptor (§3, §4.8): the mutable processing state attached to one
//! packet as it moves through `RECEIVED -> PARSED -> RUNNING -> SUSPENDED -> ... ->
//! EMITTED | DROPPED`.

use crate::buffer::BufferWrapper;
use crate::context::ContextId;

/// Offset and length of one parsed header instance inside the buffer, plus a
/// small scratch area the pipeline can use for out-of-band per-header state.
#[derive(Debug, Clone, Default)]
pub struct HeaderInstance {
    pub offset: usize,
    pub length: usize,
    pub scratch: Vec<u8>,
}

/// Lifecycle state of an in-flight packet (§4.8). Tracked explicitly so tests
/// can assert on it directly rather than inferring it from side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketState {
    Received,
    Parsed,
    Running,
    Suspended,
    Emitted,
    Dropped,
}

/// The mutable processing state carried alongside one packet's buffer.
pub struct PacketDescriptor {
    pub wrapper: BufferWrapper,
    pub parsed_length: usize,
    pub payload_length: usize,
    pub headers: Vec<HeaderInstance>,
    pub is_emit_reordering: bool,
    pub emit_hdrinst_count: usize,
    pub dropped: bool,
    pub context: Option<ContextId>,
    pub state: PacketState,
    /// Out-of-band scratch the pipeline's match-action logic reads and writes
    /// (ingress/egress port, drop intent, and similar per-packet state that
    /// lives outside any parsed header).
    pub standard_metadata: Vec<u8>,
    /// Snapshot of `standard_metadata`, preserved across a suspend/resume
    /// cycle (§4.3 step 1 and step 9). `None` when no snapshot is currently
    /// held.
    pub standard_metadata_snapshot: Option<Vec<u8>>,
}

impl PacketDescriptor {
    pub fn new(wrapper: BufferWrapper) -> Self {
        let payload_length = wrapper.pkt_len();
        Self {
            wrapper,
            parsed_length: 0,
            payload_length,
            headers: Vec::new(),
            is_emit_reordering: false,
            emit_hdrinst_count: 0,
            dropped: false,
            context: None,
            state: PacketState::Received,
            standard_metadata: Vec::new(),
            standard_metadata_snapshot: None,
        }
    }

    /// §4.3 step 1 / original `reset_pd`: clears per-pass emit/parse state and
    /// recomputes payload length from the buffer's current `pkt_len`.
    pub fn reset(&mut self) {
        self.dropped = false;
        self.parsed_length = 0;
        self.payload_length = self.wrapper.pkt_len().saturating_sub(self.parsed_length);
        self.emit_hdrinst_count = 0;
        self.is_emit_reordering = false;
    }

    pub fn mark_dropped(&mut self) {
        self.dropped = true;
        self.state = PacketState::Dropped;
        self.context = None;
    }
}
