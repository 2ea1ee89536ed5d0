//! Byte buffer with cheap headroom/tailroom adjustment, modeled on the mbuf-style
//! buffers that hardware dataplanes pass between the NIC, the pipeline, and the
//! crypto device. Unlike `bytes::BytesMut`, a `BufferWrapper` never reallocates
//! once constructed: headroom and tailroom are fixed at allocation time and
//! `prepend`/`append` only ever move the head/tail markers within that capacity.

use crate::error::EngineError;

/// A single packet buffer with independent headroom and tailroom.
///
/// `storage[head..head + len]` is the logical packet content (`pkt_len() == len`).
/// Bytes before `head` are headroom available to `prepend`; bytes from
/// `head + len` to `storage.len()` are tailroom available to `append`.
#[derive(Debug, Clone)]
pub struct BufferWrapper {
    storage: Vec<u8>,
    head: usize,
    len: usize,
}

impl BufferWrapper {
    /// Allocates a buffer with `headroom` bytes reserved before the payload and
    /// `tailroom` bytes reserved after it. `payload` is copied into the middle.
    pub fn with_headroom(payload: &[u8], headroom: usize, tailroom: usize) -> Self {
        let mut storage = vec![0u8; headroom + payload.len() + tailroom];
        storage[headroom..headroom + payload.len()].copy_from_slice(payload);
        Self { storage, head: headroom, len: payload.len() }
    }

    /// Convenience constructor with a generous default headroom (enough for the
    /// 4-byte length prefix plus an 8-byte context handle) and tailroom (enough
    /// for one cipher block of padding).
    pub fn new(payload: &[u8]) -> Self {
        Self::with_headroom(payload, 16, 16)
    }

    /// Logical packet length, independent of physical capacity.
    pub fn pkt_len(&self) -> usize {
        self.len
    }

    /// Bytes available before the head without reallocating.
    pub fn headroom(&self) -> usize {
        self.head
    }

    /// Bytes available after the tail without reallocating.
    pub fn tailroom(&self) -> usize {
        self.storage.len() - self.head - self.len
    }

    /// Pointer-equivalent: the current logical packet content.
    pub fn mtod(&self) -> &[u8] {
        &self.storage[self.head..self.head + self.len]
    }

    pub fn mtod_mut(&mut self) -> &mut [u8] {
        &mut self.storage[self.head..self.head + self.len]
    }

    /// Moves the head backward by `n` bytes, growing the logical packet to
    /// include that headroom. The caller is expected to immediately write the
    /// prepended bytes via `mtod_mut`.
    pub fn prepend(&mut self, n: usize) -> Result<(), EngineError> {
        if n > self.head {
            return Err(EngineError::BufferHeadroomExhausted { requested: n, available: self.head });
        }
        self.head -= n;
        self.len += n;
        Ok(())
    }

    /// Moves the head forward by `n` bytes, shrinking the logical packet and
    /// discarding the first `n` bytes from it (the inverse of `prepend`).
    pub fn adj(&mut self, n: usize) -> Result<(), EngineError> {
        if n > self.len {
            return Err(EngineError::BufferUnderflow { requested: n, available: self.len });
        }
        self.head += n;
        self.len -= n;
        Ok(())
    }

    /// Extends the logical packet by `n` bytes of tailroom. Newly exposed bytes
    /// are left as whatever was in the backing storage (zeroed at allocation).
    pub fn append(&mut self, n: usize) -> Result<(), EngineError> {
        if n > self.tailroom() {
            return Err(EngineError::BufferTailroomExhausted { requested: n, available: self.tailroom() });
        }
        self.len += n;
        Ok(())
    }

    /// Resets `pkt_len` to `new_len` without touching the head, used when the
    /// resume path needs to restore a length read from a prepended header.
    pub fn set_pkt_len(&mut self, new_len: usize) {
        debug_assert!(self.head + new_len <= self.storage.len());
        self.len = new_len;
    }
}
