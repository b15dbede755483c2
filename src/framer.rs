//! Re-aligns arbitrary network reads onto 188-byte TS packet boundaries.

use crate::constants::TS_PACKET_SIZE;

/// Stateful framer. Holds the prefix of a TS packet that straddled the
/// previous read boundary; everything else is emitted as borrowed slices.
///
/// The framer never scans for a sync byte. The tuner starts every
/// connection on a packet boundary, and a misaligned packet is dropped
/// downstream by the sync check.
pub struct TsFramer {
    carry: [u8; TS_PACKET_SIZE],
    carry_len: usize,
}

impl TsFramer {
    pub fn new() -> Self {
        Self {
            carry: [0u8; TS_PACKET_SIZE],
            carry_len: 0,
        }
    }

    /// Discard any half-collected packet. Called on every (re)connect.
    pub fn reset(&mut self) {
        self.carry_len = 0;
    }

    /// Feed one network chunk; `emit` is called once per complete
    /// 188-byte packet, in stream order.
    pub fn feed(&mut self, chunk: &[u8], mut emit: impl FnMut(&[u8])) {
        let mut offset = 0;

        // Top up the carry buffer first
        if self.carry_len > 0 {
            let need = TS_PACKET_SIZE - self.carry_len;
            let take = need.min(chunk.len());
            self.carry[self.carry_len..self.carry_len + take].copy_from_slice(&chunk[..take]);
            self.carry_len += take;
            offset = take;

            if self.carry_len == TS_PACKET_SIZE {
                emit(&self.carry);
                self.carry_len = 0;
            }
        }

        // Complete packets straight out of the chunk
        while offset + TS_PACKET_SIZE <= chunk.len() {
            emit(&chunk[offset..offset + TS_PACKET_SIZE]);
            offset += TS_PACKET_SIZE;
        }

        // Stash the 0..187-byte remainder
        let leftover = chunk.len() - offset;
        if leftover > 0 {
            self.carry[..leftover].copy_from_slice(&chunk[offset..]);
            self.carry_len = leftover;
        }
    }
}
