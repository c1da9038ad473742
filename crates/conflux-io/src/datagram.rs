//! Pooled datagram buffer.

use crate::timer;

/// Default buffer capacity; comfortably holds an ethernet-MTU payload.
pub const DEFAULT_CAPACITY: usize = 2048;

/// An owned byte payload with a capacity, a live length and a receive
/// timestamp.
///
/// The buffer is kept at full capacity so a socket can read straight
/// into [`Datagram::bytes_mut`]; `len` marks how much of it is payload.
/// `Default` yields an empty datagram at [`DEFAULT_CAPACITY`], which is
/// what makes the type poolable.
#[derive(Clone, Debug)]
pub struct Datagram {
    buf: Vec<u8>,
    len: usize,
    received_at: u64,
}

impl Datagram {
    /// An empty datagram with the given buffer capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![0; capacity],
            len: 0,
            received_at: 0,
        }
    }

    /// Builds a datagram holding a copy of `payload`, stamped now.
    pub fn from_payload(payload: &[u8]) -> Self {
        let mut dgram = Self::with_capacity(payload.len().max(DEFAULT_CAPACITY));
        dgram.assign(payload);
        dgram
    }

    /// Buffer capacity in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Live payload length.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The payload.
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// The whole buffer, for reading into. Follow with
    /// [`Datagram::set_len`] to mark how much was filled.
    #[inline]
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    /// Marks the first `len` buffer bytes as payload.
    ///
    /// # Panics
    ///
    /// Panics if `len` exceeds the capacity.
    pub fn set_len(&mut self, len: usize) {
        assert!(len <= self.buf.len(), "payload length exceeds capacity");
        self.len = len;
    }

    /// Copies `payload` in, growing the buffer if needed, and stamps the
    /// datagram with the current wall-clock time.
    pub fn assign(&mut self, payload: &[u8]) {
        if payload.len() > self.buf.len() {
            self.buf.resize(payload.len(), 0);
        }
        self.buf[..payload.len()].copy_from_slice(payload);
        self.len = payload.len();
        self.received_at = timer::wall_micros();
    }

    /// Microsecond receive timestamp (wall clock); zero if never stamped.
    #[inline]
    pub fn received_at(&self) -> u64 {
        self.received_at
    }

    /// Stamps the datagram with the current wall-clock time.
    pub fn stamp(&mut self) {
        self.received_at = timer::wall_micros();
    }

    /// Empties the payload and timestamp, keeping the buffer. Callers
    /// taking a datagram from a pool reset it before reuse.
    pub fn reset(&mut self) {
        self.len = 0;
        self.received_at = 0;
    }
}

impl Default for Datagram {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}
