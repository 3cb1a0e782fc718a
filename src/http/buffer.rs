//! Per-connection header reassembly.

use super::split_header;

/// Accumulates inbound bytes until a complete request head is present.
///
/// The buffer never drops or reorders bytes; trailing data after the
/// terminator (an early body, or the first frame bytes) stays in place so
/// the whole stream can be replayed to whichever component takes over.
#[derive(Debug, Default)]
pub struct HeaderBuffer {
    buf: Vec<u8>,
}

impl HeaderBuffer {
    #[inline]
    pub const fn new() -> Self { Self { buf: Vec::new() } }

    /// Append a chunk, then report whether a complete head is available.
    pub fn feed(&mut self, data: &[u8]) -> bool {
        self.buf.extend_from_slice(data);
        self.is_complete()
    }

    #[inline]
    pub fn is_complete(&self) -> bool { split_header(&self.buf).is_some() }

    /// Head and remainder views, once the terminator has arrived.
    #[inline]
    pub fn split(&self) -> Option<(&[u8], &[u8])> { split_header(&self.buf) }

    /// Everything buffered so far, in arrival order.
    #[inline]
    pub fn bytes(&self) -> &[u8] { &self.buf }

    /// Drain the accumulator, handing the stream to its new owner.
    #[inline]
    pub fn take(&mut self) -> Vec<u8> { std::mem::take(&mut self.buf) }
}
