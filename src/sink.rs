//! Outbound side of a connection.
//!
//! The core never writes to a socket; it queues bytes here and the
//! embedding server drains them. Closing is part of the queue's contract:
//! [`Close::AfterWriting`] means "flush, then drop the transport" (a 400
//! response or a policy document must reach the peer before the socket
//! dies), [`Close::Now`] means "drop it, pending output included".

/// How the transport should be torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Close {
    /// Drain queued output first.
    AfterWriting,
    /// Immediately, discarding queued output.
    Now,
}

/// Byte queue between a connection and its transport.
#[derive(Debug, Default)]
pub struct Sink {
    buf: Vec<u8>,
    close: Option<Close>,
}

impl Sink {
    #[inline]
    pub const fn new() -> Self {
        Self {
            buf: Vec::new(),
            close: None,
        }
    }

    /// Queue raw bytes toward the peer. Ignored once a close is scheduled.
    pub fn send_data(&mut self, data: &[u8]) {
        if self.close.is_none() {
            self.buf.extend_from_slice(data);
        }
    }

    /// Tear the transport down at once.
    pub fn close_connection(&mut self) { self.close = Some(Close::Now) }

    /// Tear the transport down after the queue drains.
    pub fn close_connection_after_writing(&mut self) {
        if self.close.is_none() {
            self.close = Some(Close::AfterWriting);
        }
    }

    #[inline]
    pub fn pending_close(&self) -> Option<Close> { self.close }

    /// Queued output, without draining it.
    #[inline]
    pub fn output(&self) -> &[u8] { &self.buf }

    /// Drain queued output for writing to the transport.
    #[inline]
    pub fn take(&mut self) -> Vec<u8> { std::mem::take(&mut self.buf) }
}
