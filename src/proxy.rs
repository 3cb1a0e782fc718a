//! Proxy bridge toward the external http target.
//!
//! Connections that turn out to be plain http are not served here; they
//! are handed, byte for byte, to a pre-existing http server implementation
//! behind the [`ProxyTarget`] contract. The bridge owns nothing protocol
//! shaped; it is a pipe with a one-time setup sequence.

use log::debug;

use crate::sink::Sink;

/// The external http server side of a proxied connection.
///
/// One target is constructed per connection. The [`Sink`] handed to each
/// hook is the original socket's outbound queue: the target writes its
/// response bytes there and may schedule the close itself.
pub trait ProxyTarget {
    /// Called exactly once, right after construction.
    fn post_init(&mut self, sink: &mut Sink);

    /// Called with every raw inbound chunk, original header bytes
    /// included, in arrival order.
    fn receive_data(&mut self, data: &[u8], sink: &mut Sink);
}

/// Per-connection adapter around a [`ProxyTarget`].
///
/// Construction is the commitment point: the target is built lazily, once
/// the classifier has settled on plain http, and immediately replayed
/// everything buffered up to that moment. Afterwards [`forward`](Self::forward)
/// passes chunks straight through.
#[derive(Debug)]
pub struct Bridge<P> {
    target: P,
}

impl<P: ProxyTarget> Bridge<P> {
    /// Wrap the target, run its init hook, and replay the buffered stream.
    pub fn open(mut target: P, buffered: &[u8], sink: &mut Sink) -> Self {
        target.post_init(sink);
        if !buffered.is_empty() {
            target.receive_data(buffered, sink);
        }
        debug!("proxy bridge opened, {} byte(s) replayed", buffered.len());

        Self { target }
    }

    /// Pass one chunk through, untouched.
    #[inline]
    pub fn forward(&mut self, data: &[u8], sink: &mut Sink) {
        self.target.receive_data(data, sink);
    }
}
