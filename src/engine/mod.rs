//! Handshake/frame engines.
//!
//! An engine owns everything protocol-revision specific on a websocket
//! connection: computing the handshake response, decoding and encoding
//! frames, and running the close sequence. The connection orchestrator
//! only ever talks to the [`Engine`] trait; which engine gets built is
//! the [`EngineFactory`]'s call.
//!
//! Two engines are bundled:
//!
//! - [`V13`] for clients advertising `sec-websocket-key`;
//! - [`Draft`] for key-less legacy clients speaking the early
//!   sentinel-framed revision.

mod v13;
mod draft;

pub use v13::V13;
pub use draft::Draft;

use crate::http::{self, RequestHeader};
use crate::handshake::{HttpHeader, Upgrade, derive_accept_key};
use crate::error::{HandshakeError, FrameError};
use crate::sink::Sink;

/// Engine-observed connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Handshake,
    Open,
    Closed,
}

/// What an engine observed while consuming bytes.
///
/// The orchestrator drains these and fires the matching callbacks.
#[derive(Debug, PartialEq, Eq)]
pub enum Event {
    /// Handshake complete, the connection is open.
    Open,
    /// One delivered application message.
    Message(String),
    /// Protocol violation on the wire.
    Error(FrameError),
    /// The websocket session ended.
    Closed,
}

/// Factory outcome that is not a failure.
///
/// "Not enough bytes yet" happens on every fragmented handshake, so it is
/// a normal result, not an error; the caller keeps buffering and calls
/// again on the next arrival.
#[derive(Debug)]
pub enum Build<E> {
    Ready(E),
    Pending,
}

/// Builds an engine from the bytes buffered so far.
pub trait EngineFactory {
    type Engine: Engine;

    /// Attempt construction. `data` is everything received on the
    /// connection up to now, header included; `secure` reports whether the
    /// transport is tls-wrapped.
    fn build(&mut self, data: &[u8], secure: bool)
        -> Result<Build<Self::Engine>, HandshakeError>;
}

/// One protocol revision bound to one connection.
pub trait Engine {
    /// Activate: queue the handshake response, then work through any frame
    /// bytes that arrived together with the handshake.
    fn run(&mut self, sink: &mut Sink) -> Vec<Event>;

    /// Consume one inbound chunk.
    fn receive_data(&mut self, data: &[u8], sink: &mut Sink) -> Vec<Event>;

    /// Queue one outbound text message.
    fn send_text_frame(&mut self, payload: &str, sink: &mut Sink);

    /// Start a graceful shutdown; the transport stays up until the peer
    /// acknowledges (where the revision has an acknowledgment at all).
    fn close_websocket(&mut self, sink: &mut Sink);

    /// The transport is gone, abruptly.
    fn unbind(&mut self) -> Vec<Event>;

    fn state(&self) -> State;

    /// The parsed handshake request, retained for the connection lifetime.
    fn request(&self) -> &RequestHeader;
}

/// Default factory: sniff the revision from the handshake headers.
///
/// `sec-websocket-key` present means a modern client; absent means the
/// legacy sentinel-framed revision.
pub struct Factory;

impl EngineFactory for Factory {
    type Engine = Revision;

    fn build(&mut self, data: &[u8], secure: bool)
        -> Result<Build<Revision>, HandshakeError>
    {
        let Some((head, body)) = http::split_header(data) else {
            return Ok(Build::Pending);
        };

        let mut storage = HttpHeader::new_storage();
        let mut upgrade = Upgrade::new(&mut storage);

        match upgrade.decode(data) {
            Ok(_) => {
                let accept = derive_accept_key(upgrade.sec_key);
                let request = RequestHeader::parse(head)?;
                let engine = V13::new(request, &accept, body)?;
                Ok(Build::Ready(Revision::V13(engine)))
            }
            // no key advertised: the legacy revision
            Err(HandshakeError::SecWebSocketKey) => {
                let request = RequestHeader::parse(head)?;
                let engine = Draft::new(request, secure, body)?;
                Ok(Build::Ready(Revision::Draft(engine)))
            }
            Err(HandshakeError::NotEnoughData) => Ok(Build::Pending),
            Err(e) => Err(e),
        }
    }
}

/// Engine built by [`Factory`], one variant per bundled revision.
#[derive(Debug)]
pub enum Revision {
    V13(V13),
    Draft(Draft),
}

macro_rules! delegate {
    ($self: expr, $e: ident => $body: expr) => {
        match $self {
            Revision::V13($e) => $body,
            Revision::Draft($e) => $body,
        }
    };
}

impl Engine for Revision {
    fn run(&mut self, sink: &mut Sink) -> Vec<Event> {
        delegate!(self, e => e.run(sink))
    }

    fn receive_data(&mut self, data: &[u8], sink: &mut Sink) -> Vec<Event> {
        delegate!(self, e => e.receive_data(data, sink))
    }

    fn send_text_frame(&mut self, payload: &str, sink: &mut Sink) {
        delegate!(self, e => e.send_text_frame(payload, sink))
    }

    fn close_websocket(&mut self, sink: &mut Sink) {
        delegate!(self, e => e.close_websocket(sink))
    }

    fn unbind(&mut self) -> Vec<Event> {
        delegate!(self, e => e.unbind())
    }

    fn state(&self) -> State {
        delegate!(self, e => e.state())
    }

    fn request(&self) -> &RequestHeader {
        delegate!(self, e => e.request())
    }
}
