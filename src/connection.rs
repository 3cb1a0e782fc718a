//! Per-connection orchestration.
//!
//! One [`Connection`] exists per accepted socket. It owns the whole
//! lifecycle: buffering the first bytes, classifying the protocol, handing
//! the stream to an engine or a proxy bridge, and firing the four
//! application callbacks at the defined transition points.
//!
//! Exactly one component consumes inbound bytes at any moment, and the
//! hand-over happens once, never back: before classification that is the
//! header buffer, afterwards the engine or the bridge. All state lives on
//! the connection itself; two connections share nothing.

use log::{debug, trace};

use crate::http::{HeaderBuffer, RequestHeader, BAD_REQUEST};
use crate::sniff::{self, Verdict, CROSS_DOMAIN_POLICY};
use crate::engine::{Engine, EngineFactory, Build, Event, State};
use crate::proxy::{ProxyTarget, Bridge};
use crate::sink::{Sink, Close};
use crate::error::Error;

type OpenFn<E> = Box<dyn FnMut(&mut Ctrl<'_, E>)>;
type MessageFn<E> = Box<dyn FnMut(&mut Ctrl<'_, E>, &str)>;
type CloseFn = Box<dyn FnMut()>;
type ErrorFn = Box<dyn FnMut(&Error)>;

/// Who consumes inbound bytes. The transfer out of `Unclassified`
/// happens at most once per connection.
enum Mode<E, P> {
    Unclassified(HeaderBuffer),
    Proxied(Bridge<P>),
    Engine(E),
    PolicySent,
    Closed,
}

/// One accepted socket, from first byte to teardown.
///
/// `F` builds the handshake/frame engine, `M` constructs the per-connection
/// proxy target for plain-http traffic.
pub struct Connection<F, P, M>
where
    F: EngineFactory,
{
    factory: F,
    make_proxy: M,
    secure: bool,
    mode: Mode<F::Engine, P>,
    sink: Sink,
    opened: bool,
    closed_fired: bool,
    on_open: Option<OpenFn<F::Engine>>,
    on_message: Option<MessageFn<F::Engine>>,
    on_close: Option<CloseFn>,
    on_error: Option<ErrorFn>,
}

impl<F, P, M> Connection<F, P, M>
where
    F: EngineFactory,
    P: ProxyTarget,
    M: FnMut() -> P,
{
    pub fn new(factory: F, make_proxy: M, secure: bool) -> Self {
        Self {
            factory,
            make_proxy,
            secure,
            mode: Mode::Unclassified(HeaderBuffer::new()),
            sink: Sink::new(),
            opened: false,
            closed_fired: false,
            on_open: None,
            on_message: None,
            on_close: None,
            on_error: None,
        }
    }

    /// Fired once, when the handshake completes.
    pub fn on_open(&mut self, f: impl FnMut(&mut Ctrl<'_, F::Engine>) + 'static) {
        self.on_open = Some(Box::new(f));
    }

    /// Fired once per delivered application message.
    pub fn on_message(&mut self, f: impl FnMut(&mut Ctrl<'_, F::Engine>, &str) + 'static) {
        self.on_message = Some(Box::new(f));
    }

    /// Fired once, when an opened connection terminates. A connection
    /// that never reached open terminates silently.
    pub fn on_close(&mut self, f: impl FnMut() + 'static) {
        self.on_close = Some(Box::new(f));
    }

    /// Fired with a reason on handshake failure or a wire violation.
    pub fn on_error(&mut self, f: impl FnMut(&Error) + 'static) {
        self.on_error = Some(Box::new(f));
    }

    /// Feed one inbound chunk from the transport.
    pub fn receive_data(&mut self, data: &[u8]) {
        trace!("receive_data: {} byte(s)", data.len());

        let events = match &mut self.mode {
            Mode::Closed | Mode::PolicySent => None,
            Mode::Proxied(bridge) => {
                bridge.forward(data, &mut self.sink);
                None
            }
            Mode::Engine(engine) => Some(engine.receive_data(data, &mut self.sink)),
            Mode::Unclassified(buffer) => {
                buffer.feed(data);
                None
            }
        };

        if let Some(events) = events {
            self.dispatch_events(events);
            return;
        }

        if matches!(self.mode, Mode::Unclassified(_)) {
            self.classify();
        }
    }

    /// Queue one text message toward the peer.
    ///
    /// Fails synchronously until the handshake has completed; data is
    /// never silently buffered for later.
    pub fn send(&mut self, payload: &str) -> Result<(), Error> {
        match &mut self.mode {
            Mode::Engine(engine) if engine.state() == State::Open => {
                engine.send_text_frame(payload, &mut self.sink);
                Ok(())
            }
            _ => Err(Error::SendBeforeOpen),
        }
    }

    /// Close the websocket connection cleanly.
    ///
    /// With an engine active this runs the engine's close sequence and
    /// waits for acknowledgement; without one there is nothing graceful
    /// to do and the transport is simply torn down.
    pub fn close_websocket(&mut self) {
        match &mut self.mode {
            Mode::Engine(engine) => engine.close_websocket(&mut self.sink),
            Mode::Closed => {}
            _ => {
                self.sink.close_connection();
                self.mode = Mode::Closed;
            }
        }
    }

    /// The transport is gone. Safe from any state, idempotent.
    pub fn unbind(&mut self) {
        debug!("unbind");

        let events = match &mut self.mode {
            Mode::Engine(engine) => engine.unbind(),
            Mode::Closed => return,
            _ => {
                self.mode = Mode::Closed;
                return;
            }
        };

        self.dispatch_events(events);
    }

    /// The parsed handshake request, once an engine holds one.
    pub fn request(&self) -> Option<&RequestHeader> {
        match &self.mode {
            Mode::Engine(engine) => Some(engine.request()),
            _ => None,
        }
    }

    pub fn state(&self) -> State {
        match &self.mode {
            Mode::Engine(engine) => engine.state(),
            Mode::Closed => State::Closed,
            _ => State::Handshake,
        }
    }

    /// Drain queued output for writing to the transport.
    pub fn take_outgoing(&mut self) -> Vec<u8> { self.sink.take() }

    /// Queued output, without draining it.
    pub fn output(&self) -> &[u8] { self.sink.output() }

    pub fn pending_close(&self) -> Option<Close> { self.sink.pending_close() }

    /// Run the classification step on the buffered bytes.
    fn classify(&mut self) {
        let Mode::Unclassified(buffer) = &mut self.mode else {
            return;
        };

        let Some(verdict) = sniff::classify(buffer.bytes()) else {
            // undecidable yet, keep buffering
            return;
        };

        let events = match verdict {
            Verdict::PolicyFileProbe => {
                debug!("policy file probe, answering inline");
                self.sink.send_data(CROSS_DOMAIN_POLICY);
                // infrastructure noise: the application is not told
                // about this connection
                self.on_close = None;
                self.sink.close_connection_after_writing();
                self.mode = Mode::PolicySent;
                return;
            }

            Verdict::StandardHttp => {
                debug!("standard http, bridging to the proxy target");
                let buffered = buffer.take();
                let bridge =
                    Bridge::open((self.make_proxy)(), &buffered, &mut self.sink);
                self.mode = Mode::Proxied(bridge);
                return;
            }

            Verdict::WebSocketUpgrade => {
                match self.factory.build(buffer.bytes(), self.secure) {
                    // header complete but the engine wants more bytes
                    Ok(Build::Pending) => return,

                    Ok(Build::Ready(mut engine)) => {
                        let events = engine.run(&mut self.sink);
                        self.mode = Mode::Engine(engine);
                        events
                    }

                    Err(e) => {
                        debug!("handshake failed: {}", e);
                        let err = Error::Handshake(e);
                        if let Some(cb) = &mut self.on_error {
                            cb(&err);
                        }
                        self.sink.send_data(BAD_REQUEST);
                        self.sink.close_connection_after_writing();
                        self.mode = Mode::Closed;
                        return;
                    }
                }
            }
        };

        self.dispatch_events(events);
    }

    fn dispatch_events(&mut self, events: Vec<Event>) {
        for event in events {
            match event {
                Event::Open => {
                    debug!("connection open");
                    self.opened = true;
                    if let (Mode::Engine(engine), Some(cb)) =
                        (&mut self.mode, &mut self.on_open)
                    {
                        let mut ctrl = Ctrl { engine, sink: &mut self.sink };
                        cb(&mut ctrl);
                    }
                }

                Event::Message(msg) => {
                    if let (Mode::Engine(engine), Some(cb)) =
                        (&mut self.mode, &mut self.on_message)
                    {
                        let mut ctrl = Ctrl { engine, sink: &mut self.sink };
                        cb(&mut ctrl, &msg);
                    }
                }

                Event::Error(e) => {
                    let err = Error::Frame(e);
                    if let Some(cb) = &mut self.on_error {
                        cb(&err);
                    }
                }

                Event::Closed => self.fire_close(),
            }
        }
    }

    /// The close callback fires at most once, and only for connections
    /// that actually opened.
    fn fire_close(&mut self) {
        if !self.opened || self.closed_fired {
            return;
        }
        self.closed_fired = true;
        debug!("connection closed");

        if let Some(cb) = &mut self.on_close {
            cb();
        }
    }
}

/// Live view of a connection with an active engine, handed to the open
/// and message callbacks so they can reply and close re-entrantly.
pub struct Ctrl<'c, E> {
    engine: &'c mut E,
    sink: &'c mut Sink,
}

impl<E: Engine> Ctrl<'_, E> {
    /// Queue one text message toward the peer; fails synchronously
    /// unless the connection is open.
    pub fn send(&mut self, payload: &str) -> Result<(), Error> {
        if self.engine.state() != State::Open {
            return Err(Error::SendBeforeOpen);
        }
        self.engine.send_text_frame(payload, self.sink);
        Ok(())
    }

    /// Start the engine's close sequence.
    pub fn close_websocket(&mut self) { self.engine.close_websocket(self.sink) }

    pub fn request(&self) -> &RequestHeader { self.engine.request() }

    pub fn state(&self) -> State { self.engine.state() }
}
