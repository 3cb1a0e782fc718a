//! Engine for key-less legacy clients.
//!
//! The earliest shipped revision of the protocol: no key exchange, the
//! server echoes origin and location back in the handshake, and frames
//! are sentinel-delimited (`0x00`, utf-8 payload, `0xff`). There is no
//! close exchange; closing flushes and drops the transport.

use log::debug;

use super::{Engine, Event, State};
use crate::http::{RequestHeader, HTTP_LINE_BREAK, HEADER_TERMINATOR};
use crate::handshake::HTTP_STATUS_LINE;
use crate::error::{HandshakeError, FrameError};
use crate::sink::Sink;

/// Frame opening sentinel.
const FRAME_BEGIN: u8 = 0x00;

/// Frame closing sentinel.
const FRAME_END: u8 = 0xff;

#[derive(Debug)]
pub struct Draft {
    request: RequestHeader,
    /// Prebuilt 101 response, queued by `run`.
    response: Vec<u8>,
    /// Inbound bytes not yet delimited into a whole frame.
    buf: Vec<u8>,
    state: State,
    closed_emitted: bool,
}

impl Draft {
    /// Build from the parsed request and any frame bytes that arrived
    /// buffered together with the handshake.
    pub fn new(
        request: RequestHeader,
        secure: bool,
        body: &[u8],
    ) -> Result<Self, HandshakeError> {
        let host = request
            .field_ignore_case("Host")
            .ok_or(HandshakeError::HttpHost)?;
        let scheme = if secure { "wss" } else { "ws" };

        let mut response =
            Vec::with_capacity(192 + host.len() + request.path.len());
        response.extend_from_slice(HTTP_STATUS_LINE);
        response.extend_from_slice(HTTP_LINE_BREAK);
        // legacy clients match these strings byte for byte
        response.extend_from_slice(b"Upgrade: WebSocket\r\nConnection: Upgrade\r\n");
        if let Some(origin) = request.field_ignore_case("Origin") {
            response.extend_from_slice(b"WebSocket-Origin: ");
            response.extend_from_slice(origin.as_bytes());
            response.extend_from_slice(HTTP_LINE_BREAK);
        }
        response.extend_from_slice(b"WebSocket-Location: ");
        response.extend_from_slice(scheme.as_bytes());
        response.extend_from_slice(b"://");
        response.extend_from_slice(host.as_bytes());
        response.extend_from_slice(request.path.as_bytes());
        response.extend_from_slice(HEADER_TERMINATOR);

        Ok(Self {
            request,
            response,
            buf: body.to_vec(),
            state: State::Handshake,
            closed_emitted: false,
        })
    }

    /// Deliver every complete sentinel frame in the buffer.
    fn process(&mut self, sink: &mut Sink) -> Vec<Event> {
        let mut events = Vec::new();

        while self.state != State::Closed && !self.buf.is_empty() {
            if self.buf[0] != FRAME_BEGIN {
                debug!("unexpected sentinel byte 0x{:02x}", self.buf[0]);
                events.push(Event::Error(FrameError::IllegalSentinel));
                self.state = State::Closed;
                self.closed_emitted = true;
                sink.close_connection_after_writing();
                events.push(Event::Closed);
                break;
            }

            let Some(end) = self.buf.iter().skip(1).position(|b| *b == FRAME_END)
            else {
                // frame still open
                break;
            };

            let payload = self.buf[1..1 + end].to_vec();
            self.buf.drain(..end + 2);
            events.push(Event::Message(
                String::from_utf8_lossy(&payload).into_owned(),
            ));
        }

        events
    }
}

impl Engine for Draft {
    fn run(&mut self, sink: &mut Sink) -> Vec<Event> {
        sink.send_data(&self.response);
        self.state = State::Open;
        debug!("legacy handshake response queued, connection open");

        let mut events = vec![Event::Open];
        events.extend(self.process(sink));
        events
    }

    fn receive_data(&mut self, data: &[u8], sink: &mut Sink) -> Vec<Event> {
        if self.state == State::Closed {
            return Vec::new();
        }
        self.buf.extend_from_slice(data);
        self.process(sink)
    }

    fn send_text_frame(&mut self, payload: &str, sink: &mut Sink) {
        sink.send_data(&[FRAME_BEGIN]);
        sink.send_data(payload.as_bytes());
        sink.send_data(&[FRAME_END]);
    }

    /// No close exchange in this revision: flush, then drop.
    fn close_websocket(&mut self, sink: &mut Sink) {
        if self.state == State::Closed {
            return;
        }
        self.state = State::Closed;
        sink.close_connection_after_writing();
    }

    fn unbind(&mut self) -> Vec<Event> {
        self.state = State::Closed;
        if self.closed_emitted {
            return Vec::new();
        }
        self.closed_emitted = true;
        vec![Event::Closed]
    }

    fn state(&self) -> State { self.state }

    fn request(&self) -> &RequestHeader { &self.request }
}

#[cfg(test)]
mod test {
    use super::*;

    fn engine(secure: bool, body: &[u8]) -> Draft {
        let request = RequestHeader::parse(
            b"GET /live HTTP/1.1\r\nHost: h.example.com\r\nOrigin: http://o.example.com",
        )
        .unwrap();
        Draft::new(request, secure, body).unwrap()
    }

    #[test]
    fn run_queues_response() {
        let mut sink = Sink::new();
        let mut ws = engine(false, b"");

        let events = ws.run(&mut sink);
        assert_eq!(events, vec![Event::Open]);

        let text = String::from_utf8(sink.take()).unwrap();
        assert!(text.starts_with("HTTP/1.1 101 WebSocket Protocol Handshake\r\n"));
        assert!(text.contains("Upgrade: WebSocket\r\n"));
        assert!(text.contains("Connection: Upgrade\r\n"));
        assert!(text.contains("WebSocket-Origin: http://o.example.com\r\n"));
        assert!(text.contains("WebSocket-Location: ws://h.example.com/live\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn secure_location_scheme() {
        let mut sink = Sink::new();
        let mut ws = engine(true, b"");
        ws.run(&mut sink);

        let text = String::from_utf8(sink.take()).unwrap();
        assert!(text.contains("WebSocket-Location: wss://h.example.com/live\r\n"));
    }

    #[test]
    fn missing_host_fails_construction() {
        let request = RequestHeader::parse(b"GET / HTTP/1.1\r\nOrigin: o").unwrap();
        assert!(matches!(
            Draft::new(request, false, b""),
            Err(HandshakeError::HttpHost)
        ));
    }

    #[test]
    fn sentinel_frames() {
        let mut sink = Sink::new();
        let mut ws = engine(false, b"");
        ws.run(&mut sink);

        let events = ws.receive_data(b"\x00hello\xff\x00world\xff", &mut sink);
        assert_eq!(
            events,
            vec![
                Event::Message("hello".into()),
                Event::Message("world".into())
            ]
        );
    }

    // a frame split anywhere still comes out whole, exactly once
    #[test]
    fn sentinel_frame_split() {
        let frame = b"\x00split me\xff";

        for cut in 0..frame.len() {
            let mut sink = Sink::new();
            let mut ws = engine(false, b"");
            ws.run(&mut sink);

            let mut events = ws.receive_data(&frame[..cut], &mut sink);
            events.extend(ws.receive_data(&frame[cut..], &mut sink));
            assert_eq!(events, vec![Event::Message("split me".into())]);
        }
    }

    #[test]
    fn early_frame_bytes_processed_after_run() {
        let mut sink = Sink::new();
        let mut ws = engine(false, b"\x00early\xff");

        let events = ws.run(&mut sink);
        assert_eq!(
            events,
            vec![Event::Open, Event::Message("early".into())]
        );
    }

    #[test]
    fn bad_sentinel_is_fatal() {
        let mut sink = Sink::new();
        let mut ws = engine(false, b"");
        ws.run(&mut sink);

        let events = ws.receive_data(b"\x7fnope", &mut sink);
        assert_eq!(
            events,
            vec![
                Event::Error(FrameError::IllegalSentinel),
                Event::Closed
            ]
        );
        assert_eq!(ws.state(), State::Closed);
    }

    #[test]
    fn send_text_frame_delimited() {
        let mut sink = Sink::new();
        let mut ws = engine(false, b"");
        ws.run(&mut sink);
        sink.take();

        ws.send_text_frame("msg", &mut sink);
        assert_eq!(sink.output(), b"\x00msg\xff");
    }

    #[test]
    fn close_flushes_then_drops() {
        let mut sink = Sink::new();
        let mut ws = engine(false, b"");
        ws.run(&mut sink);

        ws.close_websocket(&mut sink);
        assert_eq!(ws.state(), State::Closed);
        assert_eq!(
            sink.pending_close(),
            Some(crate::sink::Close::AfterWriting)
        );

        // the close surfaces once, at unbind
        assert_eq!(ws.unbind(), vec![Event::Closed]);
        assert!(ws.unbind().is_empty());
    }
}
