//! Engine for clients advertising `sec-websocket-key`.
//!
//! Frame mechanics follow RFC-6455: inbound client frames are masked and
//! unmasked on arrival, outbound server frames are not masked, pings are
//! answered with pongs, and closing is a two-way frame exchange. The
//! side that wants out sends a close frame and keeps the transport up
//! until the peer echoes one.

use log::debug;

use super::{Engine, Event, State};
use crate::http::RequestHeader;
use crate::handshake::Response;
use crate::error::{HandshakeError, FrameError};
use crate::frame::{FrameHead, Fin, OpCode, Mask, PayloadLen, MAX_SERVER_HEAD_LEN};
use crate::frame::mask::apply_mask;
use crate::sink::Sink;

#[derive(Debug)]
pub struct V13 {
    request: RequestHeader,
    /// Prebuilt 101 response, queued by `run`.
    response: Vec<u8>,
    /// Inbound bytes not yet decoded into a whole frame.
    buf: Vec<u8>,
    /// Reassembly buffer for a fragmented message.
    fragments: Vec<u8>,
    fragmented: bool,
    state: State,
    /// We sent a close frame and are waiting for the peer's.
    closing: bool,
    closed_emitted: bool,
}

impl V13 {
    /// Build from the parsed request, the derived accept key, and any
    /// frame bytes that arrived buffered together with the handshake.
    pub fn new(
        request: RequestHeader,
        accept: &[u8],
        body: &[u8],
    ) -> Result<Self, HandshakeError> {
        let response = Response::new(accept);
        let mut buf = [0_u8; 256];
        let n = response.encode(&mut buf)?;

        Ok(Self {
            request,
            response: buf[..n].to_vec(),
            buf: body.to_vec(),
            fragments: Vec::new(),
            fragmented: false,
            state: State::Handshake,
            closing: false,
            closed_emitted: false,
        })
    }

    fn write_frame(&self, opcode: OpCode, payload: &[u8], sink: &mut Sink) {
        let head = FrameHead::new(
            Fin::Y,
            opcode,
            Mask::None,
            PayloadLen::from_num(payload.len() as u64),
        );

        let mut hbuf = [0_u8; MAX_SERVER_HEAD_LEN];
        // an unmasked head never exceeds MAX_SERVER_HEAD_LEN
        let n = unsafe { head.encode_unchecked(&mut hbuf) };

        sink.send_data(&hbuf[..n]);
        sink.send_data(payload);
    }

    /// End the session over a wire violation.
    fn protocol_error(&mut self, e: FrameError, sink: &mut Sink, events: &mut Vec<Event>) {
        debug!("frame error: {}", e);
        events.push(Event::Error(e));
        self.state = State::Closed;
        self.closed_emitted = true;
        sink.close_connection_after_writing();
        events.push(Event::Closed);
    }

    /// Decode as many whole frames as the buffer holds.
    fn process(&mut self, sink: &mut Sink) -> Vec<Event> {
        let mut events = Vec::new();

        while self.state != State::Closed {
            let (head, head_n) = match FrameHead::decode(&self.buf) {
                Ok(v) => v,
                Err(FrameError::NotEnoughData) => break,
                Err(e) => {
                    self.protocol_error(e, sink, &mut events);
                    break;
                }
            };

            let len = head.length.to_num() as usize;
            if self.buf.len() < head_n + len {
                // wait for the whole payload
                break;
            }

            let mut payload = self.buf[head_n..head_n + len].to_vec();
            self.buf.drain(..head_n + len);

            if let Mask::Key(key) = head.mask {
                apply_mask(key, &mut payload);
            }

            match head.opcode {
                OpCode::Text | OpCode::Binary => {
                    if let Fin::Y = head.fin {
                        events.push(Event::Message(into_text(payload)));
                    } else {
                        self.fragments = payload;
                        self.fragmented = true;
                    }
                }
                OpCode::Continue => {
                    if !self.fragmented {
                        self.protocol_error(FrameError::IllegalOpCode, sink, &mut events);
                        break;
                    }
                    self.fragments.extend_from_slice(&payload);
                    if let Fin::Y = head.fin {
                        self.fragmented = false;
                        let whole = std::mem::take(&mut self.fragments);
                        events.push(Event::Message(into_text(whole)));
                    }
                }
                OpCode::Ping => {
                    self.write_frame(OpCode::Pong, &payload, sink);
                }
                OpCode::Pong => {}
                OpCode::Close => {
                    if !self.closing {
                        // peer-initiated: acknowledge before dropping
                        self.write_frame(OpCode::Close, &payload, sink);
                    }
                    self.state = State::Closed;
                    self.closed_emitted = true;
                    sink.close_connection_after_writing();
                    events.push(Event::Closed);
                }
            }
        }

        events
    }
}

fn into_text(payload: Vec<u8>) -> String {
    String::from_utf8_lossy(&payload).into_owned()
}

impl Engine for V13 {
    fn run(&mut self, sink: &mut Sink) -> Vec<Event> {
        sink.send_data(&self.response);
        self.state = State::Open;
        debug!("handshake response queued, connection open");

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
        self.write_frame(OpCode::Text, payload.as_bytes(), sink);
    }

    fn close_websocket(&mut self, sink: &mut Sink) {
        if self.state != State::Open || self.closing {
            return;
        }
        // the transport stays up until the peer acknowledges
        self.closing = true;
        self.write_frame(OpCode::Close, b"", sink);
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
