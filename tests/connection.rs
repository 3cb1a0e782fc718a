use std::cell::RefCell;
use std::rc::Rc;

use wsgate::connection::Connection;
use wsgate::engine::{Factory, State};
use wsgate::error::Error;
use wsgate::frame::{FrameHead, Fin, OpCode, Mask, PayloadLen};
use wsgate::frame::mask::apply_mask;
use wsgate::handshake::derive_accept_key;
use wsgate::http::BAD_REQUEST;
use wsgate::proxy::ProxyTarget;
use wsgate::sink::{Sink, Close};
use wsgate::sniff::CROSS_DOMAIN_POLICY;

use rand::prelude::*;

#[derive(Default)]
struct TargetLog {
    constructed: usize,
    init_count: usize,
    data: Vec<u8>,
}

struct RecordingTarget {
    log: Rc<RefCell<TargetLog>>,
}

impl ProxyTarget for RecordingTarget {
    fn post_init(&mut self, _sink: &mut Sink) {
        self.log.borrow_mut().init_count += 1;
    }

    fn receive_data(&mut self, data: &[u8], _sink: &mut Sink) {
        self.log.borrow_mut().data.extend_from_slice(data);
    }
}

fn new_conn(
) -> (Connection<Factory, RecordingTarget, impl FnMut() -> RecordingTarget>, Rc<RefCell<TargetLog>>)
{
    let log = Rc::new(RefCell::new(TargetLog::default()));
    let log2 = log.clone();
    let conn = Connection::new(
        Factory,
        move || {
            log2.borrow_mut().constructed += 1;
            RecordingTarget { log: log2.clone() }
        },
        false,
    );
    (conn, log)
}

fn client_frame(opcode: OpCode, payload: &[u8]) -> Vec<u8> {
    let key = [0x37, 0xfa, 0x21, 0x3d];
    let head = FrameHead::new(
        Fin::Y,
        opcode,
        Mask::Key(key),
        PayloadLen::from_num(payload.len() as u64),
    );

    let mut out = vec![0_u8; payload.len() + 64];
    let n = head.encode(&mut out).unwrap();
    out.truncate(n);

    let mut masked = payload.to_vec();
    apply_mask(key, &mut masked);
    out.extend_from_slice(&masked);
    out
}

const LEGACY_UPGRADE: &[u8] = b"\
    GET /?a=1 HTTP/1.1\r\n\
    Connection: Upgrade\r\n\
    Upgrade: WebSocket\r\n\
    Host: x\r\n\r\n";

const V13_UPGRADE: &[u8] = b"\
    GET /chat?room=7 HTTP/1.1\r\n\
    Host: server.example.com\r\n\
    Upgrade: WebSocket\r\n\
    Connection: Upgrade\r\n\
    Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
    Sec-WebSocket-Version: 13\r\n\r\n";

// the upgrade handshake succeeds no matter where the header is split
#[test]
fn upgrade_handshake_split_anywhere() {
    for cut in 0..LEGACY_UPGRADE.len() {
        let (mut conn, log) = new_conn();

        let opened = Rc::new(RefCell::new(false));
        let opened2 = opened.clone();
        conn.on_open(move |_| *opened2.borrow_mut() = true);

        conn.receive_data(&LEGACY_UPGRADE[..cut]);
        assert_eq!(conn.state(), State::Handshake);
        assert!(conn.output().is_empty());

        conn.receive_data(&LEGACY_UPGRADE[cut..]);

        assert!(*opened.borrow(), "not open after split at {}", cut);
        assert_eq!(conn.state(), State::Open);

        let req = conn.request().unwrap();
        assert_eq!(req.query.get("a").unwrap(), "1");
        assert_eq!(req.query.len(), 1);

        let out = conn.take_outgoing();
        assert!(out.starts_with(b"HTTP/1.1 101 WebSocket Protocol Handshake\r\n"));

        // no proxy was ever touched
        assert_eq!(log.borrow().constructed, 0);
    }
}

#[test]
fn v13_session_echo_then_close() {
    let (mut conn, _log) = new_conn();

    let closed = Rc::new(RefCell::new(false));
    let closed2 = closed.clone();
    conn.on_close(move || *closed2.borrow_mut() = true);
    conn.on_message(|ctrl, msg| ctrl.send(msg).unwrap());

    conn.receive_data(V13_UPGRADE);
    assert_eq!(conn.state(), State::Open);

    let out = String::from_utf8(conn.take_outgoing()).unwrap();
    let accept = derive_accept_key(b"dGhlIHNhbXBsZSBub25jZQ==");
    assert!(out.starts_with("HTTP/1.1 101 WebSocket Protocol Handshake\r\n"));
    assert!(out.contains(&format!(
        "sec-websocket-accept: {}\r\n",
        std::str::from_utf8(&accept).unwrap()
    )));

    assert_eq!(conn.request().unwrap().query.get("room").unwrap(), "7");

    // echo round trip
    conn.receive_data(&client_frame(OpCode::Text, b"echo me"));
    let out = conn.take_outgoing();
    let (head, n) = FrameHead::decode(&out).unwrap();
    assert_eq!(head.opcode, OpCode::Text);
    assert_eq!(head.mask, Mask::None);
    assert_eq!(&out[n..], b"echo me");

    // peer closes: server acknowledges, fires the close callback, and
    // drops the transport only after the ack drains
    conn.receive_data(&client_frame(OpCode::Close, b""));
    assert!(*closed.borrow());
    assert_eq!(conn.state(), State::Closed);
    assert_eq!(conn.pending_close(), Some(Close::AfterWriting));

    let out = conn.take_outgoing();
    let (head, _) = FrameHead::decode(&out).unwrap();
    assert_eq!(head.opcode, OpCode::Close);
}

// every byte, request line included, reaches the proxy target unmodified
#[test]
fn plain_http_forwarded_verbatim() {
    let request: &[u8] = b"\
        GET /index.html HTTP/1.1\r\n\
        Host: 127.0.0.1:12345\r\n\
        User-Agent: HttpClient\r\n\
        Accept: */*\r\n\r\n";

    for _ in 0..64 {
        let (mut conn, log) = new_conn();

        let mut pos = 0;
        while pos < request.len() {
            let step = thread_rng().gen_range(1..=request.len() - pos);
            conn.receive_data(&request[pos..pos + step]);
            pos += step;
        }

        assert_eq!(log.borrow().constructed, 1);
        assert_eq!(log.borrow().init_count, 1);
        assert_eq!(log.borrow().data, request);
        assert!(conn.output().is_empty());
    }
}

// anything that is not a well-formed websocket upgrade is proxied,
// not rejected
#[test]
fn fail_open_to_proxy() {
    for request in [
        &b"POST /submit HTTP/1.1\r\nHost: x\r\n\r\n"[..],
        &b"GET /nope HTTP/1.0\r\nHost: x\r\n\r\n"[..],
        &b"completely broken\r\n\r\n"[..],
        // upgrade headers in the wrong case are a plain request
        &b"GET / HTTP/1.1\r\nconnection: upgrade\r\nupgrade: websocket\r\n\r\n"[..],
    ] {
        let (mut conn, log) = new_conn();
        conn.receive_data(request);

        assert_eq!(log.borrow().constructed, 1, "not proxied: {:?}", request);
        assert_eq!(log.borrow().data, request);
        assert_eq!(conn.pending_close(), None);
    }
}

#[test]
fn policy_probe_answered_and_silent() {
    let (mut conn, log) = new_conn();

    let closed = Rc::new(RefCell::new(false));
    let closed2 = closed.clone();
    conn.on_close(move || *closed2.borrow_mut() = true);

    conn.receive_data(b"<policy-file-request/>");

    assert_eq!(conn.output(), CROSS_DOMAIN_POLICY);
    assert_eq!(conn.pending_close(), Some(Close::AfterWriting));
    assert_eq!(log.borrow().constructed, 0);

    // transport drops once the document drains; the application never
    // hears about this connection
    conn.unbind();
    assert!(!*closed.borrow());
}

#[test]
fn send_before_open_fails() {
    let (mut conn, _log) = new_conn();
    assert!(matches!(conn.send("too early"), Err(Error::SendBeforeOpen)));

    conn.receive_data(b"GET / HTTP/1.1\r\n");
    assert!(matches!(conn.send("still early"), Err(Error::SendBeforeOpen)));
    assert!(conn.output().is_empty());
}

#[test]
fn malformed_handshake_gets_400() {
    let (mut conn, log) = new_conn();

    let errors = Rc::new(RefCell::new(0_usize));
    let errors2 = errors.clone();
    conn.on_error(move |_| *errors2.borrow_mut() += 1);

    // classified as an upgrade, but the host header is missing
    conn.receive_data(
        b"GET / HTTP/1.1\r\n\
          Connection: Upgrade\r\n\
          Upgrade: WebSocket\r\n\
          Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
          Sec-WebSocket-Version: 13\r\n\r\n",
    );

    assert_eq!(*errors.borrow(), 1);
    assert_eq!(conn.output(), BAD_REQUEST);
    assert_eq!(conn.pending_close(), Some(Close::AfterWriting));
    assert_eq!(conn.state(), State::Closed);
    assert_eq!(log.borrow().constructed, 0);
}

// early frame bytes riding behind the handshake are not lost
#[test]
fn frame_bytes_behind_the_handshake() {
    let (mut conn, _log) = new_conn();

    let messages = Rc::new(RefCell::new(Vec::<String>::new()));
    let messages2 = messages.clone();
    conn.on_message(move |_, msg| messages2.borrow_mut().push(msg.to_owned()));

    let mut stream = V13_UPGRADE.to_vec();
    stream.extend_from_slice(&client_frame(OpCode::Text, b"first"));

    // replay the whole stream in random chunks
    for _ in 0..32 {
        let (mut conn2, _log2) = new_conn();
        let messages3 = messages.clone();
        conn2.on_message(move |_, msg| messages3.borrow_mut().push(msg.to_owned()));

        messages.borrow_mut().clear();

        let mut pos = 0;
        while pos < stream.len() {
            let step = thread_rng().gen_range(1..=stream.len() - pos);
            conn2.receive_data(&stream[pos..pos + step]);
            pos += step;
        }

        assert_eq!(*messages.borrow(), vec!["first".to_owned()]);
    }

    // and in one shot
    messages.borrow_mut().clear();
    conn.receive_data(&stream);
    assert_eq!(*messages.borrow(), vec!["first".to_owned()]);
}

#[test]
fn graceful_close_without_engine_is_abrupt() {
    let (mut conn, _log) = new_conn();

    conn.receive_data(b"GET / HTTP");
    conn.close_websocket();

    assert_eq!(conn.pending_close(), Some(Close::Now));
    assert_eq!(conn.state(), State::Closed);
}

#[test]
fn graceful_close_with_engine_waits_for_ack() {
    let (mut conn, _log) = new_conn();

    let closed = Rc::new(RefCell::new(false));
    let closed2 = closed.clone();
    conn.on_close(move || *closed2.borrow_mut() = true);

    conn.receive_data(V13_UPGRADE);
    conn.take_outgoing();

    conn.close_websocket();
    // close frame queued, transport still up
    assert_eq!(conn.pending_close(), None);
    assert!(!*closed.borrow());
    let out = conn.take_outgoing();
    let (head, _) = FrameHead::decode(&out).unwrap();
    assert_eq!(head.opcode, OpCode::Close);

    // the peer acknowledges
    conn.receive_data(&client_frame(OpCode::Close, b""));
    assert!(*closed.borrow());
    assert_eq!(conn.pending_close(), Some(Close::AfterWriting));
}
