//! Connection-handling core for servers that speak more than one protocol
//! on a single accepted socket.
//!
//! Bytes arriving on a fresh connection are buffered and sniffed until the
//! connection can be classified as one of:
//!
//! - a websocket upgrade, handed to a pluggable handshake/frame engine;
//! - a plain http request, forwarded verbatim to an external proxy target;
//! - a legacy flash cross-domain policy probe, answered inline.
//!
//! The core is sans-io: it consumes raw chunks via
//! [`Connection::receive_data`](connection::Connection::receive_data) and
//! queues outbound bytes in a [`Sink`](sink::Sink), which the embedding
//! server (or the optional tokio [`driver`]) drains to the transport.
//!
//! ## High-level API
//!
//! ```ignore
//! {
//!     let mut conn = Connection::new(Factory, || proxy.clone(), false);
//!     conn.on_open(|ctrl| { let _ = ctrl.send("hello"); });
//!     conn.on_message(|ctrl, msg| { let _ = ctrl.send(msg); });
//!
//!     // feed raw bytes from the socket
//!     conn.receive_data(&buf[..n]);
//!
//!     // drain queued output back to the socket
//!     let out = conn.take_outgoing();
//! }
//! ```
//!
//! ## Low-level API
//!
//! - [`http`]: header buffering and permissive request-head parsing
//! - [`sniff`]: protocol classification
//! - [`handshake`]: strict upgrade-request decoding, response encoding
//! - [`frame`]: frame head codec
//! - [`engine`]: the engine contract and the bundled engines

mod bleed;

pub mod error;
pub mod frame;
pub mod http;
pub mod sniff;
pub mod handshake;
pub mod engine;
pub mod proxy;
pub mod sink;
pub mod connection;

cfg_if::cfg_if! {
    if #[cfg(feature = "async")] {
        pub mod driver;
    }
}
