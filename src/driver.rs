//! Tokio pump for a single connection.
//!
//! The sans-io [`Connection`] does not touch sockets; this module wires
//! one up to anything `AsyncRead + AsyncWrite`. Embedding servers with
//! their own event loop can skip it and drive the connection directly.

use std::io::Result;

use tokio::io::{AsyncRead, AsyncWrite, AsyncReadExt, AsyncWriteExt};

use log::trace;

use crate::connection::Connection;
use crate::engine::EngineFactory;
use crate::proxy::ProxyTarget;
use crate::sink::Close;

/// Transport read buffer size.
pub const READ_BUF_SIZE: usize = 0x2000;

/// Pump one connection until its transport closes.
///
/// Queued output is flushed with `write_all` before every read, so a
/// scheduled [`Close::AfterWriting`] only drops the transport once the
/// final bytes (a 400 response, a policy document, a close frame) have
/// drained. [`Close::Now`] discards pending output. EOF and transport
/// errors feed back into [`Connection::unbind`] so the close callback
/// semantics hold.
pub async fn drive<IO, F, P, M>(mut io: IO, conn: &mut Connection<F, P, M>) -> Result<()>
where
    IO: AsyncRead + AsyncWrite + Unpin,
    F: EngineFactory,
    P: ProxyTarget,
    M: FnMut() -> P,
{
    let mut buf = vec![0_u8; READ_BUF_SIZE];

    loop {
        // flush queued output, unless an abrupt close discards it
        if conn.pending_close() != Some(Close::Now) {
            let out = conn.take_outgoing();
            if !out.is_empty() {
                trace!("flushing {} byte(s)", out.len());
                if let Err(e) = io.write_all(&out).await {
                    conn.unbind();
                    return Err(e);
                }
            }
        }

        match conn.pending_close() {
            Some(Close::Now) => {
                let _ = io.shutdown().await;
                conn.unbind();
                return Ok(());
            }
            Some(Close::AfterWriting) => {
                // everything already drained above
                let done = io.shutdown().await;
                conn.unbind();
                return done;
            }
            None => {}
        }

        let n = match io.read(&mut buf).await {
            Ok(n) => n,
            Err(e) => {
                conn.unbind();
                return Err(e);
            }
        };

        if n == 0 {
            conn.unbind();
            return Ok(());
        }

        conn.receive_data(&buf[..n]);
    }
}
