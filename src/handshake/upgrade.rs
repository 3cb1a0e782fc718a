//! Client upgrade request.
//!
//! From [RFC-6455 Section 4.1](https://datatracker.ietf.org/doc/html/rfc6455#section-4.1):
//!
//! Once a connection to the server has been established (including a
//! connection via a proxy or over a TLS-encrypted tunnel), the client
//! MUST send an opening handshake to the server.  The handshake consists
//! of an HTTP Upgrade request, along with a list of required and
//! optional header fields.
//!
//! Example:
//!
//! ```text
//! GET /path HTTP/1.1
//! host: www.example.com
//! upgrade: websocket
//! connection: upgrade
//! sec-websocket-key: dGhlIHNhbXBsZSBub25jZQ==
//! sec-websocket-version: 13
//! ```
//!

use super::{HttpHeader, filter_header};
use super::handshake_check;
use super::{MAX_ALLOW_HEADERS, HTTP_METHOD};
use super::static_headers::*;

use crate::error::HandshakeError;

/// Decoded upgrade request.
pub struct Upgrade<'h, 'b: 'h> {
    pub path: &'b [u8],
    pub host: &'b [u8],
    pub sec_key: &'b [u8],
    pub other_headers: &'h mut [HttpHeader<'b>],
}

impl<'h, 'b: 'h> Upgrade<'h, 'b> {
    /// Create with user provided headers, other fields are left empty.
    /// The max decode header size is [`MAX_ALLOW_HEADERS`].
    #[inline]
    pub fn new(other_headers: &'h mut [HttpHeader<'b>]) -> Self {
        Self {
            path: b"",
            host: b"",
            sec_key: b"",
            other_headers,
        }
    }

    /// Parse from a provided buffer, save the results, and
    /// return the number of bytes parsed.
    ///
    /// Necessary headers, including `host`, `upgrade`, `connection`,
    /// `sec-websocket-key` and `sec-websocket-version` are parsed and
    /// checked, and stored in the struct. Optional headers are stored in
    /// `other_headers`, which is shrunk to fit afterwards.
    ///
    /// If the buffer does not contain a complete http request,
    /// a [`HandshakeError::NotEnoughData`] error will be returned.
    /// If the required headers(mentioned above) do not pass the check
    /// (case insensitive), other corresponding errors will be returned.
    pub fn decode(&mut self, buf: &'b [u8]) -> Result<usize, HandshakeError> {
        debug_assert!(self.other_headers.len() >= MAX_ALLOW_HEADERS);

        let mut headers = [httparse::EMPTY_HEADER; MAX_ALLOW_HEADERS];
        let mut request = httparse::Request::new(&mut headers);

        // return value
        let decode_n = match request.parse(buf)? {
            httparse::Status::Complete(n) => n,
            httparse::Status::Partial => return Err(HandshakeError::NotEnoughData),
        };

        // check method
        if request.method.unwrap_or_default().as_bytes() != HTTP_METHOD {
            return Err(HandshakeError::HttpMethod);
        }

        // check version, should be HTTP/1.1
        // ref: https://docs.rs/httparse/latest/src/httparse/lib.rs.html#581-596
        if request.version.unwrap_or_default() != 1_u8 {
            return Err(HandshakeError::HttpVersion);
        }

        // handle headers below
        // headers are shrunk to number of inited headers
        // ref: https://docs.rs/httparse/latest/src/httparse/lib.rs.html#757-765
        let headers = request.headers;

        let mut required_headers = [
            HEADER_HOST,
            HEADER_UPGRADE,
            HEADER_CONNECTION,
            HEADER_SEC_WEBSOCKET_KEY,
            HEADER_SEC_WEBSOCKET_VERSION,
        ];

        // filter required headers, save other headers
        filter_header(headers, &mut required_headers, self.other_headers);

        let [host_hdr, upgrade_hdr, connection_hdr, sec_key_hdr, sec_version_hdr] =
            required_headers;

        // check missing header
        if !required_headers.iter().all(|h| !h.value.is_empty()) {
            handshake_check!(host_hdr, HandshakeError::HttpHost);
            handshake_check!(upgrade_hdr, HandshakeError::Upgrade);
            handshake_check!(connection_hdr, HandshakeError::Connection);
            handshake_check!(sec_key_hdr, HandshakeError::SecWebSocketKey);
            handshake_check!(sec_version_hdr, HandshakeError::SecWebSocketVersion);
        }

        // check header value (case insensitive)
        // ref: https://datatracker.ietf.org/doc/html/rfc6455#section-4.1
        handshake_check!(upgrade_hdr, HEADER_UPGRADE_VALUE, HandshakeError::Upgrade);

        handshake_check!(
            connection_hdr,
            HEADER_CONNECTION_VALUE,
            HandshakeError::Connection
        );

        handshake_check!(
            sec_version_hdr,
            HEADER_SEC_WEBSOCKET_VERSION_VALUE,
            HandshakeError::SecWebSocketVersion
        );

        // save ref
        self.path = request.path.unwrap_or_default().as_bytes();
        self.host = host_hdr.value;
        self.sec_key = sec_key_hdr.value;

        // shrink header reference
        let other_header_len = headers.len() - required_headers.len();

        let (kept, _) = std::mem::take(&mut self.other_headers).split_at_mut(other_header_len);
        self.other_headers = kept;

        Ok(decode_n)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use super::super::test::{make_headers, TEMPLATE_HEADERS};
    use rand::prelude::*;

    #[test]
    fn upgrade_request() {
        for i in 0..16 {
            let hdr_len: usize = thread_rng().gen_range(1..128);
            let headers = format!(
                "GET / HTTP/1.1\r\n{}\r\n",
                make_headers(i, hdr_len, TEMPLATE_HEADERS)
            );

            let mut other_headers = HttpHeader::new_storage();
            let mut upgrade = Upgrade::new(&mut other_headers);
            let decode_n = upgrade.decode(headers.as_bytes()).unwrap();

            assert_eq!(decode_n, headers.len());
            assert_eq!(upgrade.path, b"/");
            assert_eq!(upgrade.host, b"www.example.com");
            assert_eq!(upgrade.sec_key, b"dGhlIHNhbXBsZSBub25jZQ==");
            assert_eq!(upgrade.other_headers.len(), i);
        }
    }

    #[test]
    fn upgrade_request_incomplete() {
        let headers = "GET / HTTP/1.1\r\nhost: www.example.com\r\n";

        let mut other_headers = HttpHeader::new_storage();
        let mut upgrade = Upgrade::new(&mut other_headers);

        assert_eq!(
            upgrade.decode(headers.as_bytes()).unwrap_err(),
            HandshakeError::NotEnoughData
        );
    }

    #[test]
    fn upgrade_request_missing_headers() {
        macro_rules! run {
            ($strip: expr, $err: expr) => {{
                let headers = format!(
                    "GET / HTTP/1.1\r\n{}\r\n",
                    TEMPLATE_HEADERS
                        .split("\r\n")
                        .filter(|l| !l.starts_with($strip))
                        .map(|l| format!("{}\r\n", l))
                        .collect::<String>()
                );

                let mut other_headers = HttpHeader::new_storage();
                let mut upgrade = Upgrade::new(&mut other_headers);
                assert_eq!(upgrade.decode(headers.as_bytes()).unwrap_err(), $err);
            }};
        }

        run!("host", HandshakeError::HttpHost);
        run!("upgrade", HandshakeError::Upgrade);
        run!("connection", HandshakeError::Connection);
        run!("sec-websocket-key:", HandshakeError::SecWebSocketKey);
        run!("sec-websocket-version", HandshakeError::SecWebSocketVersion);
    }

    #[test]
    fn upgrade_request_bad_values() {
        let headers = "\
            GET / HTTP/1.1\r\n\
            host: www.example.com\r\n\
            upgrade: http/2\r\n\
            connection: upgrade\r\n\
            sec-websocket-key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
            sec-websocket-version: 13\r\n\r\n";

        let mut other_headers = HttpHeader::new_storage();
        let mut upgrade = Upgrade::new(&mut other_headers);
        assert_eq!(
            upgrade.decode(headers.as_bytes()).unwrap_err(),
            HandshakeError::Upgrade
        );
    }
}
