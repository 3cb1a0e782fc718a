//! Permissive request-head parsing.

use std::collections::BTreeMap;

use crate::error::HandshakeError;

/// Parsed request head.
///
/// Field names are stored verbatim (surrounding whitespace trimmed, case
/// untouched): a client sending `host` and one sending `Host` produce
/// different keys. Query values are percent-decoded with `+` read as space;
/// a repeated key keeps its last value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHeader {
    pub method: String,
    /// Request target exactly as sent, query string included.
    pub path: String,
    pub query: BTreeMap<String, String>,
    pub fields: BTreeMap<String, String>,
}

impl RequestHeader {
    /// Parse a complete request head (terminator already stripped).
    ///
    /// The request line must be exactly `GET <path> HTTP/1.1`; anything
    /// else is a [`HandshakeError`]. Header lines that do not look like
    /// `Name: Value` are skipped, not fatal.
    pub fn parse(block: &[u8]) -> Result<Self, HandshakeError> {
        let text = String::from_utf8_lossy(block);
        let mut lines = text.split("\r\n");

        let first = lines.next().unwrap_or("");
        let (method, path) = parse_request_line(first)?;

        if method != "GET" {
            return Err(HandshakeError::HttpMethod);
        }

        let query = match path.split_once('?') {
            Some((_, qs)) => parse_query(qs),
            None => BTreeMap::new(),
        };

        let mut fields = BTreeMap::new();
        for line in lines {
            // `Name: Value`, everything else is skipped
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            if name.is_empty() {
                continue;
            }
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            fields.insert(name.trim().to_owned(), value.to_owned());
        }

        Ok(Self {
            method: method.to_owned(),
            path: path.to_owned(),
            query,
            fields,
        })
    }

    /// Exact-name field lookup; names are stored verbatim.
    #[inline]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Case-insensitive field lookup, for protocol headers whose spelling
    /// varies across clients.
    pub fn field_ignore_case(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// `GET /path HTTP/1.1`: one method token of word characters, one path
/// token starting with `/`, the literal version, single spaces between.
fn parse_request_line(line: &str) -> Result<(&str, &str), HandshakeError> {
    let mut tokens = line.split(' ');

    match (tokens.next(), tokens.next(), tokens.next(), tokens.next()) {
        (Some(method), Some(path), Some(version), None)
            if !method.is_empty()
                && method
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'_')
                && path.starts_with('/')
                && !path.chars().any(char::is_whitespace)
                && version == "HTTP/1.1" =>
        {
            Ok((method, path))
        }
        _ => Err(HandshakeError::RequestLine),
    }
}

fn parse_query(qs: &str) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();

    for pair in qs.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (key, value) = match pair.split_once('=') {
            Some((k, v)) => (k, v),
            None => (pair, ""),
        };
        map.insert(decode_component(key), decode_component(value));
    }

    map
}

/// Form-style decoding: `+` is space, `%XX` is a byte. Escapes that do not
/// decode pass through untouched.
fn decode_component(s: &str) -> String {
    fn hex_val(b: u8) -> Option<u8> {
        match b {
            b'0'..=b'9' => Some(b - b'0'),
            b'a'..=b'f' => Some(b - b'a' + 10),
            b'A'..=b'F' => Some(b - b'A' + 10),
            _ => None,
        }
    }

    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                match (hex_val(bytes[i + 1]), hex_val(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push(hi << 4 | lo);
                        i += 3;
                    }
                    _ => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}
