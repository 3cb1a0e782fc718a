//! Protocol classification.
//!
//! Three protocols may show up on a freshly accepted socket: a websocket
//! upgrade, a plain http request, or a flash cross-domain policy probe.
//! Classification is content-based and incremental: the policy probe is
//! recognized from the first few bytes alone, the other two need a
//! complete request head.
//!
//! Anything that parses as http but is not an upgrade, including header
//! blocks that fail to parse at all, is classified as plain http and
//! forwarded, never rejected. Ordinary browsers and health checks must
//! pass straight through to the http service behind this one.

use log::debug;

use crate::http::{self, RequestHeader};

/// Opening bytes of a flash policy probe.
pub const POLICY_FILE_REQUEST: &[u8] = b"<policy-file-request";

/// The fixed answer to a policy probe.
pub const CROSS_DOMAIN_POLICY: &[u8] =
    b"<?xml version=\"1.0\"?><cross-domain-policy>\
    <allow-access-from domain=\"*\" to-ports=\"*\"/></cross-domain-policy>";

/// What a connection turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    PolicyFileProbe,
    WebSocketUpgrade,
    StandardHttp,
}

/// `<policy-file-request/>`, with optional whitespace before the closing
/// tag. This is not http; it fires on a short payload with no headers.
pub fn is_policy_file_request(data: &[u8]) -> bool {
    let Some(rest) = data.strip_prefix(POLICY_FILE_REQUEST) else {
        return false;
    };
    let ws = rest.iter().take_while(|b| b.is_ascii_whitespace()).count();
    rest[ws..].starts_with(b"/>")
}

/// Classify the bytes buffered so far; `None` means not decidable yet.
///
/// The upgrade check is a case-sensitive literal match on both field
/// names and values: `Connection: Upgrade` plus `Upgrade: WebSocket`,
/// spelled exactly like that. Everything else falls open to plain http.
pub fn classify(data: &[u8]) -> Option<Verdict> {
    if is_policy_file_request(data) {
        return Some(Verdict::PolicyFileProbe);
    }

    let (head, _) = http::split_header(data)?;

    let verdict = match RequestHeader::parse(head) {
        Err(e) => {
            debug!("unparsable request head ({}), falling open to http", e);
            Verdict::StandardHttp
        }
        Ok(req) => {
            if req.field("Connection") == Some("Upgrade")
                && req.field("Upgrade") == Some("WebSocket")
            {
                Verdict::WebSocketUpgrade
            } else {
                Verdict::StandardHttp
            }
        }
    };

    Some(verdict)
}
