//! Opening handshake of RFC 6455 section 4.2.

use crate::ensure;
use crate::protocol::{ParseError, RequestHead, ResponseHead};
use base64::prelude::*;
use http::{HeaderValue, Response, StatusCode, header};
use sha1::{Digest, Sha1};

const ACCEPT_GUID: &[u8] = b"258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// `sec-websocket-accept` value for a client key.
pub fn accept_key(key: &[u8]) -> String {
    let mut sha1 = Sha1::new();
    sha1.update(key);
    sha1.update(ACCEPT_GUID);
    BASE64_STANDARD.encode(&sha1.finalize()[..])
}

/// Builds the `101 Switching Protocols` head answering an upgrade request.
pub fn handshake_response(request: &RequestHead) -> Result<ResponseHead, ParseError> {
    ensure!(request.is_websocket_upgrade(), ParseError::protocol_violation("not a websocket upgrade request"));
    let key = request
        .headers()
        .get(header::SEC_WEBSOCKET_KEY)
        .ok_or_else(|| ParseError::protocol_violation("missing sec-websocket-key"))?;

    let accept = HeaderValue::try_from(accept_key(key.as_bytes().trim_ascii()))
        .map_err(|e| ParseError::protocol_violation(format!("invalid accept key: {e}")))?;

    let mut response = Response::new(());
    *response.status_mut() = StatusCode::SWITCHING_PROTOCOLS;
    let headers = response.headers_mut();
    headers.insert(header::UPGRADE, HeaderValue::from_static("websocket"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("upgrade"));
    headers.insert(header::SEC_WEBSOCKET_ACCEPT, accept);
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::InputBuffer;
    use crate::codec::line::LineScanner;
    use crate::test_util::ScriptedReader;

    async fn head(raw: &str) -> RequestHead {
        let raw = raw.replace('\n', "\r\n");
        let mut input = InputBuffer::new(ScriptedReader::whole(raw.as_bytes()));
        RequestHead::read(&mut input, &mut LineScanner::new()).await.unwrap().unwrap()
    }

    #[test]
    fn test_accept_key() {
        // RFC 6455 section 1.3
        assert_eq!(accept_key(b"dGhlIHNhbXBsZSBub25jZQ=="), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[tokio::test]
    async fn test_handshake_response() {
        let request =
            head("GET /chat HTTP/1.1\nHost: server\nUpgrade: websocket\nConnection: Upgrade\nSec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\n\n")
                .await;
        let response = handshake_response(&request).unwrap();
        assert_eq!(response.status(), StatusCode::SWITCHING_PROTOCOLS);
        assert_eq!(response.headers()[header::SEC_WEBSOCKET_ACCEPT], "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
        assert_eq!(response.headers()[header::UPGRADE], "websocket");
    }

    #[tokio::test]
    async fn test_handshake_violations() {
        let request = head("GET /chat HTTP/1.1\nUpgrade: websocket\n\n").await;
        assert!(matches!(handshake_response(&request), Err(ParseError::ProtocolViolation { .. })));

        let request = head("GET /chat HTTP/1.1\nSec-WebSocket-Key: abc\n\n").await;
        assert!(matches!(handshake_response(&request), Err(ParseError::ProtocolViolation { .. })));
    }
}
