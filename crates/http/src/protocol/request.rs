use std::borrow::Cow;

use crate::buffer::SharedRead;
use crate::codec::header::read_headers;
use crate::codec::line::{LineScanner, read_line};
use crate::ensure;
use crate::protocol::{ParseError, PayloadSize};
use http::{HeaderMap, HeaderName, Method, Request, Uri, Version, header};
use percent_encoding::percent_decode_str;
use tracing::trace;

/// The request line and header block of one request, the body excluded.
#[derive(Debug)]
pub struct RequestHead {
    inner: Request<()>,
    query: Vec<(String, String)>,
}

impl AsRef<Request<()>> for RequestHead {
    fn as_ref(&self) -> &Request<()> {
        &self.inner
    }
}

impl AsMut<Request<()>> for RequestHead {
    fn as_mut(&mut self) -> &mut Request<()> {
        &mut self.inner
    }
}

impl RequestHead {
    /// Reads the request line and header block.
    ///
    /// Returns `None` when the source ends cleanly before the request line.
    pub async fn read<S>(src: &mut S, scanner: &mut LineScanner) -> Result<Option<Self>, ParseError>
    where
        S: SharedRead + ?Sized,
    {
        let Some(line) = read_line(src, scanner).await? else {
            return Ok(None);
        };
        let (method, uri, version) = parse_request_line(&line)?;
        let headers = read_headers(src, scanner).await?;
        trace!(%method, %uri, headers = headers.len(), "read request head");

        let mut inner = Request::new(());
        *inner.method_mut() = method;
        *inner.uri_mut() = uri;
        *inner.version_mut() = version;
        *inner.headers_mut() = headers;
        Self::try_from(inner).map(Some)
    }

    pub fn into_inner(self) -> Request<()> {
        self.inner
    }

    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    pub fn path(&self) -> &str {
        self.inner.uri().path()
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Header value as text, lossily decoded.
    pub fn header_str<K: AsRef<str>>(&self, name: K) -> Option<Cow<'_, str>> {
        let value = self.inner.headers().get(name.as_ref())?;
        Some(String::from_utf8_lossy(value.as_bytes()))
    }

    /// Decoded query pairs in request order.
    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    /// Last value of the query parameter `name`.
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.iter().rev().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    /// URL-decoded cookies of the `cookie` header, malformed pairs skipped.
    pub fn cookies(&self) -> Vec<(String, String)> {
        let Some(cookie) = self.header_str(header::COOKIE) else {
            return Vec::new();
        };
        cookie
            .split(';')
            .filter_map(|pair| {
                let (key, value) = pair.split_once('=')?;
                let key = key.trim();
                (!key.is_empty() && !value.is_empty()).then(|| (url_decode(key), url_decode(value)))
            })
            .collect()
    }

    /// Framing of the request body: `Content-Length` first, then chunked, else no body.
    pub fn payload_size(&self) -> Result<PayloadSize, ParseError> {
        PayloadSize::from_headers(self.inner.headers())
    }

    /// True only when the client explicitly asked for `connection: keep-alive`.
    pub fn keep_alive_requested(&self) -> bool {
        self.header_eq(header::CONNECTION, "keep-alive")
    }

    pub fn expects_continue(&self) -> bool {
        self.header_eq(header::EXPECT, "100-continue")
    }

    pub fn accepts_gzip(&self) -> bool {
        self.header_str(header::ACCEPT_ENCODING).is_some_and(|v| v.contains("gzip"))
    }

    /// A native `upgrade: websocket` request.
    pub fn is_websocket_upgrade(&self) -> bool {
        self.header_eq(header::UPGRADE, "websocket")
    }

    /// Opening request of an emulated long polling socket.
    pub fn is_poll_open(&self) -> bool {
        self.query("socket") == Some("poll") && self.query("command") == Some("open")
    }

    /// Either flavour of socket request.
    pub fn is_websocket_request(&self) -> bool {
        self.is_websocket_upgrade() || self.is_poll_open()
    }

    fn header_eq(&self, name: HeaderName, expected: &str) -> bool {
        self.header_str(name).is_some_and(|v| v.trim().eq_ignore_ascii_case(expected))
    }
}

impl TryFrom<Request<()>> for RequestHead {
    type Error = ParseError;

    fn try_from(inner: Request<()>) -> Result<Self, Self::Error> {
        let query = match inner.uri().query() {
            Some(query) => serde_urlencoded::from_str::<Vec<(String, String)>>(query)
                .map_err(|e| ParseError::malformed_line(format!("invalid query string: {e}")))?,
            None => Vec::new(),
        };
        Ok(Self { inner, query })
    }
}

/// Form-style decoding: `+` is a space, `%XX` a byte, invalid UTF-8 replaced.
fn url_decode(value: &str) -> String {
    let value = value.replace('+', " ");
    percent_decode_str(&value).decode_utf8_lossy().into_owned()
}

/// Parses `METHOD SP target SP HTTP/1.x`.
pub fn parse_request_line(line: &str) -> Result<(Method, Uri, Version), ParseError> {
    let mut parts = line.split(' ');
    let (Some(method), Some(target), Some(protocol), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(ParseError::malformed_line(format!("invalid request line {line:?}")));
    };

    let method = Method::from_bytes(method.as_bytes())
        .map_err(|_| ParseError::malformed_line(format!("invalid method {method:?}")))?;
    ensure!(!target.is_empty(), ParseError::malformed_line("empty request target"));
    let uri = Uri::try_from(target).map_err(|e| ParseError::malformed_line(format!("invalid target {target:?}: {e}")))?;
    let version = match protocol {
        "HTTP/1.1" => Version::HTTP_11,
        "HTTP/1.0" => Version::HTTP_10,
        other => return Err(ParseError::malformed_line(format!("unsupported protocol {other:?}"))),
    };
    Ok((method, uri, version))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::InputBuffer;
    use crate::test_util::{SPLITS, ScriptedReader, split_reader};
    use http::HeaderValue;
    use indoc::indoc;

    fn crlf(s: &str) -> Vec<u8> {
        s.replace('\n', "\r\n").into_bytes()
    }

    async fn parse(raw: &str) -> RequestHead {
        let mut input = InputBuffer::new(ScriptedReader::whole(&crlf(raw)));
        RequestHead::read(&mut input, &mut LineScanner::new()).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn from_curl() {
        let raw = crlf(indoc! {r##"
        GET /index.html HTTP/1.1
        Host: 127.0.0.1:8080
        User-Agent: curl/7.79.1
        Accept: */*

        "##});

        for size in SPLITS {
            let mut input = InputBuffer::new(split_reader(&raw, size));
            let head = RequestHead::read(&mut input, &mut LineScanner::new()).await.unwrap().unwrap();

            assert_eq!(head.method(), &Method::GET);
            assert_eq!(head.version(), Version::HTTP_11);
            assert_eq!(head.uri().host(), None);
            assert_eq!(head.path(), "/index.html");
            assert_eq!(head.uri().query(), None);
            assert_eq!(head.headers().len(), 3);
            assert_eq!(head.headers().get(header::ACCEPT), Some(&HeaderValue::from_static("*/*")));
            assert_eq!(head.headers().get(header::USER_AGENT), Some(&HeaderValue::from_static("curl/7.79.1")));
            assert_eq!(head.payload_size().unwrap(), PayloadSize::Empty);
        }
    }

    #[tokio::test]
    async fn from_edge() {
        let head = parse(indoc! {r##"
        GET /index/?a=1&b=2&a=3 HTTP/1.1
        Host: 127.0.0.1:8080
        Connection: keep-alive
        sec-ch-ua: "#Not_A Brand";v="99", "Microsoft Edge";v="109", "Chromium";v="109"
        Accept-Encoding: gzip, deflate, br
        Cookie: session=abc; theme=dark; broken

        "##})
        .await;

        assert_eq!(head.path(), "/index/");
        assert_eq!(head.uri().query(), Some("a=1&b=2&a=3"));
        assert_eq!(head.query_pairs().len(), 3);
        assert_eq!(head.query("a"), Some("3"));
        assert_eq!(head.query("b"), Some("2"));
        assert!(head.keep_alive_requested());
        assert!(head.accepts_gzip());
        assert_eq!(
            head.header_str("sec-ch-ua").unwrap(),
            r##""#Not_A Brand";v="99", "Microsoft Edge";v="109", "Chromium";v="109""##
        );
        assert_eq!(
            head.cookies(),
            vec![("session".to_string(), "abc".to_string()), ("theme".to_string(), "dark".to_string())]
        );
    }

    #[tokio::test]
    async fn test_body_selection() {
        let head = parse("POST /upload HTTP/1.1\nContent-Length: 42\n\n").await;
        assert_eq!(head.payload_size().unwrap(), PayloadSize::Length(42));

        let head = parse("POST /upload HTTP/1.1\nTransfer-Encoding: chunked\n\n").await;
        assert_eq!(head.payload_size().unwrap(), PayloadSize::Chunked);

        let head = parse("POST /upload HTTP/1.1\nContent-Length: nope\n\n").await;
        assert!(matches!(head.payload_size(), Err(ParseError::MalformedHeader { .. })));
    }

    #[tokio::test]
    async fn test_socket_requests() {
        let head = parse("GET /chat HTTP/1.1\nUpgrade: WebSocket\nConnection: Upgrade\n\n").await;
        assert!(head.is_websocket_upgrade());
        assert!(!head.keep_alive_requested());

        let head = parse("GET /chat?socket=poll&command=open HTTP/1.1\n\n").await;
        assert!(head.is_poll_open());
        assert!(head.is_websocket_request());
    }

    #[tokio::test]
    async fn test_cookies_are_url_decoded() {
        let head = parse("GET / HTTP/1.1\nCookie: user%20name=J%C3%A9r%C3%B4me; pref=a+b%3Bc;  =x; lone\n\n").await;
        assert_eq!(
            head.cookies(),
            vec![("user name".to_string(), "Jérôme".to_string()), ("pref".to_string(), "a b;c".to_string())]
        );
    }

    #[tokio::test]
    async fn test_clean_eof_before_request() {
        let mut input = InputBuffer::new(ScriptedReader::new([]));
        assert!(RequestHead::read(&mut input, &mut LineScanner::new()).await.unwrap().is_none());
    }

    #[test]
    fn test_malformed_request_lines() {
        for line in ["GET /", "GET / HTTP/1.1 extra", "GET / FTP/1.0", "GET  HTTP/1.1", "G@T / HTTP/1.1"] {
            assert!(matches!(parse_request_line(line), Err(ParseError::MalformedLine { .. })), "{line}");
        }
        let (method, uri, version) = parse_request_line("DELETE /item/7 HTTP/1.0").unwrap();
        assert_eq!(method, Method::DELETE);
        assert_eq!(uri.path(), "/item/7");
        assert_eq!(version, Version::HTTP_10);
    }
}
