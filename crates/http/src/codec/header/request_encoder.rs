//! Serializes request heads for the client side.

use super::header_encoder::FastWrite;
use crate::protocol::{PayloadSize, SendError};
use bytes::{BufMut, BytesMut};
use http::{HeaderValue, Request, Version, header};
use std::io;
use std::io::{ErrorKind, Write};
use tokio_util::codec::Encoder;
use tracing::error;

const INIT_HEADER_SIZE: usize = 512;

const CHUNKED: HeaderValue = HeaderValue::from_static("chunked");

/// Encoder for request heads.
///
/// The request line carries the path and query of the uri. `Length(n)` forces
/// `content-length: n`, `Chunked` forces `transfer-encoding: chunked`, `Empty` strips both.
#[derive(Debug, Default)]
pub struct RequestEncoder;

impl Encoder<(Request<()>, PayloadSize)> for RequestEncoder {
    type Error = SendError;

    fn encode(&mut self, item: (Request<()>, PayloadSize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (mut head, payload_size) = item;

        let protocol = match head.version() {
            Version::HTTP_11 => "HTTP/1.1",
            Version::HTTP_10 => "HTTP/1.0",
            v => {
                error!(http_version = ?v, "unsupported http version");
                return Err(io::Error::from(ErrorKind::Unsupported).into());
            }
        };
        let target = head.uri().path_and_query().map_or("/", |p| p.as_str());

        dst.reserve(INIT_HEADER_SIZE);
        write!(FastWrite(dst), "{} {} {}\r\n", head.method(), target, protocol)?;

        let headers = head.headers_mut();
        match payload_size {
            PayloadSize::Length(n) => {
                headers.remove(header::TRANSFER_ENCODING);
                headers.insert(header::CONTENT_LENGTH, n.into());
            }
            PayloadSize::Chunked => {
                headers.remove(header::CONTENT_LENGTH);
                headers.insert(header::TRANSFER_ENCODING, CHUNKED);
            }
            PayloadSize::Empty => {
                headers.remove(header::CONTENT_LENGTH);
                headers.remove(header::TRANSFER_ENCODING);
            }
        }

        for (name, value) in head.headers() {
            dst.put_slice(name.as_ref());
            dst.put_slice(b": ");
            dst.put_slice(value.as_ref());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    fn encode(head: Request<()>, size: PayloadSize) -> String {
        let mut dst = BytesMut::new();
        RequestEncoder.encode((head, size), &mut dst).unwrap();
        String::from_utf8(dst.to_vec()).unwrap()
    }

    #[test]
    fn test_get_without_body() {
        let head = Request::builder()
            .uri("/search?q=rust&page=2")
            .header(header::HOST, "example.org")
            .header(header::CONTENT_LENGTH, "12")
            .body(())
            .unwrap();
        assert_eq!(encode(head, PayloadSize::Empty), "GET /search?q=rust&page=2 HTTP/1.1\r\nhost: example.org\r\n\r\n");
    }

    #[test]
    fn test_post_framing() {
        let head = Request::builder().method(Method::POST).uri("/upload").body(()).unwrap();
        assert_eq!(encode(head, PayloadSize::Length(5)), "POST /upload HTTP/1.1\r\ncontent-length: 5\r\n\r\n");

        let head = Request::builder().method(Method::PUT).uri("http://h/x").header(header::CONTENT_LENGTH, "3").body(()).unwrap();
        assert_eq!(encode(head, PayloadSize::Chunked), "PUT /x HTTP/1.1\r\ntransfer-encoding: chunked\r\n\r\n");
    }

    #[test]
    fn test_unsupported_version() {
        let head = Request::builder().version(Version::HTTP_2).body(()).unwrap();
        assert!(RequestEncoder.encode((head, PayloadSize::Empty), &mut BytesMut::new()).is_err());
    }
}
