//! Streaming `multipart/form-data` reader.
//!
//! Parts are produced one at a time over the request body: each [`MultipartPart`] borrows
//! the reader, so the previous part is always finished (or drained) before the next one
//! starts. Part bodies are [`BoundaryStream`]s and implement [`SharedRead`].

mod boundary;
mod content_disposition;

pub use boundary::{BoundaryState, BoundaryStream};
pub use content_disposition::ContentDisposition;

use crate::buffer::{SharedRead, drain};
use crate::codec::header::read_headers;
use crate::codec::line::{LineScanner, read_line};
use crate::protocol::ParseError;
use http::{HeaderMap, header};
use tracing::trace;

/// One part: its MIME headers and a body stream ending at the next delimiter.
#[derive(Debug)]
pub struct MultipartPart<'a, S: ?Sized> {
    pub headers: HeaderMap,
    pub body: BoundaryStream<'a, S>,
}

impl<S: SharedRead + ?Sized> MultipartPart<'_, S> {
    /// Decoded `Content-Disposition` header, if present and well formed.
    pub fn content_disposition(&self) -> Option<ContentDisposition> {
        let value = self.headers.get(header::CONTENT_DISPOSITION)?;
        ContentDisposition::decode(&String::from_utf8_lossy(value.as_bytes())).ok()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }
}

/// Reads the parts of a multipart body from `src`.
pub struct MultipartReader<'a, S: ?Sized> {
    src: &'a mut S,
    boundary: Option<String>,
    scanner: LineScanner,
    started: bool,
    end_of_post: bool,
    current: Option<BoundaryState>,
}

impl<S: ?Sized> std::fmt::Debug for MultipartReader<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultipartReader")
            .field("boundary", &self.boundary)
            .field("end_of_post", &self.end_of_post)
            .finish_non_exhaustive()
    }
}

impl<'a, S: SharedRead + ?Sized> MultipartReader<'a, S> {
    /// `boundary` is either the bare token or a full content type carrying `boundary=`.
    /// Without one the boundary is taken from the first line of the body.
    pub fn new(src: &'a mut S, boundary: Option<&str>) -> Self {
        Self {
            src,
            boundary: boundary.map(extract_boundary),
            scanner: LineScanner::new(),
            started: false,
            end_of_post: false,
            current: None,
        }
    }

    pub fn boundary(&self) -> Option<&str> {
        self.boundary.as_deref()
    }

    /// Returns the next part, or `None` after the terminal delimiter.
    ///
    /// An unfinished previous part is drained first.
    pub async fn read_part(&mut self) -> Result<Option<MultipartPart<'_, S>>, ParseError> {
        if !self.started {
            self.start().await?;
            self.started = true;
        }

        if let Some(mut state) = self.current.take() {
            if !state.is_ended() {
                let drained = drain(&mut BoundaryStream::new(&mut *self.src, &mut state)).await?;
                trace!(drained, "discarded unread multipart part");
            }
            if state.is_last_boundary() {
                self.end_of_post = true;
            }
        }
        if self.end_of_post {
            return Ok(None);
        }

        let headers = read_headers(&mut *self.src, &mut self.scanner).await?;
        let boundary = self.boundary.as_deref().unwrap_or_default();
        let state = self.current.insert(BoundaryState::new(boundary));
        trace!(headers = headers.len(), "read multipart part headers");
        Ok(Some(MultipartPart { headers, body: BoundaryStream::new(&mut *self.src, state) }))
    }

    async fn start(&mut self) -> Result<(), ParseError> {
        let line = read_line(&mut *self.src, &mut self.scanner)
            .await?
            .ok_or_else(|| ParseError::malformed_boundary("empty multipart body"))?;

        match self.boundary.clone() {
            None => match line.strip_prefix("--") {
                Some(token) if !token.is_empty() => self.boundary = Some(token.to_string()),
                _ => return Err(ParseError::malformed_boundary(format!("invalid opening line {line:?}"))),
            },
            Some(boundary) => {
                let opening = line.strip_prefix("--").unwrap_or_default();
                if opening.strip_prefix(boundary.as_str()) == Some("--") {
                    self.end_of_post = true;
                } else if opening != boundary {
                    return Err(ParseError::malformed_boundary(format!("invalid opening line {line:?}")));
                }
            }
        }
        trace!(boundary = ?self.boundary, empty = self.end_of_post, "started multipart body");
        Ok(())
    }
}

fn extract_boundary(value: &str) -> String {
    let token = match value.rfind("boundary=") {
        Some(pos) => &value[pos + "boundary=".len()..],
        None => value,
    };
    let token = token.split(';').next().unwrap_or_default().trim();
    token.trim_matches('"').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{InputBuffer, read_to_end};
    use crate::test_util::{SPLITS, ScriptedReader, split_reader};
    use bytes::BytesMut;
    use indoc::indoc;

    fn crlf(s: &str) -> Vec<u8> {
        s.replace('\n', "\r\n").into_bytes()
    }

    fn form() -> Vec<u8> {
        crlf(indoc! {r#"
            --AaB03x
            Content-Disposition: form-data; name="title"

            hello
            --AaB03x
            Content-Disposition: form-data; name="file"; filename="a.txt"
            Content-Type: text/plain

            line 1
            line 2
            --AaB03x
            Content-Disposition: form-data; name="empty"


            --AaB03x--
        "#})
    }

    #[test]
    fn test_extract_boundary() {
        assert_eq!(extract_boundary("multipart/form-data; boundary=AaB03x"), "AaB03x");
        assert_eq!(extract_boundary("multipart/form-data; boundary=\"q b\"; charset=x"), "q b");
        assert_eq!(extract_boundary("plain"), "plain");
    }

    #[tokio::test]
    async fn test_parts_in_order() {
        let expected: [(&str, &[u8]); 3] = [("title", b"hello"), ("file", b"line 1\r\nline 2"), ("empty", b"")];

        for size in SPLITS {
            let mut input = InputBuffer::new(split_reader(&form(), size));
            let mut reader = MultipartReader::new(&mut input, Some("multipart/form-data; boundary=AaB03x"));

            let mut seen = 0;
            let mut last_flags = Vec::new();
            while let Some(mut part) = reader.read_part().await.unwrap() {
                let (name, body) = expected[seen];
                assert_eq!(part.content_disposition().unwrap().get("name"), Some(name));

                let mut out = BytesMut::new();
                read_to_end(&mut part.body, &mut out).await.unwrap();
                assert_eq!(&out[..], body, "part {seen} split {size}");
                last_flags.push(part.body.is_last_boundary());
                seen += 1;
            }
            assert_eq!(seen, 3);
            assert_eq!(last_flags, [false, false, true]);
        }
    }

    #[tokio::test]
    async fn test_unread_parts_are_drained() {
        let mut input = InputBuffer::new(ScriptedReader::whole(&form()));
        let mut reader = MultipartReader::new(&mut input, Some("AaB03x"));

        {
            let first = reader.read_part().await.unwrap().unwrap();
            assert_eq!(first.content_disposition().unwrap().get("name"), Some("title"));
        }
        {
            let second = reader.read_part().await.unwrap().unwrap();
            assert_eq!(second.content_type(), Some("text/plain"));
        }

        assert!(reader.read_part().await.unwrap().is_some());
        assert!(reader.read_part().await.unwrap().is_none());
        assert!(reader.read_part().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_inferred_boundary() {
        let mut input = InputBuffer::new(ScriptedReader::whole(&form()));
        let mut reader = MultipartReader::new(&mut input, None);
        assert!(reader.read_part().await.unwrap().is_some());
        assert_eq!(reader.boundary(), Some("AaB03x"));
    }

    #[tokio::test]
    async fn test_empty_post() {
        let mut input = InputBuffer::new(ScriptedReader::whole(b"--AaB03x--\r\n"));
        let mut reader = MultipartReader::new(&mut input, Some("AaB03x"));
        assert!(reader.read_part().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_opening_mismatch() {
        let mut input = InputBuffer::new(ScriptedReader::whole(b"--other\r\n\r\n"));
        let mut reader = MultipartReader::new(&mut input, Some("AaB03x"));
        assert!(matches!(reader.read_part().await, Err(ParseError::MalformedBoundary { .. })));
    }
}
