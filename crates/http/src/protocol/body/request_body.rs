use crate::buffer::{DynRead, InputBuffer, SharedRead, drain, read_to_end};
use crate::codec::body::{ChunkedReader, LengthReader};
use crate::codec::multipart::MultipartReader;
use crate::protocol::{ParseError, PayloadSize};
use bytes::{Bytes, BytesMut};
use serde::de::DeserializeOwned;
use tracing::trace;

/// Framing state of the body being read.
#[derive(Debug, Clone)]
pub enum BodyReader {
    Length(LengthReader),
    Chunked(ChunkedReader),
    Empty,
}

impl BodyReader {
    pub fn new(size: PayloadSize) -> Self {
        match size {
            PayloadSize::Length(n) => BodyReader::Length(LengthReader::new(n)),
            PayloadSize::Chunked => BodyReader::Chunked(ChunkedReader::new()),
            PayloadSize::Empty => BodyReader::Empty,
        }
    }

    pub fn is_eof(&self) -> bool {
        match self {
            BodyReader::Length(reader) => reader.is_eof(),
            BodyReader::Chunked(reader) => reader.is_eof(),
            BodyReader::Empty => true,
        }
    }
}

/// The body of the current message: a request on the server side, a response in the client.
pub struct RequestBody<'c> {
    input: &'c mut InputBuffer<DynRead>,
    reader: BodyReader,
}

impl std::fmt::Debug for RequestBody<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestBody").field("reader", &self.reader).finish_non_exhaustive()
    }
}

impl<'c> RequestBody<'c> {
    pub fn new(input: &'c mut InputBuffer<DynRead>, size: PayloadSize) -> Self {
        Self { input, reader: BodyReader::new(size) }
    }

    /// Continues a body whose framing state was kept from an earlier reader.
    pub(crate) fn resume(input: &'c mut InputBuffer<DynRead>, reader: BodyReader) -> Self {
        Self { input, reader }
    }

    pub(crate) fn reader(&self) -> &BodyReader {
        &self.reader
    }

    pub fn is_eof(&self) -> bool {
        self.reader.is_eof()
    }

    /// Declared length, `None` for chunked bodies.
    pub fn content_length(&self) -> Option<u64> {
        match &self.reader {
            BodyReader::Length(reader) => Some(reader.remaining()),
            BodyReader::Chunked(_) => None,
            BodyReader::Empty => Some(0),
        }
    }

    /// The raw connection input, past the end of the body once it was drained.
    pub(crate) fn input_mut(&mut self) -> &mut InputBuffer<DynRead> {
        self.input
    }

    pub async fn read_to_bytes(&mut self) -> Result<Bytes, ParseError> {
        let mut buf = BytesMut::with_capacity(self.content_length().map_or(0, |n| n.min(64 * 1024) as usize));
        read_to_end(self, &mut buf).await?;
        Ok(buf.freeze())
    }

    /// Reads the whole body as text, invalid UTF-8 sequences replaced.
    pub async fn read_to_string(&mut self) -> Result<String, ParseError> {
        let bytes = self.read_to_bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub async fn read_json<T: DeserializeOwned>(&mut self) -> Result<T, ParseError> {
        let bytes = self.read_to_bytes().await?;
        serde_json::from_slice(&bytes).map_err(ParseError::invalid_body)
    }

    /// Discards whatever is left, returning the number of bytes skipped.
    pub async fn drain(&mut self) -> Result<u64, ParseError> {
        if self.is_eof() {
            return Ok(0);
        }
        let drained = drain(self).await?;
        trace!(drained, "drained request body");
        Ok(drained)
    }

    /// Multipart parts of the body. `boundary` is the bare token or the request content type;
    /// without it the boundary is taken from the first body line.
    pub fn multipart(&mut self, boundary: Option<&str>) -> MultipartReader<'_, Self> {
        MultipartReader::new(self, boundary)
    }
}

impl SharedRead for RequestBody<'_> {
    async fn shared_read(&mut self, max: usize) -> Result<&[u8], ParseError> {
        match &mut self.reader {
            BodyReader::Length(reader) => reader.shared_read(&mut *self.input, max).await,
            BodyReader::Chunked(reader) => reader.shared_read(&mut *self.input, max).await,
            BodyReader::Empty => Ok(&[]),
        }
    }

    fn rewind(&mut self, n: usize) {
        match &mut self.reader {
            BodyReader::Length(reader) => reader.rewind(&mut *self.input, n),
            BodyReader::Chunked(reader) => reader.rewind(&mut *self.input, n),
            BodyReader::Empty => {}
        }
    }
}
