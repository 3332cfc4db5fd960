//! Where content bytes go.
//!
//! The negotiated [`Transfer`] decides how bytes written to a [`ResponseSink`] reach the
//! connection: unchanged, wrapped in chunk framing, gzipped into memory (so the compressed
//! length can be announced before anything is sent), gzipped and chunked on the fly, or
//! dropped for `HEAD`.

use crate::buffer::{DynWrite, OutputBuffer};
use crate::codec::body::ChunkedEncoder;
use crate::protocol::{PayloadItem, SendError};
use bytes::{Bytes, BytesMut};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fmt;
use std::io;
use std::io::Write;
use tracing::trace;

/// How a response body is put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    /// Bytes go out as written, framed by `content-length`.
    Direct,
    /// Chunked transfer encoding.
    Chunked,
    /// Gzip into memory; [`ResponseSink::finish`] returns the compressed body.
    GzipMemory,
    /// Gzip with chunked transfer encoding.
    GzipChunked,
    /// Nothing is written.
    Discard,
}

/// Collects compressed output.
#[derive(Debug, Default)]
struct Writer {
    buf: BytesMut,
}

impl Writer {
    fn take(&mut self) -> Bytes {
        self.buf.split().freeze()
    }
}

impl Write for Writer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

enum Mode {
    Direct,
    Discard,
    Chunked(ChunkedEncoder),
    GzipMemory(GzEncoder<Writer>),
    GzipChunked(GzEncoder<Writer>, ChunkedEncoder),
}

pub struct ResponseSink<'a> {
    output: &'a mut OutputBuffer<DynWrite>,
    mode: Mode,
    written: u64,
}

impl fmt::Debug for ResponseSink<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.mode {
            Mode::Direct => Transfer::Direct,
            Mode::Discard => Transfer::Discard,
            Mode::Chunked(_) => Transfer::Chunked,
            Mode::GzipMemory(_) => Transfer::GzipMemory,
            Mode::GzipChunked(..) => Transfer::GzipChunked,
        };
        f.debug_struct("ResponseSink").field("mode", &mode).field("written", &self.written).finish()
    }
}

impl<'a> ResponseSink<'a> {
    pub fn new(output: &'a mut OutputBuffer<DynWrite>, transfer: Transfer) -> Self {
        let mode = match transfer {
            Transfer::Direct => Mode::Direct,
            Transfer::Discard => Mode::Discard,
            Transfer::Chunked => Mode::Chunked(ChunkedEncoder::new()),
            Transfer::GzipMemory => Mode::GzipMemory(gzip()),
            Transfer::GzipChunked => Mode::GzipChunked(gzip(), ChunkedEncoder::new()),
        };
        Self { output, mode, written: 0 }
    }

    /// Uncompressed bytes accepted so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    pub async fn write(&mut self, data: &[u8]) -> Result<(), SendError> {
        if data.is_empty() {
            return Ok(());
        }
        self.written += data.len() as u64;

        match &mut self.mode {
            Mode::Direct => self.output.write(data).await?,
            Mode::Discard => {}
            Mode::Chunked(chunked) => {
                self.output.encode(chunked, PayloadItem::Chunk(data)).await?;
            }
            Mode::GzipMemory(gz) => gz.write_all(data)?,
            Mode::GzipChunked(gz, chunked) => {
                gz.write_all(data)?;
                let compressed = gz.get_mut().take();
                if !compressed.is_empty() {
                    self.output.encode(chunked, PayloadItem::Chunk(compressed)).await?;
                }
            }
        }
        Ok(())
    }

    /// Completes the body: writes the terminal chunk for chunked modes, and for
    /// [`Transfer::GzipMemory`] returns the compressed body, which has not been written.
    pub async fn finish(self) -> Result<Option<Bytes>, SendError> {
        let written = self.written;
        let result = match self.mode {
            Mode::Direct | Mode::Discard => None,
            Mode::Chunked(mut chunked) => {
                self.output.encode(&mut chunked, PayloadItem::<&[u8]>::Eof).await?;
                None
            }
            Mode::GzipMemory(gz) => Some(gz.finish()?.take()),
            Mode::GzipChunked(gz, mut chunked) => {
                let rest = gz.finish()?.take();
                if !rest.is_empty() {
                    self.output.encode(&mut chunked, PayloadItem::Chunk(rest)).await?;
                }
                self.output.encode(&mut chunked, PayloadItem::<Bytes>::Eof).await?;
                None
            }
        };
        trace!(written, compressed = ?result.as_ref().map(Bytes::len), "finished response body");
        Ok(result)
    }
}

fn gzip() -> GzEncoder<Writer> {
    GzEncoder::new(Writer::default(), Compression::default())
}
