//! Decoder for HTTP chunked transfer encoding.
//!
//! Each chunk is a hexadecimal size line, the chunk data and a CRLF; a zero size ends the
//! body. Chunk extensions and trailers are not supported: a size line must be pure hex and
//! the zero chunk must be followed directly by the final empty line.

use crate::buffer::SharedRead;
use crate::codec::line::{LineScanner, read_line};
use crate::ensure;
use crate::protocol::ParseError;
use tracing::trace;

#[derive(Debug, Clone)]
pub struct ChunkedReader {
    chunk_length: u64,
    chunk_pos: u64,
    first_chunk: bool,
    finished: bool,
    scanner: LineScanner,
}

impl Default for ChunkedReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkedReader {
    pub fn new() -> Self {
        Self { chunk_length: 0, chunk_pos: 0, first_chunk: true, finished: false, scanner: LineScanner::new() }
    }

    #[inline]
    pub fn is_eof(&self) -> bool {
        self.finished
    }

    /// Returns the next segment of chunk data, never crossing a chunk boundary.
    pub async fn shared_read<'s, S>(&mut self, src: &'s mut S, max: usize) -> Result<&'s [u8], ParseError>
    where
        S: SharedRead + ?Sized,
    {
        if self.finished || max == 0 {
            return Ok(&[]);
        }

        if self.chunk_pos == self.chunk_length {
            self.next_chunk(src).await?;
            if self.finished {
                return Ok(&[]);
            }
        }

        let remaining = self.chunk_length - self.chunk_pos;
        let limit = usize::try_from(remaining).unwrap_or(usize::MAX).min(max);
        let segment = src.shared_read(limit).await?;
        if segment.is_empty() {
            return Err(ParseError::unexpected_eof());
        }

        self.chunk_pos += segment.len() as u64;
        trace!(len = segment.len(), "read chunked bytes");
        Ok(segment)
    }

    /// Gives back the last `n` bytes of the previous segment.
    pub fn rewind<S>(&mut self, src: &mut S, n: usize)
    where
        S: SharedRead + ?Sized,
    {
        let n = n.min(usize::try_from(self.chunk_pos).unwrap_or(usize::MAX));
        src.rewind(n);
        self.chunk_pos -= n as u64;
    }

    async fn next_chunk<S>(&mut self, src: &mut S) -> Result<(), ParseError>
    where
        S: SharedRead + ?Sized,
    {
        if !self.first_chunk {
            let separator = self.read_line(src).await?;
            ensure!(separator.is_empty(), ParseError::malformed_chunk("missing CRLF after chunk data"));
        }
        self.first_chunk = false;

        let size_line = self.read_line(src).await?;
        self.chunk_length = parse_chunk_size(&size_line)?;
        self.chunk_pos = 0;
        trace!(size = self.chunk_length, "read chunk size");

        if self.chunk_length == 0 {
            let end = self.read_line(src).await?;
            ensure!(end.is_empty(), ParseError::malformed_chunk("chunk trailers are not supported"));
            self.finished = true;
            trace!("finished reading chunked data");
        }
        Ok(())
    }

    async fn read_line<S>(&mut self, src: &mut S) -> Result<String, ParseError>
    where
        S: SharedRead + ?Sized,
    {
        read_line(src, &mut self.scanner).await?.ok_or_else(|| ParseError::malformed_chunk("unexpected end of stream"))
    }
}

fn parse_chunk_size(line: &str) -> Result<u64, ParseError> {
    let digits = line.trim_matches([' ', '\t']);
    ensure!(
        !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_hexdigit()),
        ParseError::malformed_chunk(format!("invalid chunk size line {line:?}"))
    );
    u64::from_str_radix(digits, 16).map_err(|_| ParseError::malformed_chunk("chunk size overflow"))
}
