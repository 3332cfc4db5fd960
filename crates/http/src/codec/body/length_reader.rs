//! Reader bounding a body to a fixed number of bytes.

use crate::buffer::SharedRead;
use crate::protocol::ParseError;
use tracing::trace;

/// Serves exactly `length` bytes of the underlying source, then end of stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthReader {
    length: u64,
    position: u64,
}

impl LengthReader {
    pub fn new(length: u64) -> Self {
        Self { length, position: 0 }
    }

    #[inline]
    pub fn remaining(&self) -> u64 {
        self.length - self.position
    }

    #[inline]
    pub fn is_eof(&self) -> bool {
        self.remaining() == 0
    }

    /// Returns the next segment, never crossing `length`.
    ///
    /// Once the body is exhausted the source is not touched anymore, so the bytes of the
    /// next message stay in the buffer.
    pub async fn shared_read<'s, S>(&mut self, src: &'s mut S, max: usize) -> Result<&'s [u8], ParseError>
    where
        S: SharedRead + ?Sized,
    {
        if self.is_eof() || max == 0 {
            return Ok(&[]);
        }

        let limit = usize::try_from(self.remaining()).unwrap_or(usize::MAX).min(max);
        let segment = src.shared_read(limit).await?;
        if segment.is_empty() {
            return Err(ParseError::unexpected_eof());
        }

        self.position += segment.len() as u64;
        trace!(len = segment.len(), remaining = self.remaining(), "read length limited bytes");
        Ok(segment)
    }

    pub fn rewind<S>(&mut self, src: &mut S, n: usize)
    where
        S: SharedRead + ?Sized,
    {
        let n = n.min(usize::try_from(self.position).unwrap_or(usize::MAX));
        src.rewind(n);
        self.position -= n as u64;
    }
}
