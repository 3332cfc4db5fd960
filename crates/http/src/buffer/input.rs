use super::{DEFAULT_BUFFER_SIZE, Pooled, SharedRead};
use crate::protocol::ParseError;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

/// The reader half every connection-level codec is written against.
pub type DynRead = dyn AsyncRead + Send + Unpin;

/// A fixed-size read buffer bound to one reader.
///
/// Unread bytes live in `buf[offset..offset + count]`. [`fill`](InputBuffer::fill) only touches
/// the reader when `count == 0`, so views handed out by [`take`](InputBuffer::take) stay valid
/// until every byte of the current fill has been consumed.
///
/// The reader is the last field so `&mut InputBuffer<TcpStream>` coerces to
/// `&mut InputBuffer<DynRead>`.
pub struct InputBuffer<R: ?Sized> {
    buf: Pooled<Box<[u8]>>,
    offset: usize,
    count: usize,
    read_counter: u64,
    reader: R,
}

impl<R: ?Sized> std::fmt::Debug for InputBuffer<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputBuffer")
            .field("capacity", &self.buf.len())
            .field("offset", &self.offset)
            .field("count", &self.count)
            .field("read_counter", &self.read_counter)
            .finish_non_exhaustive()
    }
}

impl<R> InputBuffer<R> {
    pub fn new(reader: R) -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE, reader)
    }

    pub fn with_capacity(capacity: usize, reader: R) -> Self {
        Self::with_buffer(Pooled::detached(vec![0u8; capacity].into_boxed_slice()), reader)
    }

    /// Binds a (usually pooled) buffer to `reader`, starting with every cursor at zero.
    pub fn with_buffer(buf: Pooled<Box<[u8]>>, reader: R) -> Self {
        Self { buf, offset: 0, count: 0, read_counter: 0, reader }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: ?Sized> InputBuffer<R> {
    /// The unread bytes of the current fill.
    #[inline]
    pub fn available(&self) -> &[u8] {
        &self.buf[self.offset..self.offset + self.count]
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Bytes pulled from the reader since this buffer was bound.
    #[inline]
    pub fn read_counter(&self) -> u64 {
        self.read_counter
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Advances the cursor by `n` bytes.
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.count);
        self.offset += n;
        self.count -= n;
    }

    /// Consumes `n` bytes and returns them as a view into the buffer.
    pub fn take(&mut self, n: usize) -> &[u8] {
        let n = n.min(self.count);
        let start = self.offset;
        self.offset += n;
        self.count -= n;
        &self.buf[start..start + n]
    }

    /// Gives back the last `n` consumed bytes of the current fill.
    pub fn rewind(&mut self, n: usize) {
        debug_assert!(n <= self.offset, "rewind {n} exceeds consumed bytes {}", self.offset);
        let n = n.min(self.offset);
        self.offset -= n;
        self.count += n;
    }
}

impl<R: AsyncRead + Unpin + ?Sized> InputBuffer<R> {
    /// Refills the buffer from the reader if every byte has been consumed.
    ///
    /// Returns the number of unread bytes; zero means the reader reached end of stream.
    /// Cancel safe: the cursors are only updated once the read completed.
    pub async fn fill(&mut self) -> io::Result<usize> {
        if self.count > 0 {
            return Ok(self.count);
        }
        let n = self.reader.read(&mut self.buf[..]).await?;
        self.offset = 0;
        self.count = n;
        self.read_counter += n as u64;
        trace!(len = n, "fill input buffer");
        Ok(n)
    }
}

impl<R: AsyncRead + Unpin + Send + ?Sized> SharedRead for InputBuffer<R> {
    async fn shared_read(&mut self, max: usize) -> Result<&[u8], ParseError> {
        self.fill().await?;
        Ok(self.take(max))
    }

    fn rewind(&mut self, n: usize) {
        InputBuffer::rewind(self, n);
    }
}
