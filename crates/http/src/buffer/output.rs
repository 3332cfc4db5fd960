use bytes::{BufMut, BytesMut};
use std::io;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::codec::Encoder;
use tracing::trace;

/// The writer half every connection-level codec is written against.
pub type DynWrite = dyn AsyncWrite + Send + Unpin;

/// Size at which buffered output is pushed to the writer without waiting for a flush.
const HIGH_WATER_MARK: usize = 16 * 1024;

const INIT_CAPACITY: usize = 8 * 1024;

/// Batches outgoing bytes and counts what reached the writer.
pub struct OutputBuffer<W: ?Sized> {
    buf: BytesMut,
    write_counter: u64,
    writer: W,
}

impl<W: ?Sized> std::fmt::Debug for OutputBuffer<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputBuffer")
            .field("buffered", &self.buf.len())
            .field("write_counter", &self.write_counter)
            .finish_non_exhaustive()
    }
}

impl<W> OutputBuffer<W> {
    pub fn new(writer: W) -> Self {
        Self { buf: BytesMut::with_capacity(INIT_CAPACITY), write_counter: 0, writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: ?Sized> OutputBuffer<W> {
    /// Staging area for encoders; bytes placed here go out on the next flush.
    #[inline]
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }

    /// Bytes handed to the writer so far.
    #[inline]
    pub fn write_counter(&self) -> u64 {
        self.write_counter
    }

    #[inline]
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }
}

impl<W: AsyncWrite + Unpin + ?Sized> OutputBuffer<W> {
    /// Stages `data`, pushing to the writer once the high-water mark is reached.
    pub async fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.buf.put_slice(data);
        if self.buf.len() >= HIGH_WATER_MARK {
            self.write_pending().await?;
        }
        Ok(())
    }

    /// Encodes `item` into the staging buffer, pushing to the writer past the high-water mark.
    pub async fn encode<E, I>(&mut self, encoder: &mut E, item: I) -> Result<(), E::Error>
    where
        E: Encoder<I>,
        E::Error: From<io::Error>,
    {
        encoder.encode(item, &mut self.buf)?;
        if self.buf.len() >= HIGH_WATER_MARK {
            self.write_pending().await?;
        }
        Ok(())
    }

    /// Writes every staged byte and flushes the writer.
    pub async fn flush(&mut self) -> io::Result<()> {
        self.write_pending().await?;
        self.writer.flush().await
    }

    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.flush().await?;
        self.writer.shutdown().await
    }

    async fn write_pending(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        self.writer.write_all(&self.buf).await?;
        self.write_counter += self.buf.len() as u64;
        trace!(len = self.buf.len(), "write output buffer");
        self.buf.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_flush_counts_written_bytes() {
        let mut output = OutputBuffer::new(Vec::new());
        output.write(b"HTTP/1.1 200 OK\r\n").await.unwrap();
        output.buffer_mut().extend_from_slice(b"\r\n");
        assert_eq!(output.write_counter(), 0);

        output.flush().await.unwrap();
        assert_eq!(output.write_counter(), 19);
        assert_eq!(output.pending(), 0);
        assert_eq!(output.into_inner(), b"HTTP/1.1 200 OK\r\n\r\n");
    }

    #[tokio::test]
    async fn test_large_writes_go_out_early() {
        let mut output = OutputBuffer::new(Vec::new());
        output.write(&vec![b'x'; HIGH_WATER_MARK]).await.unwrap();
        assert_eq!(output.pending(), 0);
        assert_eq!(output.write_counter(), HIGH_WATER_MARK as u64);
    }
}
