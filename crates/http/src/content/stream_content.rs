use super::{Content, ResponseSink};
use crate::protocol::SendError;
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};

const COPY_BUFFER_SIZE: usize = 8 * 1024;

/// A body read from any async reader. Its length is unknown, so it always goes out chunked.
#[derive(Debug)]
pub struct StreamContent<R> {
    reader: R,
    content_type: String,
}

impl<R: AsyncRead + Send + Unpin> StreamContent<R> {
    pub fn new<T: Into<String>>(reader: R, content_type: T) -> Self {
        Self { reader, content_type: content_type.into() }
    }
}

#[async_trait]
impl<R: AsyncRead + Send + Unpin> Content for StreamContent<R> {
    fn content_type(&self) -> Option<&str> {
        Some(&self.content_type)
    }

    fn try_compute_length(&self) -> Option<u64> {
        None
    }

    async fn copy_to(&mut self, sink: &mut ResponseSink<'_>) -> Result<(), SendError> {
        let mut buf = vec![0u8; COPY_BUFFER_SIZE];
        loop {
            let n = self.reader.read(&mut buf).await?;
            if n == 0 {
                return Ok(());
            }
            sink.write(&buf[..n]).await?;
        }
    }
}
