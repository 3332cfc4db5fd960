use super::{Content, ResponseSink};
use crate::protocol::SendError;
use async_trait::async_trait;
use mime::Mime;
use std::io::SeekFrom;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

const COPY_BUFFER_SIZE: usize = 16 * 1024;

/// A file served from disk. Supports single byte ranges.
#[derive(Debug)]
pub struct FileContent {
    file: File,
    length: u64,
    content_type: String,
}

impl FileContent {
    /// Opens `path`, taking the content type from its extension.
    pub async fn open<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).await?;
        let length = file.metadata().await?.len();
        Ok(Self { file, length, content_type: content_type_for(path).to_string() })
    }

    #[must_use]
    pub fn with_content_type<T: Into<String>>(mut self, content_type: T) -> Self {
        self.content_type = content_type.into();
        self
    }

    async fn copy_span(&mut self, sink: &mut ResponseSink<'_>, start: u64, length: u64) -> Result<(), SendError> {
        self.file.seek(SeekFrom::Start(start)).await?;
        let mut buf = vec![0u8; COPY_BUFFER_SIZE];
        let mut remaining = length;
        while remaining > 0 {
            let want = usize::try_from(remaining).unwrap_or(usize::MAX).min(buf.len());
            let n = self.file.read(&mut buf[..want]).await?;
            if n == 0 {
                return Err(SendError::invalid_body(format!("file ended {remaining} bytes early")));
            }
            sink.write(&buf[..n]).await?;
            remaining -= n as u64;
        }
        Ok(())
    }
}

#[async_trait]
impl Content for FileContent {
    fn content_type(&self) -> Option<&str> {
        Some(&self.content_type)
    }

    fn try_compute_length(&self) -> Option<u64> {
        Some(self.length)
    }

    fn supports_ranges(&self) -> bool {
        true
    }

    async fn copy_to(&mut self, sink: &mut ResponseSink<'_>) -> Result<(), SendError> {
        self.copy_span(sink, 0, self.length).await
    }

    async fn copy_range_to(&mut self, sink: &mut ResponseSink<'_>, start: u64, length: u64) -> Result<(), SendError> {
        if start.checked_add(length).is_none_or(|end| end > self.length) {
            return Err(SendError::invalid_body(format!("range {start}+{length} outside of {} bytes", self.length)));
        }
        self.copy_span(sink, start, length).await
    }
}

/// Content type for a file name, `application/octet-stream` when the extension is unknown.
pub fn content_type_for(path: &Path) -> Mime {
    let extension = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("html" | "htm") => mime::TEXT_HTML_UTF_8,
        Some("txt") => mime::TEXT_PLAIN_UTF_8,
        Some("css") => mime::TEXT_CSS,
        Some("js") => mime::APPLICATION_JAVASCRIPT,
        Some("json") => mime::APPLICATION_JSON,
        Some("xml") => mime::TEXT_XML,
        Some("svg") => mime::IMAGE_SVG,
        Some("png") => mime::IMAGE_PNG,
        Some("jpg" | "jpeg") => mime::IMAGE_JPEG,
        Some("gif") => mime::IMAGE_GIF,
        Some("pdf") => mime::APPLICATION_PDF,
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{DynWrite, OutputBuffer};
    use crate::content::Transfer;
    use std::path::PathBuf;

    async fn temp_file(name: &str, data: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("micro-wire-{}-{name}", std::process::id()));
        tokio::fs::write(&path, data).await.unwrap();
        path
    }

    async fn copy(content: &mut FileContent, range: Option<(u64, u64)>) -> Result<Vec<u8>, SendError> {
        let mut output = OutputBuffer::new(Vec::new());
        {
            let out: &mut OutputBuffer<DynWrite> = &mut output;
            let mut sink = ResponseSink::new(out, Transfer::Direct);
            match range {
                Some((start, length)) => content.copy_range_to(&mut sink, start, length).await?,
                None => content.copy_to(&mut sink).await?,
            }
        }
        output.flush().await.unwrap();
        Ok(output.into_inner())
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for(Path::new("index.HTML")), mime::TEXT_HTML_UTF_8);
        assert_eq!(content_type_for(Path::new("app.js")).essence_str(), "application/javascript");
        assert_eq!(content_type_for(Path::new("blob")), mime::APPLICATION_OCTET_STREAM);
    }

    #[tokio::test]
    async fn test_full_and_ranged_copies() {
        let data: Vec<u8> = (0..40_000u32).map(|i| (i % 251) as u8).collect();
        let path = temp_file("ranges.bin", &data).await;
        let mut content = FileContent::open(&path).await.unwrap();
        assert_eq!(content.try_compute_length(), Some(40_000));
        assert!(content.supports_ranges());
        assert_eq!(content.content_type(), Some("application/octet-stream"));

        assert_eq!(copy(&mut content, None).await.unwrap(), data);
        assert_eq!(copy(&mut content, Some((100, 20_000))).await.unwrap(), &data[100..20_100]);
        assert_eq!(copy(&mut content, None).await.unwrap(), data);
        assert!(matches!(copy(&mut content, Some((39_990, 11))).await, Err(SendError::InvalidBody { .. })));

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_with_content_type() {
        let path = temp_file("page.html", b"<html></html>").await;
        let content = FileContent::open(&path).await.unwrap();
        assert_eq!(content.content_type(), Some("text/html; charset=utf-8"));
        let content = content.with_content_type("text/x-custom");
        assert_eq!(content.content_type(), Some("text/x-custom"));
        tokio::fs::remove_file(&path).await.unwrap();
    }
}
