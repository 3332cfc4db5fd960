use super::{Content, ResponseSink};
use crate::protocol::SendError;
use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;

/// A body held in memory.
#[derive(Debug, Clone)]
pub struct BytesContent {
    bytes: Bytes,
    content_type: String,
}

impl BytesContent {
    pub fn new<B: Into<Bytes>, T: Into<String>>(bytes: B, content_type: T) -> Self {
        Self { bytes: bytes.into(), content_type: content_type.into() }
    }

    /// `text/plain; charset=utf-8`
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self::new(text.into(), mime::TEXT_PLAIN_UTF_8.as_ref())
    }

    /// `text/html; charset=utf-8`
    pub fn html<S: Into<String>>(html: S) -> Self {
        Self::new(html.into(), mime::TEXT_HTML_UTF_8.as_ref())
    }

    /// Serializes `value` as `application/json`.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        let bytes = serde_json::to_vec(value)?;
        Ok(Self::new(bytes, mime::APPLICATION_JSON.as_ref()))
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }
}

#[async_trait]
impl Content for BytesContent {
    fn content_type(&self) -> Option<&str> {
        Some(&self.content_type)
    }

    fn try_compute_length(&self) -> Option<u64> {
        Some(self.bytes.len() as u64)
    }

    async fn copy_to(&mut self, sink: &mut ResponseSink<'_>) -> Result<(), SendError> {
        sink.write(&self.bytes).await
    }
}

/// Zero bytes and no content type.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyContent;

#[async_trait]
impl Content for EmptyContent {
    fn content_type(&self) -> Option<&str> {
        None
    }

    fn try_compute_length(&self) -> Option<u64> {
        Some(0)
    }

    async fn copy_to(&mut self, _sink: &mut ResponseSink<'_>) -> Result<(), SendError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{DynWrite, OutputBuffer};
    use crate::content::Transfer;
    use serde_json::json;

    #[test]
    fn test_constructors() {
        let text = BytesContent::text("hi");
        assert_eq!(text.content_type(), Some("text/plain; charset=utf-8"));
        assert_eq!(text.try_compute_length(), Some(2));
        assert!(!text.supports_ranges());

        assert_eq!(BytesContent::html("<p/>").content_type(), Some("text/html; charset=utf-8"));

        let json = BytesContent::json(&json!({"a": 1})).unwrap();
        assert_eq!(json.content_type(), Some("application/json"));
        assert_eq!(&json.bytes()[..], br#"{"a":1}"#);
    }

    #[tokio::test]
    async fn test_copy_to_sink() {
        let mut output = OutputBuffer::new(Vec::new());
        let out: &mut OutputBuffer<DynWrite> = &mut output;
        let mut sink = ResponseSink::new(out, Transfer::Direct);
        BytesContent::text("hello").copy_to(&mut sink).await.unwrap();
        EmptyContent.copy_to(&mut sink).await.unwrap();
        assert_eq!(sink.written(), 5);
        assert!(sink.finish().await.unwrap().is_none());

        output.flush().await.unwrap();
        assert_eq!(output.into_inner(), b"hello");
    }

    #[tokio::test]
    async fn test_ranges_unsupported() {
        let mut output = OutputBuffer::new(Vec::new());
        let out: &mut OutputBuffer<DynWrite> = &mut output;
        let mut sink = ResponseSink::new(out, Transfer::Direct);
        let result = BytesContent::text("hello").copy_range_to(&mut sink, 0, 1).await;
        assert!(matches!(result, Err(SendError::InvalidBody { .. })));
    }
}
