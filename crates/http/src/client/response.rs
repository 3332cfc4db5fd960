use crate::codec::multipart::MultipartReader;
use crate::protocol::ParseError;
use crate::protocol::body::{BodyReader, RequestBody};
use bytes::Bytes;
use http::{HeaderMap, Response, StatusCode, Version, header};
use serde::de::DeserializeOwned;
use std::fmt;

/// A received response head and its body, read straight off the client's connection.
///
/// When dropped with unread body bytes, the framing state goes back to the client, which
/// discards the rest before sending its next request.
pub struct ClientResponse<'c> {
    head: Response<()>,
    reason: String,
    body: RequestBody<'c>,
    pending: &'c mut Option<BodyReader>,
}

impl fmt::Debug for ClientResponse<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientResponse")
            .field("status", &self.head.status())
            .field("headers", self.head.headers())
            .field("body", &self.body)
            .finish_non_exhaustive()
    }
}

impl<'c> ClientResponse<'c> {
    pub(crate) fn new(
        head: Response<()>,
        reason: String,
        body: RequestBody<'c>,
        pending: &'c mut Option<BodyReader>,
    ) -> Self {
        Self { head, reason, body, pending }
    }

    pub fn status(&self) -> StatusCode {
        self.head.status()
    }

    pub fn version(&self) -> Version {
        self.head.version()
    }

    /// Reason phrase as sent, or the canonical one when the server sent none.
    pub fn reason(&self) -> &str {
        if self.reason.is_empty() { self.head.status().canonical_reason().unwrap_or_default() } else { &self.reason }
    }

    pub fn headers(&self) -> &HeaderMap {
        self.head.headers()
    }

    pub fn header_str(&self, name: impl header::AsHeaderName) -> Option<&str> {
        self.head.headers().get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&mut self) -> &mut RequestBody<'c> {
        &mut self.body
    }

    pub async fn read_to_bytes(&mut self) -> Result<Bytes, ParseError> {
        self.body.read_to_bytes().await
    }

    pub async fn read_to_string(&mut self) -> Result<String, ParseError> {
        self.body.read_to_string().await
    }

    pub async fn read_json<T: DeserializeOwned>(&mut self) -> Result<T, ParseError> {
        self.body.read_json().await
    }

    /// Parts of a multipart body, the boundary taken from `content-type`.
    pub fn multipart(&mut self) -> MultipartReader<'_, RequestBody<'c>> {
        let content_type = self.header_str(header::CONTENT_TYPE).map(str::to_string);
        self.body.multipart(content_type.as_deref())
    }

    /// Reads the whole body and returns it with the head.
    pub async fn into_full(mut self) -> Result<Response<Bytes>, ParseError> {
        let body = self.body.read_to_bytes().await?;
        let head = std::mem::replace(&mut self.head, Response::new(()));
        let (parts, ()) = head.into_parts();
        Ok(Response::from_parts(parts, body))
    }
}

impl Drop for ClientResponse<'_> {
    fn drop(&mut self) {
        if !self.body.is_eof() {
            *self.pending = Some(self.body.reader().clone());
        }
    }
}
