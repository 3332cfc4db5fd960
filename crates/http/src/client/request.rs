use super::ClientError;
use crate::content::Content;
use http::header::{HOST, HeaderName};
use http::{HeaderMap, HeaderValue, Method, Request, Uri};
use std::fmt;

/// A request waiting to be sent: method, path, extra query parameters, fields and content.
pub struct ClientRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    content: Option<Box<dyn Content>>,
}

impl fmt::Debug for ClientRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("query", &self.query)
            .field("headers", &self.headers)
            .field("has_content", &self.content.is_some())
            .finish()
    }
}

impl ClientRequest {
    /// `path` may already carry a query string; parameters added with
    /// [`query`](ClientRequest::query) are appended to it.
    pub fn new<P: Into<String>>(method: Method, path: P) -> Self {
        Self { method, path: path.into(), query: Vec::new(), headers: HeaderMap::new(), content: None }
    }

    pub fn get<P: Into<String>>(path: P) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post<P: Into<String>>(path: P) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn set_path<P: Into<String>>(&mut self, path: P) {
        self.path = path.into();
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn query<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Sets the body. Its length, when known, becomes `content-length`, otherwise the body is
    /// sent chunked; its type fills `content-type` unless one is set.
    #[must_use]
    pub fn content<C: Content + 'static>(mut self, content: C) -> Self {
        self.content = Some(Box::new(content));
        self
    }

    pub fn has_content(&self) -> bool {
        self.content.is_some()
    }

    /// The request target: the path followed by the url-encoded query parameters.
    pub fn target(&self) -> Result<Uri, ClientError> {
        let mut target = if self.path.is_empty() { "/".to_string() } else { self.path.clone() };
        if !self.query.is_empty() {
            let query =
                serde_urlencoded::to_string(&self.query).map_err(|e| ClientError::invalid_url(&self.path, e))?;
            target.push(if target.contains('?') { '&' } else { '?' });
            target.push_str(&query);
        }
        Uri::try_from(target.as_str()).map_err(|e| ClientError::invalid_url(&target, e))
    }

    /// Splits the request into its head, with `host` filled in when missing, and its content.
    pub(crate) fn into_parts(self, host: &str) -> Result<(Request<()>, Option<Box<dyn Content>>), ClientError> {
        let mut head = Request::new(());
        *head.uri_mut() = self.target()?;
        *head.method_mut() = self.method;
        *head.headers_mut() = self.headers;
        if !head.headers().contains_key(HOST) {
            let value = HeaderValue::from_str(host).map_err(|e| ClientError::invalid_url(host, e))?;
            head.headers_mut().insert(HOST, value);
        }
        Ok((head, self.content))
    }
}
