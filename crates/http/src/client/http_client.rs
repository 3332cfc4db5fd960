use super::{ClientError, ClientRequest, ClientResponse};
use crate::buffer::{DynRead, DynWrite, InputBuffer, OutputBuffer};
use crate::codec::header::{RequestEncoder, read_headers};
use crate::codec::line::{LineScanner, read_line};
use crate::content::{ResponseSink, Transfer};
use crate::protocol::body::{BodyReader, RequestBody};
use crate::protocol::{ParseError, PayloadSize, SendError, parse_status_line};
use http::{HeaderValue, Method, Response, StatusCode, header};
use std::fmt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::{debug, info, trace};

/// One client connection, sending requests and reading their responses in turn.
pub struct HttpClient<R, W> {
    host: String,
    scanner: LineScanner,
    last_method: Method,
    pending: Option<BodyReader>,
    input: InputBuffer<R>,
    output: OutputBuffer<W>,
}

impl<R, W> fmt::Debug for HttpClient<R, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("host", &self.host)
            .field("pending", &self.pending)
            .field("input", &self.input)
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}

impl HttpClient<OwnedReadHalf, OwnedWriteHalf> {
    /// Opens a TCP connection to `host:port`. Requests without a `host` field get
    /// `host[:port]`, the port left out when it is 80.
    pub async fn connect(host: &str, port: u16) -> Result<Self, ClientError> {
        let address = host.trim_start_matches('[').trim_end_matches(']');
        let stream = TcpStream::connect((address, port))
            .await
            .map_err(|source| ClientError::Connect { host: host.to_string(), port, source })?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "failed to set TCP_NODELAY");
        }
        info!(host, port, "client connected");

        let (reader, writer) = stream.into_split();
        let host = if port == 80 { host.to_string() } else { format!("{host}:{port}") };
        Ok(Self::new(reader, writer, host))
    }
}

impl<R, W> HttpClient<R, W>
where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
{
    pub fn new<H: Into<String>>(reader: R, writer: W, host: H) -> Self {
        Self {
            host: host.into(),
            scanner: LineScanner::new(),
            last_method: Method::GET,
            pending: None,
            input: InputBuffer::new(reader),
            output: OutputBuffer::new(writer),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Writes `request` and its content, then flushes.
    ///
    /// Whatever is left of the previous response body is discarded first.
    pub async fn send(&mut self, request: ClientRequest) -> Result<(), ClientError> {
        self.discard_pending().await?;

        let (mut head, mut content) = request.into_parts(&self.host)?;
        let size = match &content {
            None => PayloadSize::Empty,
            Some(content) => {
                if !head.headers().contains_key(header::CONTENT_TYPE) {
                    if let Some(value) = content.content_type().and_then(|v| HeaderValue::from_str(v).ok()) {
                        head.headers_mut().insert(header::CONTENT_TYPE, value);
                    }
                }
                content.try_compute_length().map_or(PayloadSize::Chunked, PayloadSize::Length)
            }
        };
        debug!(method = %head.method(), uri = %head.uri(), ?size, "sending request");
        self.last_method = head.method().clone();

        let output: &mut OutputBuffer<DynWrite> = &mut self.output;
        output.encode(&mut RequestEncoder, (head, size)).await?;
        if let Some(content) = content.as_mut() {
            let transfer = if size.is_chunked() { Transfer::Chunked } else { Transfer::Direct };
            let mut sink = ResponseSink::new(&mut *output, transfer);
            content.copy_to(&mut sink).await?;
            sink.finish().await?;
        }
        output.flush().await.map_err(SendError::io)?;
        Ok(())
    }

    /// Reads the next response head; the body is read through the returned response.
    ///
    /// Informational responses (`100 Continue`) come back like any other; call again for the
    /// final one. Responses to `HEAD`, `1xx`, `204` and `304` have no body whatever their
    /// fields say, and a response with neither `content-length` nor chunked framing has an
    /// empty one.
    pub async fn response(&mut self) -> Result<ClientResponse<'_>, ClientError> {
        self.discard_pending().await?;

        let input: &mut InputBuffer<DynRead> = &mut self.input;
        let line = read_line(&mut *input, &mut self.scanner).await?.ok_or_else(ParseError::unexpected_eof)?;
        let (version, status, reason) = parse_status_line(&line)?;
        let headers = read_headers(&mut *input, &mut self.scanner).await?;

        let bodiless = self.last_method == Method::HEAD
            || status.is_informational()
            || status == StatusCode::NO_CONTENT
            || status == StatusCode::NOT_MODIFIED;
        let size = if bodiless { PayloadSize::Empty } else { PayloadSize::from_headers(&headers)? };
        trace!(%status, ?size, headers = headers.len(), "read response head");

        let mut head = Response::new(());
        *head.version_mut() = version;
        *head.status_mut() = status;
        *head.headers_mut() = headers;
        Ok(ClientResponse::new(head, reason, RequestBody::new(input, size), &mut self.pending))
    }

    /// Discards the unread rest of the last response body and shuts the writer down.
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.discard_pending().await?;
        self.output.shutdown().await.map_err(SendError::io)?;
        Ok(())
    }

    async fn discard_pending(&mut self) -> Result<(), ParseError> {
        if let Some(reader) = self.pending.take() {
            let input: &mut InputBuffer<DynRead> = &mut self.input;
            let drained = RequestBody::resume(input, reader).drain().await?;
            trace!(drained, "discarded unread response body");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::HttpConnection;
    use crate::content::BytesContent;
    use crate::handler::{HandlerError, make_handler};
    use crate::server::{ServerConfig, ServerState};
    use crate::test_util::{SPLITS, ScriptedReader, split_reader};
    use crate::websocket::SessionStore;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, duplex, sink, split};
    use http::Version;

    fn scripted(raw: &str, size: usize) -> HttpClient<ScriptedReader, tokio::io::Sink> {
        HttpClient::new(split_reader(raw.as_bytes(), size), sink(), "example.org")
    }

    #[tokio::test]
    async fn test_request_encoding() {
        let (client_side, mut server_side) = duplex(64 * 1024);
        let (read, write) = split(client_side);
        let mut client = HttpClient::new(read, write, "example.org");

        let request = ClientRequest::post("/submit").query("name", "a b").content(BytesContent::text("hello"));
        client.send(request).await.unwrap();
        client.send(ClientRequest::get("/next")).await.unwrap();
        client.close().await.unwrap();

        let mut sent = String::new();
        server_side.read_to_string(&mut sent).await.unwrap();
        let (first, second) = sent.split_at(sent.find("GET ").unwrap());
        assert!(first.starts_with("POST /submit?name=a+b HTTP/1.1\r\nhost: example.org\r\n"), "{first}");
        assert!(first.contains("content-type: text/plain"));
        assert!(first.contains("content-length: 5\r\n"));
        assert!(first.ends_with("\r\n\r\nhello"));
        assert_eq!(second, "GET /next HTTP/1.1\r\nhost: example.org\r\n\r\n");
    }

    #[tokio::test]
    async fn test_unread_body_is_discarded() {
        let raw = "HTTP/1.1 200 OK\r\ncontent-length: 11\r\n\r\nhello world\
                   HTTP/1.1 201 Created\r\ntransfer-encoding: chunked\r\n\r\n4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n\
                   HTTP/1.1 202 \r\ncontent-length: 2\r\n\r\nok";
        for size in SPLITS {
            let mut client = scripted(raw, size);

            client.send(ClientRequest::get("/a")).await.unwrap();
            {
                let response = client.response().await.unwrap();
                assert_eq!(response.status(), StatusCode::OK);
                assert_eq!(response.header_str(header::CONTENT_LENGTH), Some("11"));
            }

            client.send(ClientRequest::get("/b")).await.unwrap();
            {
                let mut response = client.response().await.unwrap();
                assert_eq!(response.reason(), "Created");
                let mut part = [0u8; 3];
                let n = crate::buffer::read_into(response.body(), &mut part).await.unwrap();
                assert!(n > 0, "split {size}");
            }

            let mut response = client.response().await.unwrap();
            assert_eq!(response.status(), StatusCode::ACCEPTED);
            assert_eq!(response.reason(), "Accepted");
            assert_eq!(response.read_to_string().await.unwrap(), "ok", "split {size}");
        }
    }

    #[tokio::test]
    async fn test_bodiless_responses() {
        let raw = "HTTP/1.1 200 OK\r\ncontent-length: 5\r\n\r\n\
                   HTTP/1.1 100 Continue\r\n\r\n\
                   HTTP/1.1 204 No Content\r\ncontent-length: 7\r\n\r\n\
                   HTTP/1.0 200 OK\r\n\r\n\
                   HTTP/1.1 200 OK\r\ncontent-length: 4\r\n\r\ntail";
        let mut client = scripted(raw, 7);

        client.send(ClientRequest::new(Method::HEAD, "/")).await.unwrap();
        let mut response = client.response().await.unwrap();
        assert_eq!(response.header_str(header::CONTENT_LENGTH), Some("5"));
        assert!(response.read_to_bytes().await.unwrap().is_empty());
        drop(response);

        client.send(ClientRequest::get("/")).await.unwrap();
        assert_eq!(client.response().await.unwrap().status(), StatusCode::CONTINUE);
        let mut response = client.response().await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(response.read_to_bytes().await.unwrap().is_empty());
        drop(response);

        client.send(ClientRequest::get("/")).await.unwrap();
        let mut response = client.response().await.unwrap();
        assert_eq!(response.version(), Version::HTTP_10);
        assert!(response.read_to_bytes().await.unwrap().is_empty());
        drop(response);

        client.send(ClientRequest::get("/")).await.unwrap();
        let full = client.response().await.unwrap().into_full().await.unwrap();
        assert_eq!(&full.body()[..], b"tail");
    }

    #[tokio::test]
    async fn test_malformed_and_truncated_responses() {
        let mut client = scripted("HTTP/1.1 200 OK\r\ncontent-length: 10\r\n\r\nshort", usize::MAX);
        client.send(ClientRequest::get("/")).await.unwrap();
        let mut response = client.response().await.unwrap();
        let err = response.read_to_bytes().await.unwrap_err();
        assert!(matches!(err, ParseError::Io { source } if source.kind() == std::io::ErrorKind::UnexpectedEof));

        let mut client = scripted("SPDY/3 200 OK\r\n\r\n", usize::MAX);
        client.send(ClientRequest::get("/")).await.unwrap();
        let err = client.response().await.unwrap_err();
        assert!(matches!(err, ClientError::Receive { source: ParseError::MalformedLine { .. } }), "{err:?}");

        let mut client = HttpClient::new(ScriptedReader::new([]), sink(), "example.org");
        assert!(matches!(client.response().await, Err(ClientError::Receive { .. })));
    }

    #[tokio::test]
    async fn test_against_server_connection() {
        let handler = make_handler(|ctx| {
            Box::pin(async move {
                let body = ctx.body().read_to_string().await?;
                let path = ctx.request().path().to_string();
                ctx.set_content(BytesContent::text(format!("{path}:{body}")));
                Ok::<_, HandlerError>(())
            })
        });
        let state = ServerState::new(Arc::new(ServerConfig::default()), Arc::new(handler), SessionStore::new());
        let (client_side, server_side) = duplex(64 * 1024);
        let (read, write) = split(server_side);
        let server = tokio::spawn(HttpConnection::new(read, write, Arc::clone(&state)).process());

        let (read, write) = split(client_side);
        let mut client = HttpClient::new(read, write, "localhost");
        let keep_alive = HeaderValue::from_static("keep-alive");

        let request = ClientRequest::post("/first").header(header::CONNECTION, keep_alive).content(BytesContent::text("one"));
        client.send(request).await.unwrap();
        let mut response = client.response().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.header_str(header::CONNECTION), Some("keep-alive"));
        assert_eq!(response.read_to_string().await.unwrap(), "/first:one");
        drop(response);

        client.send(ClientRequest::get("/second")).await.unwrap();
        let mut response = client.response().await.unwrap();
        assert_eq!(response.header_str(header::CONNECTION), Some("close"));
        assert_eq!(response.read_to_string().await.unwrap(), "/second:");
        drop(response);

        client.close().await.unwrap();
        server.await.unwrap().unwrap();
    }
}
